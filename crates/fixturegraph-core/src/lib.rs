//! Resolution engine for declarative object-graph fixtures.
//!
//! A factory definition maps field names to [declarations](declarations):
//! recipes computing a value from sibling fields, a sequence number, another
//! factory, or a parameter. Building resolves every declaration exactly
//! once, in a dependency-driven order, hands the finished attribute map to
//! a [`Model`](model::Model), then runs the post-instantiation declarations
//! against the instance.
//!
//! # Quick Start
//!
//! ```
//! use fixturegraph_core::prelude::*;
//! use serde_json::json;
//!
//! let addresses = Factory::builder("Address")
//! 	.model(DictModel)
//! 	.declare("city", "Paris")
//! 	.declare("owner", Declaration::self_attribute("..username"))
//! 	.build()
//! 	.unwrap();
//!
//! let users = Factory::builder("User")
//! 	.model(DictModel)
//! 	.declare("username", Declaration::sequence(|n| Ok(json!(format!("user{}", n)))))
//! 	.declare("email", Declaration::lazy_attribute(|obj| {
//! 		let name = obj.get("username")?;
//! 		Ok(json!(format!("{}@example.com", name.as_str().unwrap_or_default())))
//! 	}))
//! 	.declare("address", SubFactory::new(&addresses))
//! 	.build()
//! 	.unwrap();
//!
//! let user = users.build(Overrides::new().set("address__city", "Lyon")).unwrap();
//! assert_eq!(
//! 	user.to_value(),
//! 	json!({
//! 		"username": "user0",
//! 		"email": "user0@example.com",
//! 		"address": {"city": "Lyon", "owner": "user0"}
//! 	})
//! );
//! ```
//!
//! # Architecture
//!
//! - [`Declaration`](declarations::Declaration) - lazy recipe for one field
//! - [`DeclarationSet`](declaration_set::DeclarationSet) - declarations plus nested override contexts
//! - [`Parameter`](params::Parameter) and [`Trait`](params::Trait) - virtual fields and overlays
//! - [`StepBuilder`](builder::StepBuilder), [`BuildStep`](builder::BuildStep) and
//!   [`Resolver`](builder::Resolver) - one build, its state and its lazy attribute surface
//! - [`SequenceCounter`](sequence::SequenceCounter) - per-owner build counter
//! - [`Factory`](factory::Factory) - the immutable definition and its generation API
//!
//! # Features
//!
//! - `serde-models` - [`SerdeModel`](model::SerdeModel), deserializing the attributes
//!   into a `serde` type (enabled by default)

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod builder;
pub mod declaration_set;
pub mod declarations;
pub mod error;
pub mod factory;
pub mod model;
pub mod params;
pub mod prelude;
pub mod sequence;
pub mod strategy;

// Re-export commonly used types at crate root
pub use declarations::{Declaration, Overrides};
pub use error::{FactoryError, FactoryResult};
pub use factory::{Factory, FactoryBuilder, FactoryOptions};
pub use model::{Instance, Model};
pub use strategy::Strategy;

//! # fixturegraph
//!
//! Declarative object-graph fixtures for Rust, inspired by Factory Boy.
//!
//! A factory describes the fields of an object as declarations instead of
//! literals: values computed from sibling fields, from a build counter, from
//! another factory, or switched on by a trait. Building a factory resolves
//! every declaration once, hands the attributes to a model, and runs the
//! post-instantiation declarations against the result.
//!
//! ## Feature Flags
//!
//! - `serde-models` (default) - `SerdeModel`, which deserializes the resolved
//!   attributes into any `serde` type
//!
//! ## Quick Example
//!
//! ```rust
//! use fixturegraph::prelude::*;
//! use serde_json::json;
//!
//! let users = Factory::builder("User")
//!     .model(DictModel)
//!     .declare("username", Declaration::sequence(|n| Ok(json!(format!("user{}", n)))))
//!     .declare("is_staff", false)
//!     .declare("groups", Maybe::new("is_staff", json!(["admin"]), Declaration::skip()))
//!     .build()
//!     .unwrap();
//!
//! let user = users.build(Overrides::new()).unwrap().to_value();
//! assert!(user.get("groups").is_none());
//!
//! let staff = users.build(Overrides::new().set("is_staff", true)).unwrap().to_value();
//! assert_eq!(staff["groups"], json!(["admin"]));
//! ```

// Module re-exports
pub use fixturegraph_core::{
	builder, declaration_set, declarations, error, factory, model, params, sequence, strategy,
};

// Re-export core types
pub use fixturegraph_core::{
	Declaration, Factory, FactoryBuilder, FactoryError, FactoryOptions, FactoryResult, Instance,
	Model, Overrides, Strategy,
};

// Re-export common external dependencies
pub use serde_json;

pub mod prelude {
	//! Convenience re-exports for common usage.
	pub use fixturegraph_core::prelude::*;

	// External
	pub use serde_json::{Value, json};
}

//! Convenience re-exports for common usage.
//!
//! # Example
//!
//! ```
//! use fixturegraph_core::prelude::*;
//!
//! let tags = Factory::builder("Tag").model(DictModel).declare("name", "rust").build();
//! assert!(tags.is_ok());
//! ```

// Error types
pub use crate::error::{FactoryError, FactoryResult};

// Declarations
pub use crate::declarations::{
	ContainerAttribute, Declaration, Evaluate, FactoryRef, LazyAttribute, LazyAttributeSequence,
	LazyFunction, Maybe, Overrides, PostGeneration, PostGenerationMethodCall, RelatedFactory,
	RelatedFactoryList, SelfAttribute, Sequence, SubFactory, Transformer, ValueIterator,
};

// Parameters
pub use crate::params::{Parameter, Trait};

// Build machinery
pub use crate::builder::{BuildStep, Resolver};
pub use crate::strategy::Strategy;

// Definitions
pub use crate::factory::{Factory, FactoryBuilder, FactoryOptions, FactoryRegistry, register_factory};

// Models
pub use crate::model::{Attributes, DictModel, FnModel, Instance, ListModel, Model, Stub, downcast_instance};
#[cfg(feature = "serde-models")]
pub use crate::model::SerdeModel;

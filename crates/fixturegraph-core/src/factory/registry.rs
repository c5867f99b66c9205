//! Factory registry for lookup by name.
//!
//! Nested-graph declarations may reference a factory by name
//! ([`FactoryRef::Named`](crate::declarations::FactoryRef::Named)); the name
//! is resolved here at build time, which allows definitions that reference
//! each other.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::Factory;

/// Global factory registry.
static FACTORY_REGISTRY: Lazy<RwLock<HashMap<String, Factory>>> =
	Lazy::new(|| RwLock::new(HashMap::new()));

/// Registers a factory in the global registry, replacing any factory of
/// the same name.
///
/// # Example
///
/// ```
/// use fixturegraph_core::factory::{Factory, registry};
/// use fixturegraph_core::model::DictModel;
///
/// let factory = Factory::builder("app.Tag").model(DictModel).build().unwrap();
/// registry::register_factory("app.Tag", factory);
/// assert!(registry::has_factory("app.Tag"));
/// ```
pub fn register_factory(name: impl Into<String>, factory: Factory) {
	FACTORY_REGISTRY.write().insert(name.into(), factory);
}

/// Gets a factory by name.
pub fn get_factory(name: &str) -> Option<Factory> {
	FACTORY_REGISTRY.read().get(name).cloned()
}

/// Checks if a factory is registered under `name`.
pub fn has_factory(name: &str) -> bool {
	FACTORY_REGISTRY.read().contains_key(name)
}

/// Returns all registered names.
pub fn factory_names() -> Vec<String> {
	FACTORY_REGISTRY.read().keys().cloned().collect()
}

/// Removes a factory, returning it.
pub fn unregister_factory(name: &str) -> Option<Factory> {
	FACTORY_REGISTRY.write().remove(name)
}

/// Clears all registered factories.
///
/// This is primarily useful for testing.
pub fn clear_factories() {
	FACTORY_REGISTRY.write().clear();
}

/// Returns the number of registered factories.
pub fn factory_count() -> usize {
	FACTORY_REGISTRY.read().len()
}

/// Factory registry handle for scoped operations.
#[derive(Debug, Default)]
pub struct FactoryRegistry;

impl FactoryRegistry {
	/// Creates a new registry handle.
	pub fn new() -> Self {
		Self
	}

	/// Registers a factory under its own name.
	pub fn register(&self, factory: &Factory) {
		register_factory(factory.name(), factory.clone());
	}

	/// Gets a factory by name.
	pub fn get(&self, name: &str) -> Option<Factory> {
		get_factory(name)
	}

	/// Checks if a factory is registered.
	pub fn has(&self, name: &str) -> bool {
		has_factory(name)
	}

	/// Returns all registered names.
	pub fn names(&self) -> Vec<String> {
		factory_names()
	}

	/// Returns the number of registered factories.
	pub fn len(&self) -> usize {
		factory_count()
	}

	/// Returns true if no factories are registered.
	pub fn is_empty(&self) -> bool {
		factory_count() == 0
	}

	/// Clears all factories (primarily for testing).
	pub fn clear(&self) {
		clear_factories();
	}
}

//! Nested-graph references.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use super::{Context, Declaration, DeclarationKind, Overrides};
use crate::builder::Resolver;
use crate::error::{FactoryError, FactoryResult};
use crate::factory::{Factory, registry};

type FactoryFn = Arc<dyn Fn() -> FactoryResult<Factory> + Send + Sync>;

/// How a nested-graph declaration finds its factory.
///
/// `Named` and `Lazy` references are resolved at build time, which allows
/// definitions that refer to each other.
#[derive(Clone)]
pub enum FactoryRef {
	/// A factory held directly.
	Direct(Factory),
	/// A factory looked up in the [registry](crate::factory::registry).
	Named(String),
	/// A factory produced on demand.
	Lazy(FactoryFn),
}

impl FactoryRef {
	/// Creates a reference produced by `function` at build time.
	pub fn lazy<F>(function: F) -> Self
	where
		F: Fn() -> FactoryResult<Factory> + Send + Sync + 'static,
	{
		Self::Lazy(Arc::new(function))
	}

	/// Returns the referenced factory.
	pub fn resolve(&self) -> FactoryResult<Factory> {
		match self {
			Self::Direct(factory) => Ok(factory.clone()),
			Self::Named(name) => {
				registry::get_factory(name).ok_or_else(|| FactoryError::FactoryNotFound(name.clone()))
			}
			Self::Lazy(function) => function(),
		}
	}
}

impl fmt::Debug for FactoryRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Direct(factory) => write!(f, "Direct({})", factory.name()),
			Self::Named(name) => write!(f, "Named({})", name),
			Self::Lazy(_) => f.write_str("Lazy"),
		}
	}
}

impl From<Factory> for FactoryRef {
	fn from(factory: Factory) -> Self {
		Self::Direct(factory)
	}
}

impl From<&Factory> for FactoryRef {
	fn from(factory: &Factory) -> Self {
		Self::Direct(factory.clone())
	}
}

impl From<&str> for FactoryRef {
	fn from(name: &str) -> Self {
		Self::Named(name.to_string())
	}
}

impl From<String> for FactoryRef {
	fn from(name: String) -> Self {
		Self::Named(name)
	}
}

/// Builds another factory and uses the result as the field value.
///
/// The declaration's own defaults are merged with the call-time nested
/// overrides (which win) and passed to the nested build as its extras.
#[derive(Clone, Debug)]
pub struct SubFactory {
	factory: FactoryRef,
	defaults: Overrides,
	force_sequence: bool,
}

impl SubFactory {
	/// References `factory`.
	pub fn new(factory: impl Into<FactoryRef>) -> Self {
		Self {
			factory: factory.into(),
			defaults: Overrides::new(),
			force_sequence: false,
		}
	}

	/// Adds one default override for the nested build.
	pub fn set(mut self, name: impl Into<String>, declaration: impl Into<Declaration>) -> Self {
		self.defaults.insert(name, declaration);
		self
	}

	/// Replaces the default overrides.
	pub fn with_defaults(mut self, defaults: Overrides) -> Self {
		self.defaults = defaults;
		self
	}

	/// Makes the nested build reuse the parent step's sequence number.
	pub fn with_forced_sequence(mut self) -> Self {
		self.force_sequence = true;
		self
	}

	/// Returns the factory reference.
	pub fn factory(&self) -> &FactoryRef {
		&self.factory
	}

	pub(crate) fn evaluate(&self, resolver: &Resolver<'_>, overrides: &Context) -> FactoryResult<Value> {
		let factory = self.factory.resolve()?;
		let mut extras = self.defaults.clone();
		for (name, declaration) in overrides {
			let inherited = self.defaults.get(name).and_then(|base| declaration.inherit_from(base));
			extras.insert(name.clone(), inherited.unwrap_or_else(|| declaration.clone()));
		}
		let force_sequence = self.force_sequence.then(|| resolver.sequence());
		if let Some(sequence) = force_sequence {
			let own_sequence = extras.iter().any(|(_, declaration)| declaration.uses_sequence())
				|| factory
					.pre_declarations()
					.iter()
					.any(|entry| entry.declaration.uses_sequence());
			if own_sequence {
				warn!(
					factory = %factory.name(),
					sequence,
					"nested fields declare their own sequence; the forced sequence is used"
				);
			}
		}
		let instance = resolver.recurse(&factory, extras, force_sequence)?;
		Ok(instance.to_value())
	}
}

impl From<SubFactory> for Declaration {
	fn from(sub: SubFactory) -> Self {
		Declaration::new(DeclarationKind::SubFactory(sub))
	}
}

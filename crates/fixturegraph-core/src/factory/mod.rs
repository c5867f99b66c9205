//! Factory definitions.
//!
//! A [`Factory`] is an immutable, cheaply clonable definition: a model, a set
//! of declarations, parameters and options. It is produced by a
//! [`FactoryBuilder`], either from scratch with [`Factory::builder`] or by
//! deriving from an existing definition with [`Factory::extend`].
//!
//! # Example
//!
//! ```
//! use fixturegraph_core::prelude::*;
//! use serde_json::json;
//!
//! let users = Factory::builder("User")
//! 	.model(DictModel)
//! 	.declare("username", Declaration::sequence(|n| Ok(json!(format!("user{}", n)))))
//! 	.declare("role", "user")
//! 	.param("admin", Trait::new().set("role", "administrator"))
//! 	.build()
//! 	.unwrap();
//!
//! let user = users.build(Overrides::new()).unwrap();
//! assert_eq!(user.to_value()["role"], json!("user"));
//!
//! let admin = users.build(Overrides::new().set("admin", true)).unwrap();
//! assert_eq!(admin.to_value()["role"], json!("administrator"));
//! assert!(admin.to_value().get("admin").is_none());
//! ```

mod options;
pub mod registry;

pub use options::FactoryOptions;
pub use registry::{
	FactoryRegistry, clear_factories, factory_count, factory_names, get_factory, has_factory,
	register_factory, unregister_factory,
};

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde_json::Value;
use tracing::debug;

use crate::builder::{StepBuilder, parse_declarations};
use crate::declaration_set::DeclarationSet;
use crate::declarations::{Declaration, Overrides};
use crate::error::{FactoryError, FactoryResult};
use crate::model::{Attributes, DictModel, Instance, ListModel, Model, downcast_instance};
use crate::params::{Parameter, check_parameter_dependencies};
use crate::sequence::{SequenceCounter, SequenceStart};
use crate::strategy::Strategy;

type AdjustKwargsFn = Arc<dyn Fn(Attributes) -> FactoryResult<Attributes> + Send + Sync>;

static DICT_FACTORY: Lazy<Factory> = Lazy::new(|| Factory::plain("dict", Arc::new(DictModel)));
static LIST_FACTORY: Lazy<Factory> = Lazy::new(|| Factory::plain("list", Arc::new(ListModel)));

struct FactoryInner {
	name: String,
	model: Option<Arc<dyn Model>>,
	options: FactoryOptions,
	base_declarations: Overrides,
	parameters: Vec<(String, Parameter)>,
	parameter_names: BTreeSet<String>,
	pre: DeclarationSet,
	post: DeclarationSet,
	counter: Arc<SequenceCounter>,
	owns_counter: bool,
	sequence_start: Option<SequenceStart>,
	adjust_kwargs: Option<AdjustKwargsFn>,
}

/// An immutable factory definition.
#[derive(Clone)]
pub struct Factory {
	inner: Arc<FactoryInner>,
}

impl Factory {
	/// Starts a new definition.
	pub fn builder(name: impl Into<String>) -> FactoryBuilder {
		FactoryBuilder::new(name.into(), None)
	}

	/// Starts a definition inheriting this one.
	///
	/// The child inherits declarations, parameters, options (except the
	/// abstract flag), the model and hooks. It shares this definition's
	/// sequence counter unless it sets a model of its own; see
	/// [`FactoryBuilder::inherit_sequence`].
	pub fn extend(&self, name: impl Into<String>) -> FactoryBuilder {
		FactoryBuilder::new(name.into(), Some(self.clone()))
	}

	/// Built-in factory producing plain JSON objects.
	pub fn dict_factory() -> Factory {
		DICT_FACTORY.clone()
	}

	/// Built-in factory producing plain JSON arrays.
	pub fn list_factory() -> Factory {
		LIST_FACTORY.clone()
	}

	fn plain(name: &str, model: Arc<dyn Model>) -> Factory {
		Factory {
			inner: Arc::new(FactoryInner {
				name: name.to_string(),
				model: Some(model),
				options: FactoryOptions::default(),
				base_declarations: Overrides::new(),
				parameters: Vec::new(),
				parameter_names: BTreeSet::new(),
				pre: DeclarationSet::new(),
				post: DeclarationSet::new(),
				counter: Arc::new(SequenceCounter::new(name)),
				owns_counter: true,
				sequence_start: None,
				adjust_kwargs: None,
			}),
		}
	}

	/// Definition name.
	pub fn name(&self) -> &str {
		&self.inner.name
	}

	/// Name of the model, if any.
	pub fn model_name(&self) -> Option<&str> {
		self.inner.model.as_ref().map(|model| model.name())
	}

	/// Definition options.
	pub fn options(&self) -> &FactoryOptions {
		&self.inner.options
	}

	/// Returns true for abstract definitions.
	pub fn is_abstract(&self) -> bool {
		self.inner.options.is_abstract
	}

	/// Names of the declared parameters.
	pub fn parameter_names(&self) -> impl Iterator<Item = &str> {
		self.inner.parameter_names.iter().map(String::as_str)
	}

	/// Declarations resolved before instantiation, parameter overlays included.
	pub fn pre_declarations(&self) -> &DeclarationSet {
		&self.inner.pre
	}

	/// Declarations run against the instance.
	pub fn post_declarations(&self) -> &DeclarationSet {
		&self.inner.post
	}

	/// Returns true when this definition owns its sequence counter.
	pub fn owns_sequence(&self) -> bool {
		self.inner.owns_counter
	}

	/// Name of the definition owning the sequence counter.
	pub fn sequence_owner(&self) -> &str {
		self.inner.counter.owner()
	}

	/// Builds an instance without persisting it.
	pub fn build(&self, overrides: Overrides) -> FactoryResult<Box<dyn Instance>> {
		self.generate(Strategy::Build, overrides)
	}

	/// Builds and persists an instance.
	pub fn create(&self, overrides: Overrides) -> FactoryResult<Box<dyn Instance>> {
		self.generate(Strategy::Create, overrides)
	}

	/// Produces a stub carrying the resolved attributes.
	pub fn stub(&self, overrides: Overrides) -> FactoryResult<Box<dyn Instance>> {
		self.generate(Strategy::Stub, overrides)
	}

	/// Generates an instance with the default strategy of the options.
	pub fn generate_default(&self, overrides: Overrides) -> FactoryResult<Box<dyn Instance>> {
		self.generate(self.inner.options.strategy, overrides)
	}

	/// Generates an instance with `strategy`.
	pub fn generate(&self, strategy: Strategy, overrides: Overrides) -> FactoryResult<Box<dyn Instance>> {
		self.generate_with(strategy, overrides, None)
	}

	/// Generates an instance with `strategy`, using `forced_sequence` instead
	/// of the counter when given.
	pub fn generate_with(
		&self,
		strategy: Strategy,
		overrides: Overrides,
		forced_sequence: Option<i64>,
	) -> FactoryResult<Box<dyn Instance>> {
		debug!(
			factory = %self.name(),
			strategy = %strategy,
			overrides = overrides.len(),
			"generating"
		);
		StepBuilder::new(self.clone(), overrides, strategy).build(None, forced_sequence)
	}

	/// Creates when `create` is true, builds otherwise.
	pub fn simple_generate(&self, create: bool, overrides: Overrides) -> FactoryResult<Box<dyn Instance>> {
		let strategy = if create { Strategy::Create } else { Strategy::Build };
		self.generate(strategy, overrides)
	}

	/// Builds `size` instances.
	pub fn build_batch(&self, size: usize, overrides: &Overrides) -> FactoryResult<Vec<Box<dyn Instance>>> {
		self.generate_batch(Strategy::Build, size, overrides)
	}

	/// Creates `size` instances.
	pub fn create_batch(&self, size: usize, overrides: &Overrides) -> FactoryResult<Vec<Box<dyn Instance>>> {
		self.generate_batch(Strategy::Create, size, overrides)
	}

	/// Produces `size` stubs.
	pub fn stub_batch(&self, size: usize, overrides: &Overrides) -> FactoryResult<Vec<Box<dyn Instance>>> {
		self.generate_batch(Strategy::Stub, size, overrides)
	}

	/// Generates `size` instances with `strategy`.
	pub fn generate_batch(
		&self,
		strategy: Strategy,
		size: usize,
		overrides: &Overrides,
	) -> FactoryResult<Vec<Box<dyn Instance>>> {
		(0..size)
			.map(|_| self.generate(strategy, overrides.clone()))
			.collect()
	}

	/// Creates `size` instances when `create` is true, builds them otherwise.
	pub fn simple_generate_batch(
		&self,
		create: bool,
		size: usize,
		overrides: &Overrides,
	) -> FactoryResult<Vec<Box<dyn Instance>>> {
		let strategy = if create { Strategy::Create } else { Strategy::Build };
		self.generate_batch(strategy, size, overrides)
	}

	/// Builds an instance and downcasts it to `T`.
	pub fn build_as<T: Instance>(&self, overrides: Overrides) -> FactoryResult<T> {
		downcast_instance(self.build(overrides)?)
	}

	/// Creates an instance and downcasts it to `T`.
	pub fn create_as<T: Instance>(&self, overrides: Overrides) -> FactoryResult<T> {
		downcast_instance(self.create(overrides)?)
	}

	/// Resolves and shapes the attributes the model would receive, without
	/// instantiating. Positional fields are left out.
	pub fn attributes(&self, overrides: Overrides) -> FactoryResult<Attributes> {
		StepBuilder::new(self.clone(), overrides, Strategy::Build).attributes(None)
	}

	/// Advances the shared sequence counter, returning its previous value.
	pub fn next_sequence(&self) -> i64 {
		self.inner.counter.next()
	}

	/// Overwrites the sequence counter.
	///
	/// `None` recomputes the starting value. A definition sharing another
	/// definition's counter can only reset it with `force`; the reset is then
	/// visible to every definition sharing the counter.
	pub fn reset_sequence(&self, value: Option<i64>, force: bool) -> FactoryResult<()> {
		if !self.inner.owns_counter && !force {
			return Err(FactoryError::SequenceOwnership {
				factory: self.name().to_string(),
				owner: self.sequence_owner().to_string(),
			});
		}
		debug!(factory = %self.name(), owner = %self.sequence_owner(), ?value, "resetting sequence");
		self.inner.counter.reset(value);
		Ok(())
	}

	pub(crate) fn model(&self) -> FactoryResult<&Arc<dyn Model>> {
		self.inner.model.as_ref().ok_or_else(|| {
			FactoryError::AssociatedClass(format!(
				"Cannot generate instances of abstract factory '{}'",
				self.name()
			))
		})
	}

	pub(crate) fn check_generate(&self, strategy: Strategy) -> FactoryResult<()> {
		if self.is_abstract() {
			return Err(FactoryError::AssociatedClass(format!(
				"Cannot generate instances of abstract factory '{}'",
				self.name()
			)));
		}
		let model = self.model()?;
		if !model.supports(strategy) {
			return Err(FactoryError::UnsupportedStrategy {
				model: model.name().to_string(),
				strategy: strategy.to_string(),
			});
		}
		Ok(())
	}

	/// Applies the shaping rules: the kwargs hook, exclusions, renames and
	/// positional extraction, in that order.
	pub(crate) fn prepare_arguments(&self, attributes: Attributes) -> FactoryResult<(Vec<Value>, Attributes)> {
		let inner = &self.inner;
		let attributes = match &inner.adjust_kwargs {
			Some(adjust) => adjust(attributes)?,
			None => attributes,
		};

		let mut kwargs: Attributes = attributes
			.into_iter()
			.filter(|(name, _)| !inner.options.exclude.contains(name) && !inner.parameter_names.contains(name))
			.collect();

		for (from, to) in &inner.options.rename {
			if let Some(value) = kwargs.remove(from) {
				kwargs.insert(to.clone(), value);
			}
		}

		let args = inner
			.options
			.inline_args
			.iter()
			.map(|name| {
				kwargs.remove(name).ok_or_else(|| {
					FactoryError::InvalidDeclaration(format!(
						"positional field '{}' of factory '{}' was not resolved",
						name, inner.name
					))
				})
			})
			.collect::<FactoryResult<Vec<_>>>()?;

		Ok((args, kwargs))
	}

	pub(crate) fn instantiate(
		&self,
		strategy: Strategy,
		args: Vec<Value>,
		kwargs: Attributes,
	) -> FactoryResult<Box<dyn Instance>> {
		let model = self.model()?;
		match strategy {
			Strategy::Build => model.build(args, kwargs),
			Strategy::Create => model.create(args, kwargs),
			Strategy::Stub => model.stub(kwargs),
		}
	}
}

impl fmt::Debug for Factory {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Factory")
			.field("name", &self.inner.name)
			.field("model", &self.model_name())
			.field("pre", &self.inner.pre.sorted())
			.field("post", &self.inner.post.sorted())
			.field("parameters", &self.inner.parameter_names)
			.finish_non_exhaustive()
	}
}

/// Builder for [`Factory`] definitions.
pub struct FactoryBuilder {
	name: String,
	parent: Option<Factory>,
	model: Option<Arc<dyn Model>>,
	declarations: Overrides,
	parameters: Vec<(String, Parameter)>,
	options: Option<FactoryOptions>,
	adjust_kwargs: Option<AdjustKwargsFn>,
	sequence_start: Option<SequenceStart>,
	inherit_sequence: bool,
}

impl FactoryBuilder {
	fn new(name: String, parent: Option<Factory>) -> Self {
		Self {
			name,
			parent,
			model: None,
			declarations: Overrides::new(),
			parameters: Vec::new(),
			options: None,
			adjust_kwargs: None,
			sequence_start: None,
			inherit_sequence: false,
		}
	}

	/// Sets the model.
	pub fn model(self, model: impl Model + 'static) -> Self {
		self.shared_model(Arc::new(model))
	}

	/// Sets a model shared with other definitions.
	pub fn shared_model(mut self, model: Arc<dyn Model>) -> Self {
		self.model = Some(model);
		self
	}

	/// Declares a field. Dotted names override a nested field.
	pub fn declare(mut self, name: impl Into<String>, declaration: impl Into<Declaration>) -> Self {
		self.declarations.insert(name, declaration);
		self
	}

	/// Declares every entry of `declarations`.
	pub fn declare_all(mut self, declarations: Overrides) -> Self {
		self.declarations = self.declarations.merge(declarations);
		self
	}

	/// Declares a parameter or trait.
	pub fn param(mut self, name: impl Into<String>, parameter: impl Into<Parameter>) -> Self {
		self.parameters.push((name.into(), parameter.into()));
		self
	}

	/// Replaces the options.
	pub fn with_options(mut self, options: FactoryOptions) -> Self {
		self.options = Some(options);
		self
	}

	/// Sets a hook rewriting the attributes before the shaping rules apply.
	pub fn adjust_kwargs<F>(mut self, adjust: F) -> Self
	where
		F: Fn(Attributes) -> FactoryResult<Attributes> + Send + Sync + 'static,
	{
		self.adjust_kwargs = Some(Arc::new(adjust));
		self
	}

	/// Sets the hook computing the first sequence number.
	pub fn sequence_start<F>(mut self, start: F) -> Self
	where
		F: Fn() -> i64 + Send + Sync + 'static,
	{
		self.sequence_start = Some(Arc::new(start));
		self
	}

	/// Shares the parent's sequence counter even when this definition sets
	/// its own model.
	pub fn inherit_sequence(mut self) -> Self {
		self.inherit_sequence = true;
		self
	}

	/// Validates and freezes the definition.
	///
	/// Fails on cyclic parameters, on a missing model for a non-abstract
	/// definition, on dotted declarations without a root, and on malformed
	/// conditionals.
	pub fn build(self) -> FactoryResult<Factory> {
		let parent = self.parent.as_ref().map(|factory| &*factory.inner);

		let base_declarations = match parent {
			Some(parent) => parent.base_declarations.clone().merge(self.declarations),
			None => self.declarations,
		};

		let mut parameters = parent.map(|parent| parent.parameters.clone()).unwrap_or_default();
		for (name, parameter) in self.parameters {
			match parameters.iter_mut().find(|(existing, _)| *existing == name) {
				Some(slot) => slot.1 = parameter,
				None => parameters.push((name, parameter)),
			}
		}

		let mut declarations = base_declarations.clone();
		for name in check_parameter_dependencies(&self.name, &parameters)? {
			if let Some((_, parameter)) = parameters.iter().find(|(existing, _)| *existing == name) {
				let overlay = parameter.as_declarations(&name, &declarations);
				declarations = declarations.merge(overlay);
			}
		}
		let (pre, post) = parse_declarations(&declarations, None, None)?;

		let inherits_model = self.model.is_none();
		let model = self.model.or_else(|| parent.and_then(|parent| parent.model.clone()));
		let options = match (self.options, parent) {
			(Some(options), _) => options,
			(None, Some(parent)) => FactoryOptions {
				is_abstract: false,
				..parent.options.clone()
			},
			(None, None) => FactoryOptions::default(),
		};
		if model.is_none() && !options.is_abstract {
			return Err(FactoryError::AssociatedClass(format!(
				"No model defined on factory '{}', and it is not abstract",
				self.name
			)));
		}

		let sequence_start = self
			.sequence_start
			.or_else(|| parent.and_then(|parent| parent.sequence_start.clone()));
		let shared_counter = parent.and_then(|parent| {
			let shares = self.inherit_sequence || (inherits_model && parent.model.is_some());
			shares.then(|| parent.counter.clone())
		});
		let (counter, owns_counter) = match shared_counter {
			Some(counter) => (counter, false),
			None => {
				let counter = match &sequence_start {
					Some(start) => SequenceCounter::with_start(self.name.as_str(), start.clone()),
					None => SequenceCounter::new(self.name.as_str()),
				};
				(Arc::new(counter), true)
			}
		};

		let adjust_kwargs = self
			.adjust_kwargs
			.or_else(|| parent.and_then(|parent| parent.adjust_kwargs.clone()));
		let parameter_names = parameters.iter().map(|(name, _)| name.clone()).collect();

		debug!(
			factory = %self.name,
			parent = parent.map(|parent| parent.name.as_str()),
			pre = pre.len(),
			post = post.len(),
			parameters = parameters.len(),
			sequence_owner = %counter.owner(),
			"defined factory"
		);

		Ok(Factory {
			inner: Arc::new(FactoryInner {
				name: self.name,
				model,
				options,
				base_declarations,
				parameters,
				parameter_names,
				pre,
				post,
				counter,
				owns_counter,
				sequence_start,
				adjust_kwargs,
			}),
		})
	}
}

//! Declarations: lazy computation recipes for one attribute each.
//!
//! A [`Declaration`] pairs a [`DeclarationKind`] with a creation order taken
//! from [`next_creation_order`] when the declaration is constructed. The
//! order is what [`DeclarationSet::sorted`](crate::declaration_set::DeclarationSet::sorted)
//! sorts by. Cloning a declaration keeps its order.
//!
//! Declarations run in one of two phases:
//!
//! - [`BuilderPhase::AttributeResolution`]: evaluated by the
//!   [`Resolver`] before the object exists.
//! - [`BuilderPhase::PostInstantiation`]: evaluated against the finished
//!   instance.
//!
//! Plain values, [`Declaration::skip`] and [`Declaration::force`] have no
//! phase; they are constants as far as the engine is concerned.

mod attribute;
mod lazy;
mod maybe;
mod post;
mod subfactory;

pub use attribute::{ContainerAttribute, SelfAttribute};
pub use lazy::{LazyAttribute, LazyAttributeSequence, LazyFunction, Sequence, ValueIterator};
pub use maybe::{Maybe, Transformer};
pub use post::{
	PostGeneration, PostGenerationContext, PostGenerationMethodCall, RelatedFactory,
	RelatedFactoryList,
};
pub use subfactory::{FactoryRef, SubFactory};

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::builder::{BuildStep, Resolver};
use crate::error::{FactoryError, FactoryResult};
use crate::factory::Factory;
use crate::model::{Attributes, Instance};
use crate::sequence::next_creation_order;

/// Nested override context of one field: sub-field name to declaration.
pub type Context = BTreeMap<String, Declaration>;

/// When a declaration is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderPhase {
	/// Before instantiation, through the resolver.
	AttributeResolution,
	/// After instantiation, against the instance.
	PostInstantiation,
}

/// Contract for declarations supplied by external collaborators.
///
/// Random-value generators and similar providers implement this trait and
/// are wrapped with [`Declaration::custom`].
pub trait Evaluate: Send + Sync {
	/// Computes the field value.
	///
	/// `extra` holds the call-time nested overrides for this field, already
	/// unrolled into plain values when [`unroll_context`](Self::unroll_context)
	/// returns true.
	fn evaluate(
		&self,
		resolver: &Resolver<'_>,
		step: &BuildStep<'_>,
		extra: &Context,
	) -> FactoryResult<Value>;

	/// Whether a call-time override of this field is funneled through
	/// [`evaluate`](Self::evaluate) (under the `""` key) instead of replacing it.
	fn capture_overrides(&self) -> bool {
		false
	}

	/// Whether nested override declarations are evaluated before
	/// [`evaluate`](Self::evaluate) runs.
	fn unroll_context(&self) -> bool {
		true
	}
}

/// The variants a declaration can take.
#[derive(Clone)]
pub enum DeclarationKind {
	/// A constant value.
	Value(Value),
	/// Omit the field from the attribute map.
	Skip,
	/// A raw value bypassing a [`Transformer`].
	Force(Value),
	/// Function of nothing.
	LazyFunction(LazyFunction),
	/// Function of sibling attributes.
	LazyAttribute(LazyAttribute),
	/// Function of the build sequence.
	Sequence(Sequence),
	/// Function of sibling attributes and the build sequence.
	LazyAttributeSequence(LazyAttributeSequence),
	/// Walks through a fixed list of values.
	Iterator(ValueIterator),
	/// Reference to another attribute, possibly in an ancestor build.
	SelfAttribute(SelfAttribute),
	/// Function of the attribute and its container chain.
	ContainerAttribute(ContainerAttribute),
	/// Nested build of another factory.
	SubFactory(SubFactory),
	/// Conditional on a decider field.
	Maybe(Maybe),
	/// Default value fed through a transform function.
	Transformer(Transformer),
	/// External collaborator.
	Custom(Arc<dyn Evaluate>),
	/// Callback run against the instance.
	PostGeneration(PostGeneration),
	/// Related object built after the instance.
	RelatedFactory(RelatedFactory),
	/// Several related objects built after the instance.
	RelatedFactoryList(RelatedFactoryList),
	/// Method invoked on the instance.
	PostGenerationMethodCall(PostGenerationMethodCall),
}

/// A lazy computation recipe for one attribute.
#[derive(Clone)]
pub struct Declaration {
	order: u64,
	kind: DeclarationKind,
}

impl Declaration {
	/// Wraps a kind, stamping it with the next creation order.
	pub fn new(kind: DeclarationKind) -> Self {
		Self {
			order: next_creation_order(),
			kind,
		}
	}

	/// A constant value.
	pub fn value(value: impl Into<Value>) -> Self {
		Self::new(DeclarationKind::Value(value.into()))
	}

	/// Omits the field from the attribute map.
	pub fn skip() -> Self {
		Self::new(DeclarationKind::Skip)
	}

	/// A value that bypasses a [`Transformer`]'s transform function.
	pub fn force(value: impl Into<Value>) -> Self {
		Self::new(DeclarationKind::Force(value.into()))
	}

	/// A function of nothing, called once per build.
	pub fn lazy_function<F>(function: F) -> Self
	where
		F: Fn() -> FactoryResult<Value> + Send + Sync + 'static,
	{
		LazyFunction::new(function).into()
	}

	/// A function of sibling attributes.
	pub fn lazy_attribute<F>(function: F) -> Self
	where
		F: Fn(&Resolver<'_>) -> FactoryResult<Value> + Send + Sync + 'static,
	{
		LazyAttribute::new(function).into()
	}

	/// A function of the build sequence number.
	pub fn sequence<F>(function: F) -> Self
	where
		F: Fn(i64) -> FactoryResult<Value> + Send + Sync + 'static,
	{
		Sequence::new(function).into()
	}

	/// A function of sibling attributes and the build sequence number.
	pub fn lazy_attribute_sequence<F>(function: F) -> Self
	where
		F: Fn(&Resolver<'_>, i64) -> FactoryResult<Value> + Send + Sync + 'static,
	{
		LazyAttributeSequence::new(function).into()
	}

	/// A reference to another attribute; leading dots walk up the build chain.
	pub fn self_attribute(path: &str) -> Self {
		SelfAttribute::new(path).into()
	}

	/// A nested build of `factory`.
	pub fn sub_factory(factory: impl Into<FactoryRef>) -> Self {
		SubFactory::new(factory).into()
	}

	/// A nested plain dict, each entry resolved like a field.
	///
	/// The nested build reuses the parent step's sequence number.
	pub fn dict<I, K, V>(entries: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<Declaration>,
	{
		SubFactory::new(Factory::dict_factory())
			.with_forced_sequence()
			.with_defaults(entries.into_iter().collect())
			.into()
	}

	/// A nested plain list, each item resolved like a field.
	///
	/// The nested build reuses the parent step's sequence number.
	pub fn list<I, V>(items: I) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Into<Declaration>,
	{
		let entries = items
			.into_iter()
			.enumerate()
			.map(|(index, item)| (index.to_string(), item.into()))
			.collect();
		SubFactory::new(Factory::list_factory())
			.with_forced_sequence()
			.with_defaults(entries)
			.into()
	}

	/// Wraps an external collaborator.
	pub fn custom(evaluator: impl Evaluate + 'static) -> Self {
		Self::new(DeclarationKind::Custom(Arc::new(evaluator)))
	}

	/// Returns the creation order.
	pub fn order(&self) -> u64 {
		self.order
	}

	/// Returns the variant.
	pub fn kind(&self) -> &DeclarationKind {
		&self.kind
	}

	/// Fills the fallback branch of a trait switch on a nested field.
	///
	/// Returns `None` unless this is a [`Maybe`] waiting for the receiving
	/// build's declaration; `base` is the declaration it replaces. The
	/// creation order is kept.
	pub(crate) fn inherit_from(&self, base: &Declaration) -> Option<Declaration> {
		match &self.kind {
			DeclarationKind::Maybe(maybe) if maybe.inherits() => Some(Self {
				order: self.order,
				kind: DeclarationKind::Maybe(maybe.with_no(base.clone())),
			}),
			_ => None,
		}
	}

	/// Returns the constant carried by a value or force declaration.
	pub fn as_value(&self) -> Option<&Value> {
		match &self.kind {
			DeclarationKind::Value(value) | DeclarationKind::Force(value) => Some(value),
			_ => None,
		}
	}

	/// Returns the phase, or `None` for constants.
	pub fn phase(&self) -> Option<BuilderPhase> {
		match &self.kind {
			DeclarationKind::Value(_) | DeclarationKind::Skip | DeclarationKind::Force(_) => None,
			DeclarationKind::Maybe(maybe) => Some(maybe.phase()),
			DeclarationKind::PostGeneration(_)
			| DeclarationKind::RelatedFactory(_)
			| DeclarationKind::RelatedFactoryList(_)
			| DeclarationKind::PostGenerationMethodCall(_) => Some(BuilderPhase::PostInstantiation),
			_ => Some(BuilderPhase::AttributeResolution),
		}
	}

	/// Returns true for post-instantiation declarations.
	pub fn is_post(&self) -> bool {
		self.phase() == Some(BuilderPhase::PostInstantiation)
	}

	/// Returns true when evaluation does more than return a constant.
	pub fn is_lazy(&self) -> bool {
		self.phase().is_some()
	}

	/// Returns true for declarations driven by the build sequence.
	pub fn uses_sequence(&self) -> bool {
		matches!(
			self.kind,
			DeclarationKind::Sequence(_) | DeclarationKind::LazyAttributeSequence(_)
		)
	}

	/// Whether a call-time override is funneled through this declaration.
	pub fn capture_overrides(&self) -> bool {
		match &self.kind {
			DeclarationKind::Transformer(_) => true,
			DeclarationKind::Custom(custom) => custom.capture_overrides(),
			_ => false,
		}
	}

	/// Whether nested overrides are resolved before this declaration runs.
	pub fn unroll_context(&self) -> bool {
		match &self.kind {
			DeclarationKind::SubFactory(_)
			| DeclarationKind::Maybe(_)
			| DeclarationKind::RelatedFactory(_)
			| DeclarationKind::RelatedFactoryList(_) => false,
			DeclarationKind::Custom(custom) => custom.unroll_context(),
			_ => true,
		}
	}

	/// Rejects conditionals whose branches run in different phases.
	pub fn validate(&self) -> FactoryResult<()> {
		match &self.kind {
			DeclarationKind::Maybe(maybe) => maybe.validate(),
			_ => Ok(()),
		}
	}

	/// Evaluates the declaration before instantiation.
	///
	/// Returns `None` when the field must be omitted.
	pub fn evaluate_pre(
		&self,
		resolver: &Resolver<'_>,
		step: &BuildStep<'_>,
		overrides: &Context,
	) -> FactoryResult<Option<Value>> {
		match &self.kind {
			DeclarationKind::Value(value) | DeclarationKind::Force(value) => Ok(Some(value.clone())),
			DeclarationKind::Skip => Ok(None),
			DeclarationKind::LazyFunction(lazy) => lazy.evaluate().map(Some),
			DeclarationKind::LazyAttribute(lazy) => lazy.evaluate(resolver).map(Some),
			DeclarationKind::Sequence(sequence) => sequence.evaluate(step.sequence()).map(Some),
			DeclarationKind::LazyAttributeSequence(lazy) => {
				lazy.evaluate(resolver, step.sequence()).map(Some)
			}
			DeclarationKind::Iterator(iterator) => iterator.evaluate().map(Some),
			DeclarationKind::SelfAttribute(attribute) => attribute.evaluate(resolver).map(Some),
			DeclarationKind::ContainerAttribute(attribute) => attribute.evaluate(resolver).map(Some),
			DeclarationKind::SubFactory(sub) => sub.evaluate(resolver, overrides).map(Some),
			DeclarationKind::Maybe(maybe) => maybe.evaluate_pre(resolver, step, overrides),
			DeclarationKind::Transformer(transformer) => {
				transformer.evaluate_pre(resolver, step, overrides)
			}
			DeclarationKind::Custom(custom) => {
				let extra = if custom.unroll_context() {
					unroll_context(resolver, overrides)?
				} else {
					overrides.clone()
				};
				custom.evaluate(resolver, step, &extra).map(Some)
			}
			DeclarationKind::PostGeneration(_)
			| DeclarationKind::RelatedFactory(_)
			| DeclarationKind::RelatedFactoryList(_)
			| DeclarationKind::PostGenerationMethodCall(_) => Err(FactoryError::InvalidDeclaration(
				"post-instantiation declaration evaluated before instantiation".to_string(),
			)),
		}
	}

	/// Evaluates the declaration against a finished instance.
	///
	/// `resolver` is the fully resolved resolver of the step that produced
	/// `instance`; it only serves cached values at this point.
	pub fn evaluate_post(
		&self,
		instance: &mut dyn Instance,
		resolver: &Resolver<'_>,
		overrides: &Context,
	) -> FactoryResult<Option<Value>> {
		match &self.kind {
			DeclarationKind::Value(value) | DeclarationKind::Force(value) => Ok(Some(value.clone())),
			DeclarationKind::Skip => Ok(None),
			DeclarationKind::Maybe(maybe) => maybe.evaluate_post(instance, resolver, overrides),
			DeclarationKind::PostGeneration(post) => {
				let context = PostGenerationContext::from_overrides(resolver, overrides)?;
				post.call(instance, resolver.step(), context).map(Some)
			}
			DeclarationKind::RelatedFactory(related) => {
				related.call(instance, resolver, overrides).map(Some)
			}
			DeclarationKind::RelatedFactoryList(related) => {
				related.call(instance, resolver, overrides).map(Some)
			}
			DeclarationKind::PostGenerationMethodCall(call) => {
				let context = PostGenerationContext::from_overrides(resolver, overrides)?;
				call.call(instance, context).map(Some)
			}
			_ => Err(FactoryError::InvalidDeclaration(
				"attribute declaration evaluated after instantiation".to_string(),
			)),
		}
	}
}

impl fmt::Debug for Declaration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let kind = match &self.kind {
			DeclarationKind::Value(value) => return write!(f, "Value({})", value),
			DeclarationKind::Force(value) => return write!(f, "Force({})", value),
			DeclarationKind::SelfAttribute(attribute) => return write!(f, "{:?}", attribute),
			DeclarationKind::Skip => "Skip",
			DeclarationKind::LazyFunction(_) => "LazyFunction",
			DeclarationKind::LazyAttribute(_) => "LazyAttribute",
			DeclarationKind::Sequence(_) => "Sequence",
			DeclarationKind::LazyAttributeSequence(_) => "LazyAttributeSequence",
			DeclarationKind::Iterator(_) => "Iterator",
			DeclarationKind::ContainerAttribute(_) => "ContainerAttribute",
			DeclarationKind::SubFactory(_) => "SubFactory",
			DeclarationKind::Maybe(_) => "Maybe",
			DeclarationKind::Transformer(_) => "Transformer",
			DeclarationKind::Custom(_) => "Custom",
			DeclarationKind::PostGeneration(_) => "PostGeneration",
			DeclarationKind::RelatedFactory(_) => "RelatedFactory",
			DeclarationKind::RelatedFactoryList(_) => "RelatedFactoryList",
			DeclarationKind::PostGenerationMethodCall(_) => "PostGenerationMethodCall",
		};
		write!(f, "{}#{}", kind, self.order)
	}
}

impl From<Value> for Declaration {
	fn from(value: Value) -> Self {
		Self::value(value)
	}
}

macro_rules! impl_from_scalar {
	($($ty:ty),*) => {
		$(
			impl From<$ty> for Declaration {
				fn from(value: $ty) -> Self {
					Self::value(value)
				}
			}
		)*
	};
}

impl_from_scalar!(&str, String, bool, i32, i64, u32, u64, f64);

/// Evaluates the lazy entries of a nested context into plain values.
///
/// The entries are resolved as the fields of a nested dict build sharing
/// the current step's sequence, so they may reference each other and, with
/// leading dots, the current build. [`Declaration::force`] entries are kept
/// as they are.
pub(crate) fn unroll_context(resolver: &Resolver<'_>, context: &Context) -> FactoryResult<Context> {
	if !context.values().any(Declaration::is_lazy) {
		return Ok(context.clone());
	}

	let mut unrolled = Context::new();
	let mut extras = Overrides::new();
	for (name, declaration) in context {
		match declaration.kind() {
			DeclarationKind::Force(_) => {
				unrolled.insert(name.clone(), declaration.clone());
			}
			_ => extras.insert(name.clone(), declaration.clone()),
		}
	}

	let instance = resolver.recurse(&Factory::dict_factory(), extras, Some(resolver.sequence()))?;
	match instance.to_value() {
		Value::Object(map) => {
			for (name, value) in map {
				unrolled.insert(name, Declaration::value(value));
			}
			Ok(unrolled)
		}
		other => Err(FactoryError::InvalidDeclaration(format!(
			"context unrolled into a non-object value: {}",
			other
		))),
	}
}

/// Converts an unrolled context into plain values, dropping lazy entries.
pub(crate) fn context_values(context: &Context) -> Attributes {
	context
		.iter()
		.filter_map(|(name, declaration)| {
			declaration
				.as_value()
				.map(|value| (name.clone(), value.clone()))
		})
		.collect()
}

/// Call-time overrides ("extras") of a build.
///
/// Keys may address nested fields with the `__` separator, e.g.
/// `address__city`.
///
/// # Examples
///
/// ```
/// use fixturegraph_core::declarations::{Declaration, Overrides};
///
/// let overrides = Overrides::new()
/// 	.set("name", "alice")
/// 	.set("address__city", Declaration::self_attribute("..city"));
/// assert_eq!(overrides.len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Overrides {
	entries: BTreeMap<String, Declaration>,
}

impl Overrides {
	/// Creates an empty override map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds an override, returning `self` for chaining.
	pub fn set(mut self, name: impl Into<String>, declaration: impl Into<Declaration>) -> Self {
		self.insert(name, declaration);
		self
	}

	/// Adds an override in place.
	pub fn insert(&mut self, name: impl Into<String>, declaration: impl Into<Declaration>) {
		self.entries.insert(name.into(), declaration.into());
	}

	/// Returns an override by name.
	pub fn get(&self, name: &str) -> Option<&Declaration> {
		self.entries.get(name)
	}

	/// Returns true when `name` is overridden.
	pub fn contains(&self, name: &str) -> bool {
		self.entries.contains_key(name)
	}

	/// Iterates over the overrides in name order.
	pub fn iter(&self) -> impl Iterator<Item = (&String, &Declaration)> {
		self.entries.iter()
	}

	/// Returns the number of overrides.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Returns true when there are no overrides.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Adds every entry of `other`, replacing existing names.
	pub fn merge(mut self, other: Overrides) -> Self {
		self.entries.extend(other.entries);
		self
	}
}

impl<K: Into<String>, V: Into<Declaration>> FromIterator<(K, V)> for Overrides {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self {
			entries: iter
				.into_iter()
				.map(|(name, declaration)| (name.into(), declaration.into()))
				.collect(),
		}
	}
}

impl IntoIterator for Overrides {
	type Item = (String, Declaration);
	type IntoIter = std::collections::btree_map::IntoIter<String, Declaration>;

	fn into_iter(self) -> Self::IntoIter {
		self.entries.into_iter()
	}
}

impl From<Attributes> for Overrides {
	fn from(attributes: Attributes) -> Self {
		attributes.into_iter().collect()
	}
}

impl From<Context> for Overrides {
	fn from(context: Context) -> Self {
		Self { entries: context }
	}
}

/// Truthiness of a decider value.
pub(crate) fn is_truthy(value: Option<&Value>) -> bool {
	match value {
		None | Some(Value::Null) => false,
		Some(Value::Bool(flag)) => *flag,
		Some(Value::Number(number)) => number.as_f64().is_some_and(|n| n != 0.0),
		Some(Value::String(text)) => !text.is_empty(),
		Some(Value::Array(items)) => !items.is_empty(),
		Some(Value::Object(map)) => !map.is_empty(),
	}
}

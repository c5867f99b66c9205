//! Post-instantiation declarations.
//!
//! These run after the model produced the instance, in creation order. A
//! call-time value for a post-instantiation field does not replace the
//! declaration: it is handed to it through [`PostGenerationContext`].

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::{Context, Declaration, DeclarationKind, FactoryRef, Overrides, context_values, unroll_context};
use crate::builder::{BuildStep, Resolver};
use crate::error::FactoryResult;
use crate::model::{Attributes, Instance};

type PostGenerationFn = Arc<
	dyn Fn(&mut dyn Instance, bool, Option<&Value>, &Attributes) -> FactoryResult<Value> + Send + Sync,
>;
type SizeFn = Arc<dyn Fn() -> usize + Send + Sync>;

/// What the caller supplied for a post-instantiation field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostGenerationContext {
	/// Whether a value was passed for the field itself.
	pub value_provided: bool,
	/// The passed value; `None` when not provided.
	pub value: Option<Value>,
	/// Extra `field__name` values.
	pub extra: Attributes,
}

impl PostGenerationContext {
	pub(crate) fn from_overrides(resolver: &Resolver<'_>, overrides: &Context) -> FactoryResult<Self> {
		let unrolled = unroll_context(resolver, overrides)?;
		let mut extra = context_values(&unrolled);
		let value = extra.remove("");
		Ok(Self {
			value_provided: unrolled.contains_key(""),
			value,
			extra,
		})
	}
}

/// Calls a function with the instance once it exists.
///
/// The function receives the instance, whether the build persists, the
/// call-time value for the field (if any) and the extra values.
#[derive(Clone)]
pub struct PostGeneration {
	function: PostGenerationFn,
}

impl PostGeneration {
	/// Wraps `function`.
	pub fn new<F>(function: F) -> Self
	where
		F: Fn(&mut dyn Instance, bool, Option<&Value>, &Attributes) -> FactoryResult<Value>
			+ Send
			+ Sync
			+ 'static,
	{
		Self {
			function: Arc::new(function),
		}
	}

	pub(crate) fn call(
		&self,
		instance: &mut dyn Instance,
		step: &BuildStep<'_>,
		context: PostGenerationContext,
	) -> FactoryResult<Value> {
		(self.function)(
			instance,
			step.strategy().is_create(),
			context.value.as_ref(),
			&context.extra,
		)
	}
}

/// Builds a related object after the instance, pointing back at it.
///
/// Passing a value for the field skips the related build and returns that
/// value instead.
#[derive(Clone, Debug)]
pub struct RelatedFactory {
	factory: FactoryRef,
	related_name: Option<String>,
	defaults: Overrides,
}

impl RelatedFactory {
	/// References `factory`; `related_name` is the back-reference field set
	/// to the instance on the related object.
	pub fn new(factory: impl Into<FactoryRef>, related_name: impl Into<String>) -> Self {
		let related_name = related_name.into();
		Self {
			factory: factory.into(),
			related_name: (!related_name.is_empty()).then_some(related_name),
			defaults: Overrides::new(),
		}
	}

	/// Adds a default override for the related build.
	pub fn set(mut self, name: impl Into<String>, declaration: impl Into<Declaration>) -> Self {
		self.defaults.insert(name, declaration);
		self
	}

	/// Builds the related object.
	///
	/// `overrides` holds the raw declarations passed for the field. An entry
	/// under `""` is the value of the field itself and skips the build; the
	/// other entries become extras of the related build, so they resolve
	/// against the related object.
	pub(crate) fn call(
		&self,
		instance: &mut dyn Instance,
		resolver: &Resolver<'_>,
		overrides: &Context,
	) -> FactoryResult<Value> {
		if let Some(provided) = overrides.get("") {
			let value = provided.evaluate_pre(resolver, resolver.step(), &Context::new())?;
			return Ok(value.unwrap_or(Value::Null));
		}

		let factory = self.factory.resolve()?;
		let mut extras = self.defaults.clone();
		for (name, declaration) in overrides {
			let inherited = self.defaults.get(name).and_then(|base| declaration.inherit_from(base));
			extras.insert(name.clone(), inherited.unwrap_or_else(|| declaration.clone()));
		}
		if let Some(related_name) = &self.related_name {
			extras.insert(related_name.clone(), instance.to_value());
		}

		let related = resolver.recurse(&factory, extras, None)?;
		Ok(related.to_value())
	}
}

/// Number of objects a [`RelatedFactoryList`] builds.
#[derive(Clone)]
pub(crate) enum ListSize {
	/// A fixed count.
	Fixed(usize),
	/// A count computed for each build.
	Computed(SizeFn),
}

impl ListSize {
	fn get(&self) -> usize {
		match self {
			Self::Fixed(size) => *size,
			Self::Computed(function) => function(),
		}
	}
}

impl fmt::Debug for ListSize {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Fixed(size) => write!(f, "Fixed({})", size),
			Self::Computed(_) => f.write_str("Computed"),
		}
	}
}

/// Builds several related objects after the instance.
#[derive(Clone, Debug)]
pub struct RelatedFactoryList {
	related: RelatedFactory,
	size: ListSize,
}

impl RelatedFactoryList {
	/// Builds `size` related objects.
	pub fn new(factory: impl Into<FactoryRef>, related_name: impl Into<String>, size: usize) -> Self {
		Self {
			related: RelatedFactory::new(factory, related_name),
			size: ListSize::Fixed(size),
		}
	}

	/// Computes the number of related objects for each build.
	pub fn with_size_fn<F>(mut self, size: F) -> Self
	where
		F: Fn() -> usize + Send + Sync + 'static,
	{
		self.size = ListSize::Computed(Arc::new(size));
		self
	}

	/// Adds a default override for every related build.
	pub fn set(mut self, name: impl Into<String>, declaration: impl Into<Declaration>) -> Self {
		self.related = self.related.set(name, declaration);
		self
	}

	pub(crate) fn call(
		&self,
		instance: &mut dyn Instance,
		resolver: &Resolver<'_>,
		overrides: &Context,
	) -> FactoryResult<Value> {
		let items = (0..self.size.get())
			.map(|_| self.related.call(instance, resolver, overrides))
			.collect::<FactoryResult<Vec<_>>>()?;
		Ok(Value::Array(items))
	}
}

/// Calls a method on the instance.
///
/// The method receives the call-time value for the field when one was
/// passed, the configured argument otherwise.
///
/// # Examples
///
/// ```
/// use fixturegraph_core::declarations::PostGenerationMethodCall;
///
/// let password = PostGenerationMethodCall::new("set_password").with_arg("default");
/// ```
#[derive(Clone, Debug)]
pub struct PostGenerationMethodCall {
	method: String,
	arg: Option<Value>,
	kwargs: Attributes,
}

impl PostGenerationMethodCall {
	/// Calls `method` without arguments by default.
	pub fn new(method: impl Into<String>) -> Self {
		Self {
			method: method.into(),
			arg: None,
			kwargs: Attributes::new(),
		}
	}

	/// Sets the default positional argument.
	pub fn with_arg(mut self, arg: impl Into<Value>) -> Self {
		self.arg = Some(arg.into());
		self
	}

	/// Adds a keyword argument.
	pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.kwargs.insert(name.into(), value.into());
		self
	}

	/// Method name.
	pub fn method(&self) -> &str {
		&self.method
	}

	pub(crate) fn call(
		&self,
		instance: &mut dyn Instance,
		context: PostGenerationContext,
	) -> FactoryResult<Value> {
		let args: Vec<Value> = if context.value_provided {
			vec![context.value.unwrap_or(Value::Null)]
		} else {
			self.arg.iter().cloned().collect()
		};
		let mut kwargs = self.kwargs.clone();
		kwargs.extend(context.extra);
		instance.call_method(&self.method, &args, &kwargs)
	}
}

impl From<PostGeneration> for Declaration {
	fn from(post: PostGeneration) -> Self {
		Declaration::new(DeclarationKind::PostGeneration(post))
	}
}

impl From<RelatedFactory> for Declaration {
	fn from(related: RelatedFactory) -> Self {
		Declaration::new(DeclarationKind::RelatedFactory(related))
	}
}

impl From<RelatedFactoryList> for Declaration {
	fn from(related: RelatedFactoryList) -> Self {
		Declaration::new(DeclarationKind::RelatedFactoryList(related))
	}
}

impl From<PostGenerationMethodCall> for Declaration {
	fn from(call: PostGenerationMethodCall) -> Self {
		Declaration::new(DeclarationKind::PostGenerationMethodCall(call))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[derive(Default)]
	struct Recorder {
		calls: Vec<(String, Vec<Value>, Attributes)>,
	}

	impl Instance for Recorder {
		fn to_value(&self) -> Value {
			json!({ "calls": self.calls.len() })
		}

		fn call_method(&mut self, name: &str, args: &[Value], kwargs: &Attributes) -> FactoryResult<Value> {
			self.calls.push((name.to_string(), args.to_vec(), kwargs.clone()));
			Ok(Value::Null)
		}
	}

	#[rstest]
	fn test_method_call_uses_default_arg() {
		let call = PostGenerationMethodCall::new("set_password").with_arg("default");
		let mut recorder = Recorder::default();

		call.call(&mut recorder, PostGenerationContext::default()).unwrap();

		assert_eq!(recorder.calls[0].0, "set_password");
		assert_eq!(recorder.calls[0].1, vec![json!("default")]);
	}

	#[rstest]
	fn test_method_call_prefers_provided_value() {
		let call = PostGenerationMethodCall::new("set_password")
			.with_arg("default")
			.with_kwarg("hasher", "md5");
		let mut recorder = Recorder::default();
		let mut extra = Attributes::new();
		extra.insert("hasher".to_string(), json!("argon2"));
		let context = PostGenerationContext {
			value_provided: true,
			value: Some(json!("custom")),
			extra,
		};

		call.call(&mut recorder, context).unwrap();

		let (_, args, kwargs) = &recorder.calls[0];
		assert_eq!(args, &vec![json!("custom")]);
		assert_eq!(kwargs.get("hasher"), Some(&json!("argon2")));
	}

	#[rstest]
	fn test_method_call_without_arg() {
		let call = PostGenerationMethodCall::new("activate");
		let mut recorder = Recorder::default();

		call.call(&mut recorder, PostGenerationContext::default()).unwrap();

		assert!(recorder.calls[0].1.is_empty());
	}

	#[rstest]
	fn test_empty_related_name_is_none() {
		let related = RelatedFactory::new("app.Profile", "");
		assert!(related.related_name.is_none());
	}
}

//! Function-backed declarations.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;

use super::{Declaration, DeclarationKind};
use crate::builder::Resolver;
use crate::error::{FactoryError, FactoryResult};

type NullaryFn = Arc<dyn Fn() -> FactoryResult<Value> + Send + Sync>;
type AttributeFn = Arc<dyn Fn(&Resolver<'_>) -> FactoryResult<Value> + Send + Sync>;
type SequenceFn = Arc<dyn Fn(i64) -> FactoryResult<Value> + Send + Sync>;
type AttributeSequenceFn = Arc<dyn Fn(&Resolver<'_>, i64) -> FactoryResult<Value> + Send + Sync>;
type GetterFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Calls a function of nothing.
#[derive(Clone)]
pub struct LazyFunction {
	function: NullaryFn,
}

impl LazyFunction {
	/// Wraps `function`.
	pub fn new<F>(function: F) -> Self
	where
		F: Fn() -> FactoryResult<Value> + Send + Sync + 'static,
	{
		Self {
			function: Arc::new(function),
		}
	}

	pub(crate) fn evaluate(&self) -> FactoryResult<Value> {
		(self.function)()
	}
}

/// Calls a function of the resolver, which gives access to sibling fields.
///
/// # Examples
///
/// ```
/// use fixturegraph_core::declarations::Declaration;
/// use serde_json::json;
///
/// let email = Declaration::lazy_attribute(|obj| {
/// 	let name = obj.get("username")?;
/// 	Ok(json!(format!("{}@example.com", name.as_str().unwrap_or_default())))
/// });
/// ```
#[derive(Clone)]
pub struct LazyAttribute {
	function: AttributeFn,
}

impl LazyAttribute {
	/// Wraps `function`.
	pub fn new<F>(function: F) -> Self
	where
		F: Fn(&Resolver<'_>) -> FactoryResult<Value> + Send + Sync + 'static,
	{
		Self {
			function: Arc::new(function),
		}
	}

	pub(crate) fn evaluate(&self, resolver: &Resolver<'_>) -> FactoryResult<Value> {
		(self.function)(resolver)
	}
}

/// Calls a function of the build sequence number.
#[derive(Clone)]
pub struct Sequence {
	function: SequenceFn,
}

impl Sequence {
	/// Wraps `function`.
	pub fn new<F>(function: F) -> Self
	where
		F: Fn(i64) -> FactoryResult<Value> + Send + Sync + 'static,
	{
		Self {
			function: Arc::new(function),
		}
	}

	pub(crate) fn evaluate(&self, sequence: i64) -> FactoryResult<Value> {
		(self.function)(sequence)
	}
}

/// Calls a function of the resolver and the build sequence number.
#[derive(Clone)]
pub struct LazyAttributeSequence {
	function: AttributeSequenceFn,
}

impl LazyAttributeSequence {
	/// Wraps `function`.
	pub fn new<F>(function: F) -> Self
	where
		F: Fn(&Resolver<'_>, i64) -> FactoryResult<Value> + Send + Sync + 'static,
	{
		Self {
			function: Arc::new(function),
		}
	}

	pub(crate) fn evaluate(&self, resolver: &Resolver<'_>, sequence: i64) -> FactoryResult<Value> {
		(self.function)(resolver, sequence)
	}
}

/// Hands out the values of a fixed list, one per build.
///
/// The position is shared by every clone, so all builds of a factory walk
/// the same list.
#[derive(Clone)]
pub struct ValueIterator {
	values: Arc<Vec<Value>>,
	cycle: bool,
	position: Arc<Mutex<usize>>,
	getter: Option<GetterFn>,
}

impl ValueIterator {
	/// Cycles through `values` forever.
	pub fn new<I, V>(values: I) -> Self
	where
		I: IntoIterator<Item = V>,
		V: Into<Value>,
	{
		Self {
			values: Arc::new(values.into_iter().map(Into::into).collect()),
			cycle: true,
			position: Arc::new(Mutex::new(0)),
			getter: None,
		}
	}

	/// Walks through the values once, failing when they run out.
	pub fn once(mut self) -> Self {
		self.cycle = false;
		self
	}

	/// Maps each value before it is returned.
	pub fn with_getter<F>(mut self, getter: F) -> Self
	where
		F: Fn(&Value) -> Value + Send + Sync + 'static,
	{
		self.getter = Some(Arc::new(getter));
		self
	}

	/// Restarts from the first value.
	pub fn reset(&self) {
		*self.position.lock() = 0;
	}

	pub(crate) fn evaluate(&self) -> FactoryResult<Value> {
		let mut position = self.position.lock();
		if *position >= self.values.len() {
			if self.cycle && !self.values.is_empty() {
				*position = 0;
			} else {
				return Err(FactoryError::evaluation("iterator exhausted"));
			}
		}
		let value = &self.values[*position];
		*position += 1;
		Ok(match &self.getter {
			Some(getter) => getter(value),
			None => value.clone(),
		})
	}
}

impl From<LazyFunction> for Declaration {
	fn from(lazy: LazyFunction) -> Self {
		Declaration::new(DeclarationKind::LazyFunction(lazy))
	}
}

impl From<LazyAttribute> for Declaration {
	fn from(lazy: LazyAttribute) -> Self {
		Declaration::new(DeclarationKind::LazyAttribute(lazy))
	}
}

impl From<Sequence> for Declaration {
	fn from(sequence: Sequence) -> Self {
		Declaration::new(DeclarationKind::Sequence(sequence))
	}
}

impl From<LazyAttributeSequence> for Declaration {
	fn from(lazy: LazyAttributeSequence) -> Self {
		Declaration::new(DeclarationKind::LazyAttributeSequence(lazy))
	}
}

impl From<ValueIterator> for Declaration {
	fn from(iterator: ValueIterator) -> Self {
		Declaration::new(DeclarationKind::Iterator(iterator))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_iterator_cycles() {
		let iterator = ValueIterator::new(["a", "b"]);

		let values: Vec<Value> = (0..5).map(|_| iterator.evaluate().unwrap()).collect();

		assert_eq!(values, vec![json!("a"), json!("b"), json!("a"), json!("b"), json!("a")]);
	}

	#[rstest]
	fn test_iterator_once_exhausts() {
		let iterator = ValueIterator::new([1, 2]).once();

		assert_eq!(iterator.evaluate().unwrap(), json!(1));
		assert_eq!(iterator.evaluate().unwrap(), json!(2));
		assert!(matches!(
			iterator.evaluate(),
			Err(FactoryError::Evaluation { .. })
		));
	}

	#[rstest]
	fn test_iterator_reset_and_getter() {
		let iterator = ValueIterator::new([json!({"id": 7}), json!({"id": 8})])
			.with_getter(|value| value["id"].clone());

		assert_eq!(iterator.evaluate().unwrap(), json!(7));
		iterator.reset();
		assert_eq!(iterator.evaluate().unwrap(), json!(7));
		assert_eq!(iterator.evaluate().unwrap(), json!(8));
	}

	#[rstest]
	fn test_empty_iterator_fails() {
		let iterator = ValueIterator::new(Vec::<Value>::new());
		assert!(iterator.evaluate().is_err());
	}

	#[rstest]
	fn test_sequence_function() {
		let sequence = Sequence::new(|n| Ok(json!(format!("user{}", n))));
		assert_eq!(sequence.evaluate(4).unwrap(), json!("user4"));
	}
}

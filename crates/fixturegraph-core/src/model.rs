//! Model and instance collaborators.
//!
//! The engine never constructs objects itself. Once every pre-instantiation
//! field is resolved, the shaped attribute map is handed to a [`Model`],
//! which returns a boxed [`Instance`]. Post-instantiation declarations then
//! operate on that instance.

use std::any::Any;
use std::fmt;
#[cfg(feature = "serde-models")]
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{FactoryError, FactoryResult};
use crate::strategy::Strategy;

/// Finished attribute map handed to constructors.
pub type Attributes = serde_json::Map<String, Value>;

/// Downcasting support for [`Instance`] trait objects.
pub trait AsAny: Any {
	/// Returns `self` as `&dyn Any`.
	fn as_any(&self) -> &dyn Any;

	/// Returns `self` as `&mut dyn Any`.
	fn as_any_mut(&mut self) -> &mut dyn Any;

	/// Converts the box into `Box<dyn Any>`.
	fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
	fn as_any(&self) -> &dyn Any {
		self
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}

	fn into_any(self: Box<Self>) -> Box<dyn Any> {
		self
	}
}

/// An object produced by a [`Model`].
///
/// Only [`to_value`](Self::to_value) is required. It is used when the
/// instance becomes the value of a nested-graph field in its parent.
pub trait Instance: AsAny + Send {
	/// Returns the value stored in a parent attribute map.
	fn to_value(&self) -> Value;

	/// Reads an attribute from the instance.
	fn get_attribute(&self, name: &str) -> Option<Value> {
		match self.to_value() {
			Value::Object(mut map) => map.remove(name),
			_ => None,
		}
	}

	/// Writes an attribute on the instance.
	fn set_attribute(&mut self, name: &str, _value: Value) -> FactoryResult<()> {
		Err(FactoryError::InvalidDeclaration(format!(
			"{} does not accept attribute '{}'",
			self.type_label(),
			name
		)))
	}

	/// Invokes a named method, as used by `PostGenerationMethodCall`.
	fn call_method(&mut self, name: &str, _args: &[Value], _kwargs: &Attributes) -> FactoryResult<Value> {
		Err(FactoryError::UnknownMethod {
			target: self.type_label().to_string(),
			method: name.to_string(),
		})
	}

	/// Persists the instance. Called by the default create path.
	fn save(&mut self) -> FactoryResult<()> {
		Ok(())
	}

	/// Human readable type name used in error messages.
	fn type_label(&self) -> &'static str {
		std::any::type_name::<Self>()
	}
}

impl fmt::Debug for dyn Instance {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}({})", self.type_label(), self.to_value())
	}
}

/// Downcasts a boxed instance into its concrete type.
pub fn downcast_instance<T: Instance>(instance: Box<dyn Instance>) -> FactoryResult<T> {
	instance
		.into_any()
		.downcast::<T>()
		.map(|boxed| *boxed)
		.map_err(|_| FactoryError::InstanceType(std::any::type_name::<T>()))
}

/// Plain attribute container returned by the stub strategy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stub {
	attributes: Attributes,
}

impl Stub {
	/// Creates a stub holding `attributes`.
	pub fn new(attributes: Attributes) -> Self {
		Self { attributes }
	}

	/// Returns an attribute by name.
	pub fn get(&self, name: &str) -> Option<&Value> {
		self.attributes.get(name)
	}

	/// Returns all attributes.
	pub fn attributes(&self) -> &Attributes {
		&self.attributes
	}

	/// Consumes the stub, returning its attributes.
	pub fn into_attributes(self) -> Attributes {
		self.attributes
	}
}

impl Instance for Stub {
	fn to_value(&self) -> Value {
		Value::Object(self.attributes.clone())
	}

	fn get_attribute(&self, name: &str) -> Option<Value> {
		self.attributes.get(name).cloned()
	}

	fn set_attribute(&mut self, name: &str, value: Value) -> FactoryResult<()> {
		self.attributes.insert(name.to_string(), value);
		Ok(())
	}
}

impl Instance for Value {
	fn to_value(&self) -> Value {
		self.clone()
	}

	fn get_attribute(&self, name: &str) -> Option<Value> {
		match self {
			Value::Object(map) => map.get(name).cloned(),
			Value::Array(items) => name.parse::<usize>().ok().and_then(|i| items.get(i).cloned()),
			_ => None,
		}
	}

	fn set_attribute(&mut self, name: &str, value: Value) -> FactoryResult<()> {
		match self {
			Value::Object(map) => {
				map.insert(name.to_string(), value);
				Ok(())
			}
			_ => Err(FactoryError::InvalidDeclaration(format!(
				"cannot set attribute '{}' on a non-object value",
				name
			))),
		}
	}
}

/// External constructor collaborator.
pub trait Model: Send + Sync {
	/// Model name used in logs and errors.
	fn name(&self) -> &str;

	/// Constructs an instance without persisting it.
	fn build(&self, args: Vec<Value>, kwargs: Attributes) -> FactoryResult<Box<dyn Instance>>;

	/// Constructs and persists an instance.
	fn create(&self, args: Vec<Value>, kwargs: Attributes) -> FactoryResult<Box<dyn Instance>> {
		let mut instance = self.build(args, kwargs)?;
		instance.save()?;
		Ok(instance)
	}

	/// Produces the object returned by the stub strategy.
	fn stub(&self, kwargs: Attributes) -> FactoryResult<Box<dyn Instance>> {
		Ok(Box::new(Stub::new(kwargs)))
	}

	/// Returns false when the model forbids a strategy.
	fn supports(&self, _strategy: Strategy) -> bool {
		true
	}

	/// Receives the results of all post-instantiation declarations.
	fn after_postgeneration(
		&self,
		_instance: &mut dyn Instance,
		_create: bool,
		_results: &Attributes,
	) -> FactoryResult<()> {
		Ok(())
	}
}

type Constructor =
	Arc<dyn Fn(Vec<Value>, Attributes) -> FactoryResult<Box<dyn Instance>> + Send + Sync>;

fn boxed_constructor<T, F>(constructor: F) -> Constructor
where
	T: Instance,
	F: Fn(Vec<Value>, Attributes) -> FactoryResult<T> + Send + Sync + 'static,
{
	Arc::new(move |args, kwargs| Ok(Box::new(constructor(args, kwargs)?) as Box<dyn Instance>))
}

/// Closure-backed model.
///
/// # Examples
///
/// ```
/// use fixturegraph_core::model::{FnModel, Model};
/// use serde_json::Value;
///
/// let model = FnModel::new("dict", |_args, kwargs| Ok(Value::Object(kwargs)));
/// assert_eq!(model.name(), "dict");
/// ```
#[derive(Clone)]
pub struct FnModel {
	name: String,
	build: Constructor,
	create: Option<Constructor>,
	forbidden: Vec<Strategy>,
	save_after_postgeneration: bool,
}

impl FnModel {
	/// Creates a model from a build constructor.
	pub fn new<T, F>(name: impl Into<String>, build: F) -> Self
	where
		T: Instance,
		F: Fn(Vec<Value>, Attributes) -> FactoryResult<T> + Send + Sync + 'static,
	{
		Self {
			name: name.into(),
			build: boxed_constructor(build),
			create: None,
			forbidden: Vec::new(),
			save_after_postgeneration: false,
		}
	}

	/// Sets a dedicated create constructor, replacing build-then-save.
	pub fn with_create<T, F>(mut self, create: F) -> Self
	where
		T: Instance,
		F: Fn(Vec<Value>, Attributes) -> FactoryResult<T> + Send + Sync + 'static,
	{
		self.create = Some(boxed_constructor(create));
		self
	}

	/// Forbids a strategy for this model.
	pub fn forbid(mut self, strategy: Strategy) -> Self {
		self.forbidden.push(strategy);
		self
	}

	/// Saves created instances again when post-instantiation declarations ran.
	pub fn save_after_postgeneration(mut self) -> Self {
		self.save_after_postgeneration = true;
		self
	}
}

impl fmt::Debug for FnModel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FnModel")
			.field("name", &self.name)
			.field("forbidden", &self.forbidden)
			.finish_non_exhaustive()
	}
}

impl Model for FnModel {
	fn name(&self) -> &str {
		&self.name
	}

	fn build(&self, args: Vec<Value>, kwargs: Attributes) -> FactoryResult<Box<dyn Instance>> {
		(self.build)(args, kwargs)
	}

	fn create(&self, args: Vec<Value>, kwargs: Attributes) -> FactoryResult<Box<dyn Instance>> {
		match &self.create {
			Some(create) => create(args, kwargs),
			None => {
				let mut instance = (self.build)(args, kwargs)?;
				instance.save()?;
				Ok(instance)
			}
		}
	}

	fn supports(&self, strategy: Strategy) -> bool {
		!self.forbidden.contains(&strategy)
	}

	fn after_postgeneration(
		&self,
		instance: &mut dyn Instance,
		create: bool,
		results: &Attributes,
	) -> FactoryResult<()> {
		if self.save_after_postgeneration && create && !results.is_empty() {
			instance.save()?;
		}
		Ok(())
	}
}

/// Model deserializing the attribute map into a `serde` type.
#[cfg(feature = "serde-models")]
pub struct SerdeModel<T> {
	name: String,
	_marker: PhantomData<fn() -> T>,
}

#[cfg(feature = "serde-models")]
impl<T> SerdeModel<T> {
	/// Creates a model named `name`.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			_marker: PhantomData,
		}
	}
}

#[cfg(feature = "serde-models")]
impl<T> Model for SerdeModel<T>
where
	T: serde::de::DeserializeOwned + Instance,
{
	fn name(&self) -> &str {
		&self.name
	}

	fn build(&self, args: Vec<Value>, kwargs: Attributes) -> FactoryResult<Box<dyn Instance>> {
		if !args.is_empty() {
			return Err(FactoryError::InvalidDeclaration(format!(
				"model {} does not accept positional arguments",
				self.name
			)));
		}
		let instance: T = serde_json::from_value(Value::Object(kwargs))?;
		Ok(Box::new(instance))
	}
}

/// Model producing a JSON object from the attribute map.
#[derive(Debug, Clone, Copy, Default)]
pub struct DictModel;

impl Model for DictModel {
	fn name(&self) -> &str {
		"dict"
	}

	fn build(&self, _args: Vec<Value>, kwargs: Attributes) -> FactoryResult<Box<dyn Instance>> {
		Ok(Box::new(Value::Object(kwargs)))
	}

	fn stub(&self, kwargs: Attributes) -> FactoryResult<Box<dyn Instance>> {
		self.build(Vec::new(), kwargs)
	}
}

/// Model producing a JSON array from index-named attributes (`"0"`, `"1"`, ...).
#[derive(Debug, Clone, Copy, Default)]
pub struct ListModel;

impl Model for ListModel {
	fn name(&self) -> &str {
		"list"
	}

	fn build(&self, _args: Vec<Value>, kwargs: Attributes) -> FactoryResult<Box<dyn Instance>> {
		let mut items = kwargs
			.into_iter()
			.map(|(key, value)| {
				key.parse::<usize>().map(|index| (index, value)).map_err(|_| {
					FactoryError::InvalidDeclaration(format!("list item key '{}' is not an index", key))
				})
			})
			.collect::<FactoryResult<Vec<_>>>()?;
		items.sort_by_key(|(index, _)| *index);
		Ok(Box::new(Value::Array(
			items.into_iter().map(|(_, value)| value).collect(),
		)))
	}

	fn stub(&self, kwargs: Attributes) -> FactoryResult<Box<dyn Instance>> {
		self.build(Vec::new(), kwargs)
	}
}

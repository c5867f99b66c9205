//! Declarations reading other attributes of the build chain.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use super::{Declaration, DeclarationKind};
use crate::builder::Resolver;
use crate::error::{FactoryError, FactoryResult};

type ContainerFn =
	Arc<dyn Fn(&Resolver<'_>, &[&Resolver<'_>]) -> FactoryResult<Value> + Send + Sync>;

/// Copies the value of another attribute.
///
/// The path may be dotted (`address.city`) to read into a nested value.
/// Leading dots select the build: none or one dot reads the current build,
/// two dots its parent, three dots the grandparent, and so on.
///
/// # Examples
///
/// ```
/// use fixturegraph_core::declarations::SelfAttribute;
///
/// let sibling = SelfAttribute::new("username");
/// assert_eq!(sibling.ancestor_depth(), 0);
///
/// let parent = SelfAttribute::new("..company.name");
/// assert_eq!(parent.ancestor_depth(), 1);
/// assert_eq!(parent.path(), "company.name");
/// ```
#[derive(Clone, PartialEq)]
pub struct SelfAttribute {
	depth: usize,
	path: String,
	default: Option<Value>,
}

impl SelfAttribute {
	/// Parses `path`, counting its leading dots.
	pub fn new(path: &str) -> Self {
		let trimmed = path.trim_start_matches('.');
		Self {
			depth: path.len() - trimmed.len(),
			path: trimmed.to_string(),
			default: None,
		}
	}

	/// Returns `default` instead of failing when the attribute is missing
	/// or the build chain is shorter than requested.
	pub fn with_default(mut self, default: impl Into<Value>) -> Self {
		self.default = Some(default.into());
		self
	}

	/// Number of builds to walk up from the current one.
	pub fn ancestor_depth(&self) -> usize {
		self.depth.saturating_sub(1)
	}

	/// Dotted attribute path, without the leading dots.
	pub fn path(&self) -> &str {
		&self.path
	}

	pub(crate) fn evaluate(&self, resolver: &Resolver<'_>) -> FactoryResult<Value> {
		if self.path.is_empty() {
			return Err(FactoryError::InvalidDeclaration(
				"SelfAttribute requires an attribute name".to_string(),
			));
		}

		let chain = resolver.chain();
		let lookup = match chain.get(self.ancestor_depth()) {
			Some(target) => deep_get(target, &self.path),
			None => Err(FactoryError::UnknownAttribute {
				name: self.path.clone(),
				known: Vec::new(),
			}),
		};

		match (lookup, &self.default) {
			(Err(FactoryError::UnknownAttribute { .. }), Some(default)) => Ok(default.clone()),
			(result, _) => result,
		}
	}
}

impl fmt::Debug for SelfAttribute {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "SelfAttribute({}{})", ".".repeat(self.depth), self.path)
	}
}

/// Reads a dotted path: the first segment from `resolver`, the rest from
/// the nested values.
pub(crate) fn deep_get(resolver: &Resolver<'_>, path: &str) -> FactoryResult<Value> {
	let mut segments = path.split('.');
	let root = segments.next().unwrap_or(path);
	let mut value = resolver.get(root)?;
	for segment in segments {
		value = nested_value(&value, segment).ok_or_else(|| FactoryError::UnknownAttribute {
			name: path.to_string(),
			known: object_keys(&value),
		})?;
	}
	Ok(value)
}

fn nested_value(value: &Value, segment: &str) -> Option<Value> {
	match value {
		Value::Object(map) => map.get(segment).cloned(),
		Value::Array(items) => segment
			.parse::<usize>()
			.ok()
			.and_then(|index| items.get(index).cloned()),
		_ => None,
	}
}

fn object_keys(value: &Value) -> Vec<String> {
	match value {
		Value::Object(map) => map.keys().cloned().collect(),
		_ => Vec::new(),
	}
}

/// Calls a function of the resolver and of the resolvers of the enclosing
/// builds, closest first.
#[derive(Clone)]
pub struct ContainerAttribute {
	function: ContainerFn,
	strict: bool,
}

impl ContainerAttribute {
	/// Wraps `function`. Strict by default: fails outside of a nested build.
	pub fn new<F>(function: F) -> Self
	where
		F: Fn(&Resolver<'_>, &[&Resolver<'_>]) -> FactoryResult<Value> + Send + Sync + 'static,
	{
		Self {
			function: Arc::new(function),
			strict: true,
		}
	}

	/// Allows evaluation with an empty container chain.
	pub fn lenient(mut self) -> Self {
		self.strict = false;
		self
	}

	pub(crate) fn evaluate(&self, resolver: &Resolver<'_>) -> FactoryResult<Value> {
		let chain = resolver.chain();
		let containers = &chain[1..];
		if self.strict && containers.is_empty() {
			return Err(FactoryError::InvalidDeclaration(
				"a strict ContainerAttribute can only be used within a nested build".to_string(),
			));
		}
		(self.function)(resolver, containers)
	}
}

impl From<SelfAttribute> for Declaration {
	fn from(attribute: SelfAttribute) -> Self {
		Declaration::new(DeclarationKind::SelfAttribute(attribute))
	}
}

impl From<ContainerAttribute> for Declaration {
	fn from(attribute: ContainerAttribute) -> Self {
		Declaration::new(DeclarationKind::ContainerAttribute(attribute))
	}
}

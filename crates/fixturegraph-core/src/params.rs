//! Parameters and traits.
//!
//! A parameter is a virtual field: it may be passed at call time and read by
//! other declarations, but it never reaches the model. A [`Trait`] is a
//! boolean parameter that overlays a set of declarations when true.

use std::collections::{BTreeMap, BTreeSet};

use crate::declaration_set::SPLITTER;
use crate::declarations::{Declaration, Maybe, Overrides, SelfAttribute};
use crate::error::{FactoryError, FactoryResult};
use crate::sequence::next_creation_order;

/// A parameter holding a default value.
#[derive(Debug, Clone)]
pub struct SimpleParameter {
	value: Declaration,
}

impl SimpleParameter {
	/// Wraps the default value, which may be any declaration.
	pub fn new(value: impl Into<Declaration>) -> Self {
		Self {
			value: value.into(),
		}
	}
}

/// A named overlay, applied when the parameter of the same name is true.
///
/// # Examples
///
/// ```
/// use fixturegraph_core::params::Trait;
///
/// let admin = Trait::new()
/// 	.set("role", "administrator")
/// 	.set("is_staff", true);
/// assert_eq!(admin.overrides().len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Trait {
	order: u64,
	overrides: Overrides,
}

impl Trait {
	/// Creates an empty overlay.
	pub fn new() -> Self {
		Self {
			order: next_creation_order(),
			overrides: Overrides::new(),
		}
	}

	/// Adds one override; dotted names reach into nested builds.
	pub fn set(mut self, name: impl Into<String>, declaration: impl Into<Declaration>) -> Self {
		self.overrides.insert(name, declaration);
		self
	}

	/// Returns the overlay.
	pub fn overrides(&self) -> &Overrides {
		&self.overrides
	}
}

impl Default for Trait {
	fn default() -> Self {
		Self::new()
	}
}

/// A parameter of a factory definition.
#[derive(Debug, Clone)]
pub enum Parameter {
	/// A parameter with a default value.
	Simple(SimpleParameter),
	/// A conditional overlay.
	Trait(Trait),
}

impl Parameter {
	/// Creates a parameter with a default value.
	pub fn value(value: impl Into<Declaration>) -> Self {
		Self::Simple(SimpleParameter::new(value))
	}

	/// Creation order, used to break ties between independent parameters.
	pub fn order(&self) -> u64 {
		match self {
			Self::Simple(simple) => simple.value.order(),
			Self::Trait(overlay) => overlay.order,
		}
	}

	/// Computes the declarations this parameter contributes.
	///
	/// `declarations` is the flattened set built so far; a trait keeps the
	/// current declaration of each field it touches as the "no" branch. A
	/// nested field declared nowhere here falls back to the nested factory's
	/// own declaration.
	pub fn as_declarations(&self, name: &str, declarations: &Overrides) -> Overrides {
		match self {
			Self::Simple(simple) => Overrides::new().set(name, simple.value.clone()),
			Self::Trait(overlay) => overlay
				.overrides
				.iter()
				.map(|(field, yes)| {
					let depth = field.matches(SPLITTER).count();
					let decider = SelfAttribute::new(&format!("{}.{}", ".".repeat(depth), name)).with_default(false);
					let maybe = match declarations.get(field) {
						Some(no) => Maybe::with_decider(decider, yes.clone(), no.clone()),
						None if depth > 0 => Maybe::inheriting(decider, yes.clone()),
						None => Maybe::with_decider(decider, yes.clone(), Declaration::skip()),
					};
					(field.clone(), Declaration::from(maybe))
				})
				.collect(),
		}
	}

	/// Names among `parameters` whose value this parameter alters.
	pub fn revdeps<'p>(&self, parameters: impl IntoIterator<Item = &'p str>) -> Vec<&'p str> {
		match self {
			Self::Simple(_) => Vec::new(),
			Self::Trait(overlay) => parameters
				.into_iter()
				.filter(|name| overlay.overrides.contains(name))
				.collect(),
		}
	}
}

impl From<Trait> for Parameter {
	fn from(overlay: Trait) -> Self {
		Self::Trait(overlay)
	}
}

impl From<SimpleParameter> for Parameter {
	fn from(simple: SimpleParameter) -> Self {
		Self::Simple(simple)
	}
}

/// Orders `parameters` so that every parameter comes after the parameters
/// its overlay alters, which lets the altering overlay win.
///
/// Independent parameters keep their creation order. Fails with a cyclic
/// definition error when overlays alter each other in a loop.
pub fn check_parameter_dependencies(
	factory: &str,
	parameters: &[(String, Parameter)],
) -> FactoryResult<Vec<String>> {
	let names: Vec<&str> = parameters.iter().map(|(name, _)| name.as_str()).collect();

	// blockers[a] = parameters that must be applied before a
	let mut blockers: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
	for (name, parameter) in parameters {
		blockers
			.entry(name.as_str())
			.or_default()
			.extend(parameter.revdeps(names.iter().copied()));
	}

	let mut pending: Vec<(&str, u64)> = parameters
		.iter()
		.map(|(name, parameter)| (name.as_str(), parameter.order()))
		.collect();
	pending.sort_by_key(|(_, order)| *order);

	let mut ordered: Vec<String> = Vec::with_capacity(pending.len());
	while !pending.is_empty() {
		let ready = pending.iter().position(|(name, _)| {
			blockers
				.get(name)
				.is_none_or(|deps| deps.iter().all(|dep| ordered.iter().any(|done| done == dep)))
		});
		match ready {
			Some(index) => {
				let (name, _) = pending.remove(index);
				ordered.push(name.to_string());
			}
			None => {
				let cyclic: Vec<&str> = pending.iter().map(|(name, _)| *name).collect();
				return Err(FactoryError::CyclicDefinition {
					name: factory.to_string(),
					path: format!("Params around {}", cyclic.join(", ")),
				});
			}
		}
	}
	Ok(ordered)
}

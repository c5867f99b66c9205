//! Lazy, caching, cycle-detecting attribute evaluation.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;
use tracing::trace;

use super::{BuildStep, StepBuilder};
use crate::declaration_set::DeclarationSet;
use crate::declarations::Overrides;
use crate::error::{FactoryError, FactoryResult};
use crate::factory::Factory;
use crate::model::{Attributes, Instance};

#[derive(Debug, Clone)]
enum FieldState {
	InProgress,
	/// `None` for skipped fields.
	Resolved(Option<Value>),
}

/// The attribute surface of one build step.
///
/// Each field is evaluated on first access through [`get`](Self::get) and
/// cached. Evaluating a field that is already in progress fails with
/// [`FactoryError::CyclicDefinition`].
pub struct Resolver<'a> {
	step: &'a BuildStep<'a>,
	declarations: &'a DeclarationSet,
	states: RefCell<BTreeMap<String, FieldState>>,
	pending: RefCell<Vec<String>>,
}

impl<'a> Resolver<'a> {
	pub(crate) fn new(step: &'a BuildStep<'a>, declarations: &'a DeclarationSet) -> Self {
		Self {
			step,
			declarations,
			states: RefCell::new(BTreeMap::new()),
			pending: RefCell::new(Vec::new()),
		}
	}

	/// Returns the value of `name`, evaluating it if needed.
	///
	/// Fails with [`FactoryError::UnknownAttribute`] for undeclared or
	/// skipped fields.
	pub fn get(&self, name: &str) -> FactoryResult<Value> {
		self.lookup(name)?.ok_or_else(|| self.unknown(name))
	}

	/// Returns true when `name` is declared on this build.
	pub fn contains(&self, name: &str) -> bool {
		self.declarations.contains(name)
	}

	/// Sequence number of the build.
	pub fn sequence(&self) -> i64 {
		self.step.sequence()
	}

	/// The build step this resolver belongs to.
	pub fn step(&self) -> &'a BuildStep<'a> {
		self.step
	}

	/// Resolver of the enclosing build, if any.
	pub fn factory_parent(&self) -> Option<&'a Resolver<'a>> {
		self.step.parent()
	}

	/// This resolver followed by the resolvers of the enclosing builds,
	/// closest first.
	pub fn chain(&self) -> Vec<&Resolver<'a>> {
		let mut chain = vec![self];
		let mut current = self.step.parent();
		while let Some(parent) = current {
			chain.push(parent);
			current = parent.step.parent();
		}
		chain
	}

	/// Runs a nested build of `factory` with this resolver as parent.
	///
	/// The nested build inherits the strategy of this one.
	pub fn recurse(
		&self,
		factory: &Factory,
		extras: Overrides,
		force_sequence: Option<i64>,
	) -> FactoryResult<Box<dyn Instance>> {
		StepBuilder::new(factory.clone(), extras, self.step.strategy()).build(Some(self), force_sequence)
	}

	/// Evaluates every declared field in creation order.
	///
	/// Skipped fields are left out of the result.
	pub(crate) fn resolve_all(&self) -> FactoryResult<Attributes> {
		let mut attributes = Attributes::new();
		for name in self.declarations.sorted() {
			if let Some(value) = self.lookup(name)? {
				attributes.insert(name.to_string(), value);
			}
		}
		Ok(attributes)
	}

	fn lookup(&self, name: &str) -> FactoryResult<Option<Value>> {
		let state = self.states.borrow().get(name).cloned();
		match state {
			Some(FieldState::Resolved(value)) => return Ok(value),
			Some(FieldState::InProgress) => return Err(self.cycle(name)),
			None => {}
		}

		let entry = self.declarations.get(name).ok_or_else(|| self.unknown(name))?;

		self.states
			.borrow_mut()
			.insert(name.to_string(), FieldState::InProgress);
		self.pending.borrow_mut().push(name.to_string());

		let result = entry
			.declaration
			.evaluate_pre(self, self.step, entry.context)
			.map_err(|error| error.with_field(name));

		self.pending.borrow_mut().pop();
		match result {
			Ok(value) => {
				trace!(
					factory = %self.step.factory().name(),
					field = name,
					skipped = value.is_none(),
					"resolved field"
				);
				self.states
					.borrow_mut()
					.insert(name.to_string(), FieldState::Resolved(value.clone()));
				Ok(value)
			}
			Err(error) => {
				self.states.borrow_mut().remove(name);
				Err(error)
			}
		}
	}

	fn cycle(&self, name: &str) -> FactoryError {
		let pending = self.pending.borrow();
		let start = pending.iter().position(|field| field == name).unwrap_or(0);
		let mut path: Vec<&str> = pending[start..].iter().map(String::as_str).collect();
		path.push(name);
		FactoryError::CyclicDefinition {
			name: name.to_string(),
			path: path.join(" -> "),
		}
	}

	fn unknown(&self, name: &str) -> FactoryError {
		FactoryError::UnknownAttribute {
			name: name.to_string(),
			known: self.declarations.sorted().into_iter().map(str::to_string).collect(),
		}
	}
}

impl fmt::Debug for Resolver<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Resolver")
			.field("factory", &self.step.factory().name())
			.field("sequence", &self.step.sequence())
			.field("pending", &self.pending.borrow())
			.finish_non_exhaustive()
	}
}

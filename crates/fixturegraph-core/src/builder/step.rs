//! Per-instance build state.

use super::Resolver;
use crate::factory::Factory;
use crate::strategy::Strategy;

/// One instantiation in progress.
///
/// The sequence number is chosen once when the step is created. `parent`
/// links to the resolver of the enclosing build for nested graphs.
#[derive(Debug)]
pub struct BuildStep<'a> {
	pub(crate) factory: &'a Factory,
	pub(crate) strategy: Strategy,
	pub(crate) sequence: i64,
	pub(crate) depth: usize,
	pub(crate) parent: Option<&'a Resolver<'a>>,
}

impl<'a> BuildStep<'a> {
	/// Sequence number of this build.
	pub fn sequence(&self) -> i64 {
		self.sequence
	}

	/// Strategy of this build, inherited by nested builds.
	pub fn strategy(&self) -> Strategy {
		self.strategy
	}

	/// Resolver of the enclosing build, if any.
	pub fn parent(&self) -> Option<&'a Resolver<'a>> {
		self.parent
	}

	/// Factory being built.
	pub fn factory(&self) -> &'a Factory {
		self.factory
	}

	/// Nesting depth; zero for a top-level build.
	pub fn depth(&self) -> usize {
		self.depth
	}
}

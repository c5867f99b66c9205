//! Build orchestration.
//!
//! A [`StepBuilder`] runs one top-level or nested build:
//!
//! 1. merges the call-time extras into the factory's declarations
//!    ([`parse_declarations`]),
//! 2. picks the sequence number (forced, or the counter's next value),
//! 3. resolves the pre-instantiation fields through a [`Resolver`],
//! 4. shapes the attributes and hands them to the model,
//! 5. runs the post-instantiation declarations against the instance.
//!
//! Nested graphs re-enter through [`Resolver::recurse`] on the same call
//! stack. Any error aborts the whole build, nested builds included.

mod resolver;
mod step;

pub use resolver::Resolver;
pub use step::BuildStep;

use serde_json::Value;
use tracing::debug;

use crate::declaration_set::{DeclarationSet, join};
use crate::declarations::{Declaration, Overrides};
use crate::error::{FactoryError, FactoryResult};
use crate::factory::Factory;
use crate::model::{Attributes, Instance};
use crate::strategy::Strategy;

/// Deepest nesting allowed before a build is aborted.
pub const MAX_BUILD_DEPTH: usize = 64;

/// Splits `declarations` between the pre- and post-instantiation sets,
/// starting from `base_pre` and `base_post`.
///
/// - A post-instantiation declaration replaces any pre declaration of the
///   same name.
/// - A plain value for a post-instantiation field is handed to it as
///   `field__`.
/// - A value for a field that captures overrides is handed to it as
///   `field__` too.
/// - Dotted names whose root is a post-instantiation field go to the post
///   set, everything else to the pre set.
/// - A trait switch waiting on this build's declaration falls back to the
///   one it replaces.
pub fn parse_declarations(
	declarations: &Overrides,
	base_pre: Option<&DeclarationSet>,
	base_post: Option<&DeclarationSet>,
) -> FactoryResult<(DeclarationSet, DeclarationSet)> {
	let mut pre = base_pre.cloned().unwrap_or_default();
	let mut post = base_post.cloned().unwrap_or_default();

	let mut extra_post: Vec<(String, Declaration)> = Vec::new();
	let mut extra_maybe_pre: Vec<(String, Declaration)> = Vec::new();
	for (name, declaration) in declarations.iter() {
		if declaration.is_post() {
			pre.remove(name);
			extra_post.push((name.clone(), declaration.clone()));
		} else if post.contains(name) {
			extra_post.push((join(name, Some("")), declaration.clone()));
		} else if pre
			.get(name)
			.is_some_and(|entry| entry.declaration.capture_overrides())
		{
			extra_maybe_pre.push((join(name, Some("")), declaration.clone()));
		} else {
			extra_maybe_pre.push((name.clone(), declaration.clone()));
		}
	}

	post.update(extra_post)?;

	let (post_context, pre_extra): (Vec<_>, Vec<_>) = extra_maybe_pre
		.into_iter()
		.partition(|(name, _)| !post.filter([name.as_str()]).is_empty());
	post.update(post_context)?;
	let pre_extra: Vec<_> = pre_extra
		.into_iter()
		.map(|(name, declaration)| {
			let inherited = pre.get(&name).and_then(|entry| declaration.inherit_from(entry.declaration));
			(name, inherited.unwrap_or(declaration))
		})
		.collect();
	pre.update(pre_extra)?;

	Ok((pre, post))
}

/// Orchestrates one build of a factory.
pub struct StepBuilder {
	factory: Factory,
	extras: Overrides,
	strategy: Strategy,
}

impl StepBuilder {
	/// Prepares a build of `factory` with call-time `extras`.
	pub fn new(factory: Factory, extras: Overrides, strategy: Strategy) -> Self {
		Self {
			factory,
			extras,
			strategy,
		}
	}

	/// Runs the build below `parent`, with an optional forced sequence.
	pub fn build(
		&self,
		parent: Option<&Resolver<'_>>,
		force_sequence: Option<i64>,
	) -> FactoryResult<Box<dyn Instance>> {
		let factory = &self.factory;
		let depth = parent.map_or(0, |parent| parent.step().depth() + 1);
		if depth > MAX_BUILD_DEPTH {
			return Err(FactoryError::MaxDepthExceeded(MAX_BUILD_DEPTH));
		}
		factory.check_generate(self.strategy)?;

		let (pre, post) = parse_declarations(
			&self.extras,
			Some(factory.pre_declarations()),
			Some(factory.post_declarations()),
		)?;

		let sequence = match force_sequence {
			Some(sequence) => sequence,
			None => factory.next_sequence(),
		};

		let step = BuildStep {
			factory,
			strategy: self.strategy,
			sequence,
			depth,
			parent,
		};
		debug!(
			factory = %factory.name(),
			strategy = %self.strategy,
			sequence,
			depth,
			"starting build"
		);

		let resolver = Resolver::new(&step, &pre);
		let attributes = resolver.resolve_all()?;
		let (args, kwargs) = factory.prepare_arguments(attributes)?;
		let mut instance = factory.instantiate(self.strategy, args, kwargs)?;

		let mut results = Attributes::new();
		for name in post.sorted() {
			let Some(entry) = post.get(name) else {
				continue;
			};
			let result = entry
				.declaration
				.evaluate_post(&mut *instance, &resolver, entry.context)
				.map_err(|error| error.with_field(name))?;
			results.insert(name.to_string(), result.unwrap_or(Value::Null));
		}
		factory
			.model()?
			.after_postgeneration(&mut *instance, self.strategy.is_create(), &results)?;

		debug!(
			factory = %factory.name(),
			sequence,
			depth,
			post_declarations = results.len(),
			"finished build"
		);
		Ok(instance)
	}

	/// Resolves the pre-instantiation fields and shapes them, without
	/// instantiating.
	pub(crate) fn attributes(&self, force_sequence: Option<i64>) -> FactoryResult<Attributes> {
		let factory = &self.factory;
		factory.check_generate(self.strategy)?;
		let (pre, _) = parse_declarations(
			&self.extras,
			Some(factory.pre_declarations()),
			Some(factory.post_declarations()),
		)?;
		let sequence = force_sequence.unwrap_or_else(|| factory.next_sequence());
		let step = BuildStep {
			factory,
			strategy: self.strategy,
			sequence,
			depth: 0,
			parent: None,
		};
		let resolver = Resolver::new(&step, &pre);
		let (_, kwargs) = factory.prepare_arguments(resolver.resolve_all()?)?;
		Ok(kwargs)
	}
}

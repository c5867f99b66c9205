//! Conditional and transforming declarations.

use std::sync::Arc;

use serde_json::Value;

use super::{BuilderPhase, Context, Declaration, DeclarationKind, SelfAttribute, is_truthy};
use crate::builder::{BuildStep, Resolver};
use crate::error::{FactoryError, FactoryResult};
use crate::model::Instance;

type TransformFn = Arc<dyn Fn(Value) -> FactoryResult<Value> + Send + Sync>;

/// Chooses between two declarations based on a decider.
///
/// The chosen branch receives the field's nested overrides. A
/// [`Declaration::skip`] branch omits the field entirely.
///
/// # Examples
///
/// ```
/// use fixturegraph_core::declarations::{Declaration, Maybe};
/// use serde_json::json;
///
/// let groups = Maybe::new("is_staff", json!(["admin"]), Declaration::skip());
/// ```
#[derive(Clone)]
pub struct Maybe {
	decider: Box<Declaration>,
	yes: Box<Declaration>,
	no: Box<Declaration>,
	inherits: bool,
}

impl Maybe {
	/// Decides on the value of the sibling field `decider`.
	///
	/// A missing decider field counts as false.
	pub fn new(
		decider: &str,
		yes: impl Into<Declaration>,
		no: impl Into<Declaration>,
	) -> Self {
		Self::with_decider(SelfAttribute::new(decider).with_default(Value::Null), yes, no)
	}

	/// Decides on an arbitrary pre-instantiation declaration.
	pub fn with_decider(
		decider: impl Into<Declaration>,
		yes: impl Into<Declaration>,
		no: impl Into<Declaration>,
	) -> Self {
		Self {
			decider: Box::new(decider.into()),
			yes: Box::new(yes.into()),
			no: Box::new(no.into()),
			inherits: false,
		}
	}

	/// Falls back to whatever the receiving build declares for the field.
	///
	/// The "no" branch stays a skip until [`Maybe::with_no`] fills it in.
	pub(crate) fn inheriting(decider: impl Into<Declaration>, yes: impl Into<Declaration>) -> Self {
		Self {
			inherits: true,
			..Self::with_decider(decider, yes, Declaration::skip())
		}
	}

	pub(crate) fn inherits(&self) -> bool {
		self.inherits
	}

	pub(crate) fn with_no(&self, no: Declaration) -> Self {
		Self {
			decider: self.decider.clone(),
			yes: self.yes.clone(),
			no: Box::new(no),
			inherits: false,
		}
	}

	/// Phase of the branches; post-instantiation if either branch is.
	pub fn phase(&self) -> BuilderPhase {
		if self.yes.is_post() || self.no.is_post() {
			BuilderPhase::PostInstantiation
		} else {
			BuilderPhase::AttributeResolution
		}
	}

	pub(crate) fn validate(&self) -> FactoryResult<()> {
		if self.decider.is_post() {
			return Err(FactoryError::InvalidDeclaration(
				"a Maybe decider cannot be a post-instantiation declaration".to_string(),
			));
		}
		let phases = (self.yes.phase(), self.no.phase());
		if let (Some(yes), Some(no)) = phases {
			if yes != no {
				return Err(FactoryError::InvalidDeclaration(format!(
					"Maybe branches run in different phases ({:?} and {:?})",
					yes, no
				)));
			}
		}
		self.yes.validate()?;
		self.no.validate()
	}

	fn choose(&self, resolver: &Resolver<'_>, step: &BuildStep<'_>) -> FactoryResult<&Declaration> {
		let decision = self.decider.evaluate_pre(resolver, step, &Context::new())?;
		Ok(if is_truthy(decision.as_ref()) {
			self.yes.as_ref()
		} else {
			self.no.as_ref()
		})
	}

	pub(crate) fn evaluate_pre(
		&self,
		resolver: &Resolver<'_>,
		step: &BuildStep<'_>,
		overrides: &Context,
	) -> FactoryResult<Option<Value>> {
		self.choose(resolver, step)?
			.evaluate_pre(resolver, step, overrides)
	}

	pub(crate) fn evaluate_post(
		&self,
		instance: &mut dyn Instance,
		resolver: &Resolver<'_>,
		overrides: &Context,
	) -> FactoryResult<Option<Value>> {
		self.choose(resolver, resolver.step())?
			.evaluate_post(instance, resolver, overrides)
	}
}

/// Feeds a default value, or the call-time override, through a function.
///
/// Captures overrides: a call-time value for the field lands in the nested
/// context under `""` and is transformed too, unless it was wrapped in
/// [`Declaration::force`].
///
/// # Examples
///
/// ```
/// use fixturegraph_core::declarations::Transformer;
/// use serde_json::{json, Value};
///
/// let upper = Transformer::new("secret", |value| {
/// 	Ok(json!(value.as_str().unwrap_or_default().to_uppercase()))
/// });
/// ```
#[derive(Clone)]
pub struct Transformer {
	default: Box<Declaration>,
	transform: TransformFn,
}

impl Transformer {
	/// Transforms `default` with `transform`.
	pub fn new<F>(default: impl Into<Declaration>, transform: F) -> Self
	where
		F: Fn(Value) -> FactoryResult<Value> + Send + Sync + 'static,
	{
		Self {
			default: Box::new(default.into()),
			transform: Arc::new(transform),
		}
	}

	pub(crate) fn evaluate_pre(
		&self,
		resolver: &Resolver<'_>,
		step: &BuildStep<'_>,
		overrides: &Context,
	) -> FactoryResult<Option<Value>> {
		let source = match overrides.get("") {
			Some(declaration) => {
				if let DeclarationKind::Force(forced) = declaration.kind() {
					return Ok(Some(forced.clone()));
				}
				declaration
			}
			None => self.default.as_ref(),
		};

		match source.evaluate_pre(resolver, step, &Context::new())? {
			Some(value) => (self.transform)(value).map(Some),
			None => Ok(None),
		}
	}
}

impl From<Maybe> for Declaration {
	fn from(maybe: Maybe) -> Self {
		Declaration::new(DeclarationKind::Maybe(maybe))
	}
}

impl From<Transformer> for Declaration {
	fn from(transformer: Transformer) -> Self {
		Declaration::new(DeclarationKind::Transformer(transformer))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::declarations::PostGenerationMethodCall;
	use rstest::rstest;
	use serde_json::json;

	#[rstest]
	fn test_phase_follows_branches() {
		let pre = Maybe::new("flag", json!(1), Declaration::skip());
		assert_eq!(pre.phase(), BuilderPhase::AttributeResolution);

		let post = Maybe::new("flag", PostGenerationMethodCall::new("activate"), Declaration::skip());
		assert_eq!(post.phase(), BuilderPhase::PostInstantiation);
		assert!(post.validate().is_ok());
	}

	#[rstest]
	fn test_mixed_phases_rejected() {
		let mixed = Maybe::new(
			"flag",
			PostGenerationMethodCall::new("activate"),
			Declaration::sequence(|n| Ok(json!(n))),
		);
		assert!(matches!(mixed.validate(), Err(FactoryError::InvalidDeclaration(_))));
	}

	#[rstest]
	fn test_inheriting_branch_is_filled_once() {
		let maybe = Maybe::inheriting("flag", json!("Lyon"));
		assert!(maybe.inherits());

		let filled = maybe.with_no(Declaration::value("Paris"));
		assert!(!filled.inherits());
		assert_eq!(filled.no.as_value(), Some(&json!("Paris")));
		assert_eq!(filled.yes.as_value(), Some(&json!("Lyon")));
	}
}

//! Error types for the resolution engine.
//!
//! Every error aborts the whole build it was raised in, including all
//! in-flight nested builds. Nothing is retried.

use thiserror::Error;

/// Errors that can occur while defining or building fixtures.
#[derive(Debug, Error)]
pub enum FactoryError {
	/// A field or parameter transitively depends on itself.
	#[error("Cyclic definition for '{name}': {path}")]
	CyclicDefinition {
		/// Field or parameter that closed the cycle.
		name: String,
		/// Rendered resolution path, e.g. `a -> b -> a`.
		path: String,
	},

	/// A declaration or override is malformed.
	#[error("Invalid declaration: {0}")]
	InvalidDeclaration(String),

	/// Strategy name is not one of build, create or stub.
	#[error("Unknown strategy: {0}")]
	UnknownStrategy(String),

	/// The model refuses the requested strategy.
	#[error("Unsupported strategy '{strategy}' for model {model}")]
	UnsupportedStrategy {
		/// Model name.
		model: String,
		/// Requested strategy.
		strategy: String,
	},

	/// The definition has no constructible target.
	#[error("Associated class error: {0}")]
	AssociatedClass(String),

	/// A referenced attribute is not declared (or was skipped).
	#[error("Unknown attribute '{name}'; declared fields are {known:?}")]
	UnknownAttribute {
		/// Requested attribute.
		name: String,
		/// Fields declared on the resolver that was asked.
		known: Vec<String>,
	},

	/// An instance does not provide the requested method.
	#[error("Unknown method '{method}' on {target}")]
	UnknownMethod {
		/// Description of the receiving instance.
		target: String,
		/// Method name.
		method: String,
	},

	/// Nested builds went deeper than the engine allows.
	#[error("Maximum nested build depth exceeded: {0}")]
	MaxDepthExceeded(usize),

	/// A descendant definition tried to reset a counter it does not own.
	#[error("Can't reset a sequence on descendant factory '{factory}'; reset sequence on '{owner}' or use force")]
	SequenceOwnership {
		/// Definition on which the reset was requested.
		factory: String,
		/// Definition that owns the shared counter.
		owner: String,
	},

	/// A named factory reference could not be found in the registry.
	#[error("Factory not registered: {0}")]
	FactoryNotFound(String),

	/// A built instance could not be downcast to the requested type.
	#[error("Instance type mismatch: expected {0}")]
	InstanceType(&'static str),

	/// An external declaration or collaborator failed.
	#[error("{}", evaluation_message(.field.as_deref(), .message))]
	Evaluation {
		/// Field being resolved when the failure happened, if known.
		field: Option<String>,
		/// Failure description.
		message: String,
	},

	/// JSON conversion error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

fn evaluation_message(field: Option<&str>, message: &str) -> String {
	match field {
		Some(field) => format!("Evaluation error in '{}': {}", field, message),
		None => format!("Evaluation error: {}", message),
	}
}

impl FactoryError {
	/// Creates an evaluation error for an external collaborator failure.
	pub fn evaluation(message: impl Into<String>) -> Self {
		Self::Evaluation {
			field: None,
			message: message.into(),
		}
	}

	/// Attaches a field name to an evaluation error that does not carry one yet.
	///
	/// Other variants are returned unchanged.
	pub fn with_field(self, name: &str) -> Self {
		match self {
			Self::Evaluation {
				field: None,
				message,
			} => Self::Evaluation {
				field: Some(name.to_string()),
				message,
			},
			other => other,
		}
	}

	/// Returns true for cyclic definition errors.
	pub fn is_cyclic(&self) -> bool {
		matches!(self, Self::CyclicDefinition { .. })
	}
}

/// Result type alias for factory operations.
pub type FactoryResult<T> = Result<T, FactoryError>;

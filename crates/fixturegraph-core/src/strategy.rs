//! Build strategies.

use std::fmt;
use std::str::FromStr;

use crate::error::FactoryError;

/// How a factory turns resolved attributes into an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
	/// Construct the object without persisting it.
	Build,
	/// Construct and persist the object.
	#[default]
	Create,
	/// Return a plain attribute container instead of a model instance.
	Stub,
}

impl Strategy {
	/// Returns the lowercase strategy name.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Build => "build",
			Self::Create => "create",
			Self::Stub => "stub",
		}
	}

	/// Returns true for the persisting strategy.
	pub fn is_create(&self) -> bool {
		matches!(self, Self::Create)
	}
}

impl fmt::Display for Strategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for Strategy {
	type Err = FactoryError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"build" => Ok(Self::Build),
			"create" => Ok(Self::Create),
			"stub" => Ok(Self::Stub),
			_ => Err(FactoryError::UnknownStrategy(s.to_string())),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	#[case("build", Strategy::Build)]
	#[case("CREATE", Strategy::Create)]
	#[case("stub", Strategy::Stub)]
	fn test_parse_strategy(#[case] input: &str, #[case] expected: Strategy) {
		assert_eq!(input.parse::<Strategy>().unwrap(), expected);
	}

	#[rstest]
	fn test_parse_unknown_strategy() {
		let result = "persist".parse::<Strategy>();
		assert!(matches!(result, Err(FactoryError::UnknownStrategy(name)) if name == "persist"));
	}

	#[rstest]
	fn test_default_is_create() {
		assert_eq!(Strategy::default(), Strategy::Create);
		assert!(Strategy::default().is_create());
	}
}

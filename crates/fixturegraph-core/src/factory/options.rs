//! Per-definition configuration.

use std::collections::BTreeMap;

use crate::strategy::Strategy;

/// Options of a factory definition.
///
/// Besides the default strategy and the abstract flag, these are the
/// shaping rules applied to the resolved attributes before they reach the
/// model.
///
/// # Examples
///
/// ```
/// use fixturegraph_core::factory::FactoryOptions;
/// use fixturegraph_core::strategy::Strategy;
///
/// let options = FactoryOptions::new()
/// 	.with_strategy(Strategy::Build)
/// 	.with_exclude(vec!["password_confirmation".to_string()])
/// 	.with_rename("class_", "class");
/// assert_eq!(options.strategy, Strategy::Build);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FactoryOptions {
	/// Strategy used by [`Factory::generate_default`](super::Factory::generate_default).
	pub strategy: Strategy,

	/// Abstract definitions only serve as base for other definitions.
	pub is_abstract: bool,

	/// Fields resolved but never passed to the model.
	pub exclude: Vec<String>,

	/// Fields passed to the model under another name.
	pub rename: BTreeMap<String, String>,

	/// Fields passed to the model positionally, in this order.
	pub inline_args: Vec<String>,
}

impl FactoryOptions {
	/// Creates new default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the default strategy.
	pub fn with_strategy(mut self, strategy: Strategy) -> Self {
		self.strategy = strategy;
		self
	}

	/// Sets the abstract flag.
	pub fn with_abstract(mut self, is_abstract: bool) -> Self {
		self.is_abstract = is_abstract;
		self
	}

	/// Sets the excluded fields.
	pub fn with_exclude(mut self, fields: Vec<String>) -> Self {
		self.exclude = fields;
		self
	}

	/// Adds a rename rule.
	pub fn with_rename(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
		self.rename.insert(from.into(), to.into());
		self
	}

	/// Sets the positional fields.
	pub fn with_inline_args(mut self, fields: Vec<String>) -> Self {
		self.inline_args = fields;
		self
	}
}

//! Named declarations with their nested override contexts.
//!
//! A name like `address__city` addresses the `city` entry in the context of
//! the `address` declaration. The separator is [`SPLITTER`].

use std::collections::BTreeMap;

use crate::declarations::{Context, Declaration, Overrides};
use crate::error::{FactoryError, FactoryResult};

/// Separator between a field name and a nested field name.
pub const SPLITTER: &str = "__";

static EMPTY_CONTEXT: Context = BTreeMap::new();

/// Splits `name` at the first [`SPLITTER`] into root and remainder.
///
/// # Examples
///
/// ```
/// use fixturegraph_core::declaration_set::split;
///
/// assert_eq!(split("address__city__zip"), ("address", Some("city__zip")));
/// assert_eq!(split("name"), ("name", None));
/// assert_eq!(split("password__"), ("password", Some("")));
/// ```
pub fn split(name: &str) -> (&str, Option<&str>) {
	match name.split_once(SPLITTER) {
		Some((root, rest)) => (root, Some(rest)),
		None => (name, None),
	}
}

/// Inverse of [`split`].
pub fn join(root: &str, subpath: Option<&str>) -> String {
	match subpath {
		Some(subpath) => format!("{}{}{}", root, SPLITTER, subpath),
		None => root.to_string(),
	}
}

/// A declaration along with its nested override context.
#[derive(Debug, Clone, Copy)]
pub struct DeclarationWithContext<'a> {
	/// Field name.
	pub name: &'a str,
	/// The declaration.
	pub declaration: &'a Declaration,
	/// Overrides addressed to nested fields of `name`.
	pub context: &'a Context,
}

/// Mapping from field name to declaration and nested context.
#[derive(Debug, Clone, Default)]
pub struct DeclarationSet {
	declarations: BTreeMap<String, Declaration>,
	contexts: BTreeMap<String, Context>,
}

impl DeclarationSet {
	/// Creates an empty set.
	pub fn new() -> Self {
		Self::default()
	}

	/// Merges `values` into the set.
	///
	/// Plain names replace the declaration; dotted names land in the context
	/// of their root. Fails when a context is left without a declaration, or
	/// when a declaration is malformed.
	pub fn update<I>(&mut self, values: I) -> FactoryResult<()>
	where
		I: IntoIterator<Item = (String, Declaration)>,
	{
		for (name, declaration) in values {
			declaration.validate()?;
			match split(&name) {
				(root, None) => {
					self.declarations.insert(root.to_string(), declaration);
				}
				(root, Some(subpath)) => {
					self.contexts
						.entry(root.to_string())
						.or_default()
						.insert(subpath.to_string(), declaration);
				}
			}
		}

		let unknown: Vec<String> = self
			.contexts
			.iter()
			.filter(|(root, _)| !self.declarations.contains_key(*root))
			.flat_map(|(root, context)| context.keys().map(move |sub| join(root, Some(sub))))
			.collect();
		if !unknown.is_empty() {
			return Err(FactoryError::InvalidDeclaration(format!(
				"Received deep context for unknown fields: {:?} (known={:?})",
				unknown,
				self.declarations.keys().collect::<Vec<_>>()
			)));
		}
		Ok(())
	}

	/// Keeps the entries of `names` whose root is declared here.
	///
	/// `address__city` is kept when `address` is declared.
	pub fn filter<'n, I>(&self, names: I) -> Vec<&'n str>
	where
		I: IntoIterator<Item = &'n str>,
	{
		names
			.into_iter()
			.filter(|name| self.declarations.contains_key(split(name).0))
			.collect()
	}

	/// Field names ordered by declaration creation order.
	pub fn sorted(&self) -> Vec<&str> {
		let mut entries: Vec<(&String, &Declaration)> = self.declarations.iter().collect();
		entries.sort_by(|(a_name, a), (b_name, b)| a.order().cmp(&b.order()).then(a_name.cmp(b_name)));
		entries.into_iter().map(|(name, _)| name.as_str()).collect()
	}

	/// Returns a declaration and its context.
	pub fn get(&self, name: &str) -> Option<DeclarationWithContext<'_>> {
		self.declarations
			.get_key_value(name)
			.map(|(name, declaration)| DeclarationWithContext {
				name,
				declaration,
				context: self.contexts.get(name).unwrap_or(&EMPTY_CONTEXT),
			})
	}

	/// Removes a declaration and its context.
	pub fn remove(&mut self, name: &str) -> Option<Declaration> {
		self.contexts.remove(name);
		self.declarations.remove(name)
	}

	/// Returns true when `name` is declared.
	pub fn contains(&self, name: &str) -> bool {
		self.declarations.contains_key(name)
	}

	/// Iterates over declared fields in name order.
	pub fn iter(&self) -> impl Iterator<Item = DeclarationWithContext<'_>> {
		self.declarations.keys().filter_map(|name| self.get(name))
	}

	/// Number of declared fields.
	pub fn len(&self) -> usize {
		self.declarations.len()
	}

	/// Returns true when nothing is declared.
	pub fn is_empty(&self) -> bool {
		self.declarations.is_empty()
	}

	/// Flattens the set back into dotted overrides.
	pub fn as_overrides(&self) -> Overrides {
		let mut overrides = Overrides::new();
		for (name, declaration) in &self.declarations {
			overrides.insert(name.clone(), declaration.clone());
		}
		for (root, context) in &self.contexts {
			for (sub, declaration) in context {
				overrides.insert(join(root, Some(sub)), declaration.clone());
			}
		}
		overrides
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::{prop_assert_eq, proptest};
	use rstest::rstest;
	use serde_json::json;

	fn set_of(entries: Vec<(&str, Declaration)>) -> FactoryResult<DeclarationSet> {
		let mut set = DeclarationSet::new();
		set.update(entries.into_iter().map(|(k, v)| (k.to_string(), v)))?;
		Ok(set)
	}

	#[rstest]
	#[case("", ("", None))]
	#[case("a", ("a", None))]
	#[case("a__b", ("a", Some("b")))]
	#[case("a__b__c", ("a", Some("b__c")))]
	#[case("__a", ("", Some("a")))]
	#[case("a___b", ("a", Some("_b")))]
	fn test_split(#[case] name: &str, #[case] expected: (&str, Option<&str>)) {
		assert_eq!(split(name), expected);
	}

	#[rstest]
	fn test_update_routes_contexts() {
		// Arrange
		let set = set_of(vec![
			("address", Declaration::dict([("city", "Paris")])),
			("address__city", Declaration::value("Lyon")),
		])
		.unwrap();

		// Act
		let entry = set.get("address").unwrap();

		// Assert
		assert_eq!(set.len(), 1);
		assert_eq!(
			entry.context.get("city").and_then(|d| d.as_value()),
			Some(&json!("Lyon"))
		);
	}

	#[rstest]
	fn test_update_rejects_unknown_context() {
		let result = set_of(vec![
			("name", Declaration::value("x")),
			("address__city", Declaration::value("Lyon")),
		]);

		match result {
			Err(FactoryError::InvalidDeclaration(message)) => {
				assert!(message.contains("address__city"));
			}
			other => panic!("unexpected result: {:?}", other.map(|s| s.len())),
		}
	}

	#[rstest]
	fn test_filter_keeps_declared_roots() {
		let set = set_of(vec![("address", Declaration::value(json!({})))]).unwrap();

		let kept = set.filter(["address", "address__city", "name", "name__x"]);

		assert_eq!(kept, vec!["address", "address__city"]);
	}

	#[rstest]
	fn test_sorted_follows_creation_order() {
		let first = Declaration::value(1);
		let second = Declaration::value(2);
		let third = Declaration::value(3);
		let set = set_of(vec![("z", first), ("a", third), ("m", second)]).unwrap();

		assert_eq!(set.sorted(), vec!["z", "m", "a"]);
	}

	#[rstest]
	fn test_remove_drops_context() {
		let mut set = set_of(vec![
			("password", Declaration::value("x")),
			("password__", Declaration::value("y")),
		])
		.unwrap();

		set.remove("password");

		assert!(!set.contains("password"));
		assert!(set.as_overrides().is_empty());
	}

	#[rstest]
	fn test_as_overrides_flattens() {
		let set = set_of(vec![
			("address", Declaration::value(json!({}))),
			("address__city", Declaration::value("Lyon")),
		])
		.unwrap();

		let overrides = set.as_overrides();

		assert!(overrides.contains("address"));
		assert!(overrides.contains("address__city"));
	}

	proptest! {
		#[test]
		fn prop_join_split_roundtrip(name in "[a-z_]{0,12}") {
			let (root, subpath) = split(&name);
			prop_assert_eq!(join(root, subpath), name);
		}
	}
}

//! Test models.
//!
//! `User` is a typed instance supporting method calls; `RecordingModel`
//! keeps the post-generation results it receives.

use std::sync::Arc;

use fixturegraph_core::model::{Attributes, Instance, Model};
use fixturegraph_core::{FactoryError, FactoryResult};
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{Value, json};

/// A user with a password setter and a save counter.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct User {
	pub username: String,
	#[serde(default)]
	pub email: String,
	#[serde(default)]
	pub role: String,
	#[serde(default)]
	pub is_staff: bool,
	#[serde(skip)]
	pub password: Option<String>,
	#[serde(skip)]
	pub password_calls: Vec<(Vec<Value>, Attributes)>,
	#[serde(skip)]
	pub welcome_sent: usize,
	#[serde(skip)]
	pub saves: usize,
}

impl Instance for User {
	fn to_value(&self) -> Value {
		json!({
			"username": self.username,
			"email": self.email,
			"role": self.role,
			"is_staff": self.is_staff,
		})
	}

	fn call_method(&mut self, name: &str, args: &[Value], kwargs: &Attributes) -> FactoryResult<Value> {
		match name {
			"set_password" => {
				self.password_calls.push((args.to_vec(), kwargs.clone()));
				self.password = args.first().and_then(Value::as_str).map(str::to_string);
				Ok(Value::Null)
			}
			"send_welcome" => {
				self.welcome_sent += 1;
				Ok(json!(self.welcome_sent))
			}
			_ => Err(FactoryError::UnknownMethod {
				target: "User".to_string(),
				method: name.to_string(),
			}),
		}
	}

	fn save(&mut self) -> FactoryResult<()> {
		self.saves += 1;
		Ok(())
	}
}

/// Builds a [`User`] from the resolved attributes.
pub fn user_from(kwargs: Attributes) -> FactoryResult<User> {
	Ok(serde_json::from_value(Value::Object(kwargs))?)
}

/// Model producing JSON objects and recording post-generation results.
#[derive(Clone, Default)]
pub struct RecordingModel {
	pub results: Arc<Mutex<Vec<(bool, Attributes)>>>,
}

impl RecordingModel {
	pub fn new() -> Self {
		Self::default()
	}

	/// Results received by the last build.
	pub fn last_results(&self) -> Attributes {
		self.results
			.lock()
			.last()
			.map(|(_, results)| results.clone())
			.unwrap_or_default()
	}
}

impl Model for RecordingModel {
	fn name(&self) -> &str {
		"recording"
	}

	fn build(&self, _args: Vec<Value>, kwargs: Attributes) -> FactoryResult<Box<dyn Instance>> {
		Ok(Box::new(Value::Object(kwargs)))
	}

	fn after_postgeneration(
		&self,
		_instance: &mut dyn Instance,
		create: bool,
		results: &Attributes,
	) -> FactoryResult<()> {
		self.results.lock().push((create, results.clone()));
		Ok(())
	}
}

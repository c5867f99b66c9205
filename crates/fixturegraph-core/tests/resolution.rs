//! Integration tests for attribute resolution.

mod helpers;

use fixturegraph_core::declarations::Context;
use fixturegraph_core::prelude::*;
use helpers::models::{User, user_from};
use rstest::{fixture, rstest};
use serde_json::{Value, json};

fn username() -> Declaration {
	Declaration::sequence(|n| Ok(json!(format!("user{}", n))))
}

#[fixture]
fn users() -> Factory {
	Factory::builder("User")
		.model(FnModel::new("User", |_, kwargs| user_from(kwargs)))
		.declare("username", username())
		.declare(
			"email",
			Declaration::lazy_attribute(|obj| {
				let name = obj.get("username")?;
				Ok(json!(format!("{}@example.com", name.as_str().unwrap_or_default())))
			}),
		)
		.declare("role", "user")
		.param("admin", Trait::new().set("role", "administrator").set("is_staff", true))
		.build()
		.unwrap()
}

#[rstest]
fn test_lazy_attribute_reads_sibling(users: Factory) {
	// Act
	let user: User = users.build_as(Overrides::new()).unwrap();

	// Assert
	assert_eq!(user.username, "user0");
	assert_eq!(user.email, "user0@example.com");
}

#[rstest]
fn test_override_feeds_dependents(users: Factory) {
	let user: User = users.build_as(Overrides::new().set("username", "alice")).unwrap();

	assert_eq!(user.email, "alice@example.com");
}

#[rstest]
#[case(None, "user", false)]
#[case(Some(false), "user", false)]
#[case(Some(true), "administrator", true)]
fn test_admin_trait(users: Factory, #[case] admin: Option<bool>, #[case] role: &str, #[case] is_staff: bool) {
	// Arrange
	let overrides = match admin {
		Some(flag) => Overrides::new().set("admin", flag),
		None => Overrides::new(),
	};

	// Act
	let user: User = users.build_as(overrides).unwrap();

	// Assert
	assert_eq!(user.role, role);
	assert_eq!(user.is_staff, is_staff);
}

#[rstest]
fn test_explicit_override_beats_trait(users: Factory) {
	let user: User = users
		.build_as(Overrides::new().set("admin", true).set("role", "auditor"))
		.unwrap();

	assert_eq!(user.role, "auditor");
	assert!(user.is_staff);
}

#[rstest]
fn test_parameters_never_reach_the_model(users: Factory) {
	let attributes = users.attributes(Overrides::new().set("admin", true)).unwrap();

	assert!(!attributes.contains_key("admin"));
	assert_eq!(attributes.get("role"), Some(&json!("administrator")));
}

#[rstest]
fn test_trait_enabling_another_trait() {
	// Arrange
	let accounts = Factory::builder("Account")
		.model(DictModel)
		.declare("role", "user")
		.declare("quota", 10)
		.param("superuser", Trait::new().set("admin", true).set("quota", 1000))
		.param("admin", Trait::new().set("role", "administrator"))
		.build()
		.unwrap();

	// Act
	let account = accounts
		.build(Overrides::new().set("superuser", true))
		.unwrap()
		.to_value();

	// Assert
	assert_eq!(account, json!({"role": "administrator", "quota": 1000}));
}

#[rstest]
fn test_cyclic_self_attributes_fail() {
	let factory = Factory::builder("Loop")
		.model(DictModel)
		.declare("a", Declaration::self_attribute("b"))
		.declare("b", Declaration::self_attribute("a"))
		.build()
		.unwrap();

	let error = factory.build(Overrides::new()).unwrap_err();

	match error {
		FactoryError::CyclicDefinition { name, path } => {
			assert_eq!(name, "a");
			assert_eq!(path, "a -> b -> a");
		}
		other => panic!("unexpected error: {}", other),
	}
}

#[rstest]
fn test_longer_cycle_reports_path() {
	let factory = Factory::builder("Loop")
		.model(DictModel)
		.declare("a", Declaration::self_attribute("b"))
		.declare("b", Declaration::self_attribute("c"))
		.declare("c", Declaration::lazy_attribute(|obj| obj.get("a")))
		.build()
		.unwrap();

	let error = factory.build(Overrides::new()).unwrap_err();

	assert!(error.is_cyclic());
	assert!(error.to_string().contains("a -> b -> c -> a"));
}

#[rstest]
fn test_cycle_fails_every_build() {
	let factory = Factory::builder("Loop")
		.model(DictModel)
		.declare("a", Declaration::self_attribute("a"))
		.build()
		.unwrap();

	for _ in 0..3 {
		assert!(factory.build(Overrides::new()).unwrap_err().is_cyclic());
	}
}

#[fixture]
fn companies() -> Factory {
	let employees = Factory::builder("Employee")
		.model(DictModel)
		.declare("name", "bob")
		.declare("employer", Declaration::self_attribute("..company_name"))
		.build()
		.unwrap();

	Factory::builder("Company")
		.model(DictModel)
		.declare("company_name", "ACME")
		.declare("ceo", SubFactory::new(employees))
		.build()
		.unwrap()
}

#[rstest]
fn test_parent_reference_in_nested_build(companies: Factory) {
	let company = companies.build(Overrides::new()).unwrap().to_value();

	assert_eq!(company["ceo"], json!({"name": "bob", "employer": "ACME"}));
}

#[rstest]
fn test_dotted_override_reaches_nested_field(companies: Factory) {
	let company = companies
		.build(
			Overrides::new()
				.set("company_name", "Initech")
				.set("ceo__name", Declaration::lazy_attribute(|obj| {
					let employer = obj.get("employer")?;
					Ok(json!(format!("boss of {}", employer.as_str().unwrap_or_default())))
				})),
		)
		.unwrap()
		.to_value();

	assert_eq!(company["ceo"]["employer"], json!("Initech"));
	assert_eq!(company["ceo"]["name"], json!("boss of Initech"));
}

#[rstest]
fn test_factory_parent_reads_enclosing_build() {
	// Arrange
	let employees = Factory::builder("Employee")
		.model(DictModel)
		.declare(
			"employer",
			Declaration::lazy_attribute(|obj| match obj.factory_parent() {
				Some(parent) => parent.get("company_name"),
				None => Ok(json!("none")),
			}),
		)
		.build()
		.unwrap();
	let companies = Factory::builder("Company")
		.model(DictModel)
		.declare("company_name", "ACME")
		.declare("ceo", SubFactory::new(&employees))
		.build()
		.unwrap();

	// Act
	let company = companies.build(Overrides::new()).unwrap().to_value();
	let orphan = employees.build(Overrides::new()).unwrap().to_value();

	// Assert
	assert_eq!(company["ceo"], json!({"employer": "ACME"}));
	assert_eq!(orphan, json!({"employer": "none"}));
}

#[rstest]
fn test_unknown_dotted_root_is_invalid(companies: Factory) {
	let result = companies.build(Overrides::new().set("address__city", "Paris"));

	assert!(matches!(result, Err(FactoryError::InvalidDeclaration(_))));
}

#[rstest]
fn test_parent_reference_without_parent() {
	let strict = Factory::builder("Employee")
		.model(DictModel)
		.declare("employer", Declaration::self_attribute("..company_name"))
		.build()
		.unwrap();
	let lenient = Factory::builder("Employee")
		.model(DictModel)
		.declare("employer", SelfAttribute::new("..company_name").with_default("freelance"))
		.build()
		.unwrap();

	assert!(matches!(
		strict.build(Overrides::new()),
		Err(FactoryError::UnknownAttribute { .. })
	));
	assert_eq!(
		lenient.build(Overrides::new()).unwrap().to_value(),
		json!({"employer": "freelance"})
	);
}

#[rstest]
fn test_grandparent_reference() {
	let cities = Factory::builder("City")
		.model(DictModel)
		.declare("country", Declaration::self_attribute("...country_name"))
		.build()
		.unwrap();
	let addresses = Factory::builder("Address")
		.model(DictModel)
		.declare("city", SubFactory::new(cities))
		.build()
		.unwrap();
	let people = Factory::builder("Person")
		.model(DictModel)
		.declare("country_name", "France")
		.declare("address", SubFactory::new(addresses))
		.build()
		.unwrap();

	let person = people.build(Overrides::new()).unwrap().to_value();

	assert_eq!(person["address"]["city"]["country"], json!("France"));
}

#[rstest]
fn test_self_attribute_dotted_path() {
	let factory = Factory::builder("Order")
		.model(DictModel)
		.declare("customer", Declaration::dict([("city", "Paris")]))
		.declare("ship_to", Declaration::self_attribute("customer.city"))
		.build()
		.unwrap();

	let order = factory.build(Overrides::new()).unwrap().to_value();

	assert_eq!(order["ship_to"], json!("Paris"));
}

#[rstest]
fn test_container_attribute() {
	let members = Factory::builder("Member")
		.model(DictModel)
		.declare(
			"team",
			ContainerAttribute::new(|_, containers| containers[0].get("team_name")),
		)
		.build()
		.unwrap();
	let teams = Factory::builder("Team")
		.model(DictModel)
		.declare("team_name", "core")
		.declare("lead", SubFactory::new(&members))
		.build()
		.unwrap();

	let team = teams.build(Overrides::new()).unwrap().to_value();

	assert_eq!(team["lead"]["team"], json!("core"));
	assert!(matches!(
		members.build(Overrides::new()),
		Err(FactoryError::InvalidDeclaration(_))
	));
}

#[fixture]
fn staff() -> Factory {
	Factory::builder("Staff")
		.model(DictModel)
		.declare("is_staff", false)
		.declare("groups", Maybe::new("is_staff", json!(["admin"]), Declaration::skip()))
		.build()
		.unwrap()
}

#[rstest]
fn test_maybe_skips_field(staff: Factory) {
	let value = staff.build(Overrides::new()).unwrap().to_value();

	assert_eq!(value, json!({"is_staff": false}));
}

#[rstest]
fn test_maybe_yes_branch(staff: Factory) {
	let value = staff
		.build(Overrides::new().set("is_staff", true))
		.unwrap()
		.to_value();

	assert_eq!(value["groups"], json!(["admin"]));
}

#[rstest]
fn test_skipped_field_is_unknown_to_dependents() {
	let factory = Factory::builder("Skipping")
		.model(DictModel)
		.declare("nickname", Declaration::skip())
		.declare("display", Declaration::lazy_attribute(|obj| obj.get("nickname")))
		.build()
		.unwrap();

	let error = factory.build(Overrides::new()).unwrap_err();

	assert!(matches!(error, FactoryError::UnknownAttribute { name, .. } if name == "nickname"));
}

#[rstest]
fn test_transformer() {
	// Arrange
	let factory = Factory::builder("Account")
		.model(DictModel)
		.declare(
			"password",
			Transformer::new("secret", |value| {
				Ok(json!(format!("hashed:{}", value.as_str().unwrap_or_default())))
			}),
		)
		.build()
		.unwrap();

	// Act
	let default = factory.build(Overrides::new()).unwrap().to_value();
	let custom = factory.build(Overrides::new().set("password", "abc")).unwrap().to_value();
	let forced = factory
		.build(Overrides::new().set("password", Declaration::force("raw")))
		.unwrap()
		.to_value();

	// Assert
	assert_eq!(default["password"], json!("hashed:secret"));
	assert_eq!(custom["password"], json!("hashed:abc"));
	assert_eq!(forced["password"], json!("raw"));
}

#[rstest]
fn test_dict_and_list_use_parent_sequence() {
	let factory = Factory::builder("Profile")
		.model(DictModel)
		.declare("username", username())
		.declare("meta", Declaration::dict([("code", Declaration::sequence(|n| Ok(json!(n * 10))))]))
		.declare(
			"aliases",
			Declaration::list([Declaration::value("anon"), Declaration::self_attribute("..username")]),
		)
		.build()
		.unwrap();

	let first = factory.build(Overrides::new()).unwrap().to_value();
	let second = factory.build(Overrides::new()).unwrap().to_value();

	assert_eq!(first["meta"], json!({"code": 0}));
	assert_eq!(second["meta"], json!({"code": 10}));
	assert_eq!(second["aliases"], json!(["anon", "user1"]));
}

#[rstest]
fn test_dict_override_by_index_and_key() {
	let factory = Factory::builder("Profile")
		.model(DictModel)
		.declare("meta", Declaration::dict([("city", "Paris"), ("zip", "75000")]))
		.declare("tags", Declaration::list(["a", "b"]))
		.build()
		.unwrap();

	let value = factory
		.build(Overrides::new().set("meta__city", "Lyon").set("tags__1", "z"))
		.unwrap()
		.to_value();

	assert_eq!(value["meta"], json!({"city": "Lyon", "zip": "75000"}));
	assert_eq!(value["tags"], json!(["a", "z"]));
}

#[rstest]
#[case(None, json!({"city": "Paris", "zip": "75000"}))]
#[case(Some(false), json!({"city": "Paris", "zip": "75000"}))]
#[case(Some(true), json!({"city": "Lyon", "zip": "75000"}))]
fn test_trait_on_nested_field_keeps_nested_default(#[case] lyonnais: Option<bool>, #[case] expected: Value) {
	// Arrange
	let addresses = Factory::builder("Address")
		.model(DictModel)
		.declare("city", "Paris")
		.declare("zip", "75000")
		.build()
		.unwrap();
	let people = Factory::builder("Person")
		.model(DictModel)
		.declare("address", SubFactory::new(addresses))
		.param("lyonnais", Trait::new().set("address__city", "Lyon"))
		.build()
		.unwrap();
	let overrides = match lyonnais {
		Some(flag) => Overrides::new().set("lyonnais", flag),
		None => Overrides::new(),
	};

	// Act
	let person = people.build(overrides).unwrap().to_value();

	// Assert
	assert_eq!(person, json!({"address": expected}));
}

#[rstest]
#[case(false, "Paris")]
#[case(true, "Lyon")]
fn test_trait_on_dict_entry_keeps_dict_default(#[case] lyonnais: bool, #[case] city: &str) {
	let people = Factory::builder("Person")
		.model(DictModel)
		.declare("address", Declaration::dict([("city", "Paris"), ("zip", "75000")]))
		.param("lyonnais", Trait::new().set("address__city", "Lyon"))
		.build()
		.unwrap();

	let person = people.build(Overrides::new().set("lyonnais", lyonnais)).unwrap().to_value();

	assert_eq!(person["address"], json!({"city": city, "zip": "75000"}));
}

#[rstest]
fn test_value_iterator_cycles_across_builds() {
	let factory = Factory::builder("Paint")
		.model(DictModel)
		.declare("color", ValueIterator::new(["red", "green"]))
		.build()
		.unwrap();

	let colors: Vec<Value> = (0..3)
		.map(|_| factory.build(Overrides::new()).unwrap().to_value()["color"].clone())
		.collect();

	assert_eq!(colors, vec![json!("red"), json!("green"), json!("red")]);
}

struct Greeting;

impl Evaluate for Greeting {
	fn evaluate(&self, _resolver: &Resolver<'_>, _step: &BuildStep<'_>, extra: &Context) -> FactoryResult<Value> {
		let name = extra
			.get("name")
			.and_then(|declaration| declaration.as_value())
			.and_then(Value::as_str)
			.unwrap_or("stranger");
		Ok(json!(format!("Hello {}", name)))
	}
}

#[rstest]
fn test_custom_declaration_receives_unrolled_context() {
	let factory = Factory::builder("Card")
		.model(DictModel)
		.declare("username", "alice")
		.declare("greeting", Declaration::custom(Greeting))
		.build()
		.unwrap();

	let plain = factory.build(Overrides::new()).unwrap().to_value();
	let named = factory
		.build(Overrides::new().set("greeting__name", Declaration::self_attribute("..username")))
		.unwrap()
		.to_value();

	assert_eq!(plain["greeting"], json!("Hello stranger"));
	assert_eq!(named["greeting"], json!("Hello alice"));
}

#[rstest]
fn test_evaluation_error_names_field() {
	let factory = Factory::builder("Broken")
		.model(DictModel)
		.declare("token", Declaration::lazy_function(|| Err(FactoryError::evaluation("boom"))))
		.build()
		.unwrap();

	let error = factory.build(Overrides::new()).unwrap_err();

	assert_eq!(error.to_string(), "Evaluation error in 'token': boom");
}

#[rstest]
fn test_strategy_is_inherited_by_nested_builds() {
	// Arrange
	let things = Factory::builder("Thing")
		.model(
			FnModel::new("Thing", |_, _| Ok(json!({"created": false})))
				.with_create(|_, _| Ok(json!({"created": true}))),
		)
		.build()
		.unwrap();
	let boxes = Factory::builder("Box")
		.model(DictModel)
		.declare("thing", SubFactory::new(things))
		.build()
		.unwrap();

	// Act
	let built = boxes.build(Overrides::new()).unwrap().to_value();
	let created = boxes.create(Overrides::new()).unwrap().to_value();

	// Assert
	assert_eq!(built["thing"], json!({"created": false}));
	assert_eq!(created["thing"], json!({"created": true}));
}

#[rstest]
fn test_stub_strategy(users: Factory) {
	let stub = users.stub(Overrides::new()).unwrap();

	let stub = downcast_instance::<Stub>(stub).unwrap();
	assert_eq!(stub.get("role"), Some(&json!("user")));
	assert!(stub.get("admin").is_none());
}

#[rstest]
fn test_generate_default_uses_options() {
	let factory = Factory::builder("Thing")
		.model(
			FnModel::new("Thing", |_, _| Ok(json!("built"))).with_create(|_, _| Ok(json!("created"))),
		)
		.with_options(FactoryOptions::new().with_strategy(Strategy::Build))
		.build()
		.unwrap();

	assert_eq!(factory.generate_default(Overrides::new()).unwrap().to_value(), json!("built"));
	assert_eq!(factory.simple_generate(true, Overrides::new()).unwrap().to_value(), json!("created"));
}

#[rstest]
fn test_inline_args_and_rename() {
	// Arrange
	let factory = Factory::builder("Point")
		.model(FnModel::new("Point", |args, kwargs| {
			Ok(json!({"args": args, "kwargs": kwargs}))
		}))
		.declare("x", 1)
		.declare("y", 2)
		.declare("label_", "origin")
		.with_options(
			FactoryOptions::new()
				.with_inline_args(vec!["x".to_string(), "y".to_string()])
				.with_rename("label_", "label"),
		)
		.build()
		.unwrap();

	// Act
	let value = factory.build(Overrides::new()).unwrap().to_value();

	// Assert
	assert_eq!(value, json!({"args": [1, 2], "kwargs": {"label": "origin"}}));
}

#[cfg(feature = "serde-models")]
#[rstest]
fn test_serde_model() {
	let factory = Factory::builder("User")
		.model(SerdeModel::<User>::new("User"))
		.declare("username", "carol")
		.declare("role", "user")
		.build()
		.unwrap();

	let user: User = factory.build_as(Overrides::new()).unwrap();

	assert_eq!(user.username, "carol");
	assert_eq!(user.role, "user");
}

#[rstest]
fn test_child_definition_inherits_declarations(users: Factory) {
	let staff = users.extend("Staff").declare("role", "staff").build().unwrap();

	let user: User = staff.build_as(Overrides::new()).unwrap();
	let admin: User = staff.build_as(Overrides::new().set("admin", true)).unwrap();

	assert_eq!(user.role, "staff");
	assert!(user.email.ends_with("@example.com"));
	assert_eq!(admin.role, "administrator");
}

//! Facade re-export tests.

use fixturegraph::prelude::*;
use rstest::rstest;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Article {
	title: String,
	slug: String,
}

impl Instance for Article {
	fn to_value(&self) -> Value {
		json!({"title": self.title, "slug": self.slug})
	}
}

#[rstest]
fn test_prelude_builds_typed_instances() {
	// Arrange
	let articles = Factory::builder("Article")
		.model(SerdeModel::<Article>::new("Article"))
		.declare("title", Declaration::sequence(|n| Ok(json!(format!("Post {}", n)))))
		.declare(
			"slug",
			Declaration::lazy_attribute(|obj| {
				let title = obj.get("title")?;
				Ok(json!(title.as_str().unwrap_or_default().to_lowercase().replace(' ', "-")))
			}),
		)
		.build()
		.unwrap();

	// Act
	let article: Article = articles.build_as(Overrides::new()).unwrap();

	// Assert
	assert_eq!(article.title, "Post 0");
	assert_eq!(article.slug, "post-0");
}

#[rstest]
fn test_facade_reexports_core_modules() {
	let counter = fixturegraph::sequence::SequenceCounter::new("Facade");

	assert_eq!(counter.next(), 0);
	assert_eq!(fixturegraph::builder::MAX_BUILD_DEPTH, 64);
}

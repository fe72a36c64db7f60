//! Bookstore schema shared by the integration tests.

#![allow(dead_code)]

use std::path::PathBuf;

use reinhardt_fixtures::prelude::*;
use serde_json::{Value, json};

pub const AUTHOR: &str = "bookstore.Author";
pub const BOOK: &str = "bookstore.Book";
pub const TAG: &str = "bookstore.Tag";
pub const BOOK_TAG: &str = "bookstore.BookTag";
pub const CATEGORY: &str = "bookstore.Category";
pub const PERSON: &str = "bookstore.Person";
pub const EDITOR: &str = "bookstore.Editor";
pub const REVIEW: &str = "bookstore.Review";

/// Builds the bookstore schema.
///
/// `Book` references `Author` and owns a many-to-many relation to `Tag`
/// through `BookTag`; `Category` references itself; `Editor` inherits from
/// `Person`, which `Review` references.
pub fn schema() -> Schema {
	Schema::new(vec![
		Table::new(AUTHOR, "author")
			.with_column(Column::primary_key("id"))
			.with_column(Column::new("name"))
			.with_column(Column::new("email")),
		Table::new(BOOK, "book")
			.with_column(Column::primary_key("id"))
			.with_column(Column::new("title"))
			.with_column(Column::new("keywords").with_type(ColumnType::Array))
			.with_column(Column::foreign_key("author_id", AUTHOR, "id").with_relation("Author"))
			.with_relation(Relation::many_to_many("Tag", TAG, BOOK_TAG)),
		Table::new(TAG, "tag")
			.with_column(Column::primary_key("id"))
			.with_column(Column::new("label")),
		Table::new(BOOK_TAG, "book_tag")
			.with_column(
				Column::foreign_key("book_id", BOOK, "id")
					.with_relation("Book")
					.with_primary_key(true),
			)
			.with_column(
				Column::foreign_key("tag_id", TAG, "id")
					.with_relation("Tag")
					.with_primary_key(true),
			)
			.with_id_generator(false),
		Table::new(CATEGORY, "category")
			.with_column(Column::primary_key("id"))
			.with_column(Column::new("name"))
			.with_column(Column::foreign_key("parent_id", CATEGORY, "id").with_relation("Parent")),
		Table::new(PERSON, "person")
			.with_column(Column::primary_key("id"))
			.with_column(Column::new("name")),
		Table::new(EDITOR, "editor")
			.with_column(Column::primary_key("id"))
			.with_column(Column::new("name"))
			.with_column(Column::new("desk"))
			.with_parent(PERSON),
		Table::new(REVIEW, "review")
			.with_column(Column::primary_key("id"))
			.with_column(Column::new("body"))
			.with_column(Column::foreign_key("reviewer_id", PERSON, "id").with_relation("Reviewer")),
	])
	.unwrap()
}

/// A plain person, an editor and one review of each.
pub fn staff() -> Value {
	json!({
		PERSON: {"Person_1": {"name": "Ann"}},
		EDITOR: {"Editor_1": {"name": "Max", "desk": "fiction"}},
		REVIEW: {
			"Review_1": {"body": "Great", "reviewer": "Editor_1"},
			"Review_2": {"body": "Fine", "reviewer": "Person_1"}
		}
	})
}

/// Builds a document from a JSON literal.
pub fn document(value: Value) -> FixtureDocument {
	FixtureDocument::from_value(value).unwrap()
}

/// Returns the path of a data file under `tests/fixtures`.
pub fn data_file(name: &str) -> PathBuf {
	PathBuf::from(env!("CARGO_MANIFEST_DIR"))
		.join("tests")
		.join("fixtures")
		.join(name)
}

/// Returns one column of every stored row of `table`.
pub fn column(storage: &MemoryStorage, table: &str, column: &str) -> Vec<Value> {
	storage
		.rows(table)
		.iter()
		.map(|row| row.get(column).cloned().unwrap_or(Value::Null))
		.collect()
}

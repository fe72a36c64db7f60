//! Row storage used by the dumper and loader.
//!
//! A backend reads, deletes and writes whole rows of one table at a time and
//! scopes a load in a single transaction. Object-typed columns are encoded
//! with [`ObjectCodec`](crate::codec::ObjectCodec) by the backend on write;
//! reads return the stored form.

mod memory;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use memory::MemoryStorage;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::Value;

use crate::codec::ObjectCodec;
use crate::error::StorageResult;
use crate::schema::{ColumnType, Table};

/// Ordered mapping from column name to value.
pub type Row = IndexMap<String, Value>;

/// Column predicate for [`FixtureStorage::select`].
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilter {
	/// Rows whose column is null.
	IsNull(String),
	/// Rows whose column equals one of the values.
	In(String, Vec<Value>),
}

impl RowFilter {
	/// Returns true if `row` satisfies the predicate.
	pub fn matches(&self, row: &Row) -> bool {
		match self {
			Self::IsNull(column) => row.get(column).is_none_or(Value::is_null),
			Self::In(column, values) => row
				.get(column)
				.filter(|v| !v.is_null())
				.is_some_and(|v| values.iter().any(|candidate| loosely_equal(v, candidate))),
		}
	}
}

/// Compares stored values, treating numbers and their text form as equal.
pub(crate) fn loosely_equal(left: &Value, right: &Value) -> bool {
	match (left, right) {
		(Value::String(s), other) | (other, Value::String(s)) if !other.is_string() => {
			*s == crate::codec::scalar_text(other)
		}
		_ => left == right,
	}
}

/// Transactional row storage.
///
/// Calls are strictly sequential; the storage is owned by one dump or load
/// call for its duration.
#[async_trait]
pub trait FixtureStorage: Send {
	/// Starts the transaction covering a load.
	async fn begin(&mut self) -> StorageResult<()>;

	/// Commits the current transaction.
	async fn commit(&mut self) -> StorageResult<()>;

	/// Rolls back the current transaction.
	async fn rollback(&mut self) -> StorageResult<()>;

	/// Reads rows of `table`, optionally filtered, ordered by primary key.
	async fn select(&mut self, table: &Table, filter: Option<&RowFilter>) -> StorageResult<Vec<Row>>;

	/// Deletes every row of `table` and returns the number deleted.
	async fn delete_all(&mut self, table: &Table) -> StorageResult<u64>;

	/// Inserts a row and returns it as stored, including generated keys.
	async fn insert(&mut self, table: &Table, values: &Row) -> StorageResult<Row>;

	/// Updates the row identified by the primary-key values in `values`.
	async fn update(&mut self, table: &Table, values: &Row) -> StorageResult<Row>;
}

/// Encodes object-typed columns of `values` for storage.
pub(crate) fn encode_row(table: &Table, values: &Row) -> Row {
	values
		.iter()
		.map(|(name, value)| {
			let encoded = match table.column(name).map(|c| c.column_type) {
				Some(ColumnType::Object) => ObjectCodec::encode(value),
				_ => value.clone(),
			};
			(name.clone(), encoded)
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::schema::Column;
	use rstest::rstest;
	use serde_json::json;

	fn row(value: Value) -> Row {
		serde_json::from_value(value).unwrap()
	}

	#[rstest]
	fn test_is_null_filter() {
		let filter = RowFilter::IsNull("parent_id".to_string());
		assert!(filter.matches(&row(json!({"id": 1, "parent_id": null}))));
		assert!(filter.matches(&row(json!({"id": 1}))));
		assert!(!filter.matches(&row(json!({"id": 2, "parent_id": 1}))));
	}

	#[rstest]
	fn test_in_filter() {
		let filter = RowFilter::In("parent_id".to_string(), vec![json!(1), json!(3)]);
		assert!(filter.matches(&row(json!({"parent_id": 3}))));
		assert!(filter.matches(&row(json!({"parent_id": "1"}))));
		assert!(!filter.matches(&row(json!({"parent_id": 2}))));
		assert!(!filter.matches(&row(json!({"parent_id": null}))));
	}

	#[rstest]
	fn test_encode_row_objects_only() {
		let table = Table::new("app.Profile", "profile")
			.with_column(Column::primary_key("id"))
			.with_column(Column::new("settings").with_type(ColumnType::Object))
			.with_column(Column::new("tags").with_type(ColumnType::Array));

		let encoded = encode_row(
			&table,
			&row(json!({"id": 1, "settings": {"theme": "dark"}, "tags": "| a |"})),
		);
		assert_eq!(encoded["settings"], json!(r#"{"theme":"dark"}"#));
		assert_eq!(encoded["tags"], json!("| a |"));
	}
}

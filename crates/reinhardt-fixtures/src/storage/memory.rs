//! In-process storage backend.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use super::{FixtureStorage, Row, RowFilter, encode_row, loosely_equal};
use crate::codec::scalar_text;
use crate::error::{StorageError, StorageResult};
use crate::schema::Table;

#[derive(Debug, Clone, Default)]
struct State {
	rows: HashMap<String, Vec<Row>>,
	sequences: HashMap<String, i64>,
}

/// Storage keeping rows in memory, keyed by storage table name.
///
/// Single-column generated primary keys are assigned from a per-table
/// counter that is never reused. A transaction snapshots the whole state;
/// rollback restores the snapshot.
///
/// # Example
///
/// ```
/// # tokio_test::block_on(async {
/// use reinhardt_fixtures::schema::{Column, Table};
/// use reinhardt_fixtures::storage::{FixtureStorage, MemoryStorage, Row};
/// use serde_json::json;
///
/// let author = Table::new("bookstore.Author", "author")
///     .with_column(Column::primary_key("id"))
///     .with_column(Column::new("name"));
///
/// let mut storage = MemoryStorage::new();
/// let row = storage
///     .insert(&author, &Row::from_iter([("name".to_string(), json!("Jane"))]))
///     .await
///     .unwrap();
/// assert_eq!(row["id"], json!(1));
/// # });
/// ```
#[derive(Debug, Default)]
pub struct MemoryStorage {
	state: State,
	snapshot: Option<State>,
}

impl MemoryStorage {
	/// Creates an empty storage.
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns the rows of a storage table in insertion order.
	pub fn rows(&self, table_name: &str) -> &[Row] {
		self.state
			.rows
			.get(table_name)
			.map(Vec::as_slice)
			.unwrap_or_default()
	}

	/// Returns the number of rows in a storage table.
	pub fn count(&self, table_name: &str) -> usize {
		self.rows(table_name).len()
	}

	/// Returns true while a transaction is open.
	pub fn in_transaction(&self) -> bool {
		self.snapshot.is_some()
	}

	fn materialize(table: &Table, values: &Row) -> StorageResult<Row> {
		if let Some(unknown) = values.keys().find(|name| table.column(name).is_none()) {
			return Err(StorageError::Database(format!(
				"table {} has no column named {}",
				table.name, unknown
			)));
		}

		let encoded = encode_row(table, values);
		Ok(table
			.columns()
			.iter()
			.map(|column| {
				let value = encoded.get(&column.name).cloned().unwrap_or(Value::Null);
				(column.name.clone(), value)
			})
			.collect())
	}

	fn assign_key(&mut self, table: &Table, row: &mut Row) {
		let mut keys = table.primary_keys();
		let (Some(key), None) = (keys.next(), keys.next()) else {
			return;
		};

		let sequence = self.state.sequences.entry(table.name.clone()).or_insert(0);
		match row.get(&key.name).and_then(Value::as_i64) {
			Some(explicit) => *sequence = (*sequence).max(explicit),
			None if table.use_id_generator && row.get(&key.name).is_none_or(Value::is_null) => {
				*sequence += 1;
				row.insert(key.name.clone(), Value::from(*sequence));
			}
			None => {}
		}
	}

	fn same_key(table: &Table, stored: &Row, values: &Row) -> bool {
		table.primary_keys().all(|key| {
			match (stored.get(&key.name), values.get(&key.name)) {
				(Some(left), Some(right)) => loosely_equal(left, right),
				_ => false,
			}
		})
	}
}

fn compare_keys(table: &Table, left: &Row, right: &Row) -> Ordering {
	table
		.primary_keys()
		.map(|key| {
			let (l, r) = (left.get(&key.name), right.get(&key.name));
			match (l.and_then(Value::as_i64), r.and_then(Value::as_i64)) {
				(Some(l), Some(r)) => l.cmp(&r),
				_ => l.map(scalar_text).cmp(&r.map(scalar_text)),
			}
		})
		.find(|ordering| ordering.is_ne())
		.unwrap_or(Ordering::Equal)
}

#[async_trait]
impl FixtureStorage for MemoryStorage {
	async fn begin(&mut self) -> StorageResult<()> {
		if self.snapshot.is_some() {
			return Err(StorageError::Transaction(
				"Transaction already active".to_string(),
			));
		}
		self.snapshot = Some(self.state.clone());
		Ok(())
	}

	async fn commit(&mut self) -> StorageResult<()> {
		self.snapshot
			.take()
			.map(|_| ())
			.ok_or_else(|| StorageError::Transaction("No active transaction".to_string()))
	}

	async fn rollback(&mut self) -> StorageResult<()> {
		let snapshot = self
			.snapshot
			.take()
			.ok_or_else(|| StorageError::Transaction("No active transaction".to_string()))?;
		self.state = snapshot;
		Ok(())
	}

	async fn select(&mut self, table: &Table, filter: Option<&RowFilter>) -> StorageResult<Vec<Row>> {
		let mut rows: Vec<Row> = self
			.rows(&table.name)
			.iter()
			.filter(|row| filter.is_none_or(|f| f.matches(row)))
			.cloned()
			.collect();
		rows.sort_by(|left, right| compare_keys(table, left, right));
		Ok(rows)
	}

	async fn delete_all(&mut self, table: &Table) -> StorageResult<u64> {
		let removed = self
			.state
			.rows
			.remove(&table.name)
			.map(|rows| rows.len())
			.unwrap_or_default();
		Ok(removed as u64)
	}

	async fn insert(&mut self, table: &Table, values: &Row) -> StorageResult<Row> {
		let mut row = Self::materialize(table, values)?;
		self.assign_key(table, &mut row);

		let rows = self.state.rows.entry(table.name.clone()).or_default();
		if table.primary_keys().next().is_some() && rows.iter().any(|r| Self::same_key(table, r, &row)) {
			return Err(StorageError::Database(format!(
				"UNIQUE constraint failed: {} primary key",
				table.name
			)));
		}
		rows.push(row.clone());
		Ok(row)
	}

	async fn update(&mut self, table: &Table, values: &Row) -> StorageResult<Row> {
		let encoded = encode_row(table, values);
		let stored = self
			.state
			.rows
			.get_mut(&table.name)
			.and_then(|rows| rows.iter_mut().find(|r| Self::same_key(table, r, &encoded)))
			.ok_or_else(|| {
				StorageError::Database(format!("No row of {} matches the primary key", table.name))
			})?;

		for (name, value) in encoded {
			if table.column(&name).is_some() {
				stored.insert(name, value);
			}
		}
		Ok(stored.clone())
	}
}

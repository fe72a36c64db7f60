//! Symbolic reference table.
//!
//! Maps `(table id, symbolic key)` to the concrete row read or persisted
//! under that key. One table is created per dump or load call and dropped
//! when the call returns.

use std::collections::HashMap;

use serde_json::Value;

use crate::storage::Row;

/// Row registered under a symbolic key.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
	/// Materialized column values.
	pub values: Row,
	/// True while the row has not been persisted yet.
	pub is_new: bool,
}

impl Record {
	/// Creates an unsaved row with no values.
	pub fn new() -> Self {
		Self {
			values: Row::new(),
			is_new: true,
		}
	}

	/// Wraps a row that already exists in storage.
	pub fn persisted(values: Row) -> Self {
		Self {
			values,
			is_new: false,
		}
	}

	/// Returns the value of a column.
	pub fn get(&self, column: &str) -> Option<&Value> {
		self.values.get(column)
	}

	/// Sets the value of a column.
	pub fn set(&mut self, column: impl Into<String>, value: Value) {
		self.values.insert(column.into(), value);
	}
}

impl Default for Record {
	fn default() -> Self {
		Self::new()
	}
}

/// Per-call mapping from symbolic keys to rows.
#[derive(Debug, Default)]
pub struct ReferenceTable {
	records: HashMap<(String, String), Record>,
}

impl ReferenceTable {
	/// Creates an empty reference table.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a record, replacing any previous one under the same key.
	pub fn insert(&mut self, table: impl Into<String>, key: impl Into<String>, record: Record) {
		self.records.insert((table.into(), key.into()), record);
	}

	/// Returns the record registered under `table` and `key`.
	pub fn get(&self, table: &str, key: &str) -> Option<&Record> {
		self.records.get(&(table.to_string(), key.to_string()))
	}

	/// Returns true if a record is registered under `table` and `key`.
	pub fn contains(&self, table: &str, key: &str) -> bool {
		self.get(table, key).is_some()
	}

	/// Returns the number of registered records.
	pub fn len(&self) -> usize {
		self.records.len()
	}

	/// Returns true if nothing is registered.
	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}
}

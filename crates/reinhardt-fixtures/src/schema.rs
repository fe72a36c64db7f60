//! Schema catalog consumed by the dumper and loader.
//!
//! The catalog is read-only for the duration of a call. Table metadata
//! (columns, keys, relations and inheritance) is resolved once when the
//! catalog is built; per-row processing only performs lookups.

mod catalog;
mod setters;
mod table;

pub use catalog::Schema;
pub use setters::FieldSetters;
pub use table::{Column, ColumnType, ForeignKey, Relation, RelationKind, Table, short_name};

use crate::error::{FixtureError, FixtureResult};

/// Read-only source of table metadata.
pub trait SchemaCatalog: Send + Sync {
	/// Returns every table in declaration order.
	fn tables(&self) -> Vec<&Table>;

	/// Returns the table with the given identifier.
	fn table(&self, id: &str) -> Option<&Table>;

	/// Returns the ancestor chain of a table, nearest ancestor first.
	fn ancestors(&self, id: &str) -> Vec<&Table>;

	/// Returns the ancestors holding a mirror row for every row of a table.
	///
	/// The chain stops at the first abstract ancestor, nearest ancestor first.
	fn concrete_ancestors(&self, id: &str) -> Vec<&Table> {
		self.ancestors(id)
			.into_iter()
			.take_while(|ancestor| !ancestor.is_abstract)
			.collect()
	}

	/// Returns the table with the given identifier or fails with `UnknownType`.
	fn require_table(&self, id: &str) -> FixtureResult<&Table> {
		self.table(id)
			.ok_or_else(|| FixtureError::UnknownType(id.to_string()))
	}
}

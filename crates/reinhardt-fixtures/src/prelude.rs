//! Convenience re-exports for common usage.
//!
//! # Example
//!
//! ```
//! use reinhardt_fixtures::prelude::*;
//!
//! let schema = Schema::new(vec![
//!     Table::new("bookstore.Author", "author").with_column(Column::primary_key("id")),
//! ])
//! .unwrap();
//! let loader = FixtureLoader::new(&schema);
//! # let _ = loader;
//! ```

// Error types
pub use crate::error::{FixtureError, FixtureResult, StorageError, StorageResult};

// Schema types
pub use crate::schema::{
	Column, ColumnType, ForeignKey, Relation, RelationKind, Schema, SchemaCatalog, Table,
};

// Fixture types
pub use crate::fixtures::{
	FixtureDocument, FixtureFormat, FixtureParser, FixtureSerializer, MergePolicy,
};

// Dump and load
pub use crate::dumper::{DumpOptions, FixtureDumper};
pub use crate::loader::{FixtureLoader, LoadOptions, LoadResult};

// Storage
#[cfg(feature = "sqlite")]
pub use crate::storage::SqliteStorage;
pub use crate::storage::{FixtureStorage, MemoryStorage, Row, RowFilter};

// Command types
pub use crate::commands::{
	DumpDataCommand, DumpDataOptions, DumpResult, LoadDataArgs, LoadDataCommand, LoadDataOptions,
};

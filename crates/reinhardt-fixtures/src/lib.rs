//! Foreign-key aware fixture dump and load for the Reinhardt framework.
//!
//! Fixtures describe relational data with symbolic keys instead of
//! database-assigned identifiers, so a dataset can be dumped from one
//! database and loaded into another:
//!
//! ```json
//! {
//!   "bookstore.Author": {
//!     "Author_1": {"name": "Jane"}
//!   },
//!   "bookstore.Book": {
//!     "Book_1": {"title": "X", "author": "Author_1", "booktags": ["Tag_1"]}
//!   }
//! }
//! ```
//!
//! - **Dumping** walks tables in foreign-key dependency order, rewrites every
//!   foreign-key value as the symbolic key of the referenced row and expands
//!   self-referencing tables parents first.
//! - **Loading** merges any number of documents, empties the affected tables
//!   and inserts every entry in dependency order inside one transaction,
//!   resolving symbolic keys against rows inserted earlier in the same call.
//!
//! # Features
//!
//! - `json` - JSON fixture format support (enabled by default)
//! - `yaml` - YAML fixture format support (enabled by default)
//! - `sqlite` - [`SqliteStorage`](storage::SqliteStorage) backend (enabled by default)
//! - `full` - All features enabled
//!
//! # Architecture
//!
//! - [`SchemaCatalog`](schema::SchemaCatalog) - Table metadata: keys, relations, inheritance
//! - [`FixtureStorage`](storage::FixtureStorage) - Transactional row storage
//! - [`FixtureDumper`](dumper::FixtureDumper) - Storage to [`FixtureDocument`](fixtures::FixtureDocument)
//! - [`FixtureLoader`](loader::FixtureLoader) - Documents to storage
//! - [`LoadDataCommand`](commands::LoadDataCommand) and
//!   [`DumpDataCommand`](commands::DumpDataCommand) - Management commands

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod codec;
pub mod commands;
pub mod dumper;
pub mod error;
pub mod fixtures;
pub mod loader;
pub mod ordering;
pub mod prelude;
pub mod references;
pub mod schema;
pub mod storage;

// Re-export commonly used types at crate root
pub use dumper::{DumpOptions, FixtureDumper};
pub use error::{FixtureError, FixtureResult, StorageError, StorageResult};
pub use fixtures::{FixtureDocument, FixtureFormat, FixtureParser, FixtureSerializer, MergePolicy};
pub use loader::{FixtureLoader, LoadOptions, LoadResult};
pub use schema::{Schema, SchemaCatalog, Table};
pub use storage::{FixtureStorage, MemoryStorage};

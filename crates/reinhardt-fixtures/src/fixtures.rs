//! Fixture documents and their external formats.
//!
//! A fixture document is a nested mapping
//! `TableId → SymbolicKey → field → value`. Values are scalars, symbolic keys
//! of other rows, or lists of symbolic keys for many-to-many memberships.

mod document;
mod format;
mod parser;
mod serializer;

pub use document::{FixtureDocument, MergePolicy, TableSection, symbolic_key};
pub use format::FixtureFormat;
pub use parser::FixtureParser;
pub use serializer::FixtureSerializer;

//! Fixture document model and multi-document merging.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::codec::scalar_text;
use crate::error::{FixtureError, FixtureResult};

/// Entries of one table: symbolic key → field mapping.
///
/// Entries are kept as raw values so that a malformed entry surfaces as
/// [`FixtureError::MalformedFixtureEntry`] when it is loaded.
pub type TableSection = IndexMap<String, Value>;

/// Policy for fields defined with different values by several documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergePolicy {
	/// The value from the later document wins.
	#[default]
	LastWins,
	/// Conflicting values abort the merge with [`FixtureError::MergeConflict`].
	Reject,
}

/// Builds the symbolic key of a row: the table short name followed by its
/// primary-key values, joined with `_` (e.g. `Author_7`).
///
/// # Example
///
/// ```
/// use reinhardt_fixtures::fixtures::symbolic_key;
/// use serde_json::json;
///
/// assert_eq!(symbolic_key("BookTag", [&json!(1), &json!(2)]), "BookTag_1_2");
/// ```
pub fn symbolic_key<'a>(short_name: &str, values: impl IntoIterator<Item = &'a Value>) -> String {
	values
		.into_iter()
		.fold(short_name.to_string(), |mut key, value| {
			key.push('_');
			key.push_str(&scalar_text(value));
			key
		})
}

/// In-memory fixture document.
///
/// Shape: `{ TableId: { SymbolicKey: { field: value } } }`. The document is
/// agnostic of the external format; see [`FixtureParser`](super::FixtureParser)
/// and [`FixtureSerializer`](super::FixtureSerializer).
///
/// # Example
///
/// ```
/// use reinhardt_fixtures::fixtures::FixtureDocument;
/// use serde_json::json;
///
/// let document = FixtureDocument::from_value(json!({
///     "bookstore.Author": {"Author_1": {"name": "Jane"}},
///     "bookstore.Book": {"Book_1": {"title": "X", "author": "Author_1"}}
/// }))
/// .unwrap();
///
/// assert_eq!(document.table_ids().collect::<Vec<_>>(), vec!["bookstore.Author", "bookstore.Book"]);
/// assert!(document.contains("bookstore.Author", "Author_1"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FixtureDocument {
	tables: IndexMap<String, TableSection>,
}

impl FixtureDocument {
	/// Creates an empty document.
	pub fn new() -> Self {
		Self::default()
	}

	/// Builds a document from a nested mapping value.
	///
	/// A `null` table section is accepted as an empty section, which purges
	/// the table on load without inserting rows.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::ParseError`] if the value is not a mapping of
	/// mappings.
	pub fn from_value(value: Value) -> FixtureResult<Self> {
		let Value::Object(tables) = value else {
			return Err(FixtureError::ParseError(
				"Expected a mapping of table identifiers".to_string(),
			));
		};

		let mut document = Self::new();
		for (table, section) in tables {
			let table = table.trim().to_string();
			let section = match section {
				Value::Null => TableSection::new(),
				Value::Object(entries) => entries.into_iter().collect(),
				_ => {
					return Err(FixtureError::ParseError(format!(
						"Section for table '{}' must be a mapping of symbolic keys",
						table
					)));
				}
			};
			document.tables.insert(table, section);
		}
		Ok(document)
	}

	/// Inserts an entry, creating the table section if needed.
	pub fn insert(&mut self, table: impl Into<String>, key: impl Into<String>, fields: Value) {
		self.tables
			.entry(table.into())
			.or_default()
			.insert(key.into(), fields);
	}

	/// Ensures a (possibly empty) section exists for `table`.
	pub fn touch(&mut self, table: impl Into<String>) {
		self.tables.entry(table.into()).or_default();
	}

	/// Returns the table identifiers in document order.
	pub fn table_ids(&self) -> impl Iterator<Item = &str> {
		self.tables.keys().map(String::as_str)
	}

	/// Returns the section of a table.
	pub fn section(&self, table: &str) -> Option<&TableSection> {
		self.tables.get(table)
	}

	/// Returns the entry for a table and symbolic key.
	pub fn entry(&self, table: &str, key: &str) -> Option<&Value> {
		self.tables.get(table).and_then(|s| s.get(key))
	}

	/// Returns true if the document defines the given table and symbolic key.
	pub fn contains(&self, table: &str, key: &str) -> bool {
		self.entry(table, key).is_some()
	}

	/// Returns true if the document has a section for `table`.
	pub fn has_table(&self, table: &str) -> bool {
		self.tables.contains_key(table)
	}

	/// Returns the number of table sections.
	pub fn len(&self) -> usize {
		self.tables.len()
	}

	/// Returns true if the document has no table sections.
	pub fn is_empty(&self) -> bool {
		self.tables.is_empty()
	}

	/// Returns the total number of entries across all tables.
	pub fn entry_count(&self) -> usize {
		self.tables.values().map(IndexMap::len).sum()
	}

	/// Converts the document into a nested mapping value.
	pub fn into_value(self) -> Value {
		Value::Object(
			self.tables
				.into_iter()
				.map(|(table, section)| (table, Value::Object(section.into_iter().collect())))
				.collect(),
		)
	}

	/// Merges `other` into this document.
	///
	/// Sections are combined by table identifier, then symbolic key. Field
	/// mappings of the same entry are unioned recursively: nested mappings
	/// merge, lists are concatenated without duplicates, and conflicting
	/// scalars are resolved by `policy`.
	pub fn merge(&mut self, other: FixtureDocument, policy: MergePolicy) -> FixtureResult<()> {
		for (table, section) in other.tables {
			let target = self.tables.entry(table.clone()).or_default();
			for (key, fields) in section {
				match target.get_mut(&key) {
					Some(existing) => {
						merge_value(existing, fields, policy, &Path::new(&table, &key))?;
					}
					None => {
						target.insert(key, fields);
					}
				}
			}
		}
		Ok(())
	}
}

impl<'de> Deserialize<'de> for FixtureDocument {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let value = Value::deserialize(deserializer)?;
		Self::from_value(value).map_err(serde::de::Error::custom)
	}
}

/// Location of a merged value, for conflict reporting.
struct Path<'a> {
	table: &'a str,
	key: &'a str,
	field: Option<String>,
}

impl<'a> Path<'a> {
	fn new(table: &'a str, key: &'a str) -> Self {
		Self {
			table,
			key,
			field: None,
		}
	}

	fn child(&self, name: &str) -> Self {
		let field = match &self.field {
			Some(parent) => format!("{parent}.{name}"),
			None => name.to_string(),
		};
		Self {
			table: self.table,
			key: self.key,
			field: Some(field),
		}
	}
}

fn merge_value(
	existing: &mut Value,
	incoming: Value,
	policy: MergePolicy,
	path: &Path<'_>,
) -> FixtureResult<()> {
	match (existing, incoming) {
		(Value::Object(current), Value::Object(incoming)) => merge_map(current, incoming, policy, path),
		(Value::Array(current), Value::Array(incoming)) => {
			for item in incoming {
				if !current.contains(&item) {
					current.push(item);
				}
			}
			Ok(())
		}
		(current, incoming) => {
			if *current == incoming {
				return Ok(());
			}
			let field = path.field.clone().unwrap_or_default();
			match policy {
				MergePolicy::Reject => Err(FixtureError::MergeConflict {
					table: path.table.to_string(),
					key: path.key.to_string(),
					field,
				}),
				MergePolicy::LastWins => {
					tracing::warn!(
						table = path.table,
						key = path.key,
						field = %field,
						"Conflicting fixture values, keeping the later document's value"
					);
					*current = incoming;
					Ok(())
				}
			}
		}
	}
}

fn merge_map(
	current: &mut Map<String, Value>,
	incoming: Map<String, Value>,
	policy: MergePolicy,
	path: &Path<'_>,
) -> FixtureResult<()> {
	for (name, value) in incoming {
		match current.get_mut(&name) {
			Some(existing) => merge_value(existing, value, policy, &path.child(&name))?,
			None => {
				current.insert(name, value);
			}
		}
	}
	Ok(())
}

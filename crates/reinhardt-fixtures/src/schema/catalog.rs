//! In-memory schema catalog.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::SchemaCatalog;
use super::table::Table;
use crate::error::{FixtureError, FixtureResult};
use crate::fixtures::FixtureFormat;

/// Schema catalog built from a list of tables.
///
/// Construction validates cross-table references and resolves every
/// inheritance chain up front.
///
/// # Example
///
/// ```
/// use reinhardt_fixtures::schema::{Column, Schema, SchemaCatalog, Table};
///
/// let schema = Schema::new(vec![
///     Table::new("zoo.Animal", "animal").with_column(Column::primary_key("id")),
///     Table::new("zoo.Cat", "cat")
///         .with_column(Column::primary_key("id"))
///         .with_parent("zoo.Animal"),
/// ])
/// .unwrap();
///
/// let chain: Vec<_> = schema.ancestors("zoo.Cat").iter().map(|t| t.id.as_str()).collect();
/// assert_eq!(chain, vec!["zoo.Animal"]);
/// ```
#[derive(Debug, Clone)]
pub struct Schema {
	tables: IndexMap<String, Table>,
	ancestors: HashMap<String, Vec<String>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SchemaFile {
	tables: Vec<Table>,
}

impl Schema {
	/// Builds a catalog from tables, validating references between them.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::Schema`] on duplicate identifiers, dangling
	/// parents, foreign keys or middle tables, and inheritance cycles.
	pub fn new(tables: Vec<Table>) -> FixtureResult<Self> {
		let mut by_id = IndexMap::with_capacity(tables.len());
		for table in tables {
			if by_id.contains_key(&table.id) {
				return Err(FixtureError::Schema(format!(
					"Duplicate table identifier '{}'",
					table.id
				)));
			}
			by_id.insert(table.id.clone(), table);
		}

		for table in by_id.values() {
			Self::validate_references(table, &by_id)?;
		}

		let mut ancestors = HashMap::with_capacity(by_id.len());
		for table in by_id.values() {
			ancestors.insert(table.id.clone(), Self::resolve_chain(table, &by_id)?);
		}

		Ok(Self {
			tables: by_id,
			ancestors,
		})
	}

	/// Parses a schema description (`{"tables": [...]}`) from a string.
	pub fn from_str(content: &str, format: FixtureFormat) -> FixtureResult<Self> {
		let file: SchemaFile = match format {
			FixtureFormat::Json => serde_json::from_str(content)?,
			FixtureFormat::Yaml => Self::parse_yaml(content)?,
		};
		Self::new(file.tables)
	}

	/// Reads a schema description from a JSON or YAML file.
	pub fn from_file(path: &Path) -> FixtureResult<Self> {
		let format = FixtureFormat::from_path(path).ok_or_else(|| {
			FixtureError::UnsupportedExtension(path.display().to_string())
		})?;
		let content = std::fs::read_to_string(path).map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				FixtureError::FileNotFound(path.display().to_string())
			} else {
				FixtureError::IoError(e)
			}
		})?;
		Self::from_str(&content, format)
	}

	#[cfg(feature = "yaml")]
	fn parse_yaml(content: &str) -> FixtureResult<SchemaFile> {
		Ok(serde_yaml::from_str(content)?)
	}

	#[cfg(not(feature = "yaml"))]
	fn parse_yaml(_content: &str) -> FixtureResult<SchemaFile> {
		Err(FixtureError::UnsupportedExtension(
			"YAML support requires the 'yaml' feature".to_string(),
		))
	}

	/// Returns the number of tables.
	pub fn len(&self) -> usize {
		self.tables.len()
	}

	/// Returns true if the catalog has no tables.
	pub fn is_empty(&self) -> bool {
		self.tables.is_empty()
	}

	fn validate_references(table: &Table, tables: &IndexMap<String, Table>) -> FixtureResult<()> {
		let known = |id: &str| tables.contains_key(id);

		if let Some(parent) = table.parent.as_deref().filter(|p| !known(*p)) {
			return Err(FixtureError::Schema(format!(
				"Table '{}' inherits from unknown table '{}'",
				table.id, parent
			)));
		}

		for (column, fk) in table.foreign_keys() {
			let Some(related) = tables.get(&fk.table) else {
				return Err(FixtureError::Schema(format!(
					"Column '{}.{}' references unknown table '{}'",
					table.id, column.name, fk.table
				)));
			};
			if related.column(&fk.column).is_none() {
				return Err(FixtureError::Schema(format!(
					"Column '{}.{}' references unknown column '{}.{}'",
					table.id, column.name, fk.table, fk.column
				)));
			}
		}

		for relation in &table.relations {
			let middle_ok = relation.middle_table.as_deref().is_none_or(known);
			if !known(&relation.related_table) || !middle_ok {
				return Err(FixtureError::Schema(format!(
					"Relation '{}' of table '{}' references an unknown table",
					relation.name, table.id
				)));
			}
		}

		Ok(())
	}

	fn resolve_chain(table: &Table, tables: &IndexMap<String, Table>) -> FixtureResult<Vec<String>> {
		let mut chain = Vec::new();
		let mut seen = HashSet::from([table.id.as_str()]);
		let mut current = table.parent.as_deref();

		while let Some(id) = current {
			if !seen.insert(id) {
				return Err(FixtureError::Schema(format!(
					"Inheritance cycle detected at table '{}'",
					table.id
				)));
			}
			chain.push(id.to_string());
			current = tables.get(id).and_then(|t| t.parent.as_deref());
		}

		Ok(chain)
	}
}

impl SchemaCatalog for Schema {
	fn tables(&self) -> Vec<&Table> {
		self.tables.values().collect()
	}

	fn table(&self, id: &str) -> Option<&Table> {
		self.tables.get(id)
	}

	fn ancestors(&self, id: &str) -> Vec<&Table> {
		self.ancestors
			.get(id)
			.map(|chain| chain.iter().filter_map(|a| self.tables.get(a)).collect())
			.unwrap_or_default()
	}
}

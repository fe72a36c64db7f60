//! Field-to-column capability table.
//!
//! Fixture field names are resolved once per table instead of probing a
//! setter per field per row. A name resolves by exact column or field name
//! first, then by a normalized alias that also covers the relation name of
//! many-to-one foreign keys (`author` → `author_id`).

use std::collections::HashMap;

use super::table::Column;

/// Index from fixture field names to column positions.
#[derive(Debug, Clone, Default)]
pub struct FieldSetters {
	exact: HashMap<String, usize>,
	aliases: HashMap<String, usize>,
}

impl FieldSetters {
	/// Registers the names under which `column` can be set.
	pub(crate) fn register(&mut self, position: usize, column: &Column) {
		self.exact.entry(column.name.clone()).or_insert(position);
		self.aliases
			.entry(normalize(&column.name))
			.or_insert(position);

		if let Some(field_name) = &column.field_name {
			self.exact.entry(field_name.clone()).or_insert(position);
			self.aliases.entry(normalize(field_name)).or_insert(position);
		}

		if let Some(relation) = column
			.foreign_key
			.as_ref()
			.and_then(|fk| fk.relation.as_ref())
		{
			self.aliases.entry(normalize(relation)).or_insert(position);
		}
	}

	/// Returns the column position for a fixture field name.
	pub fn resolve(&self, name: &str) -> Option<usize> {
		self.exact
			.get(name)
			.or_else(|| self.aliases.get(&normalize(name)))
			.copied()
	}

	/// Returns the number of exact names registered.
	pub fn len(&self) -> usize {
		self.exact.len()
	}

	/// Returns true if no setter is registered.
	pub fn is_empty(&self) -> bool {
		self.exact.is_empty()
	}
}

fn normalize(name: &str) -> String {
	name.chars()
		.filter(|c| *c != '_')
		.flat_map(char::to_lowercase)
		.collect()
}

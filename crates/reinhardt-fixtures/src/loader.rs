//! Loading fixture documents into storage.
//!
//! A load merges its documents, purges the affected tables in reverse
//! dependency order and inserts every entry in dependency order, inside one
//! transaction. Symbolic foreign-key values are resolved against the rows
//! persisted earlier in the same call. Any failure rolls the transaction
//! back and is returned unchanged.
//!
//! A row of a table inheriting from concrete tables is written to each of
//! those ancestors first. The farthest ancestor generates the primary key
//! and every table below it reuses that key.

use std::collections::HashSet;
use std::path::Path;

use serde_json::{Map, Value};

use crate::codec::{ArrayCodec, scalar_text};
use crate::error::{FixtureError, FixtureResult};
use crate::fixtures::{FixtureDocument, FixtureParser, MergePolicy};
use crate::ordering;
use crate::references::{Record, ReferenceTable};
use crate::schema::{Column, ColumnType, ForeignKey, Relation, SchemaCatalog, Table};
use crate::storage::{FixtureStorage, Row};

/// Options for loading fixtures.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
	/// Policy for conflicting values across merged documents.
	pub merge_policy: MergePolicy,
}

impl LoadOptions {
	/// Creates default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the merge policy.
	pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
		self.merge_policy = policy;
		self
	}
}

/// Result of a fixture load operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadResult {
	/// Number of non-empty documents merged into the load.
	pub documents_loaded: usize,
	/// Rows deleted while purging the affected tables.
	pub rows_deleted: u64,
	/// Rows inserted from fixture entries.
	pub rows_inserted: usize,
	/// Existing rows updated through primary-key reuse.
	pub rows_updated: usize,
	/// Middle-table rows created for many-to-many memberships.
	pub links_created: usize,
	/// Tables loaded, in processing order.
	pub tables: Vec<String>,
}

/// Loads fixture documents through a [`FixtureStorage`].
///
/// # Example
///
/// ```
/// # tokio_test::block_on(async {
/// use reinhardt_fixtures::fixtures::FixtureDocument;
/// use reinhardt_fixtures::loader::FixtureLoader;
/// use reinhardt_fixtures::schema::{Column, Schema, Table};
/// use reinhardt_fixtures::storage::MemoryStorage;
/// use serde_json::json;
///
/// let schema = Schema::new(vec![
///     Table::new("bookstore.Author", "author")
///         .with_column(Column::primary_key("id"))
///         .with_column(Column::new("name")),
///     Table::new("bookstore.Book", "book")
///         .with_column(Column::primary_key("id"))
///         .with_column(Column::new("title"))
///         .with_column(Column::foreign_key("author_id", "bookstore.Author", "id").with_relation("Author")),
/// ])
/// .unwrap();
///
/// let document = FixtureDocument::from_value(json!({
///     "bookstore.Author": {"Author_1": {"name": "Jane"}},
///     "bookstore.Book": {"Book_1": {"title": "X", "author": "Author_1"}}
/// }))
/// .unwrap();
///
/// let mut storage = MemoryStorage::new();
/// let result = FixtureLoader::new(&schema)
///     .load(vec![document], &mut storage)
///     .await
///     .unwrap();
///
/// assert_eq!(result.rows_inserted, 2);
/// assert_eq!(storage.rows("book")[0]["author_id"], storage.rows("author")[0]["id"]);
/// # });
/// ```
pub struct FixtureLoader<'a> {
	catalog: &'a dyn SchemaCatalog,
	options: LoadOptions,
}

/// State owned by one load call.
struct LoadContext<'d> {
	merged: &'d FixtureDocument,
	references: ReferenceTable,
	result: LoadResult,
}

/// Many-to-many membership collected from an entry, linked after the owner is persisted.
struct Membership<'t> {
	relation: &'t Relation,
	targets: Vec<String>,
}

impl<'a> FixtureLoader<'a> {
	/// Creates a loader with default options.
	pub fn new(catalog: &'a dyn SchemaCatalog) -> Self {
		Self {
			catalog,
			options: LoadOptions::default(),
		}
	}

	/// Sets load options.
	pub fn with_options(mut self, options: LoadOptions) -> Self {
		self.options = options;
		self
	}

	/// Parses fixture files and loads them as one batch.
	pub async fn load_files(
		&self,
		paths: &[&Path],
		storage: &mut dyn FixtureStorage,
	) -> FixtureResult<LoadResult> {
		let documents = FixtureParser::new().parse_files(paths)?;
		self.load(documents, storage).await
	}

	/// Merges `documents` and loads them atomically.
	///
	/// Tables are ordered by their foreign keys only. Targets of a
	/// many-to-many list are not ordering dependencies: their entries must
	/// be loaded before the owning entry, either in a table ordered earlier
	/// or earlier in the same table.
	///
	/// # Errors
	///
	/// Returns the first error raised; storage is rolled back to its state
	/// before the call. See [`FixtureError`] for the taxonomy.
	pub async fn load(
		&self,
		documents: Vec<FixtureDocument>,
		storage: &mut dyn FixtureStorage,
	) -> FixtureResult<LoadResult> {
		let mut merged = FixtureDocument::new();
		let mut documents_loaded = 0;
		for document in documents {
			if document.is_empty() {
				continue;
			}
			merged.merge(document, self.options.merge_policy)?;
			documents_loaded += 1;
		}

		let mut context = LoadContext {
			merged: &merged,
			references: ReferenceTable::new(),
			result: LoadResult {
				documents_loaded,
				..LoadResult::default()
			},
		};
		if merged.is_empty() {
			return Ok(context.result);
		}

		storage.begin().await?;
		match self.load_merged(&mut context, storage).await {
			Ok(()) => {
				storage.commit().await?;
				let result = context.result;
				tracing::info!(
					documents = result.documents_loaded,
					deleted = result.rows_deleted,
					inserted = result.rows_inserted,
					links = result.links_created,
					"Loaded fixtures"
				);
				Ok(result)
			}
			Err(error) => {
				if let Err(rollback_error) = storage.rollback().await {
					tracing::error!(
						error = %rollback_error,
						"Failed to roll back fixture load"
					);
				}
				Err(error)
			}
		}
	}

	async fn load_merged(
		&self,
		context: &mut LoadContext<'_>,
		storage: &mut dyn FixtureStorage,
	) -> FixtureResult<()> {
		let merged = context.merged;
		let mut tables = Vec::with_capacity(merged.len());
		for id in merged.table_ids() {
			tables.push(self.loadable_table(id)?);
		}
		let ordered = ordering::order_in(tables, self.catalog);

		self.purge(&ordered, context, storage).await?;

		for table in ordered {
			let Some(section) = merged.section(&table.id) else {
				continue;
			};
			tracing::debug!(table = %table.id, entries = section.len(), "Loading table");
			for (key, entry) in section {
				self.load_entry(table, key, entry, context, storage).await?;
			}
			context.result.tables.push(table.id.clone());
		}
		Ok(())
	}

	fn loadable_table(&self, id: &str) -> FixtureResult<&'a Table> {
		let table = self.catalog.require_table(id)?;
		if table.is_abstract {
			return Err(FixtureError::UnknownType(id.to_string()));
		}
		let self_references = table.self_references();
		if self_references.len() > 1 {
			return Err(FixtureError::UnsupportedSchema {
				table: table.id.clone(),
				columns: self_references.iter().map(|c| c.name.clone()).collect(),
			});
		}
		Ok(table)
	}

	/// Deletes rows of the loaded tables and their concrete ancestors, dependents first.
	async fn purge(
		&self,
		ordered: &[&'a Table],
		context: &mut LoadContext<'_>,
		storage: &mut dyn FixtureStorage,
	) -> FixtureResult<()> {
		let mut purged = HashSet::new();
		for table in ordered.iter().rev() {
			let chain = std::iter::once(*table).chain(self.catalog.concrete_ancestors(&table.id));
			for target in chain {
				if purged.insert(target.id.as_str()) {
					context.result.rows_deleted += storage.delete_all(target).await?;
				}
			}
		}
		Ok(())
	}

	async fn load_entry(
		&self,
		table: &'a Table,
		key: &str,
		entry: &Value,
		context: &mut LoadContext<'_>,
		storage: &mut dyn FixtureStorage,
	) -> FixtureResult<()> {
		let Value::Object(fields) = entry else {
			return Err(FixtureError::MalformedFixtureEntry {
				table: table.id.clone(),
				key: key.to_string(),
				message: "entry must be a mapping of field names to values".to_string(),
			});
		};

		let (record, memberships) = self.build_record(table, key, fields, context)?;

		let ancestors = self.catalog.concrete_ancestors(&table.id);
		let (stored, mirrors) = if record.is_new {
			context.result.rows_inserted += 1;
			let (values, mirrors) = insert_mirrors(&ancestors, record.values, storage).await?;
			(storage.insert(table, &project(table, &values)).await?, mirrors)
		} else {
			context.result.rows_updated += 1;
			let mut mirrors = Vec::with_capacity(ancestors.len());
			for ancestor in &ancestors {
				let mirror = storage.update(ancestor, &project(ancestor, &record.values)).await?;
				mirrors.push((*ancestor, mirror));
			}
			(storage.update(table, &record.values).await?, mirrors)
		};
		let record = Record::persisted(stored);

		for membership in memberships {
			self.link(table, &record, membership, context, storage)
				.await?;
		}

		for (ancestor, mirror) in mirrors {
			context
				.references
				.insert(ancestor.id.clone(), key, Record::persisted(mirror));
		}
		context.references.insert(table.id.clone(), key, record);
		Ok(())
	}

	fn build_record(
		&self,
		table: &'a Table,
		key: &str,
		fields: &Map<String, Value>,
		context: &LoadContext<'_>,
	) -> FixtureResult<(Record, Vec<Membership<'a>>)> {
		let mut record = Record::new();
		let mut memberships = Vec::new();

		for (name, value) in fields {
			if let Some(relation) = membership_relation(table, name, value) {
				memberships.push(Membership {
					relation,
					targets: value
						.as_array()
						.map(|items| items.iter().map(scalar_text).collect())
						.unwrap_or_default(),
				});
				continue;
			}

			let column = table
				.resolve_field(name)
				.and_then(|position| table.column_at(position))
				.ok_or_else(|| FixtureError::MalformedFixtureEntry {
					table: table.id.clone(),
					key: key.to_string(),
					message: format!("column \"{name}\" does not exist"),
				})?;

			if column.primary_key && !column.is_foreign_key() && !value.is_null() {
				if let Some(existing) = context.references.get(&table.id, &scalar_text(value)) {
					let mut reused = existing.clone();
					reused.values.extend(record.values);
					record = reused;
					continue;
				}
			}

			let value = match &column.foreign_key {
				Some(fk) => resolve_reference(fk, value, context)?,
				None => value.clone(),
			};
			record.set(column.name.clone(), encode(column, value));
		}

		Ok((record, memberships))
	}

	/// Creates one middle-table row per target of a membership list.
	async fn link(
		&self,
		owner_table: &Table,
		owner: &Record,
		membership: Membership<'a>,
		context: &mut LoadContext<'_>,
		storage: &mut dyn FixtureStorage,
	) -> FixtureResult<()> {
		let ambiguous = || FixtureError::AmbiguousRelation {
			middle: membership
				.relation
				.middle_table
				.clone()
				.unwrap_or_else(|| membership.relation.name.clone()),
			owner: owner_table.id.clone(),
		};

		let middle = match membership.relation.middle_table.as_deref() {
			Some(id) => self.catalog.require_table(id)?,
			None => return Err(ambiguous()),
		};
		let (owner_side, target_side) = split_middle(middle, owner_table).ok_or_else(ambiguous)?;

		for target in &membership.targets {
			let (target_column, target_fk) = target_side;
			let linked = context
				.references
				.get(&target_fk.table, target)
				.ok_or_else(|| missing_reference(&target_fk.table, target, context.merged))?;

			let (owner_column, owner_fk) = owner_side;
			let mut row = Row::new();
			row.insert(
				owner_column.name.clone(),
				owner.get(&owner_fk.column).cloned().unwrap_or(Value::Null),
			);
			row.insert(
				target_column.name.clone(),
				linked.get(&target_fk.column).cloned().unwrap_or(Value::Null),
			);

			storage.insert(middle, &row).await?;
			context.result.links_created += 1;
		}

		tracing::trace!(
			middle = %middle.id,
			links = membership.targets.len(),
			"Linked many-to-many memberships"
		);
		Ok(())
	}
}

type ForeignKeySide<'t> = (&'t Column, &'t ForeignKey);

/// Splits the foreign keys of a middle table into the owner side and the target side.
fn split_middle<'t>(
	middle: &'t Table,
	owner_table: &Table,
) -> Option<(ForeignKeySide<'t>, ForeignKeySide<'t>)> {
	let (owner, target): (Vec<_>, Vec<_>) = middle
		.foreign_keys()
		.partition(|(_, fk)| fk.table == owner_table.id);
	match (owner.as_slice(), target.as_slice()) {
		([owner], [target]) => Some((*owner, *target)),
		_ => None,
	}
}

/// Returns the many-to-many relation a plural list field stands for.
fn membership_relation<'t>(table: &'t Table, name: &str, value: &Value) -> Option<&'t Relation> {
	if !value.is_array() {
		return None;
	}
	let stem = name.strip_suffix('s')?;
	let structured_column = table
		.resolve_field(name)
		.and_then(|position| table.column_at(position))
		.is_some_and(|column| column.column_type.is_structured());
	if structured_column {
		return None;
	}
	table.many_to_many(stem)
}

fn resolve_reference(fk: &ForeignKey, value: &Value, context: &LoadContext<'_>) -> FixtureResult<Value> {
	let key = scalar_text(value);
	if key.is_empty() {
		return Ok(Value::Null);
	}
	context
		.references
		.get(&fk.table, &key)
		.map(|record| record.get(&fk.column).cloned().unwrap_or(Value::Null))
		.ok_or_else(|| missing_reference(&fk.table, &key, context.merged))
}

fn missing_reference(table: &str, key: &str, merged: &FixtureDocument) -> FixtureError {
	FixtureError::MissingReference {
		table: table.to_string(),
		key: key.to_string(),
		declared_later: merged.contains(table, key),
	}
}

/// Inserts the mirror rows of a new child row, farthest ancestor first.
///
/// Each ancestor receives the values of its own columns plus the primary
/// key generated by the ancestor above it. Returns the child values carrying
/// that primary key, and the stored mirror rows.
async fn insert_mirrors<'t>(
	ancestors: &[&'t Table],
	mut values: Row,
	storage: &mut dyn FixtureStorage,
) -> FixtureResult<(Row, Vec<(&'t Table, Row)>)> {
	let mut mirrors = Vec::with_capacity(ancestors.len());
	for ancestor in ancestors.iter().rev() {
		let mirror = storage.insert(ancestor, &project(ancestor, &values)).await?;
		for column in ancestor.primary_keys() {
			if let Some(value) = mirror.get(&column.name) {
				values.insert(column.name.clone(), value.clone());
			}
		}
		mirrors.push((*ancestor, mirror));
	}
	Ok((values, mirrors))
}

/// Keeps the values of the columns `table` declares.
fn project(table: &Table, values: &Row) -> Row {
	values
		.iter()
		.filter(|(name, _)| table.column(name).is_some())
		.map(|(name, value)| (name.clone(), value.clone()))
		.collect()
}

fn encode(column: &Column, value: Value) -> Value {
	match column.column_type {
		ColumnType::Array if value.is_array() => ArrayCodec::encode(&value),
		_ => value,
	}
}

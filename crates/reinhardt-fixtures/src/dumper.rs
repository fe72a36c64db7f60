//! Dumping stored rows into fixture documents.
//!
//! Tables are visited in dependency order. Every row gets a symbolic key
//! built from the table short name and its primary-key values, and every
//! foreign-key value is replaced by the symbolic key of the row it points
//! at, so the document survives regenerated primary keys.
//!
//! A row of a concrete ancestor that mirrors a dumped child row is emitted
//! once, under the child. References to it use the child's symbolic key.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde_json::{Map, Value};

use crate::codec::{ArrayCodec, ObjectCodec, scalar_text};
use crate::error::{FixtureError, FixtureResult};
use crate::fixtures::{FixtureDocument, FixtureFormat, FixtureSerializer, symbolic_key};
use crate::ordering;
use crate::schema::{Column, ColumnType, SchemaCatalog, Table, short_name};
use crate::storage::{FixtureStorage, Row, RowFilter};

/// Options for a dump.
#[derive(Debug, Clone)]
pub struct DumpOptions {
	/// Table identifiers to dump. Empty means every concrete table.
	pub tables: Vec<String>,
	/// Also dump the tables referenced by the selected ones, transitively.
	pub follow_references: bool,
}

impl Default for DumpOptions {
	fn default() -> Self {
		Self {
			tables: Vec::new(),
			follow_references: true,
		}
	}
}

impl DumpOptions {
	/// Creates default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Restricts the dump to the given table identifiers.
	///
	/// Tables referenced by foreign keys of the selection are dumped too
	/// unless [`with_follow_references`](Self::with_follow_references) turns
	/// that off.
	pub fn with_tables<I, S>(mut self, tables: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.tables = tables.into_iter().map(Into::into).collect();
		self
	}

	/// Sets whether referenced tables join a restricted selection.
	pub fn with_follow_references(mut self, follow: bool) -> Self {
		self.follow_references = follow;
		self
	}
}

/// Symbolic keys of child rows, by `(ancestor table, primary-key identity)`
/// of their mirror rows.
type Mirrors = HashMap<(String, String), String>;

/// Reads tables through a [`FixtureStorage`] and emits a [`FixtureDocument`].
///
/// # Example
///
/// ```
/// # tokio_test::block_on(async {
/// use reinhardt_fixtures::dumper::FixtureDumper;
/// use reinhardt_fixtures::schema::{Column, Schema, Table};
/// use reinhardt_fixtures::storage::{FixtureStorage, MemoryStorage, Row};
/// use serde_json::json;
///
/// let author = Table::new("bookstore.Author", "author")
///     .with_column(Column::primary_key("id"))
///     .with_column(Column::new("name"));
/// let schema = Schema::new(vec![author.clone()]).unwrap();
///
/// let mut storage = MemoryStorage::new();
/// storage
///     .insert(&author, &Row::from_iter([("name".to_string(), json!("Jane"))]))
///     .await
///     .unwrap();
///
/// let document = FixtureDumper::new(&schema).dump(&mut storage).await.unwrap();
/// assert_eq!(
///     document.entry("bookstore.Author", "Author_1"),
///     Some(&json!({"name": "Jane"}))
/// );
/// # });
/// ```
pub struct FixtureDumper<'a> {
	catalog: &'a dyn SchemaCatalog,
	options: DumpOptions,
}

impl<'a> FixtureDumper<'a> {
	/// Creates a dumper over every concrete table of `catalog`.
	pub fn new(catalog: &'a dyn SchemaCatalog) -> Self {
		Self {
			catalog,
			options: DumpOptions::default(),
		}
	}

	/// Sets dump options.
	pub fn with_options(mut self, options: DumpOptions) -> Self {
		self.options = options;
		self
	}

	/// Dumps the selected tables into a document.
	///
	/// Tables without rows are omitted. Abstract tables have no rows of
	/// their own and are never dumped.
	///
	/// # Errors
	///
	/// - [`FixtureError::UnknownType`] if an option names an unknown table
	/// - [`FixtureError::UnsupportedSchema`] if a selected table has two or
	///   more self-referencing foreign keys
	/// - [`FixtureError::InvalidValue`] if an object column cannot be decoded
	/// - [`FixtureError::Storage`] on read failures
	pub async fn dump(&self, storage: &mut dyn FixtureStorage) -> FixtureResult<FixtureDocument> {
		let selected = self.selection()?;

		let mut tables = Vec::with_capacity(selected.len());
		for table in ordering::order_in(selected, self.catalog) {
			let rows = self.read_rows(table, storage).await?;
			tracing::debug!(table = %table.id, rows = rows.len(), "Dumping table");
			tables.push((table, rows));
		}
		let mirrors = self.mirrors(&tables);

		let mut document = FixtureDocument::new();
		for (table, rows) in &tables {
			for row in rows {
				let mirrored = key_identity(table, row)
					.is_some_and(|identity| mirrors.contains_key(&(table.id.clone(), identity)));
				if mirrored {
					continue;
				}
				let fields = self.dump_row(table, row, &mirrors)?;
				document.insert(table.id.clone(), row_key(table, row), Value::Object(fields));
			}
		}

		tracing::info!(
			tables = document.len(),
			rows = document.entry_count(),
			"Dumped fixtures"
		);
		Ok(document)
	}

	/// Dumps and serializes the document in `format`.
	pub async fn dump_to_string(
		&self,
		storage: &mut dyn FixtureStorage,
		format: FixtureFormat,
	) -> FixtureResult<String> {
		let document = self.dump(storage).await?;
		FixtureSerializer::new()
			.with_format(format)
			.serialize(&document)
	}

	/// Dumps and writes the document to `path` in `format`.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::ValidationError`] for an empty path.
	pub async fn dump_to_file(
		&self,
		storage: &mut dyn FixtureStorage,
		path: &Path,
		format: FixtureFormat,
	) -> FixtureResult<FixtureDocument> {
		if path.as_os_str().is_empty() {
			return Err(FixtureError::ValidationError {
				field: "path".to_string(),
				message: "An output file must be specified".to_string(),
			});
		}

		let document = self.dump(storage).await?;
		FixtureSerializer::new()
			.with_format(format)
			.write_to_file(&document, path)?;
		Ok(document)
	}

	async fn read_rows(
		&self,
		table: &Table,
		storage: &mut dyn FixtureStorage,
	) -> FixtureResult<Vec<Row>> {
		match table.self_references().as_slice() {
			[] => Ok(storage.select(table, None).await?),
			[column] => read_tree(table, column, storage).await,
			columns => Err(FixtureError::UnsupportedSchema {
				table: table.id.clone(),
				columns: columns.iter().map(|c| c.name.clone()).collect(),
			}),
		}
	}

	/// Resolves the concrete tables to dump.
	fn selection(&self) -> FixtureResult<Vec<&'a Table>> {
		let mut included = HashSet::new();
		let mut pending = Vec::new();
		for id in &self.options.tables {
			pending.push(self.catalog.require_table(id)?);
		}

		while let Some(table) = pending.pop() {
			if !included.insert(table.id.as_str()) || !self.options.follow_references {
				continue;
			}
			for (_, fk) in table.foreign_keys() {
				pending.push(self.catalog.require_table(&fk.table)?);
			}
		}

		Ok(self
			.catalog
			.tables()
			.into_iter()
			.filter(|table| !table.is_abstract)
			.filter(|table| self.options.tables.is_empty() || included.contains(table.id.as_str()))
			.collect())
	}

	/// Maps the mirror rows of dumped child rows to the child's symbolic key.
	///
	/// The deepest table wins when several descendants share an ancestor row.
	fn mirrors(&self, tables: &[(&Table, Vec<Row>)]) -> Mirrors {
		let mut children: Vec<_> = tables
			.iter()
			.map(|(table, rows)| (self.catalog.concrete_ancestors(&table.id), *table, rows))
			.filter(|(ancestors, _, _)| !ancestors.is_empty())
			.collect();
		children.sort_by_key(|(ancestors, _, _)| std::cmp::Reverse(ancestors.len()));

		let mut mirrors = Mirrors::new();
		for (ancestors, table, rows) in children {
			for row in rows {
				let key = row_key(table, row);
				for ancestor in &ancestors {
					if let Some(identity) = key_identity(ancestor, row) {
						mirrors
							.entry((ancestor.id.clone(), identity))
							.or_insert_with(|| key.clone());
					}
				}
			}
		}
		mirrors
	}

	fn dump_row(&self, table: &Table, row: &Row, mirrors: &Mirrors) -> FixtureResult<Map<String, Value>> {
		let mut primary_keys = Map::new();
		let mut values = Map::new();
		let mut has_key_reference = false;

		for column in table.columns() {
			let Some(raw) = row.get(&column.name).filter(|v| !v.is_null()) else {
				continue;
			};

			if column.primary_key {
				primary_keys.insert(column.name.clone(), raw.clone());
			}

			if let Some(fk) = &column.foreign_key {
				let reference = if scalar_text(raw).is_empty() {
					Value::String(String::new())
				} else {
					let identity = symbolic_key("", [raw]);
					Value::String(
						mirrors
							.get(&(fk.table.clone(), identity))
							.cloned()
							.unwrap_or_else(|| symbolic_key(short_name(&fk.table), [raw])),
					)
				};
				if column.primary_key {
					has_key_reference = true;
					primary_keys.insert(column.name.clone(), reference);
				} else {
					values.insert(column.name.clone(), reference);
				}
			} else if !column.primary_key || !table.use_id_generator {
				values.insert(column.name.clone(), decode(column, raw)?);
			}
		}

		if primary_keys.len() > 1 || (!primary_keys.is_empty() && has_key_reference) {
			primary_keys.extend(values);
			values = primary_keys;
		}

		Ok(values)
	}
}

fn decode(column: &Column, raw: &Value) -> FixtureResult<Value> {
	match column.column_type {
		ColumnType::Array => Ok(ArrayCodec::decode(raw)),
		ColumnType::Object => ObjectCodec::decode(&column.name, raw),
		ColumnType::Scalar | ColumnType::Enum => Ok(raw.clone()),
	}
}

/// Reads a self-referencing table root first, one generation at a time.
///
/// Roots are the rows whose self reference is null. Each following
/// generation holds the rows referencing a row of the previous one.
async fn read_tree(
	table: &Table,
	column: &Column,
	storage: &mut dyn FixtureStorage,
) -> FixtureResult<Vec<Row>> {
	let related_column = column
		.foreign_key
		.as_ref()
		.map(|fk| fk.column.as_str())
		.unwrap_or("id");

	let mut rows = Vec::new();
	let mut seen = HashSet::new();
	let mut filter = RowFilter::IsNull(column.name.clone());

	loop {
		let mut referenced = Vec::new();
		for row in storage.select(table, Some(&filter)).await? {
			if !seen.insert(row_identity(table, &row)) {
				continue;
			}
			if let Some(value) = row.get(related_column).filter(|v| !v.is_null()) {
				referenced.push(value.clone());
			}
			rows.push(row);
		}

		if referenced.is_empty() {
			break;
		}
		filter = RowFilter::In(column.name.clone(), referenced);
	}

	let total = storage.select(table, None).await?.len();
	if total > rows.len() {
		tracing::warn!(
			table = %table.id,
			column = %column.name,
			skipped = total - rows.len(),
			"Rows unreachable from a root of the self reference were not dumped"
		);
	}

	Ok(rows)
}

/// Builds the symbolic key of a row from its non-null primary-key values.
fn row_key(table: &Table, row: &Row) -> String {
	let keys = table
		.primary_keys()
		.filter_map(|column| row.get(&column.name))
		.filter(|value| !value.is_null());
	symbolic_key(table.short_name(), keys)
}

/// Primary-key values of `table` read from `row`, which may belong to a child table.
fn key_identity(table: &Table, row: &Row) -> Option<String> {
	let keys = table
		.primary_keys()
		.map(|column| row.get(&column.name).filter(|value| !value.is_null()))
		.collect::<Option<Vec<_>>>()?;
	(!keys.is_empty()).then(|| symbolic_key("", keys))
}

fn row_identity(table: &Table, row: &Row) -> String {
	let keys: Vec<&Value> = table
		.primary_keys()
		.filter_map(|column| row.get(&column.name))
		.collect();
	if keys.is_empty() {
		Value::Object(row.clone().into_iter().collect()).to_string()
	} else {
		symbolic_key("", keys)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::schema::Schema;
	use crate::storage::MemoryStorage;
	use rstest::rstest;
	use serde_json::json;

	fn row(value: Value) -> Row {
		serde_json::from_value(value).unwrap()
	}

	fn dumper_for(tables: Vec<Table>) -> (Schema, Vec<Table>) {
		(Schema::new(tables.clone()).unwrap(), tables)
	}

	#[rstest]
	#[tokio::test]
	async fn test_generated_key_omitted_and_foreign_key_substituted() {
		let (schema, tables) = dumper_for(vec![
			Table::new("bookstore.Author", "author")
				.with_column(Column::primary_key("id"))
				.with_column(Column::new("name")),
			Table::new("bookstore.Book", "book")
				.with_column(Column::primary_key("id"))
				.with_column(Column::new("title"))
				.with_column(Column::foreign_key("author_id", "bookstore.Author", "id")),
		]);
		let mut storage = MemoryStorage::new();
		storage.insert(&tables[1], &row(json!({"id": 4, "title": "X", "author_id": 7}))).await.unwrap();
		storage.insert(&tables[0], &row(json!({"id": 7, "name": "Jane"}))).await.unwrap();

		let document = FixtureDumper::new(&schema).dump(&mut storage).await.unwrap();

		assert_eq!(
			document.table_ids().collect::<Vec<_>>(),
			vec!["bookstore.Author", "bookstore.Book"]
		);
		assert_eq!(document.entry("bookstore.Author", "Author_7"), Some(&json!({"name": "Jane"})));
		assert_eq!(
			document.entry("bookstore.Book", "Book_4"),
			Some(&json!({"title": "X", "author_id": "Author_7"}))
		);
	}

	#[rstest]
	#[tokio::test]
	async fn test_null_values_skipped_and_natural_key_kept() {
		let (schema, tables) = dumper_for(vec![
			Table::new("geo.Country", "country")
				.with_column(Column::primary_key("code"))
				.with_column(Column::new("name"))
				.with_id_generator(false),
		]);
		let mut storage = MemoryStorage::new();
		storage.insert(&tables[0], &row(json!({"code": "NO", "name": null}))).await.unwrap();

		let document = FixtureDumper::new(&schema).dump(&mut storage).await.unwrap();
		assert_eq!(document.entry("geo.Country", "Country_NO"), Some(&json!({"code": "NO"})));
	}

	#[rstest]
	#[tokio::test]
	async fn test_composite_key_middle_table() {
		let (schema, tables) = dumper_for(vec![
			Table::new("bookstore.Book", "book").with_column(Column::primary_key("id")),
			Table::new("bookstore.Tag", "tag").with_column(Column::primary_key("id")),
			Table::new("bookstore.BookTag", "book_tag")
				.with_column(Column::foreign_key("book_id", "bookstore.Book", "id").with_primary_key(true))
				.with_column(Column::foreign_key("tag_id", "bookstore.Tag", "id").with_primary_key(true))
				.with_id_generator(false),
		]);
		let mut storage = MemoryStorage::new();
		storage.insert(&tables[2], &row(json!({"book_id": 1, "tag_id": 2}))).await.unwrap();

		let document = FixtureDumper::new(&schema).dump(&mut storage).await.unwrap();
		assert_eq!(
			document.entry("bookstore.BookTag", "BookTag_1_2"),
			Some(&json!({"book_id": "Book_1", "tag_id": "Tag_2"}))
		);
		assert!(!document.has_table("bookstore.Book"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_array_and_object_columns_decoded() {
		let (schema, tables) = dumper_for(vec![
			Table::new("app.Profile", "profile")
				.with_column(Column::primary_key("id"))
				.with_column(Column::new("tags").with_type(ColumnType::Array))
				.with_column(Column::new("settings").with_type(ColumnType::Object)),
		]);
		let mut storage = MemoryStorage::new();
		storage
			.insert(&tables[0], &row(json!({"tags": "| rust | sql |", "settings": {"theme": "dark"}})))
			.await
			.unwrap();

		let document = FixtureDumper::new(&schema).dump(&mut storage).await.unwrap();
		assert_eq!(
			document.entry("app.Profile", "Profile_1"),
			Some(&json!({"tags": ["rust", "sql"], "settings": {"theme": "dark"}}))
		);
	}

	#[rstest]
	#[tokio::test]
	async fn test_self_reference_parents_first() {
		let (schema, tables) = dumper_for(vec![
			Table::new("shop.Category", "category")
				.with_column(Column::primary_key("id"))
				.with_column(Column::foreign_key("parent_id", "shop.Category", "id")),
		]);
		let mut storage = MemoryStorage::new();
		storage.insert(&tables[0], &row(json!({"id": 1, "parent_id": 2}))).await.unwrap();
		storage.insert(&tables[0], &row(json!({"id": 2, "parent_id": 3}))).await.unwrap();
		storage.insert(&tables[0], &row(json!({"id": 3}))).await.unwrap();

		let document = FixtureDumper::new(&schema).dump(&mut storage).await.unwrap();
		let keys: Vec<_> = document
			.section("shop.Category")
			.unwrap()
			.keys()
			.cloned()
			.collect();
		assert_eq!(keys, vec!["Category_3", "Category_2", "Category_1"]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_multiple_self_references_rejected() {
		let (schema, _) = dumper_for(vec![
			Table::new("org.Employee", "employee")
				.with_column(Column::primary_key("id"))
				.with_column(Column::foreign_key("manager_id", "org.Employee", "id"))
				.with_column(Column::foreign_key("mentor_id", "org.Employee", "id")),
		]);
		let mut storage = MemoryStorage::new();

		let result = FixtureDumper::new(&schema).dump(&mut storage).await;
		match result {
			Err(FixtureError::UnsupportedSchema { table, columns }) => {
				assert_eq!(table, "org.Employee");
				assert_eq!(columns, vec!["manager_id", "mentor_id"]);
			}
			other => panic!("Expected UnsupportedSchema, got {other:?}"),
		}
	}

	#[rstest]
	#[tokio::test]
	async fn test_table_filter() {
		let (schema, tables) = dumper_for(vec![
			Table::new("a.Author", "author").with_column(Column::primary_key("id")),
			Table::new("a.Tag", "tag").with_column(Column::primary_key("id")),
		]);
		let mut storage = MemoryStorage::new();
		storage.insert(&tables[0], &Row::new()).await.unwrap();
		storage.insert(&tables[1], &Row::new()).await.unwrap();

		let document = FixtureDumper::new(&schema)
			.with_options(DumpOptions::new().with_tables(["a.Tag"]))
			.dump(&mut storage)
			.await
			.unwrap();
		assert_eq!(document.table_ids().collect::<Vec<_>>(), vec!["a.Tag"]);

		let unknown = FixtureDumper::new(&schema)
			.with_options(DumpOptions::new().with_tables(["a.Missing"]))
			.dump(&mut storage)
			.await;
		assert!(matches!(unknown, Err(FixtureError::UnknownType(_))));
	}

	#[rstest]
	#[tokio::test]
	async fn test_referenced_tables_follow_selection() {
		let (schema, tables) = dumper_for(vec![
			Table::new("bookstore.Author", "author").with_column(Column::primary_key("id")),
			Table::new("bookstore.Book", "book")
				.with_column(Column::primary_key("id"))
				.with_column(Column::foreign_key("author_id", "bookstore.Author", "id")),
			Table::new("bookstore.Tag", "tag").with_column(Column::primary_key("id")),
		]);
		let mut storage = MemoryStorage::new();
		storage.insert(&tables[0], &Row::new()).await.unwrap();
		storage.insert(&tables[1], &row(json!({"author_id": 1}))).await.unwrap();
		storage.insert(&tables[2], &Row::new()).await.unwrap();

		let followed = FixtureDumper::new(&schema)
			.with_options(DumpOptions::new().with_tables(["bookstore.Book"]))
			.dump(&mut storage)
			.await
			.unwrap();
		assert_eq!(
			followed.table_ids().collect::<Vec<_>>(),
			vec!["bookstore.Author", "bookstore.Book"]
		);

		let restricted = FixtureDumper::new(&schema)
			.with_options(
				DumpOptions::new()
					.with_tables(["bookstore.Book"])
					.with_follow_references(false),
			)
			.dump(&mut storage)
			.await
			.unwrap();
		assert_eq!(restricted.table_ids().collect::<Vec<_>>(), vec!["bookstore.Book"]);
	}

	#[rstest]
	#[tokio::test]
	async fn test_mirror_rows_dumped_through_child() {
		let (schema, tables) = dumper_for(vec![
			Table::new("staff.Person", "person")
				.with_column(Column::primary_key("id"))
				.with_column(Column::new("name")),
			Table::new("staff.Editor", "editor")
				.with_column(Column::primary_key("id"))
				.with_column(Column::new("name"))
				.with_column(Column::new("desk"))
				.with_parent("staff.Person"),
			Table::new("staff.Review", "review")
				.with_column(Column::primary_key("id"))
				.with_column(Column::foreign_key("reviewer_id", "staff.Person", "id")),
		]);
		let mut storage = MemoryStorage::new();
		storage.insert(&tables[0], &row(json!({"id": 1, "name": "Max"}))).await.unwrap();
		storage.insert(&tables[0], &row(json!({"id": 2, "name": "Ann"}))).await.unwrap();
		storage
			.insert(&tables[1], &row(json!({"id": 1, "name": "Max", "desk": "fiction"})))
			.await
			.unwrap();
		storage.insert(&tables[2], &row(json!({"reviewer_id": 1}))).await.unwrap();
		storage.insert(&tables[2], &row(json!({"reviewer_id": 2}))).await.unwrap();

		let document = FixtureDumper::new(&schema).dump(&mut storage).await.unwrap();

		assert_eq!(
			document.section("staff.Person").unwrap().keys().collect::<Vec<_>>(),
			vec!["Person_2"]
		);
		assert_eq!(
			document.entry("staff.Editor", "Editor_1"),
			Some(&json!({"name": "Max", "desk": "fiction"}))
		);
		assert_eq!(
			document.entry("staff.Review", "Review_1"),
			Some(&json!({"reviewer_id": "Editor_1"}))
		);
		assert_eq!(
			document.entry("staff.Review", "Review_2"),
			Some(&json!({"reviewer_id": "Person_2"}))
		);
	}

	#[rstest]
	#[tokio::test]
	async fn test_dump_to_file_rejects_empty_path() {
		let schema = Schema::new(vec![]).unwrap();
		let mut storage = MemoryStorage::new();
		let result = FixtureDumper::new(&schema)
			.dump_to_file(&mut storage, Path::new(""), FixtureFormat::Json)
			.await;
		assert!(matches!(result, Err(FixtureError::ValidationError { .. })));
	}
}

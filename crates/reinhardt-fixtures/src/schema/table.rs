//! Table, column and relation metadata.

use serde::{Deserialize, Serialize};

use super::setters::FieldSetters;

/// Storage shape of a column, as far as fixtures are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
	/// Plain scalar value passed through unchanged.
	#[default]
	Scalar,
	/// List of scalars stored with the [`ArrayCodec`](crate::codec::ArrayCodec) text encoding.
	Array,
	/// Opaque object stored as a serialized blob.
	Object,
	/// Enumerated value, passed through unchanged.
	Enum,
}

impl ColumnType {
	/// Returns true for array and object columns, whose fixture value may be a list.
	pub fn is_structured(&self) -> bool {
		matches!(self, Self::Array | Self::Object)
	}
}

/// Target of a foreign-key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
	/// Identifier of the related table.
	pub table: String,
	/// Column of the related table holding the referenced value.
	#[serde(default = "default_related_column")]
	pub column: String,
	/// Name of the relation this key implements (e.g. `Author`).
	#[serde(default)]
	pub relation: Option<String>,
}

fn default_related_column() -> String {
	"id".to_string()
}

impl ForeignKey {
	/// Creates a foreign key pointing at `column` of `table`.
	pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
		Self {
			table: table.into(),
			column: column.into(),
			relation: None,
		}
	}

	/// Sets the relation name.
	pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
		self.relation = Some(relation.into());
		self
	}
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
	/// Storage column name (e.g. `author_id`).
	pub name: String,
	/// Model field name (e.g. `AuthorId`), when it differs from the column name.
	#[serde(default)]
	pub field_name: Option<String>,
	/// Storage shape.
	#[serde(default, rename = "type")]
	pub column_type: ColumnType,
	/// Whether the column is part of the primary key.
	#[serde(default)]
	pub primary_key: bool,
	/// Foreign-key target, if any.
	#[serde(default)]
	pub foreign_key: Option<ForeignKey>,
}

impl Column {
	/// Creates a scalar column.
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			field_name: None,
			column_type: ColumnType::Scalar,
			primary_key: false,
			foreign_key: None,
		}
	}

	/// Creates a primary-key column.
	pub fn primary_key(name: impl Into<String>) -> Self {
		Self::new(name).with_primary_key(true)
	}

	/// Creates a foreign-key column referencing `column` of `table`.
	pub fn foreign_key(
		name: impl Into<String>,
		table: impl Into<String>,
		column: impl Into<String>,
	) -> Self {
		Self::new(name).with_foreign_key(ForeignKey::new(table, column))
	}

	/// Sets the model field name.
	pub fn with_field_name(mut self, field_name: impl Into<String>) -> Self {
		self.field_name = Some(field_name.into());
		self
	}

	/// Sets the column type.
	pub fn with_type(mut self, column_type: ColumnType) -> Self {
		self.column_type = column_type;
		self
	}

	/// Sets the primary-key flag.
	pub fn with_primary_key(mut self, primary_key: bool) -> Self {
		self.primary_key = primary_key;
		self
	}

	/// Sets the foreign-key target.
	pub fn with_foreign_key(mut self, foreign_key: ForeignKey) -> Self {
		self.foreign_key = Some(foreign_key);
		self
	}

	/// Sets the relation name of the foreign key. No-op on plain columns.
	pub fn with_relation(mut self, relation: impl Into<String>) -> Self {
		if let Some(fk) = self.foreign_key.take() {
			self.foreign_key = Some(fk.with_relation(relation));
		}
		self
	}

	/// Returns true if the column is a foreign key.
	pub fn is_foreign_key(&self) -> bool {
		self.foreign_key.is_some()
	}
}

/// Direction of a relation between two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
	/// The owning table holds a foreign key to the related table.
	ManyToOne,
	/// The related table holds a foreign key to the owning table.
	OneToMany,
	/// Both tables are linked through a middle table.
	ManyToMany,
}

/// Named relation between two tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
	/// Relation name (e.g. `Tag`).
	pub name: String,
	/// Relation direction.
	pub kind: RelationKind,
	/// Identifier of the related table.
	pub related_table: String,
	/// Identifier of the middle table for many-to-many relations.
	#[serde(default)]
	pub middle_table: Option<String>,
}

impl Relation {
	/// Creates a many-to-many relation through `middle_table`.
	pub fn many_to_many(
		name: impl Into<String>,
		related_table: impl Into<String>,
		middle_table: impl Into<String>,
	) -> Self {
		Self {
			name: name.into(),
			kind: RelationKind::ManyToMany,
			related_table: related_table.into(),
			middle_table: Some(middle_table.into()),
		}
	}

	/// Creates a relation of the given kind without a middle table.
	pub fn new(name: impl Into<String>, kind: RelationKind, related_table: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			kind,
			related_table: related_table.into(),
			middle_table: None,
		}
	}
}

fn default_true() -> bool {
	true
}

/// Table metadata as exposed by the schema catalog.
///
/// # Example
///
/// ```
/// use reinhardt_fixtures::schema::{Column, Table};
///
/// let book = Table::new("bookstore.Book", "book")
///     .with_column(Column::primary_key("id"))
///     .with_column(Column::new("title"))
///     .with_column(Column::foreign_key("author_id", "bookstore.Author", "id").with_relation("Author"));
///
/// assert_eq!(book.short_name(), "Book");
/// assert_eq!(book.resolve_field("author"), Some(2));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "TableDef", into = "TableDef")]
pub struct Table {
	/// Fully-qualified identifier (e.g. `bookstore.Author`).
	pub id: String,
	/// Storage table name (e.g. `author`).
	pub name: String,
	columns: Vec<Column>,
	/// Relations owned by this table.
	pub relations: Vec<Relation>,
	/// Identifier of the direct ancestor in an inheritance chain.
	pub parent: Option<String>,
	/// Abstract tables have no concrete implementation.
	pub is_abstract: bool,
	/// Whether the primary key is generated by the storage.
	pub use_id_generator: bool,
	setters: FieldSetters,
}

impl Table {
	/// Creates a concrete table with a generated primary key.
	pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			columns: Vec::new(),
			relations: Vec::new(),
			parent: None,
			is_abstract: false,
			use_id_generator: true,
			setters: FieldSetters::default(),
		}
	}

	/// Appends a column and registers its field setters.
	pub fn with_column(mut self, column: Column) -> Self {
		self.setters.register(self.columns.len(), &column);
		self.columns.push(column);
		self
	}

	/// Appends a relation.
	pub fn with_relation(mut self, relation: Relation) -> Self {
		self.relations.push(relation);
		self
	}

	/// Sets the direct ancestor table.
	pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
		self.parent = Some(parent.into());
		self
	}

	/// Marks the table abstract.
	pub fn with_abstract(mut self, is_abstract: bool) -> Self {
		self.is_abstract = is_abstract;
		self
	}

	/// Sets whether primary keys are generated by the storage.
	pub fn with_id_generator(mut self, use_id_generator: bool) -> Self {
		self.use_id_generator = use_id_generator;
		self
	}

	/// Returns the columns in declaration order.
	pub fn columns(&self) -> &[Column] {
		&self.columns
	}

	/// Returns the column at `position`.
	pub fn column_at(&self, position: usize) -> Option<&Column> {
		self.columns.get(position)
	}

	/// Returns the column with the given storage name.
	pub fn column(&self, name: &str) -> Option<&Column> {
		self.columns.iter().find(|c| c.name == name)
	}

	/// Returns the primary-key columns.
	pub fn primary_keys(&self) -> impl Iterator<Item = &Column> {
		self.columns.iter().filter(|c| c.primary_key)
	}

	/// Returns the foreign-key columns.
	pub fn foreign_keys(&self) -> impl Iterator<Item = (&Column, &ForeignKey)> {
		self.columns
			.iter()
			.filter_map(|c| c.foreign_key.as_ref().map(|fk| (c, fk)))
	}

	/// Returns the foreign-key columns pointing back at this table.
	pub fn self_references(&self) -> Vec<&Column> {
		self.foreign_keys()
			.filter(|(_, fk)| fk.table == self.id)
			.map(|(column, _)| column)
			.collect()
	}

	/// Returns the identifier segment after the last `.`, `\` or `:`.
	pub fn short_name(&self) -> &str {
		short_name(&self.id)
	}

	/// Resolves a fixture field name to a column position.
	pub fn resolve_field(&self, name: &str) -> Option<usize> {
		self.setters.resolve(name)
	}

	/// Finds a many-to-many relation by relation name or middle table name.
	pub fn many_to_many(&self, name: &str) -> Option<&Relation> {
		self.relations
			.iter()
			.filter(|r| r.kind == RelationKind::ManyToMany)
			.find(|r| {
				r.name.eq_ignore_ascii_case(name)
					|| r.middle_table.as_deref().is_some_and(|middle| {
						middle.eq_ignore_ascii_case(name)
							|| short_name(middle).eq_ignore_ascii_case(name)
					})
			})
	}
}

/// Returns the identifier segment after the last `.`, `\` or `:`.
pub fn short_name(id: &str) -> &str {
	id.rsplit(['.', '\\', ':']).next().unwrap_or(id)
}

/// Serialized shape of a [`Table`]; the setter index is rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableDef {
	id: String,
	name: String,
	#[serde(default)]
	columns: Vec<Column>,
	#[serde(default)]
	relations: Vec<Relation>,
	#[serde(default)]
	parent: Option<String>,
	#[serde(default, rename = "abstract")]
	is_abstract: bool,
	#[serde(default = "default_true")]
	use_id_generator: bool,
}

impl From<TableDef> for Table {
	fn from(def: TableDef) -> Self {
		let mut table = Table::new(def.id, def.name)
			.with_abstract(def.is_abstract)
			.with_id_generator(def.use_id_generator);
		table.parent = def.parent;
		table.relations = def.relations;
		def.columns
			.into_iter()
			.fold(table, |table, column| table.with_column(column))
	}
}

impl From<Table> for TableDef {
	fn from(table: Table) -> Self {
		Self {
			id: table.id,
			name: table.name,
			columns: table.columns,
			relations: table.relations,
			parent: table.parent,
			is_abstract: table.is_abstract,
			use_id_generator: table.use_id_generator,
		}
	}
}

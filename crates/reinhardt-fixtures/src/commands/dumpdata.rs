//! dumpdata command implementation.

use std::path::PathBuf;

use crate::dumper::{DumpOptions, FixtureDumper};
use crate::error::FixtureResult;
use crate::fixtures::{FixtureDocument, FixtureFormat, FixtureSerializer};
use crate::schema::SchemaCatalog;
use crate::storage::FixtureStorage;

/// Options for the dumpdata command.
#[derive(Debug, Clone, Default)]
pub struct DumpDataOptions {
	/// Output format.
	pub format: FixtureFormat,

	/// Tables to dump; empty dumps every concrete table.
	pub tables: Vec<String>,

	/// Output file; when unset the serialized document is printed.
	pub output: Option<PathBuf>,

	/// Indentation for JSON output, 0 for compact.
	pub indent: Option<usize>,

	/// Verbosity level.
	pub verbosity: u8,
}

impl DumpDataOptions {
	/// Creates new default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the output format.
	pub fn with_format(mut self, format: FixtureFormat) -> Self {
		self.format = format;
		self
	}

	/// Restricts the dump to the given tables.
	pub fn with_tables(mut self, tables: Vec<String>) -> Self {
		self.tables = tables;
		self
	}

	/// Sets the output file.
	pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
		self.output = Some(path.into());
		self
	}

	/// Sets JSON indentation.
	pub fn with_indent(mut self, indent: usize) -> Self {
		self.indent = Some(indent);
		self
	}

	/// Sets verbosity level.
	pub fn with_verbosity(mut self, level: u8) -> Self {
		self.verbosity = level;
		self
	}
}

/// Result of a dumpdata run.
#[derive(Debug, Clone)]
pub struct DumpResult {
	/// The dumped document.
	pub document: FixtureDocument,
	/// The serialized document.
	pub content: String,
}

impl DumpResult {
	/// Returns the number of rows dumped.
	pub fn rows_dumped(&self) -> usize {
		self.document.entry_count()
	}
}

/// The dumpdata command for exporting storage contents as fixtures.
#[derive(Debug, Default)]
pub struct DumpDataCommand;

impl DumpDataCommand {
	/// Creates a new dumpdata command.
	pub fn new() -> Self {
		Self
	}

	/// Returns the command name.
	pub fn name(&self) -> &str {
		"dumpdata"
	}

	/// Returns the command description.
	pub fn description(&self) -> &str {
		"Outputs the contents of the database as a fixture"
	}

	/// Returns the command help text.
	pub fn help(&self) -> &str {
		r#"
Usage: dumpdata [options] [table ...]

Outputs the contents of the database as a fixture of the given format.
Foreign keys are written as symbolic keys so the fixture can be loaded
into a database with different generated identifiers.

Arguments:
  table                Only dump the given table(s)

Options:
  --format FORMAT      Output format (json, yaml)
  --indent N           Indentation for JSON output
  --output, -o FILE    Write the fixture to FILE instead of stdout
  --verbosity LEVEL    Verbosity level (0=minimal, 1=normal, 2=verbose)
"#
	}

	/// Executes the dumpdata command.
	pub async fn execute(
		&self,
		options: DumpDataOptions,
		catalog: &dyn SchemaCatalog,
		storage: &mut dyn FixtureStorage,
	) -> FixtureResult<DumpResult> {
		let dumper = FixtureDumper::new(catalog)
			.with_options(DumpOptions::new().with_tables(options.tables.iter()));
		let document = dumper.dump(storage).await?;

		let mut serializer = FixtureSerializer::new().with_format(options.format);
		if let Some(indent) = options.indent {
			serializer = serializer.with_indent(indent);
		}
		let content = serializer.serialize(&document)?;

		match &options.output {
			Some(path) => {
				std::fs::write(path, &content)?;
				if options.verbosity > 0 {
					println!(
						"Dumped {} object(s) to {}",
						document.entry_count(),
						path.display()
					);
				}
			}
			None => println!("{content}"),
		}

		Ok(DumpResult { document, content })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::FixtureError;
	use crate::schema::{Column, Schema, Table};
	use crate::storage::{MemoryStorage, Row};
	use rstest::rstest;
	use serde_json::json;
	use tempfile::NamedTempFile;

	async fn populated() -> (Schema, MemoryStorage) {
		let schema = Schema::new(vec![
			Table::new("bookstore.Author", "author")
				.with_column(Column::primary_key("id"))
				.with_column(Column::new("name")),
		])
		.unwrap();
		let mut storage = MemoryStorage::new();
		let author = schema.table("bookstore.Author").unwrap();
		storage
			.insert(author, &Row::from_iter([("name".to_string(), json!("Jane"))]))
			.await
			.unwrap();
		(schema, storage)
	}

	#[rstest]
	fn test_command_metadata() {
		let cmd = DumpDataCommand::new();
		assert_eq!(cmd.name(), "dumpdata");
		assert!(!cmd.description().is_empty());
		assert!(cmd.help().contains("--format"));
	}

	#[rstest]
	fn test_options_builder() {
		let options = DumpDataOptions::new()
			.with_format(FixtureFormat::Yaml)
			.with_tables(vec!["bookstore.Author".to_string()])
			.with_output("out.yaml")
			.with_indent(4)
			.with_verbosity(1);

		assert_eq!(options.format, FixtureFormat::Yaml);
		assert_eq!(options.tables, vec!["bookstore.Author".to_string()]);
		assert_eq!(options.output, Some(PathBuf::from("out.yaml")));
		assert_eq!(options.indent, Some(4));
		assert_eq!(options.verbosity, 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_execute_to_file() {
		let (schema, mut storage) = populated().await;
		let file = NamedTempFile::with_suffix(".json").unwrap();

		let result = DumpDataCommand::new()
			.execute(
				DumpDataOptions::new().with_output(file.path()),
				&schema,
				&mut storage,
			)
			.await
			.unwrap();

		assert_eq!(result.rows_dumped(), 1);
		let written = std::fs::read_to_string(file.path()).unwrap();
		assert_eq!(written.trim(), result.content.trim());
		assert!(written.contains("Author_1"));
	}

	#[rstest]
	#[tokio::test]
	async fn test_execute_unknown_table() {
		let (schema, mut storage) = populated().await;

		let result = DumpDataCommand::new()
			.execute(
				DumpDataOptions::new().with_tables(vec!["bookstore.Novel".to_string()]),
				&schema,
				&mut storage,
			)
			.await;

		assert!(matches!(result, Err(FixtureError::UnknownType(_))));
	}
}

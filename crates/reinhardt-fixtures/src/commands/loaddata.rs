//! loaddata command implementation.
//!
//! This command loads fixture files into storage as one atomic batch.

use std::path::{Path, PathBuf};

use crate::error::{FixtureError, FixtureResult};
use crate::fixtures::MergePolicy;
use crate::loader::{FixtureLoader, LoadOptions, LoadResult};
use crate::schema::SchemaCatalog;
use crate::storage::FixtureStorage;

/// Arguments for the loaddata command.
#[derive(Debug, Clone, Default)]
pub struct LoadDataArgs {
	/// Fixture file paths to load.
	pub fixture_paths: Vec<PathBuf>,
}

/// Options for the loaddata command.
#[derive(Debug, Clone, Default)]
pub struct LoadDataOptions {
	/// How conflicting values across fixture files are resolved.
	pub merge_policy: MergePolicy,

	/// Verbosity level.
	pub verbosity: u8,
}

impl LoadDataOptions {
	/// Creates new default options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Sets the merge policy.
	pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
		self.merge_policy = policy;
		self
	}

	/// Sets verbosity level.
	pub fn with_verbosity(mut self, level: u8) -> Self {
		self.verbosity = level;
		self
	}
}

/// The loaddata command for loading fixtures into storage.
///
/// # Example
///
/// ```ignore
/// let command = LoadDataCommand::new();
/// let args = LoadDataArgs {
///     fixture_paths: vec![PathBuf::from("fixtures/bookstore.json")],
/// };
/// let options = LoadDataOptions::new().with_verbosity(1);
/// let result = command.execute(args, options, &schema, &mut storage).await?;
/// println!("Loaded {} rows", result.rows_inserted);
/// ```
#[derive(Debug, Default)]
pub struct LoadDataCommand;

impl LoadDataCommand {
	/// Creates a new loaddata command.
	pub fn new() -> Self {
		Self
	}

	/// Returns the command name.
	pub fn name(&self) -> &str {
		"loaddata"
	}

	/// Returns the command description.
	pub fn description(&self) -> &str {
		"Installs the named fixture(s) in the database"
	}

	/// Returns the command help text.
	pub fn help(&self) -> &str {
		r#"
Usage: loaddata [options] fixture [fixture ...]

Installs the named fixture(s) in the database. All fixtures are merged and
loaded in one transaction; tables named in the fixtures are emptied first.

Arguments:
  fixture              One or more fixture files to load

Options:
  --strict             Fail when fixtures define conflicting values
  --verbosity LEVEL    Verbosity level (0=minimal, 1=normal, 2=verbose)
"#
	}

	/// Executes the loaddata command.
	///
	/// # Errors
	///
	/// Fails with `ValidationError` when no path is given, `FileNotFound`
	/// when a path does not exist, or with the loader's error otherwise.
	pub async fn execute(
		&self,
		args: LoadDataArgs,
		options: LoadDataOptions,
		catalog: &dyn SchemaCatalog,
		storage: &mut dyn FixtureStorage,
	) -> FixtureResult<LoadResult> {
		if args.fixture_paths.is_empty() {
			return Err(FixtureError::ValidationError {
				field: "fixture_paths".to_string(),
				message: "At least one fixture file must be specified".to_string(),
			});
		}

		for path in &args.fixture_paths {
			if !path.exists() {
				return Err(FixtureError::FileNotFound(path.display().to_string()));
			}
		}

		let loader = FixtureLoader::new(catalog)
			.with_options(LoadOptions::new().with_merge_policy(options.merge_policy));
		let paths: Vec<&Path> = args.fixture_paths.iter().map(PathBuf::as_path).collect();

		let result = loader.load_files(&paths, storage).await?;

		if options.verbosity > 0 {
			self.print_result(&result, options.verbosity);
		}

		Ok(result)
	}

	fn print_result(&self, result: &LoadResult, verbosity: u8) {
		println!(
			"Installed {} object(s) from {} fixture(s)",
			result.rows_inserted + result.rows_updated,
			result.documents_loaded
		);
		if verbosity > 1 {
			println!("Deleted {} existing row(s)", result.rows_deleted);
			println!("Created {} relation link(s)", result.links_created);
			for table in &result.tables {
				println!("  - {table}");
			}
		}
	}
}

//! Error types for the fixtures module.
//!
//! Every error raised while a load is in progress aborts the surrounding
//! transaction; the loader rolls back and returns the first error to
//! the caller unchanged.

use thiserror::Error;

/// Errors that can occur during fixture dump and load operations.
#[derive(Debug, Error)]
pub enum FixtureError {
	/// A fixture references a table identifier with no concrete implementation.
	#[error("Unknown type: {0}")]
	UnknownType(String),

	/// A symbolic key used as a foreign-key or many-to-many target is not loaded.
	#[error(
		"The object \"{key}\" from table \"{table}\" is not defined in your data file{}",
		reference_hint(.declared_later)
	)]
	MissingReference {
		/// Identifier of the referenced table.
		table: String,
		/// Symbolic key that could not be resolved.
		key: String,
		/// True when the document declares the key after its first use.
		declared_later: bool,
	},

	/// A middle table cannot be split into distinct owner and target roles.
	#[error("Unable to find the many-to-many relationship \"{middle}\" for table \"{owner}\"")]
	AmbiguousRelation {
		/// Identifier of the middle table.
		middle: String,
		/// Identifier of the owning table.
		owner: String,
	},

	/// A table carries two or more self-referential foreign keys.
	#[error(
		"Table \"{table}\" has multiple self-referencing foreign keys ({}), which is not supported",
		.columns.join(", ")
	)]
	UnsupportedSchema {
		/// Identifier of the rejected table.
		table: String,
		/// Names of the self-referencing columns.
		columns: Vec<String>,
	},

	/// A row entry is not a field mapping, or names an unknown field.
	#[error("Malformed fixture entry \"{key}\" for table \"{table}\": {message}")]
	MalformedFixtureEntry {
		/// Identifier of the table the entry belongs to.
		table: String,
		/// Symbolic key of the entry.
		key: String,
		/// Description of the problem.
		message: String,
	},

	/// Two documents define the same field with different values.
	#[error("Conflicting values for {table}.{key}.{field} while merging fixtures")]
	MergeConflict {
		/// Identifier of the table.
		table: String,
		/// Symbolic key of the entry.
		key: String,
		/// Field holding conflicting values.
		field: String,
	},

	/// A stored value could not be decoded for a column.
	#[error("Invalid value for column \"{column}\": {message}")]
	InvalidValue {
		/// Column name.
		column: String,
		/// Decoding error message.
		message: String,
	},

	/// The schema description is inconsistent.
	#[error("Schema error: {0}")]
	Schema(String),

	/// Error surfaced by the persistence layer.
	#[error(transparent)]
	Storage(#[from] StorageError),

	/// Error parsing fixture data.
	#[error("Parse error: {0}")]
	ParseError(String),

	/// Validation failed for a specific argument.
	#[error("Validation error: {field}: {message}")]
	ValidationError {
		/// Argument that failed validation.
		field: String,
		/// Validation error message.
		message: String,
	},

	/// Fixture file not found.
	#[error("Fixture file not found: {0}")]
	FileNotFound(String),

	/// Unsupported file extension.
	#[error("Unsupported file extension: {0}")]
	UnsupportedExtension(String),

	/// I/O operation failed.
	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	JsonError(#[from] serde_json::Error),

	/// YAML serialization/deserialization error (when yaml feature is enabled).
	#[cfg(feature = "yaml")]
	#[error("YAML error: {0}")]
	YamlError(#[from] serde_yaml::Error),
}

fn reference_hint(declared_later: &bool) -> &'static str {
	if *declared_later {
		" before its first use"
	} else {
		""
	}
}

/// Errors raised by a [`FixtureStorage`](crate::storage::FixtureStorage) backend.
#[derive(Debug, Error)]
pub enum StorageError {
	/// Database operation failed.
	#[error("Database error: {0}")]
	Database(String),

	/// Transaction state error.
	#[error("Transaction error: {0}")]
	Transaction(String),

	/// Error from the SQLite driver.
	#[cfg(feature = "sqlite")]
	#[error("SQLx error: {0}")]
	Sqlx(#[from] sqlx::Error),
}

/// Result type alias for fixture operations.
pub type FixtureResult<T> = Result<T, FixtureError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[rstest]
	fn test_unknown_type_error() {
		let error = FixtureError::UnknownType("bookstore.Novel".to_string());
		assert_eq!(error.to_string(), "Unknown type: bookstore.Novel");
	}

	#[rstest]
	#[case(false, "The object \"Author_Z\" from table \"bookstore.Author\" is not defined in your data file")]
	#[case(
		true,
		"The object \"Author_Z\" from table \"bookstore.Author\" is not defined in your data file before its first use"
	)]
	fn test_missing_reference_message(#[case] declared_later: bool, #[case] expected: &str) {
		let error = FixtureError::MissingReference {
			table: "bookstore.Author".to_string(),
			key: "Author_Z".to_string(),
			declared_later,
		};
		assert_eq!(error.to_string(), expected);
	}

	#[rstest]
	fn test_unsupported_schema_lists_columns() {
		let error = FixtureError::UnsupportedSchema {
			table: "org.Employee".to_string(),
			columns: vec!["manager_id".to_string(), "mentor_id".to_string()],
		};
		assert!(error.to_string().contains("manager_id, mentor_id"));
	}

	#[rstest]
	fn test_storage_error_from() {
		let error: FixtureError = StorageError::Database("disk full".to_string()).into();
		assert!(matches!(error, FixtureError::Storage(_)));
		assert_eq!(error.to_string(), "Database error: disk full");
	}

	#[rstest]
	fn test_io_error_from() {
		let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
		let error: FixtureError = io_error.into();
		assert!(matches!(error, FixtureError::IoError(_)));
	}
}

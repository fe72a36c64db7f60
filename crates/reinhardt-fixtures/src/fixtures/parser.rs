//! Fixture parsing functionality.
//!
//! This module handles parsing of fixture files in JSON and YAML formats
//! into format-agnostic [`FixtureDocument`]s.

use std::path::Path;

use serde_json::Value;

use super::{FixtureDocument, FixtureFormat};
use crate::error::{FixtureError, FixtureResult};

/// Parser for fixture files.
///
/// Supports both JSON and YAML formats (YAML requires the `yaml` feature).
/// An empty file parses to an empty document.
#[derive(Debug, Default)]
pub struct FixtureParser;

impl FixtureParser {
	/// Creates a new fixture parser.
	pub fn new() -> Self {
		Self
	}

	/// Parses a fixture file from the given path.
	///
	/// The format is automatically detected from the file extension.
	///
	/// # Errors
	///
	/// Returns an error if:
	/// - The file extension is not recognized
	/// - The file cannot be read
	/// - The file content is not a mapping of table sections
	pub fn parse_file(&self, path: &Path) -> FixtureResult<FixtureDocument> {
		let format = FixtureFormat::from_path(path).ok_or_else(|| {
			FixtureError::UnsupportedExtension(
				path.extension()
					.and_then(|e| e.to_str())
					.unwrap_or("(none)")
					.to_string(),
			)
		})?;

		let content = std::fs::read_to_string(path).map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				FixtureError::FileNotFound(path.display().to_string())
			} else {
				FixtureError::IoError(e)
			}
		})?;

		tracing::debug!(path = %path.display(), format = %format, "Parsing fixture file");
		self.parse_string(&content, format)
	}

	/// Parses fixture data from a string.
	pub fn parse_string(&self, content: &str, format: FixtureFormat) -> FixtureResult<FixtureDocument> {
		if content.trim().is_empty() {
			return Ok(FixtureDocument::new());
		}

		let value = match format {
			FixtureFormat::Json => serde_json::from_str::<Value>(content)?,
			FixtureFormat::Yaml => self.parse_yaml(content)?,
		};

		match value {
			Value::Null => Ok(FixtureDocument::new()),
			value => FixtureDocument::from_value(value),
		}
	}

	/// Parses YAML fixture content.
	#[cfg(feature = "yaml")]
	fn parse_yaml(&self, content: &str) -> FixtureResult<Value> {
		Ok(serde_yaml::from_str(content)?)
	}

	/// Stub for YAML parsing when the feature is not enabled.
	#[cfg(not(feature = "yaml"))]
	fn parse_yaml(&self, _content: &str) -> FixtureResult<Value> {
		Err(FixtureError::UnsupportedExtension(
			"YAML support requires the 'yaml' feature".to_string(),
		))
	}

	/// Parses multiple fixture files, one document per file, in order.
	pub fn parse_files(&self, paths: &[&Path]) -> FixtureResult<Vec<FixtureDocument>> {
		paths.iter().map(|path| self.parse_file(path)).collect()
	}
}

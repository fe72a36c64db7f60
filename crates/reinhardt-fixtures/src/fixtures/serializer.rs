//! Fixture document serialization.

use std::path::Path;

use super::{FixtureDocument, FixtureFormat};
use crate::error::{FixtureError, FixtureResult};

/// Serializer turning a [`FixtureDocument`] into fixture file content.
#[derive(Debug, Clone)]
pub struct FixtureSerializer {
	format: FixtureFormat,
	indent: usize,
}

impl FixtureSerializer {
	/// Creates a serializer producing pretty-printed JSON.
	pub fn new() -> Self {
		Self {
			format: FixtureFormat::Json,
			indent: 2,
		}
	}

	/// Sets the output format.
	pub fn with_format(mut self, format: FixtureFormat) -> Self {
		self.format = format;
		self
	}

	/// Sets the indentation level. Zero yields compact JSON.
	pub fn with_indent(mut self, indent: usize) -> Self {
		self.indent = indent;
		self
	}

	/// Serializes a document to a string.
	pub fn serialize(&self, document: &FixtureDocument) -> FixtureResult<String> {
		match self.format {
			FixtureFormat::Json => self.serialize_json(document),
			FixtureFormat::Yaml => self.serialize_yaml(document),
		}
	}

	fn serialize_json(&self, document: &FixtureDocument) -> FixtureResult<String> {
		if self.indent == 0 {
			return Ok(serde_json::to_string(document)?);
		}

		let indent = " ".repeat(self.indent);
		let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
		let mut buffer = Vec::new();
		let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
		serde::Serialize::serialize(document, &mut serializer)?;
		String::from_utf8(buffer).map_err(|e| FixtureError::ParseError(e.to_string()))
	}

	#[cfg(feature = "yaml")]
	fn serialize_yaml(&self, document: &FixtureDocument) -> FixtureResult<String> {
		Ok(serde_yaml::to_string(document)?)
	}

	#[cfg(not(feature = "yaml"))]
	fn serialize_yaml(&self, _document: &FixtureDocument) -> FixtureResult<String> {
		Err(FixtureError::UnsupportedExtension(
			"YAML support requires the 'yaml' feature".to_string(),
		))
	}

	/// Writes a serialized document to a file.
	pub fn write_to_file(&self, document: &FixtureDocument, path: &Path) -> FixtureResult<()> {
		let content = self.serialize(document)?;
		std::fs::write(path, content)?;
		Ok(())
	}

	/// Returns the configured output format.
	pub fn format(&self) -> FixtureFormat {
		self.format
	}
}

impl Default for FixtureSerializer {
	fn default() -> Self {
		Self::new()
	}
}

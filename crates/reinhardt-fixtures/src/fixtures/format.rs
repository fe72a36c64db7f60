//! External fixture formats.

use std::path::Path;

/// Supported fixture file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub enum FixtureFormat {
	/// JSON format (default).
	#[default]
	Json,

	/// YAML format (requires `yaml` feature).
	Yaml,
}

impl FixtureFormat {
	/// Determines the fixture format from a file extension.
	///
	/// # Example
	///
	/// ```
	/// # use reinhardt_fixtures::fixtures::FixtureFormat;
	/// assert_eq!(FixtureFormat::from_extension("json"), Some(FixtureFormat::Json));
	/// assert_eq!(FixtureFormat::from_extension("yml"), Some(FixtureFormat::Yaml));
	/// assert_eq!(FixtureFormat::from_extension("xml"), None);
	/// ```
	pub fn from_extension(ext: &str) -> Option<Self> {
		match ext.to_lowercase().as_str() {
			"json" => Some(Self::Json),
			"yaml" | "yml" => Some(Self::Yaml),
			_ => None,
		}
	}

	/// Determines the fixture format from a file path.
	pub fn from_path(path: &Path) -> Option<Self> {
		path.extension()
			.and_then(|ext| ext.to_str())
			.and_then(Self::from_extension)
	}

	/// Returns the default file extension for this format.
	pub fn extension(&self) -> &'static str {
		match self {
			Self::Json => "json",
			Self::Yaml => "yaml",
		}
	}
}

impl std::fmt::Display for FixtureFormat {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Json => write!(f, "JSON"),
			Self::Yaml => write!(f, "YAML"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use std::path::PathBuf;

	#[rstest]
	#[case("json", Some(FixtureFormat::Json))]
	#[case("JSON", Some(FixtureFormat::Json))]
	#[case("yaml", Some(FixtureFormat::Yaml))]
	#[case("yml", Some(FixtureFormat::Yaml))]
	#[case("xml", None)]
	fn test_from_extension(#[case] ext: &str, #[case] expected: Option<FixtureFormat>) {
		assert_eq!(FixtureFormat::from_extension(ext), expected);
	}

	#[rstest]
	fn test_from_path() {
		assert_eq!(
			FixtureFormat::from_path(&PathBuf::from("bookstore.json")),
			Some(FixtureFormat::Json)
		);
		assert_eq!(
			FixtureFormat::from_path(&PathBuf::from("data/bookstore.yml")),
			Some(FixtureFormat::Yaml)
		);
		assert_eq!(FixtureFormat::from_path(&PathBuf::from("no_extension")), None);
	}

	#[rstest]
	fn test_display_and_extension() {
		assert_eq!(FixtureFormat::Yaml.to_string(), "YAML");
		assert_eq!(FixtureFormat::Json.extension(), "json");
	}
}

//! Storage-boundary codecs for array and object columns.
//!
//! Array columns store a list of scalars in one text value:
//!
//! ```text
//! | red | green | blue |
//! ```
//!
//! Items are wrapped between the `"| "` and `" |"` delimiters and separated
//! by a literal `" | "` token. An empty list is stored as an empty string.
//!
//! Object columns store an opaque value as JSON text. Fixtures carry the
//! decoded value; storage backends encode it again on write-back.

use serde_json::Value;

use crate::error::{FixtureError, FixtureResult};

const ARRAY_OPEN: &str = "| ";
const ARRAY_CLOSE: &str = " |";
const ARRAY_SEPARATOR: &str = " | ";

/// Codec for the textual array encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArrayCodec;

impl ArrayCodec {
	/// Decodes a stored value into a list.
	///
	/// Non-string values are returned unchanged.
	///
	/// # Example
	///
	/// ```
	/// use reinhardt_fixtures::codec::ArrayCodec;
	/// use serde_json::json;
	///
	/// assert_eq!(ArrayCodec::decode(&json!("| a | b |")), json!(["a", "b"]));
	/// assert_eq!(ArrayCodec::decode(&json!("")), json!([]));
	/// ```
	pub fn decode(stored: &Value) -> Value {
		let Value::String(text) = stored else {
			return stored.clone();
		};

		let inner = text
			.strip_prefix(ARRAY_OPEN)
			.and_then(|t| t.strip_suffix(ARRAY_CLOSE))
			.unwrap_or_else(|| text.trim_matches('|').trim());

		if inner.is_empty() {
			return Value::Array(Vec::new());
		}

		Value::Array(
			inner
				.split(ARRAY_SEPARATOR)
				.map(|item| Value::String(item.to_string()))
				.collect(),
		)
	}

	/// Encodes a list into its stored text form.
	///
	/// Non-list values are returned unchanged.
	///
	/// # Example
	///
	/// ```
	/// use reinhardt_fixtures::codec::ArrayCodec;
	/// use serde_json::json;
	///
	/// assert_eq!(ArrayCodec::encode(&json!(["a", 2])), json!("| a | 2 |"));
	/// ```
	pub fn encode(value: &Value) -> Value {
		let Value::Array(items) = value else {
			return value.clone();
		};

		if items.is_empty() {
			return Value::String(String::new());
		}

		let joined = items
			.iter()
			.map(scalar_text)
			.collect::<Vec<_>>()
			.join(ARRAY_SEPARATOR);
		Value::String(format!("{ARRAY_OPEN}{joined}{ARRAY_CLOSE}"))
	}
}

/// Codec for opaque object columns stored as JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjectCodec;

impl ObjectCodec {
	/// Decodes a stored object value.
	///
	/// # Errors
	///
	/// Returns [`FixtureError::InvalidValue`] when the stored text is not valid JSON.
	pub fn decode(column: &str, stored: &Value) -> FixtureResult<Value> {
		match stored {
			Value::String(text) => {
				serde_json::from_str(text).map_err(|e| FixtureError::InvalidValue {
					column: column.to_string(),
					message: e.to_string(),
				})
			}
			other => Ok(other.clone()),
		}
	}

	/// Encodes a native value into its stored text form. Null stays null.
	pub fn encode(value: &Value) -> Value {
		match value {
			Value::Null => Value::Null,
			other => Value::String(other.to_string()),
		}
	}
}

/// Renders a scalar the way it appears inside symbolic keys and array text.
pub fn scalar_text(value: &Value) -> String {
	match value {
		Value::Null => String::new(),
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}

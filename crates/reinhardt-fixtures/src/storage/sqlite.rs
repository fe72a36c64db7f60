//! SQLite storage backend

use async_trait::async_trait;
use serde_json::{Number, Value};
use sqlx::{Column as _, Row as _, Sqlite, SqlitePool, Transaction, TypeInfo, sqlite::SqliteRow};

use super::{FixtureStorage, Row, RowFilter, encode_row};
use crate::error::{StorageError, StorageResult};
use crate::schema::Table;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

/// SQLite storage backed by a `sqlx` pool.
///
/// Between `begin` and `commit`/`rollback` every statement runs on the held
/// transaction; outside of it statements run on the pool. Use a pool with a
/// single connection for `sqlite::memory:` databases.
pub struct SqliteStorage {
	pool: SqlitePool,
	tx: Option<Transaction<'static, Sqlite>>,
}

impl SqliteStorage {
	/// Creates a storage over `pool`.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool, tx: None }
	}

	/// Returns the underlying pool.
	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	fn bind_value<'q>(query: SqliteQuery<'q>, value: &'q Value) -> SqliteQuery<'q> {
		match value {
			Value::Null => query.bind(None::<String>),
			Value::Bool(b) => query.bind(*b),
			Value::Number(n) => match n.as_i64() {
				Some(i) => query.bind(i),
				None => query.bind(n.as_f64()),
			},
			Value::String(s) => query.bind(s.as_str()),
			// Lists reaching storage unencoded are kept as JSON text
			other => query.bind(other.to_string()),
		}
	}

	fn convert_row(sqlite_row: SqliteRow) -> Row {
		let mut row = Row::new();
		for column in sqlite_row.columns() {
			let column_name = column.name();
			let type_name = column.type_info().name().to_uppercase();

			// try_get::<i64> may yield 0 for NULL in a RETURNING clause
			let is_null = sqlite_row
				.try_get::<Option<String>, _>(column_name)
				.ok()
				.flatten()
				.is_none() && sqlite_row
				.try_get::<Option<i64>, _>(column_name)
				.ok()
				.flatten()
				.is_none() && sqlite_row
				.try_get::<Option<f64>, _>(column_name)
				.ok()
				.flatten()
				.is_none() && sqlite_row
				.try_get::<Option<Vec<u8>>, _>(column_name)
				.ok()
				.flatten()
				.is_none();

			let value = if is_null {
				Value::Null
			} else if type_name.contains("BOOL") {
				sqlite_row
					.try_get::<i64, _>(column_name)
					.map(|v| Value::Bool(v != 0))
					.unwrap_or(Value::Null)
			} else if let Ok(value) = sqlite_row.try_get::<i64, _>(column_name) {
				Value::from(value)
			} else if let Ok(value) = sqlite_row.try_get::<f64, _>(column_name) {
				Number::from_f64(value).map_or(Value::Null, Value::Number)
			} else if let Ok(value) = sqlite_row.try_get::<String, _>(column_name) {
				Value::String(value)
			} else if let Ok(value) = sqlite_row.try_get::<Vec<u8>, _>(column_name) {
				Value::String(String::from_utf8_lossy(&value).into_owned())
			} else {
				Value::Null
			};
			row.insert(column_name.to_string(), value);
		}
		row
	}

	async fn fetch_all(&mut self, sql: &str, params: &[Value]) -> StorageResult<Vec<Row>> {
		tracing::trace!(sql, "Executing fixture query");
		let mut query = sqlx::query(sql);
		for param in params {
			query = Self::bind_value(query, param);
		}
		let rows = match self.tx.as_mut() {
			Some(tx) => query.fetch_all(&mut **tx).await?,
			None => query.fetch_all(&self.pool).await?,
		};
		Ok(rows.into_iter().map(Self::convert_row).collect())
	}

	async fn fetch_optional(&mut self, sql: &str, params: &[Value]) -> StorageResult<Option<Row>> {
		Ok(self.fetch_all(sql, params).await?.into_iter().next())
	}

	async fn execute(&mut self, sql: &str) -> StorageResult<u64> {
		tracing::trace!(sql, "Executing fixture statement");
		let query = sqlx::query(sql);
		let result = match self.tx.as_mut() {
			Some(tx) => query.execute(&mut **tx).await?,
			None => query.execute(&self.pool).await?,
		};
		Ok(result.rows_affected())
	}
}

fn quote(identifier: &str) -> String {
	format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn placeholders(count: usize) -> String {
	vec!["?"; count].join(", ")
}

fn order_clause(table: &Table) -> String {
	let keys: Vec<String> = table.primary_keys().map(|c| quote(&c.name)).collect();
	if keys.is_empty() {
		" ORDER BY rowid".to_string()
	} else {
		format!(" ORDER BY {}", keys.join(", "))
	}
}

#[async_trait]
impl FixtureStorage for SqliteStorage {
	async fn begin(&mut self) -> StorageResult<()> {
		if self.tx.is_some() {
			return Err(StorageError::Transaction(
				"Transaction already active".to_string(),
			));
		}
		self.tx = Some(self.pool.begin().await?);
		Ok(())
	}

	async fn commit(&mut self) -> StorageResult<()> {
		let tx = self.tx.take().ok_or_else(|| {
			StorageError::Transaction("Transaction already consumed".to_string())
		})?;
		tx.commit().await?;
		Ok(())
	}

	async fn rollback(&mut self) -> StorageResult<()> {
		let tx = self.tx.take().ok_or_else(|| {
			StorageError::Transaction("Transaction already consumed".to_string())
		})?;
		tx.rollback().await?;
		Ok(())
	}

	async fn select(&mut self, table: &Table, filter: Option<&RowFilter>) -> StorageResult<Vec<Row>> {
		let base = format!("SELECT * FROM {}", quote(&table.name));
		let (sql, params) = match filter {
			None => (base, Vec::new()),
			Some(RowFilter::IsNull(column)) => {
				(format!("{base} WHERE {} IS NULL", quote(column)), Vec::new())
			}
			Some(RowFilter::In(_, values)) if values.is_empty() => return Ok(Vec::new()),
			Some(RowFilter::In(column, values)) => (
				format!(
					"{base} WHERE {} IN ({})",
					quote(column),
					placeholders(values.len())
				),
				values.clone(),
			),
		};
		self.fetch_all(&format!("{sql}{}", order_clause(table)), &params)
			.await
	}

	async fn delete_all(&mut self, table: &Table) -> StorageResult<u64> {
		self.execute(&format!("DELETE FROM {}", quote(&table.name)))
			.await
	}

	async fn insert(&mut self, table: &Table, values: &Row) -> StorageResult<Row> {
		let generated: Vec<&str> = table
			.primary_keys()
			.filter(|_| table.use_id_generator)
			.map(|c| c.name.as_str())
			.collect();
		let encoded: Row = encode_row(table, values)
			.into_iter()
			.filter(|(name, value)| !(value.is_null() && generated.contains(&name.as_str())))
			.collect();

		let sql = if encoded.is_empty() {
			format!("INSERT INTO {} DEFAULT VALUES RETURNING *", quote(&table.name))
		} else {
			let columns: Vec<String> = encoded.keys().map(|c| quote(c)).collect();
			format!(
				"INSERT INTO {} ({}) VALUES ({}) RETURNING *",
				quote(&table.name),
				columns.join(", "),
				placeholders(encoded.len())
			)
		};

		let params: Vec<Value> = encoded.into_values().collect();
		self.fetch_optional(&sql, &params).await?.ok_or_else(|| {
			StorageError::Database(format!("Insert into {} returned no row", table.name))
		})
	}

	async fn update(&mut self, table: &Table, values: &Row) -> StorageResult<Row> {
		let encoded = encode_row(table, values);
		let keys: Vec<&str> = table.primary_keys().map(|c| c.name.as_str()).collect();
		if keys.is_empty() {
			return Err(StorageError::Database(format!(
				"Table {} has no primary key to update by",
				table.name
			)));
		}

		let mut key_values = Vec::with_capacity(keys.len());
		for key in &keys {
			let value = encoded.get(*key).cloned().ok_or_else(|| {
				StorageError::Database(format!("Missing primary key {} for {}", key, table.name))
			})?;
			key_values.push(value);
		}

		let condition = keys
			.iter()
			.map(|k| format!("{} = ?", quote(k)))
			.collect::<Vec<_>>()
			.join(" AND ");
		let assignments: Vec<(&String, &Value)> = encoded
			.iter()
			.filter(|(name, _)| !keys.contains(&name.as_str()))
			.collect();

		let (sql, mut params) = if assignments.is_empty() {
			(
				format!("SELECT * FROM {} WHERE {}", quote(&table.name), condition),
				Vec::new(),
			)
		} else {
			let set = assignments
				.iter()
				.map(|(name, _)| format!("{} = ?", quote(name)))
				.collect::<Vec<_>>()
				.join(", ");
			(
				format!(
					"UPDATE {} SET {} WHERE {} RETURNING *",
					quote(&table.name),
					set,
					condition
				),
				assignments.iter().map(|(_, v)| (*v).clone()).collect::<Vec<_>>(),
			)
		};
		params.extend(key_values);

		self.fetch_optional(&sql, &params).await?.ok_or_else(|| {
			StorageError::Database(format!("No row of {} matches the primary key", table.name))
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::schema::Column;
	use rstest::rstest;
	use serde_json::json;
	use sqlx::sqlite::SqlitePoolOptions;

	async fn storage() -> SqliteStorage {
		let pool = SqlitePoolOptions::new()
			.max_connections(1)
			.connect("sqlite::memory:")
			.await
			.unwrap();
		sqlx::query(
			"CREATE TABLE author (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, active BOOLEAN, rating REAL)",
		)
		.execute(&pool)
		.await
		.unwrap();
		SqliteStorage::new(pool)
	}

	fn author() -> Table {
		Table::new("bookstore.Author", "author")
			.with_column(Column::primary_key("id"))
			.with_column(Column::new("name"))
			.with_column(Column::new("active"))
			.with_column(Column::new("rating"))
	}

	fn row(value: Value) -> Row {
		serde_json::from_value(value).unwrap()
	}

	#[rstest]
	fn test_quote_escapes() {
		assert_eq!(quote("author"), "\"author\"");
		assert_eq!(quote("we\"ird"), "\"we\"\"ird\"");
		assert_eq!(placeholders(3), "?, ?, ?");
	}

	#[rstest]
	#[tokio::test]
	async fn test_insert_returning_generated_key() {
		let mut storage = storage().await;
		let row = storage
			.insert(&author(), &row(json!({"id": null, "name": "Jane", "active": true, "rating": 4.5})))
			.await
			.unwrap();

		assert_eq!(row["id"], json!(1));
		assert_eq!(row["name"], json!("Jane"));
		assert_eq!(row["rating"], json!(4.5));
	}

	#[rstest]
	#[tokio::test]
	async fn test_insert_default_values() {
		let mut storage = storage().await;
		let row = storage.insert(&author(), &Row::new()).await.unwrap();
		assert_eq!(row["id"], json!(1));
		assert_eq!(row["name"], Value::Null);
	}

	#[rstest]
	#[tokio::test]
	async fn test_rollback_discards_writes() {
		let mut storage = storage().await;
		storage.insert(&author(), &row(json!({"name": "Jane"}))).await.unwrap();

		storage.begin().await.unwrap();
		storage.delete_all(&author()).await.unwrap();
		storage.rollback().await.unwrap();

		let rows = storage.select(&author(), None).await.unwrap();
		assert_eq!(rows.len(), 1);
	}

	#[rstest]
	#[tokio::test]
	async fn test_commit_without_transaction_fails() {
		let mut storage = storage().await;
		assert!(matches!(
			storage.commit().await,
			Err(StorageError::Transaction(_))
		));
	}

	#[rstest]
	#[tokio::test]
	async fn test_update_and_filters() {
		let mut storage = storage().await;
		storage.insert(&author(), &row(json!({"name": "Jane"}))).await.unwrap();
		storage.insert(&author(), &row(json!({"name": "Joe"}))).await.unwrap();

		let updated = storage
			.update(&author(), &row(json!({"id": 2, "name": "Joseph"})))
			.await
			.unwrap();
		assert_eq!(updated["name"], json!("Joseph"));

		let matched = storage
			.select(
				&author(),
				Some(&RowFilter::In("id".to_string(), vec![json!(2)])),
			)
			.await
			.unwrap();
		assert_eq!(matched.len(), 1);
		assert_eq!(matched[0]["name"], json!("Joseph"));

		let unnamed = storage
			.select(&author(), Some(&RowFilter::IsNull("name".to_string())))
			.await
			.unwrap();
		assert!(unnamed.is_empty());
	}
}

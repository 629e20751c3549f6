//! Keyed JSON document collections
//!
//! Each document is a JSON object addressed by `(collection, id)`. Queries
//! filter and order on top-level fields through `json_extract`, which keeps
//! the store schemaless the way the session and submission records expect.

use rusqlite::types::Value as SqlValue;
use rusqlite::{OptionalExtension, TransactionBehavior, params, params_from_iter};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{DbConn, DbPool};
use crate::{Error, Result};

/// Maximum number of deletes committed in a single transaction
pub const BATCH_LIMIT: usize = 500;

/// A stored document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    /// Deserialize the document body into a typed record
    ///
    /// # Errors
    ///
    /// Returns error if the body does not match `T`
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.data.clone())?)
    }
}

/// Comparison operator for a field filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl FilterOp {
    const fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

/// A single `field <op> value` condition
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: Value,
}

/// Collection query: conjunction of filters, optional ordering and limit
#[derive(Debug, Clone, Default)]
pub struct Query {
    filters: Vec<Filter>,
    order_by: Option<(String, Direction)>,
    limit: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter on a top-level field
    #[must_use]
    pub fn filter(mut self, field: &str, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op,
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some((field.to_string(), direction));
        self
    }

    #[must_use]
    pub const fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Document store over the shared connection pool
#[derive(Clone)]
pub struct DocumentStore {
    pool: DbPool,
}

impl DocumentStore {
    /// Create a new document store
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<DbConn> {
        self.pool.get().map_err(|e| Error::Database(e.to_string()))
    }

    /// Fetch a document by id
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                [collection, id],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|data| {
            Ok(Document {
                id: id.to_string(),
                data: serde_json::from_str(&data)?,
            })
        })
        .transpose()
    }

    /// Write a document, replacing any existing body under the same id
    ///
    /// # Errors
    ///
    /// Returns error if the value is not a JSON object or the write fails
    pub fn set<T: Serialize>(&self, collection: &str, id: &str, value: &T) -> Result<()> {
        let body = object_body(value)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(collection, id) DO UPDATE
             SET data = excluded.data, updated_at = datetime('now')",
            params![collection, id, body],
        )?;
        Ok(())
    }

    /// Insert a document under a generated id
    ///
    /// # Errors
    ///
    /// Returns error if the value is not a JSON object or the write fails
    pub fn add<T: Serialize>(&self, collection: &str, value: &T) -> Result<String> {
        let body = object_body(value)?;
        let id = Uuid::new_v4().simple().to_string();
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO documents (collection, id, data) VALUES (?1, ?2, ?3)",
            params![collection, id, body],
        )?;
        Ok(id)
    }

    /// Atomically modify a document's top-level fields
    ///
    /// Returns the updated document, or `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn update<F>(&self, collection: &str, id: &str, apply: F) -> Result<Option<Document>>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let raw: Option<String> = tx
            .query_row(
                "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
                [collection, id],
                |row| row.get(0),
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let mut data: Value = serde_json::from_str(&raw)?;
        let fields = data
            .as_object_mut()
            .ok_or_else(|| Error::Database(format!("{collection}/{id} is not an object")))?;
        apply(fields);

        tx.execute(
            "UPDATE documents SET data = ?3, updated_at = datetime('now')
             WHERE collection = ?1 AND id = ?2",
            params![collection, id, serde_json::to_string(&data)?],
        )?;
        tx.commit()?;

        Ok(Some(Document {
            id: id.to_string(),
            data,
        }))
    }

    /// Run a query against a collection
    ///
    /// # Errors
    ///
    /// Returns error if a field name is invalid, a filter value is not a
    /// scalar, or the database operation fails
    pub fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        let mut sql = String::from("SELECT id, data FROM documents WHERE collection = ?");
        let mut values = vec![SqlValue::Text(collection.to_string())];

        for filter in &query.filters {
            sql.push_str(&format!(
                " AND json_extract(data, ?) {} ?",
                filter.op.as_sql()
            ));
            values.push(SqlValue::Text(field_path(&filter.field)?));
            values.push(scalar(&filter.value)?);
        }

        if let Some((field, direction)) = &query.order_by {
            let dir = match direction {
                Direction::Asc => "ASC",
                Direction::Desc => "DESC",
            };
            sql.push_str(&format!(" ORDER BY json_extract(data, ?) {dir}, id {dir}"));
            values.push(SqlValue::Text(field_path(field)?));
        }

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            values.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut documents = Vec::new();
        for row in rows {
            let (id, data) = row?;
            documents.push(Document {
                id,
                data: serde_json::from_str(&data)?,
            });
        }
        Ok(documents)
    }

    /// Delete a single document, returning whether it existed
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let n = conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND id = ?2",
            [collection, id],
        )?;
        Ok(n > 0)
    }

    /// Delete documents in batches of at most [`BATCH_LIMIT`]
    ///
    /// Returns the number of documents actually removed.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails; batches committed before
    /// the failure stay deleted
    pub fn delete_many(&self, collection: &str, ids: &[String]) -> Result<usize> {
        let mut conn = self.conn()?;
        let mut deleted = 0;

        for chunk in ids.chunks(BATCH_LIMIT) {
            let tx = conn.transaction()?;
            {
                let mut stmt =
                    tx.prepare_cached("DELETE FROM documents WHERE collection = ?1 AND id = ?2")?;
                for id in chunk {
                    deleted += stmt.execute([collection, id.as_str()])?;
                }
            }
            tx.commit()?;
            tracing::debug!(collection, batch = chunk.len(), "committed delete batch");
        }

        Ok(deleted)
    }

    /// Number of documents in a collection
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn count(&self, collection: &str) -> Result<usize> {
        let conn = self.conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            [collection],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(n).unwrap_or(0))
    }
}

fn object_body<T: Serialize>(value: &T) -> Result<String> {
    let value = serde_json::to_value(value)?;
    if !value.is_object() {
        return Err(Error::Database("documents must be JSON objects".to_string()));
    }
    Ok(serde_json::to_string(&value)?)
}

/// Build a JSON path for a top-level field, rejecting anything but identifiers
fn field_path(field: &str) -> Result<String> {
    let valid = !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return Err(Error::Database(format!("invalid field name: {field:?}")));
    }
    Ok(format!("$.{field}"))
}

fn scalar(value: &Value) -> Result<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .ok_or_else(|| Error::Database(format!("unsupported number: {n}"))),
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Err(Error::Database(
            "filter values must be scalars".to_string(),
        )),
    }
}

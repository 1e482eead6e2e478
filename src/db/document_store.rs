//! Document store
//!
//! Generic CRUD over named collections of JSON documents. Each document is a
//! flat JSON object addressed by `(collection, id)`; the store stamps
//! `createdAt`/`updatedAt` into every document it writes.
//!
//! Queries are conjunctions of equality / membership predicates on top-level
//! fields with an optional single-field ordering, pushed down to SQLite through
//! `json_extract`.

use anyhow::{bail, Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

/// Top-level fields of a document
pub type Fields = Map<String, Value>;

pub const CREATED_AT: &str = "createdAt";
pub const UPDATED_AT: &str = "updatedAt";

/// Named collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Organizations,
    Members,
    JoinRequests,
    Activities,
    Budgets,
    Feedback,
    Settings,
    Posts,
    Comments,
    Reactions,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Organizations => "organizations",
            Collection::Members => "members",
            Collection::JoinRequests => "join_requests",
            Collection::Activities => "activities",
            Collection::Budgets => "budgets",
            Collection::Feedback => "feedback",
            Collection::Settings => "settings",
            Collection::Posts => "posts",
            Collection::Comments => "comments",
            Collection::Reactions => "reactions",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored document
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

impl Document {
    /// Decode the document into a typed model; `id` is injected as a field.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        let mut map = self.fields.clone();
        map.insert("id".to_string(), Value::String(self.id.clone()));
        serde_json::from_value(Value::Object(map))
            .with_context(|| format!("Malformed document {}", self.id))
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }
}

/// Serialize a value into document fields, dropping `id` and null entries.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields> {
    match serde_json::to_value(value).context("Failed to serialize document")? {
        Value::Object(mut map) => {
            map.remove("id");
            map.retain(|_, v| !v.is_null());
            Ok(map)
        }
        other => bail!("Documents must be JSON objects, got {}", other),
    }
}

/// Current time as a fixed-width RFC 3339 UTC string, so lexical order is
/// chronological order.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
enum Predicate {
    Eq(&'static str, Value),
    In(&'static str, Vec<Value>),
}

/// Conjunction of field predicates plus an optional ordering
#[derive(Debug, Clone, Default)]
pub struct Query {
    predicates: Vec<Predicate>,
    order_by: Option<(&'static str, SortOrder)>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &'static str, value: impl Into<Value>) -> Self {
        self.predicates.push(Predicate::Eq(field, value.into()));
        self
    }

    pub fn is_in<V: Into<Value>>(
        mut self,
        field: &'static str,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.predicates.push(Predicate::In(field, values));
        self
    }

    pub fn order_by(mut self, field: &'static str, order: SortOrder) -> Self {
        self.order_by = Some((field, order));
        self
    }
}

/// SQLite bindable form of a JSON scalar as `json_extract` returns it
enum Scalar {
    Text(String),
    Int(i64),
    Real(f64),
    Null,
}

impl From<&Value> for Scalar {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Scalar::Null,
            Value::Bool(b) => Scalar::Int(i64::from(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => Scalar::Real(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => Scalar::Text(s.clone()),
            other => Scalar::Text(other.to_string()),
        }
    }
}

fn push_scalar(qb: &mut QueryBuilder<'_, Sqlite>, scalar: Scalar) {
    match scalar {
        Scalar::Text(s) => qb.push_bind(s),
        Scalar::Int(i) => qb.push_bind(i),
        Scalar::Real(f) => qb.push_bind(f),
        Scalar::Null => qb.push("NULL"),
    };
}

/// `json_extract` expression for a top-level field. Field names are inlined so
/// the expression indexes apply; only identifier characters are allowed.
fn field_expr(field: &str) -> Result<String> {
    if field.is_empty() || !field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("Invalid document field name: {:?}", field);
    }
    Ok(format!("json_extract(data, '$.{}')", field))
}

#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: String,
    data: String,
}

impl DocumentRow {
    fn into_document(self) -> Result<Document> {
        let fields: Fields = serde_json::from_str(&self.data)
            .with_context(|| format!("Corrupt document data for {}", self.id))?;
        Ok(Document {
            id: self.id,
            fields,
        })
    }
}

pub struct DocumentStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> DocumentStore<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a document. A caller-supplied id overwrites any existing
    /// document with that id; otherwise a fresh UUID is generated.
    pub async fn create(
        &self,
        collection: Collection,
        mut fields: Fields,
        id: Option<&str>,
    ) -> Result<Document> {
        let id = id
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let now = timestamp();
        fields.remove("id");
        fields.insert(CREATED_AT.to_string(), Value::String(now.clone()));
        fields.insert(UPDATED_AT.to_string(), Value::String(now.clone()));

        let data = serde_json::to_string(&fields).context("Failed to encode document")?;

        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, data, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(collection, id) DO UPDATE SET
                data = excluded.data,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(collection.as_str())
        .bind(&id)
        .bind(&data)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await
        .with_context(|| format!("Failed to create document in {}", collection))?;

        Ok(Document { id, fields })
    }

    /// Typed convenience over [`create`](Self::create)
    pub async fn insert<T: Serialize>(
        &self,
        collection: Collection,
        value: &T,
        id: Option<&str>,
    ) -> Result<Document> {
        self.create(collection, to_fields(value)?, id).await
    }

    pub async fn get_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, data
            FROM documents
            WHERE collection = ? AND id = ?
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(self.pool)
        .await
        .with_context(|| format!("Failed to get document {}/{}", collection, id))?;

        row.map(DocumentRow::into_document).transpose()
    }

    /// Fetch and decode a document
    pub async fn find<T: DeserializeOwned>(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<T>> {
        match self.get_by_id(collection, id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Fetch several documents by id; missing ids are skipped.
    pub async fn get_many(&self, collection: Collection, ids: &[String]) -> Result<Vec<Document>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb =
            QueryBuilder::<Sqlite>::new("SELECT id, data FROM documents WHERE collection = ");
        qb.push_bind(collection.as_str());
        qb.push(" AND id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id.clone());
        }
        separated.push_unseparated(")");

        let rows = qb
            .build_query_as::<DocumentRow>()
            .fetch_all(self.pool)
            .await
            .with_context(|| format!("Failed to fetch documents from {}", collection))?;

        rows.into_iter().map(DocumentRow::into_document).collect()
    }

    pub async fn get_all(&self, collection: Collection) -> Result<Vec<Document>> {
        self.query(collection, &Query::new()).await
    }

    pub async fn query(&self, collection: Collection, query: &Query) -> Result<Vec<Document>> {
        let mut qb =
            QueryBuilder::<Sqlite>::new("SELECT id, data FROM documents WHERE collection = ");
        qb.push_bind(collection.as_str());

        for predicate in &query.predicates {
            match predicate {
                Predicate::Eq(field, value) => {
                    qb.push(" AND ").push(field_expr(field)?);
                    match Scalar::from(value) {
                        Scalar::Null => {
                            qb.push(" IS NULL");
                        }
                        scalar => {
                            qb.push(" = ");
                            push_scalar(&mut qb, scalar);
                        }
                    }
                }
                Predicate::In(_, values) if values.is_empty() => {
                    qb.push(" AND 0");
                }
                Predicate::In(field, values) => {
                    qb.push(" AND ").push(field_expr(field)?).push(" IN (");
                    for (i, value) in values.iter().enumerate() {
                        if i > 0 {
                            qb.push(", ");
                        }
                        push_scalar(&mut qb, Scalar::from(value));
                    }
                    qb.push(")");
                }
            }
        }

        match query.order_by {
            Some((field, SortOrder::Asc)) => {
                qb.push(" ORDER BY ").push(field_expr(field)?).push(" ASC, rowid ASC");
            }
            Some((field, SortOrder::Desc)) => {
                qb.push(" ORDER BY ").push(field_expr(field)?).push(" DESC, rowid DESC");
            }
            None => {
                qb.push(" ORDER BY rowid ASC");
            }
        }

        let rows = qb
            .build_query_as::<DocumentRow>()
            .fetch_all(self.pool)
            .await
            .with_context(|| format!("Failed to query {}", collection))?;

        rows.into_iter().map(DocumentRow::into_document).collect()
    }

    /// Query and decode every matching document
    pub async fn query_as<T: DeserializeOwned>(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<T>> {
        self.query(collection, query)
            .await?
            .iter()
            .map(Document::decode)
            .collect()
    }

    /// Count matching documents
    pub async fn count(&self, collection: Collection, query: &Query) -> Result<usize> {
        Ok(self.query(collection, query).await?.len())
    }

    /// Shallow-merge `partial` into an existing document. Returns `None` when
    /// the document does not exist. A null value removes the field.
    pub async fn update(
        &self,
        collection: Collection,
        id: &str,
        partial: Fields,
    ) -> Result<Option<Document>> {
        let Some(mut doc) = self.get_by_id(collection, id).await? else {
            return Ok(None);
        };

        for (key, value) in partial {
            if key == "id" || key == CREATED_AT {
                continue;
            }
            if value.is_null() {
                doc.fields.remove(&key);
            } else {
                doc.fields.insert(key, value);
            }
        }

        let now = timestamp();
        doc.fields
            .insert(UPDATED_AT.to_string(), Value::String(now.clone()));
        let data = serde_json::to_string(&doc.fields).context("Failed to encode document")?;

        let result = sqlx::query(
            r#"
            UPDATE documents
            SET data = ?, updated_at = ?
            WHERE collection = ? AND id = ?
            "#,
        )
        .bind(&data)
        .bind(&now)
        .bind(collection.as_str())
        .bind(id)
        .execute(self.pool)
        .await
        .with_context(|| format!("Failed to update document {}/{}", collection, id))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(doc))
    }

    pub async fn delete(&self, collection: Collection, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection.as_str())
            .bind(id)
            .execute(self.pool)
            .await
            .with_context(|| format!("Failed to delete document {}/{}", collection, id))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete every document matching the query, returning how many went.
    pub async fn delete_where(&self, collection: Collection, query: &Query) -> Result<usize> {
        let docs = self.query(collection, query).await?;
        let mut deleted = 0;
        for doc in docs {
            if self.delete(collection, &doc.id).await? {
                deleted += 1;
            }
        }
        Ok(deleted)
    }
}

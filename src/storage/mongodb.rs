//! MongoDB storage backend using the official MongoDB async driver.
//!
//! Provides `MongoDocumentStore`, a [`DocumentStore`] that compiles a
//! [`QueryDescriptor`] into a native MongoDB `find`: filter document, sort
//! document, projection document, skip and limit.
//!
//! # Feature flag
//!
//! This module is gated behind the `mongodb_backend` feature flag:
//! ```toml
//! [dependencies]
//! observers-rs = { version = "0.1", features = ["mongodb_backend"] }
//! ```
//!
//! # Literal handling
//!
//! Filter literals reach the store as strings. Since documents keep native
//! BSON types (integers, booleans, doubles), an equality literal is matched
//! against every type it could stand for via `$in`: `"25"` matches the string
//! `"25"` and the integer `25`. Range operands that parse as numbers are sent
//! as numbers, everything else as strings.
//!
//! # Population
//!
//! References are resolved with one extra `{_id: {$in: [...]}}` query per
//! populated path, after the page has been fetched. Nested references are
//! resolved the same way on the populated documents, which never carry the
//! version field.

use crate::core::error::StoreError;
use crate::core::filter::{Comparison, Condition, FilterExpression};
use crate::core::query::{
    Document as JsonDocument, Pagination, Populate, Projection, QueryDescriptor, SortDirection,
};
use crate::core::store::{CREATED_AT_FIELD, DocumentStore, ID_FIELD};
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use futures::future::{BoxFuture, FutureExt};
use mongodb::Database;
use mongodb::bson::{Bson, Document, doc};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Conversion helpers
// ---------------------------------------------------------------------------

fn backend(context: &str) -> impl FnOnce(mongodb::error::Error) -> StoreError + '_ {
    move |e| StoreError::Backend(format!("{}: {}", context, e))
}

/// Convert a JSON object into a BSON Document.
fn json_to_document(json: JsonDocument) -> Result<Document, StoreError> {
    match mongodb::bson::to_bson(&Value::Object(json)) {
        Ok(Bson::Document(d)) => Ok(d),
        Ok(_) => Err(StoreError::InvalidDocument(
            "Expected BSON document, got non-object".to_string(),
        )),
        Err(e) => Err(StoreError::InvalidDocument(format!(
            "Failed to convert JSON to BSON: {}",
            e
        ))),
    }
}

/// Convert a BSON Document back into a JSON value.
fn document_to_json(doc: Document) -> Value {
    Bson::Document(doc).into_relaxed_extjson()
}

/// Every BSON value a string literal could stand for
fn literal_variants(value: &str) -> Vec<Bson> {
    let mut variants: Vec<Bson> = vec![Bson::String(value.to_string())];

    match value {
        "true" => variants.push(Bson::Boolean(true)),
        "false" => variants.push(Bson::Boolean(false)),
        _ => {
            if let Ok(i) = value.parse::<i64>() {
                variants.push(Bson::Int64(i));
            }
            if let Ok(f) = value.parse::<f64>()
                && f.is_finite()
            {
                variants.push(Bson::Double(f));
            }
        }
    }

    variants
}

/// Range operand: numeric when the literal is a number
fn range_operand(value: &str) -> Bson {
    if let Ok(i) = value.parse::<i64>() {
        Bson::Int64(i)
    } else if let Ok(f) = value.parse::<f64>()
        && f.is_finite()
    {
        Bson::Double(f)
    } else {
        Bson::String(value.to_string())
    }
}

/// Compile a filter expression into a MongoDB filter document.
pub fn filter_document(filter: &FilterExpression) -> Document {
    let mut out = Document::new();

    for (field, condition) in &filter.fields {
        let compiled = match condition {
            Condition::Equals { value } => {
                let variants = literal_variants(value);
                if variants.len() == 1 {
                    Bson::String(value.clone())
                } else {
                    Bson::Document(doc! { "$in": variants })
                }
            }
            Condition::OneOf { values } => {
                let variants: Vec<Bson> = values.iter().flat_map(|v| literal_variants(v)).collect();
                Bson::Document(doc! { "$in": variants })
            }
            Condition::Range { comparisons } => {
                let mut range = Document::new();
                for Comparison { op, value } in comparisons {
                    range.insert(op.native(), range_operand(value));
                }
                Bson::Document(range)
            }
        };
        out.insert(field.clone(), compiled);
    }

    if !filter.any_of.is_empty() {
        let alternatives: Vec<Bson> = filter
            .any_of
            .iter()
            .map(|m| {
                let field = m.field.as_str();
                Bson::Document(doc! { field: { "$regex": m.pattern.as_str(), "$options": "i" } })
            })
            .collect();
        out.insert("$or", alternatives);
    }

    out
}

/// Compile a sort specification into a MongoDB sort document.
pub fn sort_document(query: &QueryDescriptor) -> Option<Document> {
    if query.sort.is_empty() {
        return None;
    }
    let mut sort = Document::new();
    for key in &query.sort {
        let direction = match key.direction {
            SortDirection::Ascending => 1,
            SortDirection::Descending => -1,
        };
        sort.insert(key.field.clone(), direction);
    }
    Some(sort)
}

/// Compile a projection into a MongoDB projection document.
pub fn projection_document(projection: &Projection) -> Option<Document> {
    let (fields, flag) = match projection {
        Projection::All => return None,
        Projection::Include(fields) => (fields, 1),
        Projection::Exclude(fields) => (fields, 0),
    };
    let mut out = Document::new();
    for field in fields {
        out.insert(field.clone(), flag);
    }
    Some(out)
}

// ---------------------------------------------------------------------------
// MongoDocumentStore
// ---------------------------------------------------------------------------

/// `skip` and `limit` of a page, bounded to what the driver can encode
///
/// Both travel as signed 64-bit integers. A skip beyond `i64::MAX` is
/// clamped; such a page is past the end of any collection and comes back empty.
pub fn page_bounds(pagination: &Pagination) -> (u64, i64) {
    let skip = u64::try_from(pagination.skip())
        .unwrap_or(u64::MAX)
        .min(i64::MAX as u64);
    let limit = i64::try_from(pagination.limit).unwrap_or(i64::MAX);
    (skip, limit)
}

/// Document store backed by MongoDB.
///
/// Collection names map one-to-one to MongoDB collections.
///
/// # Example
///
/// ```rust,ignore
/// use mongodb::Client;
/// use observers::storage::MongoDocumentStore;
///
/// let client = Client::with_uri_str("mongodb://localhost:27017").await?;
/// let store = MongoDocumentStore::new(client.database("observers"));
/// let topics = store.find(&query).await?;
/// ```
#[derive(Clone, Debug)]
pub struct MongoDocumentStore {
    database: Database,
    version_field: String,
}

impl MongoDocumentStore {
    /// Create a new `MongoDocumentStore` with the given database handle.
    pub fn new(database: Database) -> Self {
        Self {
            database,
            version_field: "__v".to_string(),
        }
    }

    /// Name of the version field stamped on inserted documents
    pub fn with_version_field(mut self, field: impl Into<String>) -> Self {
        self.version_field = field.into();
        self
    }

    /// Get a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.database.collection(name)
    }

    /// Replace reference ids at `populate.path` with documents from its collection
    fn populate<'a>(
        &'a self,
        docs: &'a mut [Value],
        populate: &'a Populate,
    ) -> BoxFuture<'a, Result<(), StoreError>> {
        async move {
            let path = populate.path.as_str();
            let ids: Vec<Bson> = docs
                .iter()
                .filter_map(|d| d.get(path))
                .flat_map(|v| match v {
                    Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
                    Value::String(id) => vec![id.as_str()],
                    _ => Vec::new(),
                })
                .map(|id| Bson::String(id.to_string()))
                .collect();
            if ids.is_empty() {
                return Ok(());
            }

            let version_field = self.version_field.as_str();
            let mut referenced: Vec<Value> = self
                .collection(&populate.collection)
                .find(doc! { ID_FIELD: { "$in": ids } })
                .projection(doc! { version_field: 0 })
                .await
                .map_err(backend("Failed to populate references"))?
                .try_collect::<Vec<Document>>()
                .await
                .map_err(backend("Failed to collect populated references"))?
                .into_iter()
                .map(document_to_json)
                .collect();

            for nested in &populate.populate {
                self.populate(&mut referenced, nested).await?;
            }

            let by_id: HashMap<String, Value> = referenced
                .into_iter()
                .filter_map(|d| Some((d.get(ID_FIELD)?.as_str()?.to_string(), d)))
                .collect();
            let resolve = |id: &Value| id.as_str().and_then(|id| by_id.get(id)).cloned();

            for doc in docs.iter_mut() {
                let Some(slot) = doc.get_mut(path) else {
                    continue;
                };
                let populated = match &*slot {
                    Value::Array(items) => Value::Array(items.iter().filter_map(resolve).collect()),
                    Value::String(_) => resolve(&*slot).unwrap_or(Value::Null),
                    _ => continue,
                };
                *slot = populated;
            }

            Ok(())
        }
        .boxed()
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn find(&self, query: &QueryDescriptor) -> Result<Vec<Value>, StoreError> {
        let filter = filter_document(&query.filter);
        tracing::debug!(collection = %query.collection, filter = %filter, "Executing MongoDB find");

        let mut find = self.collection(&query.collection).find(filter);
        if let Some(sort) = sort_document(query) {
            find = find.sort(sort);
        }
        if let Some(projection) = projection_document(&query.projection) {
            find = find.projection(projection);
        }
        if let Some(pagination) = &query.pagination {
            let (skip, limit) = page_bounds(pagination);
            find = find.skip(skip).limit(limit);
        }

        let docs: Vec<Document> = find
            .await
            .map_err(backend("Failed to execute query"))?
            .try_collect()
            .await
            .map_err(backend("Failed to collect query results"))?;

        let mut results: Vec<Value> = docs.into_iter().map(document_to_json).collect();
        for populate in &query.populate {
            self.populate(&mut results, populate).await?;
        }

        Ok(results)
    }

    async fn insert(&self, collection: &str, mut document: JsonDocument) -> Result<Value, StoreError> {
        if !matches!(document.get(ID_FIELD), Some(Value::String(id)) if !id.is_empty()) {
            document.insert(ID_FIELD.to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        document
            .entry(CREATED_AT_FIELD)
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        document
            .entry(self.version_field.clone())
            .or_insert_with(|| Value::from(0));

        let doc = json_to_document(document.clone())?;
        self.collection(collection)
            .insert_one(doc)
            .await
            .map_err(backend("Failed to insert document"))?;

        Ok(Value::Object(document))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        mut changes: JsonDocument,
    ) -> Result<Option<Value>, StoreError> {
        changes.remove(ID_FIELD);
        if changes.is_empty() {
            return self.get(collection, id).await;
        }

        let set = json_to_document(changes)?;
        let result = self
            .collection(collection)
            .update_one(doc! { ID_FIELD: id }, doc! { "$set": set })
            .await
            .map_err(backend("Failed to update document"))?;

        if result.matched_count == 0 {
            return Ok(None);
        }
        self.get(collection, id).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let result = self
            .collection(collection)
            .delete_one(doc! { ID_FIELD: id })
            .await
            .map_err(backend("Failed to delete document"))?;

        Ok(result.deleted_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::{CmpOp, TextMatch};
    use crate::core::query::SortKey;

    #[test]
    fn test_equality_expands_numeric_literal() {
        let mut filter = FilterExpression::new();
        filter.insert("reportCount", Condition::Equals { value: "25".to_string() });
        let compiled = filter_document(&filter);
        assert_eq!(
            compiled,
            doc! { "reportCount": { "$in": [Bson::String("25".to_string()), Bson::Int64(25), Bson::Double(25.0)] } }
        );
    }

    #[test]
    fn test_plain_string_equality() {
        let mut filter = FilterExpression::new();
        filter.insert("category", Condition::Equals { value: "road".to_string() });
        assert_eq!(filter_document(&filter), doc! { "category": "road" });
    }

    #[test]
    fn test_range_uses_native_operators() {
        let mut filter = FilterExpression::new();
        filter.insert(
            "price",
            Condition::Range {
                comparisons: vec![
                    Comparison { op: CmpOp::Gte, value: "100".to_string() },
                    Comparison { op: CmpOp::Lt, value: "2024-01-01".to_string() },
                ],
            },
        );
        assert_eq!(
            filter_document(&filter),
            doc! { "price": { "$gte": 100_i64, "$lt": "2024-01-01" } }
        );
    }

    #[test]
    fn test_search_becomes_or_regex() {
        let mut filter = FilterExpression::new();
        filter.any_of = vec![
            TextMatch { field: "title".to_string(), pattern: "hole".to_string() },
            TextMatch { field: "description".to_string(), pattern: "hole".to_string() },
        ];
        assert_eq!(
            filter_document(&filter),
            doc! { "$or": [
                { "title": { "$regex": "hole", "$options": "i" } },
                { "description": { "$regex": "hole", "$options": "i" } },
            ] }
        );
    }

    #[test]
    fn test_sort_and_projection_documents() {
        let query = QueryDescriptor::new("topics")
            .with_sort(vec![SortKey::desc("createdAt"), SortKey::asc("title")])
            .with_projection(Projection::exclude(["__v"]));
        assert_eq!(sort_document(&query), Some(doc! { "createdAt": -1, "title": 1 }));
        assert_eq!(projection_document(&query.projection), Some(doc! { "__v": 0 }));
        assert_eq!(projection_document(&Projection::All), None);
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(&Pagination::new(3, 20)), (40, 20));

        // a page far past the end still yields encodable options
        let (skip, limit) = page_bounds(&Pagination::new(100_000_000_000_000_000, 1000));
        assert_eq!(skip, i64::MAX as u64);
        assert_eq!(limit, 1000);

        let (skip, limit) = page_bounds(&Pagination::new(usize::MAX, usize::MAX));
        assert_eq!(skip, i64::MAX as u64);
        assert_eq!(limit, i64::MAX);
    }
}

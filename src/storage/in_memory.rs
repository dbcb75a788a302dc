//! In-memory implementation of DocumentStore for testing and development
//!
//! Documents are JSON objects kept in insertion order per collection. Query
//! execution mirrors what a document database does with a descriptor:
//!
//! 1. filter (field conditions AND'ed, search matches OR'ed)
//! 2. sort (stable; missing values sort first ascending)
//! 3. skip / limit
//! 4. projection on top-level fields
//! 5. population of reference fields
//!
//! Filter literals arrive as strings. They are compared against the stored
//! value's type: a numeric field compares numerically when the literal parses
//! as a number, a string field compares lexicographically (which orders
//! RFC 3339 timestamps correctly).

use crate::core::error::StoreError;
use crate::core::filter::{Condition, FilterExpression, TextMatch};
use crate::core::query::{Document, Populate, Projection, QueryDescriptor, SortDirection, SortKey};
use crate::core::store::{CREATED_AT_FIELD, DocumentStore, ID_FIELD};
use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use uuid::Uuid;

type Collection = IndexMap<String, Document>;

/// In-memory document store
///
/// Only collections declared with [`with_collection`](Self::with_collection)
/// exist; queries on anything else fail with
/// [`StoreError::UnknownCollection`]. Uses RwLock for thread-safe access.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
    version_field: String,
}

impl InMemoryDocumentStore {
    /// Create an empty store with no collections
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            version_field: "__v".to_string(),
        }
    }

    /// Declare a collection
    pub fn with_collection(self, name: impl Into<String>) -> Self {
        if let Ok(mut collections) = self.collections.write() {
            collections.entry(name.into()).or_default();
        }
        self
    }

    /// Name of the version field stamped on inserted documents
    pub fn with_version_field(mut self, field: impl Into<String>) -> Self {
        self.version_field = field.into();
        self
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Collection>>, StoreError> {
        self.collections
            .read()
            .map_err(|e| StoreError::Backend(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Collection>>, StoreError> {
        self.collections
            .write()
            .map_err(|e| StoreError::Backend(format!("Failed to acquire write lock: {}", e)))
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find(&self, query: &QueryDescriptor) -> Result<Vec<Value>, StoreError> {
        let collections = self.read()?;
        let collection = collections
            .get(&query.collection)
            .ok_or_else(|| StoreError::UnknownCollection(query.collection.clone()))?;

        let matcher = Matcher::compile(&query.filter)?;
        let mut matched: Vec<&Document> = collection
            .values()
            .filter(|doc| matcher.matches(doc))
            .collect();

        if !query.sort.is_empty() {
            matched.sort_by(|a, b| compare_docs(a, b, &query.sort));
        }

        let page = matched
            .into_iter()
            .skip(query.skip())
            .take(query.limit().unwrap_or(usize::MAX));

        let mut results = Vec::new();
        for doc in page {
            let mut doc = project(doc, &query.projection);
            for populate in &query.populate {
                populate_field(&mut doc, populate, &collections, &self.version_field);
            }
            results.push(Value::Object(doc));
        }

        tracing::debug!(
            collection = %query.collection,
            returned = results.len(),
            "Executed in-memory query"
        );

        Ok(results)
    }

    async fn insert(&self, collection: &str, mut document: Document) -> Result<Value, StoreError> {
        let id = match document.get(ID_FIELD) {
            Some(Value::String(id)) if !id.is_empty() => id.clone(),
            Some(Value::String(_)) | None => Uuid::new_v4().to_string(),
            Some(other) => {
                return Err(StoreError::InvalidDocument(format!(
                    "'{}' must be a string, got {}",
                    ID_FIELD, other
                )));
            }
        };
        document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        document
            .entry(CREATED_AT_FIELD)
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));
        document
            .entry(self.version_field.clone())
            .or_insert_with(|| Value::from(0));

        let mut collections = self.write()?;
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        docs.insert(id, document.clone());

        Ok(Value::Object(document))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: Document,
    ) -> Result<Option<Value>, StoreError> {
        let mut collections = self.write()?;
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;

        let Some(doc) = docs.get_mut(id) else {
            return Ok(None);
        };
        for (field, value) in changes {
            if field == ID_FIELD {
                continue;
            }
            doc.insert(field, value);
        }
        Ok(Some(Value::Object(doc.clone())))
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        let mut collections = self.write()?;
        let docs = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        Ok(docs.shift_remove(id).is_some())
    }
}

// ---------------------------------------------------------------------------
// Filter evaluation
// ---------------------------------------------------------------------------

/// A filter expression with its search patterns compiled once per query
struct Matcher<'a> {
    filter: &'a FilterExpression,
    text: Vec<(&'a str, Regex)>,
}

impl<'a> Matcher<'a> {
    fn compile(filter: &'a FilterExpression) -> Result<Self, StoreError> {
        let text = filter
            .any_of
            .iter()
            .map(|TextMatch { field, pattern }| {
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|re| (field.as_str(), re))
                    .map_err(|e| StoreError::InvalidQuery(format!("bad search pattern: {}", e)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { filter, text })
    }

    fn matches(&self, doc: &Document) -> bool {
        let fields_hold = self
            .filter
            .fields
            .iter()
            .all(|(field, condition)| eval_condition(get_path(doc, field), condition));
        if !fields_hold {
            return false;
        }

        self.text.is_empty()
            || self.text.iter().any(|(field, re)| {
                matches!(get_path(doc, field), Some(Value::String(s)) if re.is_match(s))
            })
    }
}

fn eval_condition(value: Option<&Value>, condition: &Condition) -> bool {
    let Some(value) = value else {
        return false;
    };
    match condition {
        Condition::Equals { value: literal } => equals_literal(value, literal),
        Condition::OneOf { values } => values.iter().any(|literal| equals_literal(value, literal)),
        Condition::Range { comparisons } => comparisons.iter().all(|c| {
            compare_literal(value, &c.value).is_some_and(|ordering| c.op.accepts(ordering))
        }),
    }
}

/// Equality between a stored value and a string literal
///
/// An array matches when any element does.
fn equals_literal(value: &Value, literal: &str) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|item| equals_literal(item, literal)),
        Value::String(s) => s == literal,
        Value::Bool(b) => literal.parse::<bool>().is_ok_and(|l| l == *b),
        Value::Number(_) => compare_literal(value, literal) == Some(Ordering::Equal),
        Value::Null => literal == "null",
        Value::Object(_) => false,
    }
}

/// Order a stored value against a string literal, `None` when incomparable
fn compare_literal(value: &Value, literal: &str) -> Option<Ordering> {
    match value {
        Value::Number(n) => {
            let lhs = n.as_f64()?;
            let rhs = literal.trim().parse::<f64>().ok()?;
            lhs.partial_cmp(&rhs)
        }
        Value::String(s) => Some(s.as_str().cmp(literal)),
        _ => None,
    }
}

fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

fn compare_docs(a: &Document, b: &Document, sort: &[SortKey]) -> Ordering {
    for key in sort {
        let ordering = match (get_path(a, &key.field), get_path(b, &key.field)) {
            (Some(x), Some(y)) => compare_values(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return match key.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
        }
    }
    Ordering::Equal
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

// ---------------------------------------------------------------------------
// Projection and population
// ---------------------------------------------------------------------------

fn project(doc: &Document, projection: &Projection) -> Document {
    let top_level = |fields: &indexmap::IndexSet<String>| -> HashSet<String> {
        fields
            .iter()
            .filter_map(|f| f.split('.').next())
            .map(str::to_string)
            .collect()
    };

    match projection {
        Projection::All => doc.clone(),
        Projection::Include(fields) => {
            let keep = top_level(fields);
            doc.iter()
                .filter(|(k, _)| k.as_str() == ID_FIELD || keep.contains(k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()
        }
        Projection::Exclude(fields) => doc
            .iter()
            .filter(|(k, _)| !fields.contains(k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    }
}

/// Replace the id(s) at `populate.path` with the referenced documents
///
/// Missing references resolve to `null` for a single id and are dropped
/// from arrays. A path removed by the projection is left alone. Populated
/// documents lose their version field and have their own nested references
/// resolved in turn.
fn populate_field(
    doc: &mut Document,
    populate: &Populate,
    collections: &HashMap<String, Collection>,
    version_field: &str,
) {
    let Some(target) = collections.get(&populate.collection) else {
        tracing::warn!(collection = %populate.collection, "Cannot populate from unknown collection");
        return;
    };
    let resolve = |id: &Value| {
        let mut found = id.as_str().and_then(|id| target.get(id)).cloned()?;
        found.remove(version_field);
        for nested in &populate.populate {
            populate_field(&mut found, nested, collections, version_field);
        }
        Some(Value::Object(found))
    };

    let Some(slot) = doc.get_mut(&populate.path) else {
        return;
    };
    let populated = match &*slot {
        Value::Array(ids) => Value::Array(ids.iter().filter_map(resolve).collect()),
        Value::String(_) => resolve(&*slot).unwrap_or(Value::Null),
        _ => return,
    };
    *slot = populated;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::filter::{CmpOp, Comparison};
    use crate::core::query::Pagination;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    async fn seeded() -> InMemoryDocumentStore {
        let store = InMemoryDocumentStore::new()
            .with_collection("topics")
            .with_collection("tags");

        for (id, name) in [("t1", "Red"), ("t2", "blue")] {
            store
                .insert("tags", doc(json!({"_id": id, "name": name})))
                .await
                .unwrap();
        }

        let topics = [
            json!({"_id": "a", "title": "Pot hole", "description": "Deep hole on Main St", "category": "road", "reportCount": 12, "createdAt": "2024-01-03T00:00:00Z", "tags": ["t1"]}),
            json!({"_id": "b", "title": "Broken lamp", "description": "Street light out", "category": "lighting", "reportCount": 3, "createdAt": "2024-01-01T00:00:00Z", "tags": ["t2", "missing"]}),
            json!({"_id": "c", "title": "Graffiti", "description": "On the school wall", "category": "vandalism", "reportCount": 7, "createdAt": "2024-01-02T00:00:00Z", "tags": []}),
        ];
        for topic in topics {
            store.insert("topics", doc(topic)).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_find_all_in_insertion_order() {
        let store = seeded().await;
        let docs = store.find(&QueryDescriptor::new("topics")).await.unwrap();
        let ids: Vec<&str> = docs.iter().filter_map(|d| d["_id"].as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let store = seeded().await;
        let result = store.find(&QueryDescriptor::new("widgets")).await;
        assert!(matches!(result, Err(StoreError::UnknownCollection(_))));
    }

    #[tokio::test]
    async fn test_numeric_range_compares_numbers() {
        let store = seeded().await;
        let mut filter = FilterExpression::new();
        filter.insert(
            "reportCount",
            Condition::Range {
                comparisons: vec![Comparison {
                    op: CmpOp::Gte,
                    value: "7".to_string(),
                }],
            },
        );
        let docs = store
            .find(&QueryDescriptor::new("topics").with_filter(filter))
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn test_equality_and_membership() {
        let store = seeded().await;

        let mut filter = FilterExpression::new();
        filter.insert("category", Condition::Equals { value: "road".to_string() });
        let docs = store
            .find(&QueryDescriptor::new("topics").with_filter(filter))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);

        let mut filter = FilterExpression::new();
        filter.insert(
            "category",
            Condition::OneOf {
                values: vec!["road".to_string(), "lighting".to_string()],
            },
        );
        let docs = store
            .find(&QueryDescriptor::new("topics").with_filter(filter))
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive_or() {
        let store = seeded().await;
        let mut filter = FilterExpression::new();
        filter.any_of = vec![
            TextMatch { field: "title".to_string(), pattern: "LIGHT".to_string() },
            TextMatch { field: "description".to_string(), pattern: "LIGHT".to_string() },
        ];
        let docs = store
            .find(&QueryDescriptor::new("topics").with_filter(filter))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["_id"], "b");
    }

    #[tokio::test]
    async fn test_sort_and_paginate() {
        let store = seeded().await;
        let query = QueryDescriptor::new("topics")
            .with_sort(vec![SortKey::desc("createdAt")])
            .with_pagination(Pagination::new(2, 1));
        let docs = store.find(&query).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["_id"], "c");

        let past_end = QueryDescriptor::new("topics").with_pagination(Pagination::new(9, 10));
        assert!(store.find(&past_end).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_projection_keeps_id() {
        let store = seeded().await;
        let query = QueryDescriptor::new("topics").with_projection(Projection::include(["title"]));
        let docs = store.find(&query).await.unwrap();
        let keys: Vec<&String> = docs[0].as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 2);
        assert!(docs[0].get("_id").is_some());
        assert!(docs[0].get("title").is_some());
    }

    #[tokio::test]
    async fn test_default_projection_hides_version() {
        let store = seeded().await;
        let query = QueryDescriptor::new("topics").with_projection(Projection::exclude(["__v"]));
        let docs = store.find(&query).await.unwrap();
        assert!(docs.iter().all(|d| d.get("__v").is_none()));
    }

    #[tokio::test]
    async fn test_populate_resolves_references() {
        let store = seeded().await;
        let query = QueryDescriptor::new("topics").populate("tags", "tags");
        let docs = store.find(&query).await.unwrap();

        assert_eq!(docs[0]["tags"][0]["name"], "Red");
        // the dangling reference is dropped
        assert_eq!(docs[1]["tags"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_populated_documents_hide_version_field() {
        let store = seeded().await;
        let query = QueryDescriptor::new("topics").populate("tags", "tags");
        let docs = store.find(&query).await.unwrap();

        let tag = docs[0]["tags"][0].as_object().unwrap();
        assert_eq!(tag.get("name"), Some(&json!("Red")));
        assert!(tag.get("__v").is_none());
    }

    #[tokio::test]
    async fn test_nested_populate() {
        let store = InMemoryDocumentStore::new()
            .with_collection("topics")
            .with_collection("reports")
            .with_collection("votes");
        store
            .insert("votes", doc(json!({"_id": "v1", "value": 1})))
            .await
            .unwrap();
        store
            .insert("reports", doc(json!({"_id": "r1", "text": "still there", "votes": ["v1", "gone"]})))
            .await
            .unwrap();
        store
            .insert("topics", doc(json!({"_id": "a", "slug": "pot-hole", "reports": ["r1"]})))
            .await
            .unwrap();

        let query = QueryDescriptor::new("topics").populate_with(
            Populate::new("reports", "reports").with_nested(Populate::new("votes", "votes")),
        );
        let docs = store.find(&query).await.unwrap();

        let report = &docs[0]["reports"][0];
        assert_eq!(report["text"], "still there");
        assert_eq!(report["votes"].as_array().map(Vec::len), Some(1));
        assert_eq!(report["votes"][0]["value"], 1);
        assert!(report["votes"][0].get("__v").is_none());
    }

    #[tokio::test]
    async fn test_insert_assigns_defaults() {
        let store = InMemoryDocumentStore::new().with_collection("reports");
        let created = store
            .insert("reports", doc(json!({"text": "still broken"})))
            .await
            .unwrap();
        assert!(created["_id"].as_str().is_some_and(|id| !id.is_empty()));
        assert!(created["createdAt"].is_string());
        assert_eq!(created["__v"], 0);
    }

    #[tokio::test]
    async fn test_insert_rejects_non_string_id() {
        let store = InMemoryDocumentStore::new().with_collection("reports");
        let result = store.insert("reports", doc(json!({"_id": 5}))).await;
        assert!(matches!(result, Err(StoreError::InvalidDocument(_))));
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = seeded().await;

        let updated = store
            .update("topics", "a", doc(json!({"category": "street", "_id": "zzz"})))
            .await
            .unwrap()
            .expect("document exists");
        assert_eq!(updated["category"], "street");
        assert_eq!(updated["_id"], "a");

        assert!(store.update("topics", "nope", Document::new()).await.unwrap().is_none());

        assert!(store.delete("topics", "a").await.unwrap());
        assert!(!store.delete("topics", "a").await.unwrap());
        let remaining = store.find(&QueryDescriptor::new("topics")).await.unwrap();
        assert!(remaining.iter().all(|d| d["_id"] != "a"));
    }

    #[test]
    fn test_equals_literal_coercion() {
        assert!(equals_literal(&json!(12), "12"));
        assert!(equals_literal(&json!(12.0), "12"));
        assert!(equals_literal(&json!(true), "true"));
        assert!(equals_literal(&json!(["a", "b"]), "b"));
        assert!(!equals_literal(&json!("12"), "012"));
        assert!(!equals_literal(&json!({"a": 1}), "a"));
    }

    #[test]
    fn test_get_path_nested() {
        let d = doc(json!({"location": {"address": "Main St"}}));
        assert_eq!(get_path(&d, "location.address"), Some(&json!("Main St")));
        assert_eq!(get_path(&d, "location.zip"), None);
    }
}

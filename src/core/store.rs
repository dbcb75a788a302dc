//! Document store abstraction
//!
//! The query layer never talks to a database directly. It hands a finished
//! [`QueryDescriptor`] to a [`DocumentStore`], which executes it and returns
//! the matching documents. Type coercion of filter literals, field path
//! validation against a schema and cancellation all belong to the store.

use crate::core::error::StoreError;
use crate::core::query::{Document, QueryDescriptor};
use async_trait::async_trait;
use serde_json::Value;

/// Field holding a document's id
pub const ID_FIELD: &str = "_id";

/// Field holding a document's creation timestamp (RFC 3339)
pub const CREATED_AT_FIELD: &str = "createdAt";

/// Store-level query and persistence API
///
/// Implementations are shared across requests and must be thread-safe.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Execute a list query
    ///
    /// Applies, in order: filter, sort, skip/limit, projection, population.
    /// A page past the end yields an empty list, not an error.
    async fn find(&self, query: &QueryDescriptor) -> Result<Vec<Value>, StoreError>;

    /// Insert a document, assigning `_id`, `createdAt` and the version field when absent
    async fn insert(&self, collection: &str, document: Document) -> Result<Value, StoreError>;

    /// Shallow-merge `changes` into a document, returning the updated document
    async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: Document,
    ) -> Result<Option<Value>, StoreError>;

    /// Delete a document, returning whether it existed
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, StoreError>;
}

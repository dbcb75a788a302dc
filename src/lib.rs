//! # Observers
//!
//! Query translation layer of a community topic-reporting service, with the
//! list endpoints built on top of it.
//!
//! ## Features
//!
//! - **Safe Query Translation**: Untyped query parameters become a bounded, store-agnostic query
//! - **Filtering**: Equality, membership and `gte`/`gt`/`lte`/`lt` range conditions
//! - **Search**: Case-insensitive literal substring search across configured fields
//! - **Sorting, Projection, Pagination**: With per-collection defaults that never fail
//! - **Tag Post-Filter**: Intersection of populated topic tags with requested tags
//! - **Pluggable Stores**: In-memory store included, MongoDB behind `mongodb_backend`
//! - **Configuration-Based**: Query policy per collection via YAML
//!
//! ## Quick Start
//!
//! ```rust
//! use observers::prelude::*;
//!
//! let params = RawParameters::from_query_str("category=road&price[gte]=100&sort=-title,category");
//! let translator = QueryTranslator::new(QueryDefaults::default());
//! let query = translator.translate(QueryDescriptor::new("topics"), &params);
//!
//! assert_eq!(query.sort, vec![SortKey::desc("title"), SortKey::asc("category")]);
//! assert_eq!(query.limit(), Some(100));
//! ```

pub mod config;
pub mod core;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Query Layer ===
    pub use crate::core::{
        filter::{CmpOp, Comparison, Condition, FilterExpression, TextMatch},
        params::{ParamValue, RawParameters},
        query::{
            Document, ItemResponse, ListResponse, Pagination, Populate, Projection,
            QueryDescriptor, SortDirection, SortKey, SortSpecification,
        },
        tags::{TagFilter, Tagged},
        translator::{QueryDefaults, QueryTranslator},
    };

    // === Errors ===
    pub use crate::core::error::{ObserversError, ObserversResult, StoreError};

    // === Storage ===
    pub use crate::core::store::DocumentStore;
    pub use crate::storage::InMemoryDocumentStore;
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoDocumentStore;

    // === Config ===
    pub use crate::config::{CollectionConfig, DefaultsConfig, ObserversConfig};

    // === Server ===
    pub use crate::core::extractors::Params;
    pub use crate::server::{AppState, ServerBuilder};

    // === External dependencies ===
    pub use anyhow::Result;
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Value, json};
}

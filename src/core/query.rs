//! Query descriptors and list response envelopes
//!
//! A [`QueryDescriptor`] is the not-yet-executed form of a list query. It is
//! created per request from a base descriptor for the target collection,
//! refined by the translator stages, handed to a
//! [`DocumentStore`](crate::core::store::DocumentStore) once, then dropped.

use crate::core::filter::FilterExpression;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sort direction of a single key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// One `(field, direction)` pair of a sort specification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Descending,
        }
    }

    /// Parse a single token: a leading `-` means descending
    ///
    /// Stray leading `=` or `+` characters are ignored. Returns `None` when
    /// the remaining field name is empty or not a plain field path.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim().trim_start_matches(['=', '+']);
        let (field, direction) = match token.strip_prefix('-') {
            Some(rest) => (rest, SortDirection::Descending),
            None => (token, SortDirection::Ascending),
        };
        is_field_path(field).then(|| Self {
            field: field.to_string(),
            direction,
        })
    }
}

/// Ordered sequence of sort keys
///
/// Encoded externally as `-createdAt,title`.
pub type SortSpecification = Vec<SortKey>;

/// Parse a comma-separated sort list, dropping invalid tokens
pub fn parse_sort_list(raw: &str) -> SortSpecification {
    raw.split(',').filter_map(SortKey::parse).collect()
}

/// Which fields each returned document carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "fields", rename_all = "lowercase")]
pub enum Projection {
    /// Every field
    All,

    /// Only these fields (the document id is always kept)
    Include(IndexSet<String>),

    /// Every field except these
    Exclude(IndexSet<String>),
}

impl Projection {
    pub fn include<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Include(fields.into_iter().map(Into::into).collect())
    }

    pub fn exclude<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Projection::Exclude(fields.into_iter().map(Into::into).collect())
    }

    /// Whether a top-level field survives this projection
    pub fn keeps(&self, field: &str, id_field: &str) -> bool {
        match self {
            Projection::All => true,
            Projection::Include(fields) => field == id_field || fields.contains(field),
            Projection::Exclude(fields) => !fields.contains(field),
        }
    }

    /// The same projection, widened so that `field` survives it
    pub fn retaining(self, field: &str) -> Self {
        match self {
            Projection::All => Projection::All,
            Projection::Include(mut fields) => {
                fields.insert(field.to_string());
                Projection::Include(fields)
            }
            Projection::Exclude(mut fields) => {
                fields.shift_remove(field);
                if fields.is_empty() {
                    Projection::All
                } else {
                    Projection::Exclude(fields)
                }
            }
        }
    }
}

/// Pagination of a list query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// Page number (starts at 1)
    pub page: usize,

    /// Number of documents per page (at least 1)
    pub limit: usize,
}

impl Pagination {
    /// Create a pagination, raising page and limit to at least 1
    pub fn new(page: usize, limit: usize) -> Self {
        Self {
            page: page.max(1),
            limit: limit.max(1),
        }
    }

    /// Number of documents to skip: `(page - 1) * limit`
    pub fn skip(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Reference field resolved into full documents at execution time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Populate {
    /// Field holding the id (or array of ids) of referenced documents
    pub path: String,

    /// Collection the ids point into
    pub collection: String,

    /// References resolved inside each populated document
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub populate: Vec<Populate>,
}

impl Populate {
    pub fn new(path: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            collection: collection.into(),
            populate: Vec::new(),
        }
    }

    /// Also resolve `nested` inside every document this populates
    pub fn with_nested(mut self, nested: Populate) -> Self {
        self.populate.push(nested);
        self
    }
}

/// Not-yet-executed list query over one collection
///
/// Each translator stage writes exactly one facet. A fresh descriptor from
/// [`QueryDescriptor::new`] matches every document, in store order, with
/// every field, without bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub collection: String,
    pub filter: FilterExpression,
    pub sort: SortSpecification,
    pub projection: Projection,
    pub pagination: Option<Pagination>,
    pub populate: Vec<Populate>,
}

impl QueryDescriptor {
    /// Base (unrestricted) query over a collection
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: FilterExpression::default(),
            sort: Vec::new(),
            projection: Projection::All,
            pagination: None,
            populate: Vec::new(),
        }
    }

    /// Resolve `path` into documents of `collection` when executed
    pub fn populate(mut self, path: impl Into<String>, collection: impl Into<String>) -> Self {
        self.populate.push(Populate::new(path, collection));
        self
    }

    /// Resolve a reference, with its own nested references, when executed
    pub fn populate_with(mut self, populate: Populate) -> Self {
        self.populate.push(populate);
        self
    }

    pub fn with_filter(mut self, filter: FilterExpression) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_sort(mut self, sort: SortSpecification) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_pagination(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    /// Documents to skip (0 when unpaginated)
    pub fn skip(&self) -> usize {
        self.pagination.map(|p| p.skip()).unwrap_or(0)
    }

    /// Maximum documents to return (`None` when unpaginated)
    pub fn limit(&self) -> Option<usize> {
        self.pagination.map(|p| p.limit)
    }
}

/// `{status, results, data: {data: [...]}}` envelope of list endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse<T> {
    pub status: String,
    pub results: usize,
    pub data: DataEnvelope<Vec<T>>,
}

impl<T> ListResponse<T> {
    pub fn success(data: Vec<T>) -> Self {
        Self {
            status: "success".to_string(),
            results: data.len(),
            data: DataEnvelope { data },
        }
    }
}

/// `{status, data: {data: ...}}` envelope of single-document endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ItemResponse<T> {
    pub status: String,
    pub data: DataEnvelope<T>,
}

impl<T> ItemResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data: DataEnvelope { data },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// A stored document
pub type Document = serde_json::Map<String, Value>;

/// Plain field path: `[A-Za-z0-9_]` segments joined by dots
pub(crate) fn is_field_path(field: &str) -> bool {
    !field.is_empty()
        && field.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

//! Translation of raw request parameters into a query descriptor
//!
//! The [`QueryTranslator`] runs five stages in a fixed order:
//!
//! ```text
//! filter -> search -> sort -> limit_fields -> paginate
//! ```
//!
//! Every stage takes the descriptor by value, writes only its own facet and
//! hands it back, so the stages compose as plain function calls. None of them
//! can fail: malformed input degrades to the configured default or to a no-op.
//!
//! # Example
//!
//! ```rust
//! use observers::core::params::RawParameters;
//! use observers::core::query::QueryDescriptor;
//! use observers::core::translator::{QueryDefaults, QueryTranslator};
//!
//! let params = RawParameters::from_query_str("category=road&sort=-title&page=2&limit=10");
//! let translator = QueryTranslator::new(QueryDefaults::default());
//! let query = translator.translate(QueryDescriptor::new("topics"), &params);
//!
//! assert_eq!(query.skip(), 10);
//! assert_eq!(query.limit(), Some(10));
//! ```

use crate::core::filter::{CmpOp, Comparison, Condition, FilterExpression, TextMatch};
use crate::core::params::{ParamValue, RawParameters};
use crate::core::query::{
    Pagination, Projection, QueryDescriptor, SortDirection, SortKey, SortSpecification,
    is_field_path, parse_sort_list,
};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Parameter keys that control the query instead of filtering it
pub const RESERVED_KEYS: &[&str] = &["page", "sort", "limit", "fields", "search", "tags"];

/// Parameter carrying the free-text search term
pub const SEARCH_KEY: &str = "search";

/// Default policies applied when a request leaves a facet unspecified
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryDefaults {
    /// Page size when `limit` is absent or malformed
    pub limit: usize,

    /// Sort order when `sort` is absent or has no valid key
    pub sort: SortSpecification,

    /// Internal version field hidden by the default projection
    pub version_field: String,

    /// Upper bound for `limit`; larger requests are clamped. `None` disables it.
    pub max_limit: Option<usize>,
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            limit: 100,
            sort: vec![SortKey::desc("createdAt")],
            version_field: "__v".to_string(),
            max_limit: Some(1000),
        }
    }
}

/// Stage-wise translator from [`RawParameters`] to a [`QueryDescriptor`]
///
/// Holds only configuration; one translator can serve any number of
/// concurrent requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTranslator {
    defaults: QueryDefaults,
    search_fields: Vec<String>,
}

impl QueryTranslator {
    pub fn new(defaults: QueryDefaults) -> Self {
        Self {
            defaults,
            search_fields: Vec::new(),
        }
    }

    /// Fields the search stage matches against
    ///
    /// Without search fields the search stage is a no-op.
    pub fn with_search_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn defaults(&self) -> &QueryDefaults {
        &self.defaults
    }

    pub fn search_fields(&self) -> &[String] {
        &self.search_fields
    }

    /// Run every stage in order
    pub fn translate(&self, query: QueryDescriptor, raw: &RawParameters) -> QueryDescriptor {
        let query = self.filter(query, raw);
        let query = self.search(query, raw);
        let query = self.sort(query, raw);
        let query = self.limit_fields(query, raw);
        let query = self.paginate(query, raw);

        tracing::debug!(
            collection = %query.collection,
            conditions = query.filter.fields.len(),
            search = !query.filter.any_of.is_empty(),
            skip = query.skip(),
            limit = ?query.limit(),
            "Translated list query"
        );

        query
    }

    /// Stage 1: field filters
    pub fn filter(&self, mut query: QueryDescriptor, raw: &RawParameters) -> QueryDescriptor {
        query.filter.fields = parse_filter(raw).fields;
        query
    }

    /// Stage 2: free-text search, OR'ed across the search fields
    pub fn search(&self, mut query: QueryDescriptor, raw: &RawParameters) -> QueryDescriptor {
        query.filter.any_of = self.parse_search(raw);
        query
    }

    /// Stage 3: sort order
    pub fn sort(&self, mut query: QueryDescriptor, raw: &RawParameters) -> QueryDescriptor {
        query.sort = self.parse_sort(raw);
        query
    }

    /// Stage 4: field projection
    pub fn limit_fields(&self, mut query: QueryDescriptor, raw: &RawParameters) -> QueryDescriptor {
        query.projection = self.parse_projection(raw);
        query
    }

    /// Stage 5: pagination
    pub fn paginate(&self, mut query: QueryDescriptor, raw: &RawParameters) -> QueryDescriptor {
        query.pagination = Some(self.parse_pagination(raw));
        query
    }

    /// Text matches for the `search` term, empty when there is nothing to search
    pub fn parse_search(&self, raw: &RawParameters) -> Vec<TextMatch> {
        let Some(term) = raw.get_str(SEARCH_KEY).map(str::trim) else {
            return Vec::new();
        };
        if term.is_empty() || self.search_fields.is_empty() {
            return Vec::new();
        }

        let pattern = regex::escape(term);
        self.search_fields
            .iter()
            .map(|field| TextMatch {
                field: field.clone(),
                pattern: pattern.clone(),
            })
            .collect()
    }

    /// Sort specification, falling back to the default sort
    pub fn parse_sort(&self, raw: &RawParameters) -> SortSpecification {
        let Some(sort) = raw.get_str("sort") else {
            return self.defaults.sort.clone();
        };

        let keys = parse_sort_list(sort);
        if keys.is_empty() {
            tracing::debug!(sort = %sort, "No valid sort key, using default order");
            return self.defaults.sort.clone();
        }
        keys
    }

    /// Projection, falling back to hiding the version field
    pub fn parse_projection(&self, raw: &RawParameters) -> Projection {
        let default = || Projection::exclude([self.defaults.version_field.clone()]);

        let Some(fields) = raw.get_str("fields") else {
            return default();
        };

        let mut include = IndexSet::new();
        let mut exclude = IndexSet::new();
        for key in parse_sort_list(fields) {
            match key.direction {
                SortDirection::Ascending => include.insert(key.field),
                SortDirection::Descending => exclude.insert(key.field),
            };
        }

        if !include.is_empty() {
            Projection::Include(include)
        } else if !exclude.is_empty() {
            Projection::Exclude(exclude)
        } else {
            tracing::debug!(fields = %fields, "No valid projection field, using default");
            default()
        }
    }

    /// Page and limit, each falling back to its default when malformed
    pub fn parse_pagination(&self, raw: &RawParameters) -> Pagination {
        let page = positive_int(raw, "page").unwrap_or(1);
        let mut limit = positive_int(raw, "limit").unwrap_or(self.defaults.limit);

        if let Some(max) = self.defaults.max_limit
            && limit > max
        {
            tracing::debug!(requested = limit, max, "Clamping page size");
            limit = max;
        }

        Pagination::new(page, limit)
    }
}

/// Field filters of a parameter map
///
/// Reserved keys are skipped. A nested value becomes a range condition built
/// from its recognised operators; a repeated key becomes a membership
/// condition; anything else is an equality. Values are not coerced.
pub fn parse_filter(raw: &RawParameters) -> FilterExpression {
    let mut filter = FilterExpression::new();

    for (key, value) in raw.iter() {
        if RESERVED_KEYS.contains(&key.as_str()) {
            continue;
        }
        if !is_field_path(key) {
            tracing::debug!(key = %key, "Ignoring parameter that is not a field path");
            continue;
        }

        let condition = match value {
            ParamValue::Single(value) => Condition::Equals {
                value: value.clone(),
            },
            ParamValue::Many(values) => Condition::OneOf {
                values: values.clone(),
            },
            ParamValue::Nested(ops) => {
                let comparisons: Vec<Comparison> = ops
                    .iter()
                    .filter_map(|(token, value)| match CmpOp::from_token(token) {
                        Some(op) => Some(Comparison {
                            op,
                            value: value.clone(),
                        }),
                        None => {
                            tracing::debug!(field = %key, operator = %token, "Dropping unsupported operator");
                            None
                        }
                    })
                    .collect();
                if comparisons.is_empty() {
                    continue;
                }
                Condition::Range { comparisons }
            }
        };

        filter.insert(key.clone(), condition);
    }

    filter
}

fn positive_int(raw: &RawParameters, key: &str) -> Option<usize> {
    let value = raw.get_str(key)?;
    match value.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Some(n),
        _ => {
            tracing::debug!(key, value, "Malformed positive integer, using default");
            None
        }
    }
}

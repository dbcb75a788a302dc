//! Tag-intersection post-filter for topic listings
//!
//! Tags are a populated relation, not a field of the topic document, so the
//! filter cannot be expressed in a [`FilterExpression`](crate::core::filter::FilterExpression).
//! It runs in application code over the topics a store query already
//! returned.
//!
//! The store query is paginated before this filter runs, so a page can hold
//! fewer than `limit` topics even when later pages contain more matches.

use crate::core::params::{ParamValue, RawParameters};
use serde_json::Value;
use std::collections::HashSet;

/// Parameter carrying the requested tag groups
pub const TAGS_KEY: &str = "tags";

/// Something that carries tag names
pub trait Tagged {
    /// Names of the tags attached to this item
    fn tag_names(&self) -> Vec<&str>;
}

/// A topic document whose `tags` field was populated with tag documents
///
/// Tags that were not populated (bare ids) carry no name and are skipped.
impl Tagged for Value {
    fn tag_names(&self) -> Vec<&str> {
        match self.get("tags") {
            Some(Value::Array(tags)) => tags
                .iter()
                .filter_map(|tag| match tag {
                    Value::Object(tag) => tag.get("name").and_then(Value::as_str),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Lower-cased set of requested tag names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagFilter {
    names: HashSet<String>,
}

impl TagFilter {
    /// Build a filter from pipe-delimited groups (`"red|blue"`)
    pub fn from_groups<I, S>(groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = groups
            .into_iter()
            .flat_map(|group| {
                group
                    .as_ref()
                    .split('|')
                    .map(|name| name.trim().to_lowercase())
                    .collect::<Vec<_>>()
            })
            .filter(|name| !name.is_empty())
            .collect();
        Self { names }
    }

    /// Remove the `tags` parameter from a request and build a filter from it
    ///
    /// Returns `None` when no tag was requested, so the caller can skip the
    /// post-filter entirely. The parameter is removed in every case, keeping
    /// it out of the field filters.
    pub fn take_from(raw: &mut RawParameters) -> Option<Self> {
        let filter = match raw.remove(TAGS_KEY)? {
            ParamValue::Single(group) => Self::from_groups([group]),
            ParamValue::Many(groups) => Self::from_groups(groups),
            ParamValue::Nested(_) => return None,
        };
        (!filter.is_empty()).then_some(filter)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.to_lowercase())
    }

    /// Whether any tag of `item` is among the requested ones
    pub fn matches<T: Tagged + ?Sized>(&self, item: &T) -> bool {
        item.tag_names().into_iter().any(|name| self.contains(name))
    }

    /// Keep only the items intersecting the requested tags, preserving order
    pub fn retain<T: Tagged>(&self, items: Vec<T>) -> Vec<T> {
        let before = items.len();
        let kept: Vec<T> = items.into_iter().filter(|item| self.matches(item)).collect();
        tracing::debug!(before, after = kept.len(), "Applied tag post-filter");
        kept
    }
}

//! Configuration loading and management
//!
//! Query policy is configuration, not code: the default page size, default
//! sort, hidden version field and limit clamp are global defaults that each
//! collection may override, next to its search fields and populated
//! references.
//!
//! ```yaml
//! defaults:
//!   limit: 100
//!   sort: "-createdAt"
//!   version_field: "__v"
//!   max_limit: 1000
//! collections:
//!   - name: topics
//!     search_fields: [title, description]
//!     populate:
//!       - path: tags
//!         collection: tags
//!       - path: reports
//!         collection: reports
//!         populate:
//!           - path: votes
//!             collection: votes
//!   - name: tags
//!     default_sort: "name"
//! ```

use crate::core::query::{Populate, QueryDescriptor, parse_sort_list};
use crate::core::translator::{QueryDefaults, QueryTranslator};
use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Global query defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Page size when the request does not specify one
    #[serde(default = "default_limit")]
    pub limit: usize,

    /// Sort list when the request does not specify one (e.g. `-createdAt`)
    #[serde(default = "default_sort")]
    pub sort: String,

    /// Internal version field hidden by the default projection
    #[serde(default = "default_version_field")]
    pub version_field: String,

    /// Largest accepted page size; omit or set to null to disable the clamp
    #[serde(default = "default_max_limit")]
    pub max_limit: Option<usize>,
}

fn default_limit() -> usize {
    100
}

fn default_sort() -> String {
    "-createdAt".to_string()
}

fn default_version_field() -> String {
    "__v".to_string()
}

fn default_max_limit() -> Option<usize> {
    Some(1000)
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            limit: default_limit(),
            sort: default_sort(),
            version_field: default_version_field(),
            max_limit: default_max_limit(),
        }
    }
}

/// Configuration for one collection exposed by the list endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Collection name, also its route segment (e.g. "topics")
    pub name: String,

    /// Overrides the global default sort
    #[serde(default)]
    pub default_sort: Option<String>,

    /// Overrides the global default page size
    #[serde(default)]
    pub default_limit: Option<usize>,

    /// Fields matched by the `search` parameter; empty disables search
    #[serde(default)]
    pub search_fields: Vec<String>,

    /// References resolved on every list and get, possibly nested
    #[serde(default)]
    pub populate: Vec<Populate>,
}

impl CollectionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_sort: None,
            default_limit: None,
            search_fields: Vec::new(),
            populate: Vec::new(),
        }
    }
}

/// Complete configuration of the query layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserversConfig {
    #[serde(default)]
    pub defaults: DefaultsConfig,

    pub collections: Vec<CollectionConfig>,
}

impl ObserversConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the translator cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.defaults.limit == 0 {
            bail!("defaults.limit must be at least 1");
        }
        if parse_sort_list(&self.defaults.sort).is_empty() {
            bail!("defaults.sort has no valid sort key: '{}'", self.defaults.sort);
        }

        let mut seen = HashSet::new();
        for collection in &self.collections {
            if !seen.insert(collection.name.as_str()) {
                bail!("Collection '{}' is declared twice", collection.name);
            }
            if let Some(sort) = &collection.default_sort
                && parse_sort_list(sort).is_empty()
            {
                bail!(
                    "Collection '{}' has no valid default sort key: '{}'",
                    collection.name,
                    sort
                );
            }
            if collection.default_limit == Some(0) {
                bail!("Collection '{}' default_limit must be at least 1", collection.name);
            }
        }
        Ok(())
    }

    /// Find a collection configuration
    pub fn collection(&self, name: &str) -> Option<&CollectionConfig> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Translator carrying the policy of a collection
    pub fn translator_for(&self, name: &str) -> Option<QueryTranslator> {
        let collection = self.collection(name)?;
        let sort = collection
            .default_sort
            .as_deref()
            .unwrap_or(&self.defaults.sort);

        let defaults = QueryDefaults {
            limit: collection.default_limit.unwrap_or(self.defaults.limit),
            sort: parse_sort_list(sort),
            version_field: self.defaults.version_field.clone(),
            max_limit: self.defaults.max_limit,
        };

        Some(QueryTranslator::new(defaults).with_search_fields(collection.search_fields.clone()))
    }

    /// Fresh base descriptor of a collection, with its populated references
    pub fn base_query(&self, name: &str) -> Option<QueryDescriptor> {
        let collection = self.collection(name)?;
        Some(
            collection
                .populate
                .iter()
                .cloned()
                .fold(QueryDescriptor::new(name), QueryDescriptor::populate_with),
        )
    }

    /// Default configuration: topics, tags, reports, votes and users
    pub fn default_config() -> Self {
        Self {
            defaults: DefaultsConfig::default(),
            collections: vec![
                CollectionConfig {
                    search_fields: vec!["title".to_string(), "description".to_string()],
                    populate: vec![
                        Populate::new("tags", "tags"),
                        Populate::new("reports", "reports").with_nested(Populate::new("votes", "votes")),
                    ],
                    ..CollectionConfig::new("topics")
                },
                CollectionConfig::new("tags"),
                CollectionConfig::new("reports"),
                CollectionConfig::new("votes"),
                CollectionConfig::new("users"),
            ],
        }
    }
}

impl Default for ObserversConfig {
    fn default() -> Self {
        Self::default_config()
    }
}

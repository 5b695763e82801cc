//! Configuration for magnify.
//!
//! # Example
//!
//! ```
//! use magnify::{EngineKind, MagnifyConfig};
//!
//! let config = MagnifyConfig::from_json_str(r#"{
//!     "default": "typesense",
//!     "typesense": {
//!         "url": "http://localhost:8108",
//!         "api_key": "xyz",
//!         "collection_settings": {
//!             "products": {
//!                 "query_by": "name,description",
//!                 "fields": [{ "name": "name", "type": "string" }]
//!             }
//!         }
//!     }
//! }"#).unwrap();
//!
//! assert_eq!(config.default, EngineKind::Typesense);
//! let typesense = config.typesense.unwrap();
//! assert_eq!(typesense.request_timeout_ms, 30_000);
//! assert_eq!(typesense.collection_settings["products"].query_by.as_deref(), Some("name,description"));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::engines::traits::EngineError;

/// Which backend a [`crate::Magnify`] hands out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Algolia,
    Meilisearch,
    Typesense,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Algolia => write!(f, "algolia"),
            Self::Meilisearch => write!(f, "meilisearch"),
            Self::Typesense => write!(f, "typesense"),
        }
    }
}

/// Top-level configuration.
///
/// Only the engines that are actually used need a section.
#[derive(Debug, Clone, Deserialize)]
pub struct MagnifyConfig {
    /// Engine returned by [`crate::Magnify::engine`]
    #[serde(default = "default_engine")]
    pub default: EngineKind,

    #[serde(default)]
    pub algolia: Option<AlgoliaConfig>,

    #[serde(default)]
    pub meilisearch: Option<MeilisearchConfig>,

    #[serde(default)]
    pub typesense: Option<TypesenseConfig>,
}

/// Algolia application credentials and per-index settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AlgoliaConfig {
    pub app_id: String,
    pub api_key: String,

    /// Overrides both the `-dsn` read host and the write host
    #[serde(default)]
    pub host: Option<String>,

    /// Settings pushed by `sync_index_settings`, keyed by index name
    #[serde(default)]
    pub index_settings: BTreeMap<String, Value>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Meilisearch host and per-index settings.
#[derive(Debug, Clone, Deserialize)]
pub struct MeilisearchConfig {
    #[serde(default = "default_meilisearch_host")]
    pub host: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Settings pushed by `sync_index_settings`, keyed by index uid
    #[serde(default)]
    pub index_settings: BTreeMap<String, Value>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Typesense node and per-collection schema.
#[derive(Debug, Clone, Deserialize)]
pub struct TypesenseConfig {
    #[serde(default = "default_typesense_url")]
    pub url: String,

    pub api_key: String,

    /// Schema used when a collection is created on first use
    #[serde(default)]
    pub collection_settings: BTreeMap<String, CollectionSettings>,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Typesense collection schema plus the fields searched by default
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionSettings {
    /// Comma-separated `query_by` fields
    #[serde(default, alias = "queryBy")]
    pub query_by: Option<String>,

    /// Remaining keys form the collection schema (`fields`, `default_sorting_field`, ...)
    #[serde(flatten)]
    pub schema: Map<String, Value>,
}

fn default_engine() -> EngineKind { EngineKind::Meilisearch }
fn default_meilisearch_host() -> String { "http://127.0.0.1:7700".to_string() }
fn default_typesense_url() -> String { "http://localhost:8108".to_string() }
fn default_connect_timeout_ms() -> u64 { 5_000 }
fn default_request_timeout_ms() -> u64 { 30_000 }

impl Default for MagnifyConfig {
    fn default() -> Self {
        Self {
            default: default_engine(),
            algolia: None,
            meilisearch: None,
            typesense: None,
        }
    }
}

impl MeilisearchConfig {
    /// Config for a Meilisearch host with defaults for everything else
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            api_key: None,
            index_settings: BTreeMap::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl AlgoliaConfig {
    pub fn new(app_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            api_key: api_key.into(),
            host: None,
            index_settings: BTreeMap::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl TypesenseConfig {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            collection_settings: BTreeMap::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl MagnifyConfig {
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        serde_json::from_str(json)
            .map_err(|e| EngineError::Config(format!("invalid configuration: {}", e)))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            EngineError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MagnifyConfig::default();
        assert_eq!(config.default, EngineKind::Meilisearch);
        assert!(config.meilisearch.is_none());
    }

    #[test]
    fn test_meilisearch_defaults() {
        let config = MagnifyConfig::from_json_str(r#"{"meilisearch": {}}"#).unwrap();
        let meili = config.meilisearch.unwrap();
        assert_eq!(meili.host, "http://127.0.0.1:7700");
        assert_eq!(meili.api_key, None);
        assert_eq!(meili.connect_timeout_ms, 5_000);
    }

    #[test]
    fn test_query_by_alias_and_schema_flatten() {
        let settings: CollectionSettings = serde_json::from_str(
            r#"{"queryBy": "title", "fields": [], "default_sorting_field": "rank"}"#,
        )
        .unwrap();
        assert_eq!(settings.query_by.as_deref(), Some("title"));
        assert!(settings.schema.contains_key("fields"));
        assert!(settings.schema.contains_key("default_sorting_field"));
        assert!(!settings.schema.contains_key("queryBy"));
    }

    #[test]
    fn test_algolia_requires_credentials() {
        let err = MagnifyConfig::from_json_str(r#"{"algolia": {"app_id": "APP"}}"#).unwrap_err();
        assert!(matches!(err, EngineError::Config(_)));
    }

    #[test]
    fn test_unknown_engine_rejected() {
        assert!(MagnifyConfig::from_json_str(r#"{"default": "solr"}"#).is_err());
    }

    #[test]
    fn test_engine_kind_display() {
        assert_eq!(EngineKind::Typesense.to_string(), "typesense");
    }
}

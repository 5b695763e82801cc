//! # Magnify
//!
//! Engine-agnostic full-text search for application records.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Query Layer                           │
//! │  • Product::search("shoes").where_in(..).order_by(..)      │
//! │  • Builds a backend-neutral SearchQuery descriptor         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Engine Adapters                          │
//! │  • Algolia, Meilisearch, Typesense                         │
//! │  • Translate filters/sort, return ordered keys             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                    (ordered keys → RecordHydrator)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Hydration                              │
//! │  • Host loads records by key                               │
//! │  • Records reordered to the backend's rank order           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use magnify::{Magnify, MagnifyConfig, MeilisearchConfig, SearchEngineExt, SortDirection};
//! # use magnify::{HydrationError, RecordHydrator, SearchKey, Searchable};
//! # use serde_json::{json, Map, Value};
//! # struct Product { id: i64, name: String }
//! # impl Searchable for Product {
//! #     fn search_index() -> &'static str { "products" }
//! #     fn search_key_value(&self) -> SearchKey { self.id.into() }
//! #     fn to_searchable_object(&self) -> Map<String, Value> {
//! #         json!({ "name": self.name }).as_object().cloned().unwrap_or_default()
//! #     }
//! # }
//! # struct Products;
//! # #[async_trait::async_trait]
//! # impl RecordHydrator<Product> for Products {
//! #     async fn hydrate_by_ids(&self, _: &[SearchKey]) -> Result<Vec<Product>, HydrationError> {
//! #         Ok(Vec::new())
//! #     }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), magnify::EngineError> {
//!     let magnify = Magnify::new(MagnifyConfig {
//!         meilisearch: Some(MeilisearchConfig::new("http://127.0.0.1:7700")),
//!         ..Default::default()
//!     });
//!     let engine = magnify.engine()?;
//!
//!     engine.index(&[Product { id: 1, name: "Red shoe".into() }]).await?;
//!
//!     let page = Product::search("shoes")
//!         .where_in("color", ["red", "blue"])
//!         .order_by("price", SortDirection::Asc)
//!         .paginate(engine.as_ref(), &Products, 1, 20)
//!         .await?;
//!     println!("{} of {} results", page.len(), page.total);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`searchable`]: Record contracts ([`Searchable`], [`RecordHydrator`])
//! - [`search`]: Query builder, filter translators, result assembly
//! - [`engines`]: Backend adapters and the [`Magnify`] registry
//! - [`config`]: Engine configuration
//! - [`commands`]: Operator commands (settings sync)
//! - [`metrics`]: Search and indexing metrics

pub mod commands;
pub mod config;
pub mod engines;
pub mod metrics;
pub mod search;
pub mod searchable;

pub use config::{AlgoliaConfig, CollectionSettings, EngineKind, MagnifyConfig, MeilisearchConfig, TypesenseConfig};
pub use engines::{
    build_engine, AlgoliaEngine, Document, DocumentBatch, DocumentFailure, EngineError, Magnify,
    MeilisearchEngine, SearchEngine, SearchEngineExt, TypesenseEngine, DEFAULT_SEARCH_LIMIT,
};
pub use search::{Builder, Hit, Paginator, QueryValue, SearchQuery, SearchResults, SortDirection};
pub use searchable::{HydrationError, RecordHydrator, SearchKey, Searchable};

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search engine adapters.
//!
//! Every backend implements [`SearchEngine`]. [`Magnify`] builds them from a
//! [`MagnifyConfig`] on first request and hands out shared handles.
//!
//! ```text
//!                    ┌──────────────┐
//!   Builder<R> ─────►│ SearchEngine │◄──── Magnify::engine_for(kind)
//!                    └──────┬───────┘
//!           ┌───────────────┼────────────────┐
//!           ▼               ▼                ▼
//!    AlgoliaEngine  MeilisearchEngine  TypesenseEngine
//!           └───────────────┴────────────────┘
//!                      HttpBackend (reqwest)
//! ```

pub mod algolia;
pub(crate) mod http;
pub mod meilisearch;
pub mod traits;
pub mod typesense;

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

pub use algolia::AlgoliaEngine;
pub use meilisearch::MeilisearchEngine;
pub use traits::{
    Document, DocumentBatch, DocumentFailure, EngineError, SearchEngine, SearchEngineExt,
    DEFAULT_SEARCH_LIMIT,
};
pub use typesense::TypesenseEngine;

use crate::config::{EngineKind, MagnifyConfig};

/// Build the engine of `kind` from its configuration section.
pub fn build_engine(
    kind: EngineKind,
    config: &MagnifyConfig,
) -> Result<Arc<dyn SearchEngine>, EngineError> {
    let missing = || EngineError::Config(format!("no configuration for the {} engine", kind));

    let engine: Arc<dyn SearchEngine> = match kind {
        EngineKind::Algolia => {
            Arc::new(AlgoliaEngine::new(config.algolia.clone().ok_or_else(missing)?)?)
        }
        EngineKind::Meilisearch => {
            Arc::new(MeilisearchEngine::new(config.meilisearch.clone().ok_or_else(missing)?)?)
        }
        EngineKind::Typesense => {
            Arc::new(TypesenseEngine::new(config.typesense.clone().ok_or_else(missing)?)?)
        }
    };
    Ok(engine)
}

/// Engine registry keyed by backend.
///
/// Engines are built lazily and cached, so the Typesense provisioning memo
/// and the HTTP connection pools are shared by every caller.
pub struct Magnify {
    config: MagnifyConfig,
    engines: DashMap<EngineKind, Arc<dyn SearchEngine>>,
}

impl Magnify {
    pub fn new(config: MagnifyConfig) -> Self {
        Self {
            config,
            engines: DashMap::new(),
        }
    }

    pub fn config(&self) -> &MagnifyConfig {
        &self.config
    }

    /// The configured default engine
    pub fn engine(&self) -> Result<Arc<dyn SearchEngine>, EngineError> {
        self.engine_for(self.config.default)
    }

    pub fn engine_for(&self, kind: EngineKind) -> Result<Arc<dyn SearchEngine>, EngineError> {
        if let Some(engine) = self.engines.get(&kind) {
            return Ok(Arc::clone(engine.value()));
        }

        let engine = build_engine(kind, &self.config)?;
        info!(engine = %kind, "Search engine initialized");
        Ok(Arc::clone(
            self.engines.entry(kind).or_insert(engine).value(),
        ))
    }
}

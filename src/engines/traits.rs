use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::search::query_builder::{Builder, SearchQuery};
use crate::search::results::{hydrate_in_order, Paginator, SearchResults};
use crate::searchable::{HydrationError, RecordHydrator, SearchKey, Searchable};

/// Default hit count of a non-paginated search without [`Builder::take`].
pub const DEFAULT_SEARCH_LIMIT: usize = 250;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    #[error("{backend} rejected {operation}: {message}")]
    Indexing {
        backend: &'static str,
        operation: &'static str,
        message: String,
        /// Per-document diagnostics when only part of a batch failed
        failures: Vec<DocumentFailure>,
    },
    #[error("{backend} search failed: {message}")]
    Search {
        backend: &'static str,
        message: String,
    },
    #[error("{capability} is not supported by the {backend} engine")]
    Unsupported {
        backend: &'static str,
        capability: &'static str,
    },
    #[error("{backend} unavailable during {operation}: {message}")]
    BackendUnavailable {
        backend: &'static str,
        operation: &'static str,
        message: String,
    },
    #[error(transparent)]
    Hydration(#[from] HydrationError),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// A document the backend refused
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentFailure {
    pub key: Option<SearchKey>,
    pub message: String,
}

/// Searchable projection of one record
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub key: SearchKey,
    pub fields: Map<String, Value>,
}

/// Documents bound for one index
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentBatch {
    pub index: String,
    /// Document field carrying the key
    pub key_field: String,
    pub documents: Vec<Document>,
}

impl DocumentBatch {
    /// Project records into documents. The index and key field come from the
    /// record type, so one batch always targets one index.
    pub fn from_records<R: Searchable>(records: &[R]) -> Self {
        Self {
            index: R::search_index().to_string(),
            key_field: R::search_key().to_string(),
            documents: records
                .iter()
                .map(|record| Document {
                    key: record.search_key_value(),
                    fields: record.to_searchable_object(),
                })
                .collect(),
        }
    }

    pub fn keys(&self) -> Vec<SearchKey> {
        self.documents.iter().map(|doc| doc.key.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }
}

/// A full-text search backend.
///
/// Implementations translate [`SearchQuery`] into their own grammar and talk
/// to the backend; callers hold `Arc<dyn SearchEngine>` and use the
/// record-typed helpers of [`SearchEngineExt`].
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Backend name used in errors, logs and metrics
    fn name(&self) -> &'static str;

    /// Upsert documents. An empty batch makes no network call.
    async fn update(&self, batch: DocumentBatch) -> Result<(), EngineError>;

    /// Delete documents by key. No keys, no network call.
    async fn delete(&self, index: &str, keys: &[SearchKey]) -> Result<(), EngineError>;

    /// Single search capped at the descriptor's limit.
    async fn search(&self, query: &SearchQuery) -> Result<SearchResults, EngineError>;

    /// Page-scoped search, `page` is 1-based.
    async fn search_page(
        &self,
        query: &SearchQuery,
        page: usize,
        per_page: usize,
    ) -> Result<SearchResults, EngineError>;

    /// Remove every document of an index, keeping the index itself.
    async fn flush(&self, index: &str) -> Result<(), EngineError>;

    /// Push configured index settings to the backend.
    async fn sync_index_settings(&self) -> Result<(), EngineError> {
        Err(EngineError::Unsupported {
            backend: self.name(),
            capability: "index settings sync",
        })
    }
}

/// Record-typed operations on top of any [`SearchEngine`].
#[async_trait]
pub trait SearchEngineExt: SearchEngine {
    /// Index records of one type, keyed by their search key
    async fn index<R: Searchable>(&self, records: &[R]) -> Result<(), EngineError> {
        if records.is_empty() {
            return Ok(());
        }
        self.update(DocumentBatch::from_records(records)).await
    }

    /// Remove records of one type from their index
    async fn remove<R: Searchable>(&self, records: &[R]) -> Result<(), EngineError> {
        if records.is_empty() {
            return Ok(());
        }
        let keys: Vec<SearchKey> = records.iter().map(Searchable::search_key_value).collect();
        self.delete(R::search_index(), &keys).await
    }

    /// Search and hydrate the hits in rank order
    async fn get<R, H>(&self, builder: Builder<R>, hydrator: &H) -> Result<Vec<R>, EngineError>
    where
        R: Searchable,
        H: RecordHydrator<R> + ?Sized,
    {
        let query = builder.into_descriptor();
        let results = self.search(&query).await?;
        hydrate_in_order(&results.keys(), hydrator).await
    }

    /// Search one page and hydrate it in rank order
    async fn paginate<R, H>(
        &self,
        builder: Builder<R>,
        hydrator: &H,
        page: usize,
        per_page: usize,
    ) -> Result<Paginator<R>, EngineError>
    where
        R: Searchable,
        H: RecordHydrator<R> + ?Sized,
    {
        let query = builder.into_descriptor();
        let results = self.search_page(&query, page, per_page).await?;
        let records = hydrate_in_order(&results.keys(), hydrator).await?;
        Ok(Paginator::new(results.total, page, per_page, records))
    }

    /// Flush the index of record type `R`
    async fn flush_records<R: Searchable>(&self) -> Result<(), EngineError> {
        self.flush(R::search_index()).await
    }
}

impl<T: SearchEngine + ?Sized> SearchEngineExt for T {}

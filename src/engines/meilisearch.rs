//! Meilisearch engine.
//!
//! Documents are added with an explicit `primaryKey`, searches use
//! `page`/`hitsPerPage` pagination so the reply carries an exhaustive
//! `totalHits`. Indexes are created implicitly by the first document write;
//! `sync_index_settings` creates configured indexes up front and pushes their
//! settings.
//!
//! Writes are asynchronous in Meilisearch: the reply only carries a
//! `taskUid`. Every write waits on `GET /tasks/{uid}` so a document the
//! backend rejects later surfaces as `Indexing` with its diagnostic.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::http::{HttpBackend, Operation, TaskState};
use super::traits::{DocumentBatch, EngineError, SearchEngine, DEFAULT_SEARCH_LIMIT};
use crate::config::MeilisearchConfig;
use crate::metrics::{self, SearchTimer};
use crate::search::{validate_page, Hit, MeilisearchTranslator, SearchQuery, SearchResults};
use crate::searchable::SearchKey;

const ENGINE: &str = "meilisearch";

pub struct MeilisearchEngine {
    config: MeilisearchConfig,
    http: HttpBackend,
}

impl MeilisearchEngine {
    pub fn new(config: MeilisearchConfig) -> Result<Self, EngineError> {
        let mut headers = HeaderMap::new();
        if let Some(ref key) = config.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key))
                .map_err(|e| EngineError::Config(format!("invalid Meilisearch api key: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = HttpBackend::new(
            ENGINE,
            &config.host,
            headers,
            Duration::from_millis(config.connect_timeout_ms),
            Duration::from_millis(config.request_timeout_ms),
        )?;

        Ok(Self { config, http })
    }

    /// Base search parameters shared by `search` and `search_page`.
    fn search_parameters(query: &SearchQuery) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("q".into(), Value::from(query.query.as_str()));
        if let Some(filter) = MeilisearchTranslator::filter(query) {
            params.insert("filter".into(), Value::from(filter));
        }
        let sort = MeilisearchTranslator::sort(query);
        if !sort.is_empty() {
            params.insert("sort".into(), Value::from(sort));
        }
        if !query.highlight_fields.is_empty() {
            params.insert(
                "attributesToHighlight".into(),
                Value::from(query.highlight_fields.clone()),
            );
        }
        params
    }

    /// Send a write and wait for the task it enqueued.
    async fn write(&self, operation: Operation, request: RequestBuilder) -> Result<(), EngineError> {
        let result = self.send_and_wait(operation, request).await;
        metrics::record_index_operation(ENGINE, operation.as_str(), result.is_ok());
        result
    }

    async fn send_and_wait(
        &self,
        operation: Operation,
        request: RequestBuilder,
    ) -> Result<(), EngineError> {
        let reply = self.http.send_json(operation, request).await?;
        let Some(uid) = reply.get("taskUid").and_then(Value::as_u64) else {
            warn!(operation = operation.as_str(), "Meilisearch write reply without taskUid");
            return Ok(());
        };

        let uid = uid.to_string();
        self.http
            .wait_for_task(operation, &["tasks", &uid], task_state)
            .await
    }

    async fn perform_search(
        &self,
        query: &SearchQuery,
        params: Map<String, Value>,
    ) -> Result<SearchResults, EngineError> {
        let timer = SearchTimer::start(ENGINE);
        let index = query.index_name();
        debug!(index = %index, params = ?params, "Meilisearch search");

        let request = self
            .http
            .request(Method::POST, &["indexes", index, "search"])
            .json(&params);

        match self.http.send_json(Operation::Search, request).await {
            Ok(body) => {
                let results = map_results(&query.key_field, &query.highlight_fields, body);
                timer.finish("success", results.len());
                Ok(results)
            }
            Err(e) => {
                timer.finish("error", 0);
                Err(e)
            }
        }
    }
}

/// Read the state of a `GET /tasks/{uid}` reply.
fn task_state(task: &Value) -> TaskState {
    match task.get("status").and_then(Value::as_str) {
        Some("succeeded") => TaskState::Succeeded,
        Some(status @ ("failed" | "canceled")) => {
            let error = task.get("error");
            let message = error
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("no error details");
            let code = error
                .and_then(|e| e.get("code"))
                .and_then(Value::as_str)
                .unwrap_or(status);
            let uid = task.get("uid").and_then(Value::as_u64).unwrap_or_default();
            TaskState::Failed(format!("task {} {}: {} ({})", uid, status, message, code))
        }
        _ => TaskState::Pending,
    }
}

/// Pull ordered keys, highlights and the hit count out of a search reply.
fn map_results(key_field: &str, highlight_fields: &[String], body: Value) -> SearchResults {
    let hits = body
        .get("hits")
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .filter_map(|hit| {
                    let key = hit.get(key_field).and_then(SearchKey::from_json);
                    if key.is_none() {
                        warn!(key_field = %key_field, "Meilisearch hit without key field");
                    }
                    key.map(|key| (key, hit))
                })
                .enumerate()
                .map(|(rank, (key, hit))| Hit {
                    key,
                    rank,
                    highlights: highlights(hit, highlight_fields),
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let total = body
        .get("totalHits")
        .or_else(|| body.get("estimatedTotalHits"))
        .and_then(Value::as_u64)
        .unwrap_or(hits.len() as u64);

    SearchResults { total, hits, raw: body }
}

fn highlights(hit: &Value, fields: &[String]) -> BTreeMap<String, String> {
    let Some(formatted) = hit.get("_formatted") else {
        return BTreeMap::new();
    };
    fields
        .iter()
        .filter_map(|field| {
            formatted
                .get(field)
                .and_then(Value::as_str)
                .map(|snippet| (field.clone(), snippet.to_string()))
        })
        .collect()
}

#[async_trait]
impl SearchEngine for MeilisearchEngine {
    fn name(&self) -> &'static str {
        ENGINE
    }

    async fn update(&self, batch: DocumentBatch) -> Result<(), EngineError> {
        if batch.is_empty() {
            return Ok(());
        }

        let count = batch.len();
        let documents: Vec<Value> = batch
            .documents
            .into_iter()
            .map(|doc| {
                let mut fields = doc.fields;
                fields.insert(batch.key_field.clone(), doc.key.to_json());
                Value::Object(fields)
            })
            .collect();

        let request = self
            .http
            .request(Method::POST, &["indexes", &batch.index, "documents"])
            .query(&[("primaryKey", batch.key_field.as_str())])
            .json(&documents);

        self.write(Operation::Index, request).await?;

        metrics::record_documents(ENGINE, Operation::Index.as_str(), count);
        debug!(index = %batch.index, count, "Meilisearch documents indexed");
        Ok(())
    }

    async fn delete(&self, index: &str, keys: &[SearchKey]) -> Result<(), EngineError> {
        if keys.is_empty() {
            return Ok(());
        }

        let ids: Vec<Value> = keys.iter().map(SearchKey::to_json).collect();
        let request = self
            .http
            .request(Method::POST, &["indexes", index, "documents", "delete-batch"])
            .json(&ids);

        self.write(Operation::Delete, request).await?;

        metrics::record_documents(ENGINE, Operation::Delete.as_str(), keys.len());
        debug!(index = %index, count = keys.len(), "Meilisearch documents deleted");
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResults, EngineError> {
        query.validate()?;
        if query.is_unsatisfiable() {
            debug!(index = %query.index_name(), "Empty inclusion list, skipping search");
            return Ok(SearchResults::empty());
        }

        let mut params = Self::search_parameters(query);
        params.insert("limit".into(), Value::from(query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT)));
        self.perform_search(query, params).await
    }

    async fn search_page(
        &self,
        query: &SearchQuery,
        page: usize,
        per_page: usize,
    ) -> Result<SearchResults, EngineError> {
        validate_page(page, per_page)?;
        query.validate()?;
        if query.is_unsatisfiable() {
            debug!(index = %query.index_name(), "Empty inclusion list, skipping search");
            return Ok(SearchResults::empty());
        }

        let mut params = Self::search_parameters(query);
        params.insert("page".into(), Value::from(page));
        params.insert("hitsPerPage".into(), Value::from(per_page));
        self.perform_search(query, params).await
    }

    async fn flush(&self, index: &str) -> Result<(), EngineError> {
        let request = self
            .http
            .request(Method::DELETE, &["indexes", index, "documents"]);
        self.write(Operation::Flush, request).await?;

        info!(index = %index, "Meilisearch index flushed");
        Ok(())
    }

    async fn sync_index_settings(&self) -> Result<(), EngineError> {
        if self.config.index_settings.is_empty() {
            debug!("No Meilisearch index settings configured");
            return Ok(());
        }

        for (name, settings) in &self.config.index_settings {
            let create = self
                .http
                .request(Method::POST, &["indexes"])
                .json(&json!({ "uid": name }));
            let reply = self.http.send(Operation::SyncSettings, create).await?;
            if !reply.is_success() && reply.status != StatusCode::CONFLICT {
                metrics::record_index_operation(ENGINE, Operation::SyncSettings.as_str(), false);
                return Err(self.http.rejection(Operation::SyncSettings, &reply));
            }

            let update = self
                .http
                .request(Method::PATCH, &["indexes", name, "settings"])
                .json(settings);
            self.write(Operation::SyncSettings, update).await?;

            info!(index = %name, "Meilisearch index settings synced");
        }
        Ok(())
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Algolia engine.
//!
//! Searches go to the `-dsn` read host, writes to the application host.
//! Records are identified by `objectID`. Algolia pages are 0-based, so the
//! public page number is shifted down by one.
//!
//! Every write answers with a `taskID`; the adapter polls
//! `GET /1/indexes/{index}/task/{taskID}` on the write host until the task
//! is published.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::http::{HttpBackend, Operation, TaskState};
use super::traits::{DocumentBatch, EngineError, SearchEngine, DEFAULT_SEARCH_LIMIT};
use crate::config::AlgoliaConfig;
use crate::metrics::{self, SearchTimer};
use crate::search::{validate_page, AlgoliaTranslator, Hit, SearchQuery, SearchResults};
use crate::searchable::SearchKey;

const ENGINE: &str = "algolia";
const OBJECT_ID: &str = "objectID";

/// Objects per batch request
pub const BATCH_CHUNK_SIZE: usize = 1000;

pub struct AlgoliaEngine {
    config: AlgoliaConfig,
    read: HttpBackend,
    write: HttpBackend,
}

impl AlgoliaEngine {
    pub fn new(config: AlgoliaConfig) -> Result<Self, EngineError> {
        let mut headers = HeaderMap::new();
        headers.insert("x-algolia-application-id", header_value(&config.app_id)?);
        headers.insert("x-algolia-api-key", header_value(&config.api_key)?);

        let (read_host, write_host) = match config.host {
            Some(ref host) => (host.clone(), host.clone()),
            None => (
                format!("https://{}-dsn.algolia.net", config.app_id),
                format!("https://{}.algolia.net", config.app_id),
            ),
        };

        let connect_timeout = Duration::from_millis(config.connect_timeout_ms);
        let request_timeout = Duration::from_millis(config.request_timeout_ms);
        let read = HttpBackend::new(ENGINE, &read_host, headers.clone(), connect_timeout, request_timeout)?;
        let write = HttpBackend::new(ENGINE, &write_host, headers, connect_timeout, request_timeout)?;

        Ok(Self { config, read, write })
    }

    fn search_parameters(query: &SearchQuery, page: usize, hits_per_page: usize) -> Map<String, Value> {
        if !query.orders.is_empty() {
            debug!(
                index = %query.index_name(),
                orders = query.orders.len(),
                "Algolia sorts through replica indices, ignoring order clauses"
            );
        }

        let mut params = Map::new();
        params.insert("query".into(), Value::from(query.query.as_str()));
        params.insert("page".into(), Value::from(page));
        params.insert("hitsPerPage".into(), Value::from(hits_per_page));
        if let Some(filters) = AlgoliaTranslator::filter(query) {
            params.insert("filters".into(), Value::from(filters));
        }
        if !query.highlight_fields.is_empty() {
            params.insert(
                "attributesToHighlight".into(),
                Value::from(query.highlight_fields.clone()),
            );
        }
        params
    }

    async fn perform_search(
        &self,
        query: &SearchQuery,
        params: Map<String, Value>,
    ) -> Result<SearchResults, EngineError> {
        let timer = SearchTimer::start(ENGINE);
        let index = query.index_name();
        debug!(index = %index, params = ?params, "Algolia search");

        let request = self
            .read
            .request(Method::POST, &["1", "indexes", index, "query"])
            .json(&params);

        match self.read.send_json(Operation::Search, request).await {
            Ok(body) => {
                let results = map_results(&query.highlight_fields, body);
                timer.finish("success", results.len());
                Ok(results)
            }
            Err(e) => {
                timer.finish("error", 0);
                Err(e)
            }
        }
    }

    /// Send batch requests in chunks of [`BATCH_CHUNK_SIZE`].
    async fn batch(
        &self,
        operation: Operation,
        index: &str,
        requests: Vec<Value>,
    ) -> Result<(), EngineError> {
        for chunk in requests.chunks(BATCH_CHUNK_SIZE) {
            let request = self
                .write
                .request(Method::POST, &["1", "indexes", index, "batch"])
                .json(&json!({ "requests": chunk }));
            self.write_and_wait(operation, index, request).await?;
        }
        Ok(())
    }

    /// Send a write and wait until its task is published.
    async fn write_and_wait(
        &self,
        operation: Operation,
        index: &str,
        request: RequestBuilder,
    ) -> Result<(), EngineError> {
        let result = self.send_and_wait(operation, index, request).await;
        metrics::record_index_operation(ENGINE, operation.as_str(), result.is_ok());
        result
    }

    async fn send_and_wait(
        &self,
        operation: Operation,
        index: &str,
        request: RequestBuilder,
    ) -> Result<(), EngineError> {
        let reply = self.write.send_json(operation, request).await?;
        let Some(task_id) = reply.get("taskID").and_then(Value::as_u64) else {
            warn!(index = %index, operation = operation.as_str(), "Algolia write reply without taskID");
            return Ok(());
        };

        let task_id = task_id.to_string();
        self.write
            .wait_for_task(operation, &["1", "indexes", index, "task", &task_id], task_state)
            .await
    }
}

/// Read the state of a task status reply.
fn task_state(task: &Value) -> TaskState {
    match task.get("status").and_then(Value::as_str) {
        Some("published") => TaskState::Succeeded,
        Some("notPublished") => TaskState::Pending,
        status => {
            let message = task
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| format!("task status {}", status.unwrap_or("missing")));
            TaskState::Failed(message)
        }
    }
}

fn header_value(value: &str) -> Result<HeaderValue, EngineError> {
    HeaderValue::from_str(value)
        .map_err(|e| EngineError::Config(format!("invalid Algolia credentials: {}", e)))
}

fn update_request(key_field: &str, key: &SearchKey, mut fields: Map<String, Value>) -> Value {
    fields.insert(key_field.to_string(), key.to_json());
    fields.insert(OBJECT_ID.into(), Value::from(key.canonical().into_owned()));
    json!({ "action": "updateObject", "body": fields })
}

fn delete_request(key: &SearchKey) -> Value {
    json!({ "action": "deleteObject", "body": { OBJECT_ID: key.canonical() } })
}

fn map_results(highlight_fields: &[String], body: Value) -> SearchResults {
    let hits: Vec<Hit> = body
        .get("hits")
        .and_then(Value::as_array)
        .map(|hits| {
            hits.iter()
                .filter_map(|hit| {
                    let key = hit.get(OBJECT_ID).and_then(SearchKey::from_json);
                    if key.is_none() {
                        warn!("Algolia hit without objectID");
                    }
                    key.map(|key| (key, highlights(hit, highlight_fields)))
                })
                .enumerate()
                .map(|(rank, (key, highlights))| Hit { key, rank, highlights })
                .collect()
        })
        .unwrap_or_default();

    let total = body
        .get("nbHits")
        .and_then(Value::as_u64)
        .unwrap_or(hits.len() as u64);

    SearchResults { total, hits, raw: body }
}

fn highlights(hit: &Value, fields: &[String]) -> BTreeMap<String, String> {
    let Some(result) = hit.get("_highlightResult") else {
        return BTreeMap::new();
    };
    fields
        .iter()
        .filter_map(|field| {
            result
                .get(field)
                .and_then(|h| h.get("value"))
                .and_then(Value::as_str)
                .map(|value| (field.clone(), value.to_string()))
        })
        .collect()
}

#[async_trait]
impl SearchEngine for AlgoliaEngine {
    fn name(&self) -> &'static str {
        ENGINE
    }

    async fn update(&self, batch: DocumentBatch) -> Result<(), EngineError> {
        if batch.is_empty() {
            return Ok(());
        }

        let count = batch.len();
        let requests: Vec<Value> = batch
            .documents
            .into_iter()
            .map(|doc| update_request(&batch.key_field, &doc.key, doc.fields))
            .collect();

        self.batch(Operation::Index, &batch.index, requests).await?;
        metrics::record_documents(ENGINE, Operation::Index.as_str(), count);
        debug!(index = %batch.index, count, "Algolia objects saved");
        Ok(())
    }

    async fn delete(&self, index: &str, keys: &[SearchKey]) -> Result<(), EngineError> {
        if keys.is_empty() {
            return Ok(());
        }

        let requests: Vec<Value> = keys.iter().map(delete_request).collect();
        self.batch(Operation::Delete, index, requests).await?;
        metrics::record_documents(ENGINE, Operation::Delete.as_str(), keys.len());
        debug!(index = %index, count = keys.len(), "Algolia objects deleted");
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResults, EngineError> {
        query.validate()?;
        if query.is_unsatisfiable() {
            debug!(index = %query.index_name(), "Empty inclusion list, skipping search");
            return Ok(SearchResults::empty());
        }

        let params = Self::search_parameters(query, 0, query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT));
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

        let params = Self::search_parameters(query, page - 1, per_page);
        self.perform_search(query, params).await
    }

    async fn flush(&self, index: &str) -> Result<(), EngineError> {
        let request = self
            .write
            .request(Method::POST, &["1", "indexes", index, "clear"]);
        self.write_and_wait(Operation::Flush, index, request).await?;

        info!(index = %index, "Algolia index cleared");
        Ok(())
    }

    async fn sync_index_settings(&self) -> Result<(), EngineError> {
        if self.config.index_settings.is_empty() {
            debug!("No Algolia index settings configured");
            return Ok(());
        }

        for (index, settings) in &self.config.index_settings {
            let request = self
                .write
                .request(Method::PUT, &["1", "indexes", index, "settings"])
                .json(settings);
            self.write_and_wait(Operation::SyncSettings, index, request).await?;

            info!(index = %index, "Algolia index settings synced");
        }
        Ok(())
    }
}

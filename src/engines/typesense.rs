// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Typesense engine.
//!
//! Typesense needs a collection to exist before documents or searches can
//! reach it. The engine checks for the collection on first use and creates
//! it from the configured [`CollectionSettings`] when it is missing:
//!
//! ```text
//! GET /collections/{c}
//!   ├─ 200 ──────────────────────────────► memoise
//!   └─ 404 ─► POST /collections (schema)
//!               ├─ 2xx ──────────────────► memoise
//!               └─ 409 (created by a peer) ► memoise
//! ```
//!
//! Documents always carry `id` set to the canonical key, since Typesense only
//! accepts string ids. A search asks for at most [`MAX_PER_PAGE`] hits;
//! larger limits are rejected before any request is sent.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashSet;
use futures::future::try_join_all;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::http::{HttpBackend, Operation};
use super::traits::{DocumentBatch, DocumentFailure, EngineError, SearchEngine, DEFAULT_SEARCH_LIMIT};
use crate::config::{CollectionSettings, TypesenseConfig};
use crate::metrics::{self, SearchTimer};
use crate::search::{validate_page, Hit, SearchQuery, SearchResults, TypesenseTranslator};
use crate::searchable::SearchKey;

const ENGINE: &str = "typesense";
const API_KEY_HEADER: &str = "x-typesense-api-key";

/// Largest `per_page` Typesense accepts
pub const MAX_PER_PAGE: usize = 250;

pub struct TypesenseEngine {
    config: TypesenseConfig,
    http: HttpBackend,
    /// Collections known to exist
    provisioned: DashSet<String>,
}

impl TypesenseEngine {
    pub fn new(config: TypesenseConfig) -> Result<Self, EngineError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&config.api_key)
            .map_err(|e| EngineError::Config(format!("invalid Typesense api key: {}", e)))?;
        headers.insert(API_KEY_HEADER, key);

        let http = HttpBackend::new(
            ENGINE,
            &config.url,
            headers,
            Duration::from_millis(config.connect_timeout_ms),
            Duration::from_millis(config.request_timeout_ms),
        )?;

        Ok(Self {
            config,
            http,
            provisioned: DashSet::new(),
        })
    }

    fn settings(&self, collection: &str) -> Option<&CollectionSettings> {
        self.config.collection_settings.get(collection)
    }

    /// Make sure `collection` exists, creating it from its configured schema.
    pub async fn ensure_collection(&self, collection: &str) -> Result<(), EngineError> {
        if self.provisioned.contains(collection) {
            return Ok(());
        }

        let lookup = self
            .http
            .request(Method::GET, &["collections", collection]);
        let reply = self.http.send(Operation::Provision, lookup).await?;

        if reply.is_success() {
            debug!(collection = %collection, "Typesense collection exists");
            self.provisioned.insert(collection.to_string());
            return Ok(());
        }
        if reply.status != StatusCode::NOT_FOUND {
            metrics::record_index_operation(ENGINE, Operation::Provision.as_str(), false);
            return Err(self.http.rejection(Operation::Provision, &reply));
        }

        let settings = self.settings(collection).ok_or_else(|| {
            EngineError::Config(format!(
                "no collection_settings for Typesense collection '{}'",
                collection
            ))
        })?;
        let mut schema = settings.schema.clone();
        schema.insert("name".into(), Value::from(collection));

        let create = self.http.request(Method::POST, &["collections"]).json(&schema);
        let reply = self.http.send(Operation::Provision, create).await?;

        if reply.status == StatusCode::CONFLICT {
            debug!(collection = %collection, "Typesense collection created concurrently");
        } else if !reply.is_success() {
            metrics::record_index_operation(ENGINE, Operation::Provision.as_str(), false);
            return Err(self.http.rejection(Operation::Provision, &reply));
        } else {
            info!(collection = %collection, "Typesense collection created");
        }

        metrics::record_index_operation(ENGINE, Operation::Provision.as_str(), true);
        self.provisioned.insert(collection.to_string());
        Ok(())
    }

    fn query_by(&self, collection: &str) -> Result<String, EngineError> {
        self.settings(collection)
            .and_then(|settings| settings.query_by.clone())
            .ok_or_else(|| {
                EngineError::Config(format!(
                    "no query_by configured for Typesense collection '{}'",
                    collection
                ))
            })
    }

    fn search_parameters(
        query: &SearchQuery,
        query_by: String,
        page: usize,
        per_page: usize,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("q", query.query.clone()),
            ("query_by", query_by),
            ("page", page.to_string()),
            ("per_page", per_page.to_string()),
            ("highlight_start_tag", "<mark>".to_string()),
            ("highlight_end_tag", "</mark>".to_string()),
            ("snippet_threshold", "30".to_string()),
            ("highlight_affix_num_tokens", "4".to_string()),
            ("exhaustive_search", "false".to_string()),
            ("use_cache", "false".to_string()),
            ("prioritize_exact_match", "true".to_string()),
            ("enable_overrides", "true".to_string()),
        ];
        if let Some(filter) = TypesenseTranslator::filter(query) {
            params.push(("filter_by", filter));
        }
        if let Some(sort) = TypesenseTranslator::sort(query) {
            params.push(("sort_by", sort));
        }
        if !query.highlight_fields.is_empty() {
            params.push(("highlight_fields", query.highlight_fields.join(",")));
        }
        params
    }

    async fn perform_search(
        &self,
        query: &SearchQuery,
        page: usize,
        per_page: usize,
    ) -> Result<SearchResults, EngineError> {
        let collection = query.index_name();
        let query_by = self.query_by(collection)?;
        self.ensure_collection(collection).await?;

        let timer = SearchTimer::start(ENGINE);
        let params = Self::search_parameters(query, query_by, page, per_page);
        debug!(collection = %collection, params = ?params, "Typesense search");

        let request = self
            .http
            .request(Method::GET, &["collections", collection, "documents", "search"])
            .query(&params);

        match self.http.send_json(Operation::Search, request).await {
            Ok(body) => {
                let results = map_results(&query.key_field, body);
                timer.finish("success", results.len());
                Ok(results)
            }
            Err(e) => {
                timer.finish("error", 0);
                Err(e)
            }
        }
    }

    async fn delete_one(&self, collection: &str, key: &SearchKey) -> Result<(), EngineError> {
        let key = key.canonical();
        let request = self
            .http
            .request(Method::DELETE, &["collections", collection, "documents", &key]);
        let reply = self.http.send(Operation::Delete, request).await?;
        if reply.is_success() || reply.status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(self.http.rejection(Operation::Delete, &reply))
        }
    }
}

fn check_per_page(per_page: usize) -> Result<(), EngineError> {
    if per_page > MAX_PER_PAGE {
        return Err(EngineError::InvalidQuery(format!(
            "Typesense returns at most {} hits per request, {} requested",
            MAX_PER_PAGE, per_page
        )));
    }
    Ok(())
}

/// JSONL import body. Every document gets `id` = canonical key next to its
/// own key field.
fn import_body(batch: &DocumentBatch) -> Result<String, EngineError> {
    let mut lines = Vec::with_capacity(batch.len());
    for doc in &batch.documents {
        let mut fields = doc.fields.clone();
        fields.insert(batch.key_field.clone(), doc.key.to_json());
        fields.insert("id".into(), Value::from(doc.key.canonical().into_owned()));
        let line = serde_json::to_string(&fields).map_err(|e| EngineError::Indexing {
            backend: ENGINE,
            operation: Operation::Index.as_str(),
            message: format!("failed to encode document {}: {}", doc.key, e),
            failures: Vec::new(),
        })?;
        lines.push(line);
    }
    Ok(lines.join("\n"))
}

/// Collect the failed lines of an import reply. Line `n` reports on
/// document `n` of the batch.
fn import_failures(keys: &[SearchKey], body: &str) -> Vec<DocumentFailure> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .enumerate()
        .filter_map(|(position, line)| {
            let result: Value = match serde_json::from_str(line) {
                Ok(value) => value,
                Err(_) => {
                    return Some(DocumentFailure {
                        key: keys.get(position).cloned(),
                        message: format!("unreadable import result: {}", line),
                    })
                }
            };
            if result.get("success").and_then(Value::as_bool) == Some(true) {
                return None;
            }
            Some(DocumentFailure {
                key: keys.get(position).cloned(),
                message: result
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown import error")
                    .to_string(),
            })
        })
        .collect()
}

fn map_results(key_field: &str, body: Value) -> SearchResults {
    let mut raw_hits: Vec<&Value> = Vec::new();
    if let Some(groups) = body.get("grouped_hits").and_then(Value::as_array) {
        for group in groups {
            if let Some(hits) = group.get("hits").and_then(Value::as_array) {
                raw_hits.extend(hits);
            }
        }
    } else if let Some(hits) = body.get("hits").and_then(Value::as_array) {
        raw_hits.extend(hits);
    }

    let hits: Vec<Hit> = raw_hits
        .into_iter()
        .filter_map(|hit| {
            let document = hit.get("document")?;
            let key = document
                .get(key_field)
                .or_else(|| document.get("id"))
                .and_then(SearchKey::from_json);
            if key.is_none() {
                warn!(key_field = %key_field, "Typesense hit without key field");
            }
            key.map(|key| (key, highlights(hit)))
        })
        .enumerate()
        .map(|(rank, (key, highlights))| Hit { key, rank, highlights })
        .collect();

    let total = body
        .get("found")
        .and_then(Value::as_u64)
        .unwrap_or(hits.len() as u64);

    SearchResults { total, hits, raw: body }
}

fn highlights(hit: &Value) -> BTreeMap<String, String> {
    hit.get("highlights")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let field = entry.get("field")?.as_str()?;
                    let snippet = entry.get("snippet")?.as_str()?;
                    Some((field.to_string(), snippet.to_string()))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl SearchEngine for TypesenseEngine {
    fn name(&self) -> &'static str {
        ENGINE
    }

    async fn update(&self, batch: DocumentBatch) -> Result<(), EngineError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.ensure_collection(&batch.index).await?;

        let body = import_body(&batch)?;
        let request = self
            .http
            .request(Method::POST, &["collections", &batch.index, "documents", "import"])
            .query(&[("action", "upsert")])
            .header(CONTENT_TYPE, "text/plain")
            .body(body);

        let reply = self.http.send(Operation::Index, request).await?;
        if !reply.is_success() {
            metrics::record_index_operation(ENGINE, Operation::Index.as_str(), false);
            return Err(self.http.rejection(Operation::Index, &reply));
        }

        let failures = import_failures(&batch.keys(), &reply.body);
        if !failures.is_empty() {
            warn!(
                collection = %batch.index,
                failed = failures.len(),
                count = batch.len(),
                "Typesense import partially failed"
            );
            metrics::record_index_operation(ENGINE, Operation::Index.as_str(), false);
            return Err(EngineError::Indexing {
                backend: ENGINE,
                operation: Operation::Index.as_str(),
                message: format!("{} of {} documents failed to import", failures.len(), batch.len()),
                failures,
            });
        }

        metrics::record_index_operation(ENGINE, Operation::Index.as_str(), true);
        metrics::record_documents(ENGINE, Operation::Index.as_str(), batch.len());
        debug!(collection = %batch.index, count = batch.len(), "Typesense documents imported");
        Ok(())
    }

    async fn delete(&self, index: &str, keys: &[SearchKey]) -> Result<(), EngineError> {
        if keys.is_empty() {
            return Ok(());
        }

        let result = try_join_all(keys.iter().map(|key| self.delete_one(index, key))).await;
        metrics::record_index_operation(ENGINE, Operation::Delete.as_str(), result.is_ok());
        result?;

        metrics::record_documents(ENGINE, Operation::Delete.as_str(), keys.len());
        debug!(collection = %index, count = keys.len(), "Typesense documents deleted");
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<SearchResults, EngineError> {
        query.validate()?;
        if query.is_unsatisfiable() {
            debug!(collection = %query.index_name(), "Empty inclusion list, skipping search");
            return Ok(SearchResults::empty());
        }
        let limit = query.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
        check_per_page(limit)?;
        self.perform_search(query, 1, limit).await
    }

    async fn search_page(
        &self,
        query: &SearchQuery,
        page: usize,
        per_page: usize,
    ) -> Result<SearchResults, EngineError> {
        validate_page(page, per_page)?;
        check_per_page(per_page)?;
        query.validate()?;
        if query.is_unsatisfiable() {
            debug!(collection = %query.index_name(), "Empty inclusion list, skipping search");
            return Ok(SearchResults::empty());
        }
        self.perform_search(query, page, per_page).await
    }

    async fn flush(&self, index: &str) -> Result<(), EngineError> {
        let request = self
            .http
            .request(Method::DELETE, &["collections", index, "documents"])
            .query(&[("truncate", "true")]);

        let reply = self.http.send(Operation::Flush, request).await?;
        if reply.status == StatusCode::NOT_FOUND {
            debug!(collection = %index, "Typesense collection absent, nothing to flush");
            return Ok(());
        }
        if !reply.is_success() {
            metrics::record_index_operation(ENGINE, Operation::Flush.as_str(), false);
            return Err(self.http.rejection(Operation::Flush, &reply));
        }

        metrics::record_index_operation(ENGINE, Operation::Flush.as_str(), true);
        info!(collection = %index, "Typesense collection flushed");
        Ok(())
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for magnify.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `magnify_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `engine`: algolia, meilisearch, typesense
//! - `operation`: index, delete, flush, sync_settings, provision
//! - `status`: success, error, skipped

use metrics::{counter, histogram};
use std::time::{Duration, Instant};

/// Record a search request and its outcome
pub fn record_search_query(engine: &str, status: &str) {
    counter!(
        "magnify_search_queries_total",
        "engine" => engine.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record search latency
pub fn record_search_latency(engine: &str, duration: Duration) {
    histogram!(
        "magnify_search_seconds",
        "engine" => engine.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record number of hits a search returned
pub fn record_search_results(count: usize) {
    histogram!("magnify_search_results").record(count as f64);
}

/// Record an index lifecycle operation
pub fn record_index_operation(engine: &str, operation: &str, success: bool) {
    counter!(
        "magnify_index_operations_total",
        "engine" => engine.to_string(),
        "operation" => operation.to_string(),
        "status" => if success { "success" } else { "error" }
    )
    .increment(1);
}

/// Record documents written or deleted
pub fn record_documents(engine: &str, operation: &str, count: usize) {
    counter!(
        "magnify_documents_total",
        "engine" => engine.to_string(),
        "operation" => operation.to_string()
    )
    .increment(count as u64);
}

/// Timer that records search latency on completion
pub struct SearchTimer {
    engine: &'static str,
    start: Instant,
}

impl SearchTimer {
    pub fn start(engine: &'static str) -> Self {
        Self {
            engine,
            start: Instant::now(),
        }
    }

    /// Record the outcome and latency of the search
    pub fn finish(self, status: &str, hits: usize) {
        record_search_query(self.engine, status);
        record_search_latency(self.engine, self.start.elapsed());
        if status == "success" {
            record_search_results(hits);
        }
    }
}

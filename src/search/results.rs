// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search results and pagination assembly.
//!
//! Engines return [`SearchResults`]: ordered hit keys plus the raw backend
//! response. Hydration resolves those keys into records, and
//! [`reorder_by_keys`] puts the records back into rank order because the
//! hydrator may answer in storage order.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;
use tracing::debug;

use crate::engines::traits::EngineError;
use crate::searchable::{RecordHydrator, SearchKey, Searchable};

/// One matched document
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub key: SearchKey,
    /// Zero-based position in the backend's ranking
    pub rank: usize,
    /// Highlighted snippet per requested field
    pub highlights: BTreeMap<String, String>,
}

/// Backend-native search outcome, normalised to ordered keys
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    /// Best available hit count from the backend. May be approximate.
    pub total: u64,
    pub hits: Vec<Hit>,
    /// Response body as returned by the backend
    pub raw: Value,
}

impl SearchResults {
    pub fn empty() -> Self {
        Self {
            total: 0,
            hits: Vec::new(),
            raw: Value::Null,
        }
    }

    /// Hit keys in rank order
    pub fn keys(&self) -> Vec<SearchKey> {
        self.hits.iter().map(|hit| hit.key.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }
}

/// One page of hydrated records
#[derive(Debug, Clone, PartialEq)]
pub struct Paginator<R> {
    /// Best available total, potentially approximate
    pub total: u64,
    /// 1-based page number that was requested
    pub page: usize,
    pub per_page: usize,
    /// Records in rank order
    pub records: Vec<R>,
}

impl<R> Paginator<R> {
    pub fn new(total: u64, page: usize, per_page: usize, records: Vec<R>) -> Self {
        Self {
            total,
            page,
            per_page,
            records,
        }
    }

    /// Number of the last page (at least 1)
    pub fn last_page(&self) -> usize {
        let per_page = self.per_page.max(1) as u64;
        (self.total.div_ceil(per_page)).max(1) as usize
    }

    pub fn has_more(&self) -> bool {
        self.page < self.last_page()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

impl<R> IntoIterator for Paginator<R> {
    type Item = R;
    type IntoIter = std::vec::IntoIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Reject page numbers and sizes below 1.
pub fn validate_page(page: usize, per_page: usize) -> Result<(), EngineError> {
    if page < 1 {
        return Err(EngineError::InvalidQuery(format!(
            "page must be at least 1, got {}",
            page
        )));
    }
    if per_page < 1 {
        return Err(EngineError::InvalidQuery(format!(
            "per_page must be at least 1, got {}",
            per_page
        )));
    }
    Ok(())
}

/// Arrange `records` in the order of `keys`.
///
/// Keys without a matching record are dropped; records whose key was not
/// requested are discarded.
pub fn reorder_by_keys<R: Searchable>(keys: &[SearchKey], records: Vec<R>) -> Vec<R> {
    let mut by_key: HashMap<SearchKey, R> = records
        .into_iter()
        .map(|record| (record.search_key_value(), record))
        .collect();

    let ordered: Vec<R> = keys.iter().filter_map(|key| by_key.remove(key)).collect();

    if ordered.len() < keys.len() {
        debug!(
            requested = keys.len(),
            found = ordered.len(),
            "Some search hits have no matching record"
        );
    }
    ordered
}

/// Hydrate `keys` and return the records in key order.
pub async fn hydrate_in_order<R, H>(keys: &[SearchKey], hydrator: &H) -> Result<Vec<R>, EngineError>
where
    R: Searchable,
    H: RecordHydrator<R> + ?Sized,
{
    if keys.is_empty() {
        return Ok(Vec::new());
    }
    let records = hydrator.hydrate_by_ids(keys).await?;
    Ok(reorder_by_keys(keys, records))
}

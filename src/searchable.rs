// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Record-side contracts.
//!
//! [`Searchable`] is implemented by every record type that lives in a search
//! index. [`RecordHydrator`] turns the ordered keys of a search back into
//! records; it is free to return them in any order.

use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::search::query_builder::Builder;

/// Primary key of an indexed record.
///
/// Backends disagree on key types (Typesense and Algolia only know string
/// ids), so keys compare and hash by their canonical string form:
/// `SearchKey::Integer(5) == SearchKey::Text("5".into())`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchKey {
    Integer(i64),
    Text(String),
}

impl SearchKey {
    /// Canonical string form used for equality and as backend document id
    pub fn canonical(&self) -> Cow<'_, str> {
        match self {
            Self::Integer(n) => Cow::Owned(n.to_string()),
            Self::Text(s) => Cow::Borrowed(s),
        }
    }

    /// Integer view of the key, parsing text keys when possible
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(n) => Some(*n),
            Self::Text(s) => s.parse().ok(),
        }
    }

    /// Read a key out of a hit's JSON field
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Integer(i)),
                None => Some(Self::Text(n.to_string())),
            },
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Integer(n) => Value::from(*n),
            Self::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl PartialEq for SearchKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical() == other.canonical()
    }
}

impl Eq for SearchKey {}

impl Hash for SearchKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical().hash(state);
    }
}

impl fmt::Display for SearchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

impl From<i64> for SearchKey {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for SearchKey {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<u32> for SearchKey {
    fn from(value: u32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<&str> for SearchKey {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for SearchKey {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// A record type that is kept in a search index.
pub trait Searchable: Send + Sync {
    /// Index (or collection) holding this record type
    fn search_index() -> &'static str
    where
        Self: Sized;

    /// Document field carrying the primary key
    fn search_key() -> &'static str
    where
        Self: Sized,
    {
        "id"
    }

    fn search_key_value(&self) -> SearchKey;

    /// Flat projection of the record that gets indexed
    fn to_searchable_object(&self) -> Map<String, Value>;

    /// Start a search against this record type's index
    fn search(query: impl Into<String>) -> Builder<Self>
    where
        Self: Sized,
    {
        Builder::new(query)
    }
}

#[derive(Error, Debug)]
#[error("record hydration failed: {0}")]
pub struct HydrationError(pub String);

/// Resolves search keys into full records.
#[async_trait]
pub trait RecordHydrator<R>: Send + Sync {
    /// Look up the records for `ids`. The result order is unspecified and
    /// keys without a record may be missing.
    async fn hydrate_by_ids(&self, ids: &[SearchKey]) -> Result<Vec<R>, HydrationError>;
}

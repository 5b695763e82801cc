// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Query Builder - engine-agnostic search descriptor
//!
//! Provides a fluent way to describe one search that every engine adapter
//! translates into its own filter, sort and pagination syntax.
//!
//! # Example
//!
//! ```rust
//! use magnify::search::{Builder, SortDirection};
//! use magnify::{Searchable, SearchKey};
//! use serde_json::{json, Map, Value};
//!
//! struct Product { id: i64 }
//!
//! impl Searchable for Product {
//!     fn search_index() -> &'static str { "products" }
//!     fn search_key_value(&self) -> SearchKey { self.id.into() }
//!     fn to_searchable_object(&self) -> Map<String, Value> {
//!         json!({ "id": self.id }).as_object().cloned().unwrap_or_default()
//!     }
//! }
//!
//! let builder = Builder::<Product>::new("shoes")
//!     .where_in("color", ["red", "blue"])
//!     .where_eq("in_stock", true)
//!     .order_by("price", SortDirection::Asc)
//!     .take(10);
//!
//! assert_eq!(builder.descriptor().index_name(), "products");
//! assert_eq!(builder.descriptor().filters().len(), 2);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde::{Deserialize, Serialize};

use crate::engines::traits::{EngineError, SearchEngine, SearchEngineExt};
use crate::search::results::Paginator;
use crate::searchable::{RecordHydrator, Searchable};

/// Default timestamp field used by [`Builder::latest_created`] and
/// [`Builder::oldest_created`].
pub const DEFAULT_TIMESTAMP_FIELD: &str = "createdAt";

/// Scalar value a constraint compares against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Numeric(f64),
    /// Text value
    Text(String),
}

impl QueryValue {
    /// True for values every backend renders unquoted.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::Numeric(_))
    }
}

impl fmt::Display for QueryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Integer(n) => write!(f, "{}", n),
            Self::Numeric(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i32> for QueryValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<u32> for QueryValue {
    fn from(value: u32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f32> for QueryValue {
    fn from(value: f32) -> Self {
        Self::Numeric(value.into())
    }
}

impl From<f64> for QueryValue {
    fn from(value: f64) -> Self {
        Self::Numeric(value)
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for QueryValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// One sort key; position in [`SearchQuery::orders`] is its priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderClause {
    pub field: String,
    pub direction: SortDirection,
}

/// One constraint of the descriptor, the unit every translator consumes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldFilter<'a> {
    /// field = value
    Equals { field: &'a str, value: &'a QueryValue },
    /// field != value
    NotEquals { field: &'a str, value: &'a QueryValue },
    /// field is one of values
    In { field: &'a str, values: &'a [QueryValue] },
    /// field is none of values
    NotIn { field: &'a str, values: &'a [QueryValue] },
}

impl<'a> FieldFilter<'a> {
    pub fn field(&self) -> &'a str {
        match self {
            Self::Equals { field, .. }
            | Self::NotEquals { field, .. }
            | Self::In { field, .. }
            | Self::NotIn { field, .. } => field,
        }
    }
}

/// Engine-agnostic description of one search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text query, passed verbatim to the backend
    pub query: String,
    /// Index override set by [`Builder::within`]
    pub index: Option<String>,
    /// Index of the record type
    pub default_index: String,
    /// Document field carrying the record key
    pub key_field: String,
    pub wheres: BTreeMap<String, QueryValue>,
    pub where_nots: BTreeMap<String, QueryValue>,
    pub where_ins: BTreeMap<String, Vec<QueryValue>>,
    pub where_not_ins: BTreeMap<String, Vec<QueryValue>>,
    pub orders: Vec<OrderClause>,
    pub limit: Option<usize>,
    pub highlight_fields: Vec<String>,
}

impl SearchQuery {
    /// Create an unconstrained descriptor for an index
    pub fn new(
        query: impl Into<String>,
        default_index: impl Into<String>,
        key_field: impl Into<String>,
    ) -> Self {
        Self {
            query: query.into(),
            index: None,
            default_index: default_index.into(),
            key_field: key_field.into(),
            wheres: BTreeMap::new(),
            where_nots: BTreeMap::new(),
            where_ins: BTreeMap::new(),
            where_not_ins: BTreeMap::new(),
            orders: Vec::new(),
            limit: None,
            highlight_fields: Vec::new(),
        }
    }

    /// The index this search targets.
    pub fn index_name(&self) -> &str {
        self.index.as_deref().unwrap_or(&self.default_index)
    }

    /// True when no constraint of any category is present.
    pub fn has_constraints(&self) -> bool {
        !(self.wheres.is_empty()
            && self.where_nots.is_empty()
            && self.where_ins.is_empty()
            && self.where_not_ins.is_empty())
    }

    /// An inclusion over zero values can never match.
    pub fn is_unsatisfiable(&self) -> bool {
        self.where_ins.values().any(Vec::is_empty)
    }

    /// Constraints in translation order: equality, negation, inclusion,
    /// exclusion. Empty value lists are skipped.
    pub fn filters(&self) -> Vec<FieldFilter<'_>> {
        single_filters(&self.wheres, |field, value| FieldFilter::Equals { field, value })
            .chain(single_filters(&self.where_nots, |field, value| {
                FieldFilter::NotEquals { field, value }
            }))
            .chain(list_filters(&self.where_ins, |field, values| FieldFilter::In { field, values }))
            .chain(list_filters(&self.where_not_ins, |field, values| {
                FieldFilter::NotIn { field, values }
            }))
            .collect()
    }

    /// Reject descriptors no backend can execute.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.limit == Some(0) {
            return Err(EngineError::InvalidQuery("limit must be at least 1".into()));
        }

        let mut fields = self
            .wheres
            .keys()
            .chain(self.where_nots.keys())
            .chain(self.where_ins.keys())
            .chain(self.where_not_ins.keys())
            .chain(self.orders.iter().map(|o| &o.field));
        if let Some(field) = fields.find(|f| f.trim().is_empty()) {
            return Err(EngineError::InvalidQuery(format!(
                "field name {:?} is empty",
                field
            )));
        }

        let mut values = self
            .wheres
            .values()
            .chain(self.where_nots.values())
            .chain(self.where_ins.values().flatten())
            .chain(self.where_not_ins.values().flatten());
        if values.any(|v| matches!(v, QueryValue::Numeric(n) if !n.is_finite())) {
            return Err(EngineError::InvalidQuery(
                "numeric constraint values must be finite".into(),
            ));
        }

        Ok(())
    }
}

fn single_filters<'a>(
    map: &'a BTreeMap<String, QueryValue>,
    make: fn(&'a str, &'a QueryValue) -> FieldFilter<'a>,
) -> impl Iterator<Item = FieldFilter<'a>> + 'a {
    map.iter().map(move |(field, value)| make(field, value))
}

fn list_filters<'a>(
    map: &'a BTreeMap<String, Vec<QueryValue>>,
    make: fn(&'a str, &'a [QueryValue]) -> FieldFilter<'a>,
) -> impl Iterator<Item = FieldFilter<'a>> + 'a {
    map.iter()
        .filter(|(_, values)| !values.is_empty())
        .map(move |(field, values)| make(field, values))
}

/// Fluent builder over a [`SearchQuery`] for record type `R`.
pub struct Builder<R> {
    query: SearchQuery,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for Builder<R> {
    fn clone(&self) -> Self {
        Self {
            query: self.query.clone(),
            _record: PhantomData,
        }
    }
}

impl<R> fmt::Debug for Builder<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder").field("query", &self.query).finish()
    }
}

impl<R: Searchable> Builder<R> {
    /// Start a search against `R`'s index
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: SearchQuery::new(query, R::search_index(), R::search_key()),
            _record: PhantomData,
        }
    }

    /// Search a custom index instead of the record type's own
    pub fn within(mut self, index: impl Into<String>) -> Self {
        self.query.index = Some(index.into());
        self
    }

    /// Add a "field = value" constraint
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.wheres.insert(field.into(), value.into());
        self
    }

    /// Add a "field != value" constraint
    pub fn where_not(mut self, field: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.query.where_nots.insert(field.into(), value.into());
        self
    }

    /// Add a "field is one of values" constraint
    pub fn where_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<QueryValue>,
    {
        self.query
            .where_ins
            .insert(field.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Add a "field is none of values" constraint
    pub fn where_not_in<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<QueryValue>,
    {
        self.query
            .where_not_ins
            .insert(field.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Cap the number of hits of a non-paginated search
    pub fn take(mut self, limit: usize) -> Self {
        self.query.limit = Some(limit);
        self
    }

    /// Append a sort key
    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.orders.push(OrderClause {
            field: field.into(),
            direction,
        });
        self
    }

    /// Newest first on `field`
    pub fn latest(self, field: impl Into<String>) -> Self {
        self.order_by(field, SortDirection::Desc)
    }

    /// Oldest first on `field`
    pub fn oldest(self, field: impl Into<String>) -> Self {
        self.order_by(field, SortDirection::Asc)
    }

    /// Newest first on the creation timestamp
    pub fn latest_created(self) -> Self {
        self.latest(DEFAULT_TIMESTAMP_FIELD)
    }

    /// Oldest first on the creation timestamp
    pub fn oldest_created(self) -> Self {
        self.oldest(DEFAULT_TIMESTAMP_FIELD)
    }

    /// Fields the backend should return with highlight markers
    pub fn highlight<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.highlight_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn descriptor(&self) -> &SearchQuery {
        &self.query
    }

    pub fn into_descriptor(self) -> SearchQuery {
        self.query
    }

    /// Run the search and hydrate the hits in rank order.
    pub async fn get<E, H>(self, engine: &E, hydrator: &H) -> Result<Vec<R>, EngineError>
    where
        E: SearchEngine + ?Sized,
        H: RecordHydrator<R> + ?Sized,
    {
        engine.get(self, hydrator).await
    }

    /// Run a page-scoped search (`page` is 1-based).
    pub async fn paginate<E, H>(
        self,
        engine: &E,
        hydrator: &H,
        page: usize,
        per_page: usize,
    ) -> Result<Paginator<R>, EngineError>
    where
        E: SearchEngine + ?Sized,
        H: RecordHydrator<R> + ?Sized,
    {
        engine.paginate(self, hydrator, page, per_page).await
    }
}

// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Search Infrastructure
//!
//! One query descriptor, three backend grammars.
//!
//! # Architecture
//!
//! ```text
//! Builder<R> → SearchQuery (descriptor)
//!     ↓
//!     ├─→ AlgoliaTranslator     → filters=brand:"acme" AND (color:"red" OR color:"blue")
//!     ├─→ MeilisearchTranslator → filter=brand = "acme" AND color IN ["red", "blue"]
//!     └─→ TypesenseTranslator   → filter_by=brand:=`acme` && color:=[`red`, `blue`]
//! ```
//!
//! Engines execute the translated search, hand the ordered hit keys to a
//! [`RecordHydrator`](crate::RecordHydrator) and restore rank order with
//! [`reorder_by_keys`].
//!
//! # Filter grammars
//!
//! ```text
//!                 Algolia              Meilisearch            Typesense
//! equals          f:"v" / f = 1        f = "v"                f:=`v`
//! not equals      NOT f:"v"            NOT f = "v"            f:!=`v`
//! one of          (f:"a" OR f:"b")     f IN ["a", "b"]        f:=[`a`, `b`]
//! none of         NOT f:"a" AND ...    f NOT IN ["a", "b"]    f:!=[`a`, `b`]
//! booleans        1 / 0                true / false           true / false
//! ```

pub mod query_builder;
mod algolia_translator;
mod meilisearch_translator;
mod typesense_translator;
pub mod results;

pub use query_builder::{
    Builder, FieldFilter, OrderClause, QueryValue, SearchQuery, SortDirection,
    DEFAULT_TIMESTAMP_FIELD,
};
pub use algolia_translator::AlgoliaTranslator;
pub use meilisearch_translator::MeilisearchTranslator;
pub use typesense_translator::TypesenseTranslator;
pub use results::{hydrate_in_order, reorder_by_keys, validate_page, Hit, Paginator, SearchResults};

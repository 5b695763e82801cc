//! Typesense Translator
//!
//! Translates a [`SearchQuery`] into Typesense `filter_by` / `sort_by` syntax.
//!
//! # Typesense Filter Syntax
//!
//! ```text
//! status:=`active`                  - Exact match
//! status:!=`active`                 - Not equals
//! color:=[`red`, `blue`]            - One of
//! color:!=[`red`, `blue`]           - None of
//! a:=1 && b:=true                   - AND
//! ```

use super::query_builder::{FieldFilter, QueryValue, SearchQuery};

/// Typesense query translator
pub struct TypesenseTranslator;

impl TypesenseTranslator {
    /// Translate the descriptor's constraints into one `filter_by` value.
    pub fn filter(query: &SearchQuery) -> Option<String> {
        let clauses: Vec<String> = query.filters().iter().map(Self::translate_filter).collect();
        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" && "))
        }
    }

    /// `sort_by` value: `price:asc,createdAt:desc`
    pub fn sort(query: &SearchQuery) -> Option<String> {
        if query.orders.is_empty() {
            return None;
        }
        Some(
            query
                .orders
                .iter()
                .map(|order| format!("{}:{}", order.field, order.direction.as_str()))
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    fn translate_filter(filter: &FieldFilter<'_>) -> String {
        match filter {
            FieldFilter::Equals { field, value } => {
                format!("{}:={}", field, Self::format_value(value))
            }
            FieldFilter::NotEquals { field, value } => {
                format!("{}:!={}", field, Self::format_value(value))
            }
            FieldFilter::In { field, values } => {
                format!("{}:=[{}]", field, Self::format_list(values))
            }
            FieldFilter::NotIn { field, values } => {
                format!("{}:!=[{}]", field, Self::format_list(values))
            }
        }
    }

    fn format_list(values: &[QueryValue]) -> String {
        values
            .iter()
            .map(Self::format_value)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Strings are wrapped in backticks so commas and operators inside a
    /// value are not parsed as filter syntax.
    pub fn format_value(value: &QueryValue) -> String {
        match value {
            QueryValue::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            QueryValue::Integer(n) => n.to_string(),
            QueryValue::Numeric(n) => n.to_string(),
            QueryValue::Text(s) => format!("`{}`", s.replace('`', "")),
        }
    }
}

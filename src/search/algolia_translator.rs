//! Algolia Translator
//!
//! Translates a [`SearchQuery`] into the Algolia `filters` parameter.
//!
//! # Algolia Filter Syntax
//!
//! ```text
//! brand:"acme"                      - Facet equals
//! price = 10                        - Numeric equals (booleans as 1/0)
//! NOT brand:"acme"                  - Not equals
//! (color:"red" OR color:"blue")     - One of
//! NOT color:"red" AND NOT color:"blue"  - None of
//! ```
//!
//! Algolia cannot negate a parenthesised group, so exclusion is spelled out
//! as one negated condition per value.

use super::query_builder::{FieldFilter, QueryValue, SearchQuery};

/// Algolia query translator
pub struct AlgoliaTranslator;

impl AlgoliaTranslator {
    /// Translate the descriptor's constraints into one `filters` expression.
    pub fn filter(query: &SearchQuery) -> Option<String> {
        let clauses: Vec<String> = query.filters().iter().map(Self::translate_filter).collect();
        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        }
    }

    fn translate_filter(filter: &FieldFilter<'_>) -> String {
        match filter {
            FieldFilter::Equals { field, value } => Self::condition(field, value),
            FieldFilter::NotEquals { field, value } => {
                format!("NOT {}", Self::condition(field, value))
            }
            FieldFilter::In { field, values } => {
                let conditions: Vec<String> =
                    values.iter().map(|v| Self::condition(field, v)).collect();
                if conditions.len() == 1 {
                    conditions[0].clone()
                } else {
                    format!("({})", conditions.join(" OR "))
                }
            }
            FieldFilter::NotIn { field, values } => values
                .iter()
                .map(|v| format!("NOT {}", Self::condition(field, v)))
                .collect::<Vec<_>>()
                .join(" AND "),
        }
    }

    /// Numbers and booleans compare numerically, text matches as a facet.
    fn condition(field: &str, value: &QueryValue) -> String {
        match value {
            QueryValue::Text(_) => format!("{}:{}", field, Self::format_value(value)),
            _ => format!("{} = {}", field, Self::format_value(value)),
        }
    }

    /// Booleans as `1`/`0`, numbers bare, text double-quoted.
    pub fn format_value(value: &QueryValue) -> String {
        match value {
            QueryValue::Boolean(b) => if *b { "1" } else { "0" }.to_string(),
            QueryValue::Integer(n) => n.to_string(),
            QueryValue::Numeric(n) => n.to_string(),
            QueryValue::Text(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        }
    }
}

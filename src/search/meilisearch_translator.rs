//! Meilisearch Translator
//!
//! Translates a [`SearchQuery`] into Meilisearch filter and sort syntax.
//!
//! # Meilisearch Filter Syntax
//!
//! ```text
//! status = "active"                 - Equals
//! NOT status = "active"             - Not equals
//! color IN ["red", "blue"]          - One of
//! color NOT IN ["red", "blue"]      - None of
//! a = 1 AND b = true                - AND
//! ```

use super::query_builder::{FieldFilter, QueryValue, SearchQuery};

/// Meilisearch query translator
pub struct MeilisearchTranslator;

impl MeilisearchTranslator {
    /// Translate the descriptor's constraints into one `filter` expression.
    /// Returns `None` when there is nothing to filter on.
    pub fn filter(query: &SearchQuery) -> Option<String> {
        let clauses: Vec<String> = query.filters().iter().map(Self::translate_filter).collect();
        if clauses.is_empty() {
            None
        } else {
            Some(clauses.join(" AND "))
        }
    }

    /// Sort rules, highest priority first: `["price:asc", "createdAt:desc"]`
    pub fn sort(query: &SearchQuery) -> Vec<String> {
        query
            .orders
            .iter()
            .map(|order| format!("{}:{}", order.field, order.direction.as_str()))
            .collect()
    }

    fn translate_filter(filter: &FieldFilter<'_>) -> String {
        match filter {
            FieldFilter::Equals { field, value } => {
                format!("{} = {}", field, Self::format_value(value))
            }
            FieldFilter::NotEquals { field, value } => {
                format!("NOT {} = {}", field, Self::format_value(value))
            }
            FieldFilter::In { field, values } => {
                format!("{} IN [{}]", field, Self::format_list(values))
            }
            FieldFilter::NotIn { field, values } => {
                format!("{} NOT IN [{}]", field, Self::format_list(values))
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

    /// Booleans as `true`/`false`, numbers bare, everything else quoted.
    pub fn format_value(value: &QueryValue) -> String {
        match value {
            QueryValue::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            QueryValue::Integer(n) => n.to_string(),
            QueryValue::Numeric(n) => n.to_string(),
            QueryValue::Text(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::query_builder::{OrderClause, SortDirection};

    fn query() -> SearchQuery {
        SearchQuery::new("shoes", "products", "id")
    }

    #[test]
    fn test_no_constraints_no_filter() {
        assert_eq!(MeilisearchTranslator::filter(&query()), None);
    }

    #[test]
    fn test_equality() {
        let mut q = query();
        q.wheres.insert("status".into(), "active".into());
        assert_eq!(MeilisearchTranslator::filter(&q).unwrap(), "status = \"active\"");
    }

    #[test]
    fn test_negation() {
        let mut q = query();
        q.where_nots.insert("archived".into(), true.into());
        assert_eq!(MeilisearchTranslator::filter(&q).unwrap(), "NOT archived = true");
    }

    #[test]
    fn test_inclusion_is_membership() {
        let mut q = query();
        q.where_ins.insert("color".into(), vec!["red".into(), "blue".into()]);
        assert_eq!(
            MeilisearchTranslator::filter(&q).unwrap(),
            "color IN [\"red\", \"blue\"]"
        );
    }

    #[test]
    fn test_exclusion() {
        let mut q = query();
        q.where_not_ins.insert("size".into(), vec![40.into(), 41.into()]);
        assert_eq!(MeilisearchTranslator::filter(&q).unwrap(), "size NOT IN [40, 41]");
    }

    #[test]
    fn test_categories_joined_with_and() {
        let mut q = query();
        q.wheres.insert("brand".into(), "acme".into());
        q.where_nots.insert("price".into(), 0.into());
        q.where_ins.insert("color".into(), vec!["red".into()]);
        q.where_not_ins.insert("tag".into(), vec!["sale".into()]);
        assert_eq!(
            MeilisearchTranslator::filter(&q).unwrap(),
            "brand = \"acme\" AND NOT price = 0 AND color IN [\"red\"] AND tag NOT IN [\"sale\"]"
        );
    }

    #[test]
    fn test_empty_exclusion_contributes_nothing() {
        let mut q = query();
        q.where_not_ins.insert("tag".into(), Vec::new());
        assert_eq!(MeilisearchTranslator::filter(&q), None);
    }

    #[test]
    fn test_escape_quotes() {
        assert_eq!(
            MeilisearchTranslator::format_value(&"say \"hi\"".into()),
            "\"say \\\"hi\\\"\""
        );
    }

    #[test]
    fn test_numeric_values_unquoted() {
        assert_eq!(MeilisearchTranslator::format_value(&2.5.into()), "2.5");
        assert_eq!(MeilisearchTranslator::format_value(&7.into()), "7");
        assert_eq!(MeilisearchTranslator::format_value(&false.into()), "false");
    }

    #[test]
    fn test_sort() {
        let mut q = query();
        q.orders.push(OrderClause { field: "price".into(), direction: SortDirection::Asc });
        q.orders.push(OrderClause { field: "createdAt".into(), direction: SortDirection::Desc });
        assert_eq!(MeilisearchTranslator::sort(&q), vec!["price:asc", "createdAt:desc"]);
    }
}

//! SPARQL text for the endpoint query shapes
//!
//! Wildcard positions are given fresh variable names. Subject and object
//! variables get a `FILTER(!isBlank(...))` so blank-node matches are never
//! counted or sampled.

use crate::rdf::{Node, TriplePattern};
use std::fmt::Write;

fn term(node: &Node, position: &str) -> String {
    match node {
        Node::Any => format!("?_any_{}", position),
        other => other.to_string(),
    }
}

/// The pattern as a triple, with wildcards named
pub fn triple_clause(pattern: &TriplePattern) -> String {
    format!(
        "{} {} {} .",
        term(&pattern.subject, "s"),
        term(&pattern.predicate, "p"),
        term(&pattern.object, "o")
    )
}

/// The pattern plus its blank-node filters
pub fn where_clause(pattern: &TriplePattern) -> String {
    let mut clause = triple_clause(pattern);
    let subject = term(&pattern.subject, "s");
    let object = term(&pattern.object, "o");
    if pattern.subject.is_variable() {
        let _ = write!(clause, " FILTER(!isBlank({}))", subject);
    }
    if pattern.object.is_variable() && object != subject {
        let _ = write!(clause, " FILTER(!isBlank({}))", object);
    }
    clause
}

/// Name of the projected count variable
pub const COUNT_VAR: &str = "count";

/// `SELECT (COUNT(*) AS ?count)` over the pattern
pub fn count_query(pattern: &TriplePattern) -> String {
    format!("SELECT (COUNT(*) AS ?{}) WHERE {{ {} }}", COUNT_VAR, where_clause(pattern))
}

/// `SELECT *` over the pattern, capped at `cap` rows
pub fn lower_bound_query(pattern: &TriplePattern, cap: u64) -> String {
    format!("SELECT * WHERE {{ {} }} LIMIT {}", where_clause(pattern), cap)
}

/// `CONSTRUCT` of the single match at `offset`
pub fn nth_match_query(pattern: &TriplePattern, offset: u64) -> String {
    format!(
        "CONSTRUCT {{ {} }} WHERE {{ {} }} OFFSET {} LIMIT 1",
        triple_clause(pattern),
        where_clause(pattern),
        offset
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::NamedNode;

    fn knows() -> NamedNode {
        NamedNode::new("http://xmlns.com/foaf/0.1/knows").unwrap()
    }

    #[test]
    fn test_count_query() {
        let pattern = TriplePattern::new(Node::var("x").unwrap(), knows(), Node::var("y").unwrap());
        assert_eq!(
            count_query(&pattern),
            "SELECT (COUNT(*) AS ?count) WHERE { ?x <http://xmlns.com/foaf/0.1/knows> ?y . \
             FILTER(!isBlank(?x)) FILTER(!isBlank(?y)) }"
        );
    }

    #[test]
    fn test_constant_positions_are_not_filtered() {
        let pattern = TriplePattern::new(Node::uri("http://example.org/a").unwrap(), knows(), Node::Any);
        let query = lower_bound_query(&pattern, 50_000);
        assert_eq!(
            query,
            "SELECT * WHERE { <http://example.org/a> <http://xmlns.com/foaf/0.1/knows> ?_any_o . \
             FILTER(!isBlank(?_any_o)) } LIMIT 50000"
        );
    }

    #[test]
    fn test_nth_match_query() {
        let pattern = TriplePattern::new(Node::var("s").unwrap(), knows(), Node::literal("x"));
        let query = nth_match_query(&pattern, 7);
        assert!(query.starts_with("CONSTRUCT { ?s <http://xmlns.com/foaf/0.1/knows> \"x\" . }"));
        assert!(query.ends_with("OFFSET 7 LIMIT 1"));
        assert_eq!(query.matches("isBlank").count(), 1);
    }

    #[test]
    fn test_repeated_variable_filtered_once() {
        let x = Node::var("x").unwrap();
        let pattern = TriplePattern::new(x.clone(), knows(), x);
        assert_eq!(where_clause(&pattern).matches("isBlank").count(), 1);
    }
}

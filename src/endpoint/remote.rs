//! Triple endpoint backed by a SPARQL service

use super::query::{self, COUNT_VAR};
use super::{EndpointError, EndpointResult, SparqlClient, TripleEndpoint};
use crate::rdf::{Node, RdfTerm, Triple, TriplePattern};
use tracing::trace;

/// Answers triple-pattern queries by issuing SPARQL through a client
pub struct RemoteEndpoint<C: SparqlClient> {
    client: C,
}

impl<C: SparqlClient> RemoteEndpoint<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Get the underlying client
    pub fn client(&self) -> &C {
        &self.client
    }
}

/// A blank node in a SPARQL pattern is a variable, not the node it names
fn concrete_terms_only(pattern: &TriplePattern) -> EndpointResult<()> {
    if matches!(pattern.subject, Node::Blank(_)) || matches!(pattern.object, Node::Blank(_)) {
        return Err(EndpointError::Unsupported(format!(
            "blank nodes cannot be sent to a SPARQL endpoint: {}",
            pattern
        )));
    }
    Ok(())
}

impl<C: SparqlClient> TripleEndpoint for RemoteEndpoint<C> {
    fn uri(&self) -> &str {
        self.client.endpoint_uri()
    }

    fn count_matches(&self, pattern: &TriplePattern) -> EndpointResult<u64> {
        concrete_terms_only(pattern)?;
        let query = query::count_query(pattern);
        trace!("count query on {}: {}", self.uri(), query);
        let rows = self.client.select(&query)?;
        let row = rows
            .first()
            .ok_or_else(|| EndpointError::UnexpectedResults("COUNT query returned no rows".to_string()))?;
        // Some services rename the aggregate column, so fall back to the only column
        let term = row
            .get(COUNT_VAR)
            .or_else(|| if row.len() == 1 { row.values().next() } else { None })
            .ok_or_else(|| EndpointError::UnexpectedResults("COUNT query returned no count column".to_string()))?;
        match term {
            RdfTerm::Literal(l) => l
                .value()
                .parse::<u64>()
                .map_err(|e| EndpointError::UnexpectedResults(format!("bad count {:?}: {}", l.value(), e))),
            other => Err(EndpointError::UnexpectedResults(format!("count is not a literal: {}", other))),
        }
    }

    fn count_matches_lower_bound(&self, pattern: &TriplePattern, cap: u64) -> EndpointResult<u64> {
        concrete_terms_only(pattern)?;
        let query = query::lower_bound_query(pattern, cap);
        trace!("lower bound query on {}: {}", self.uri(), query);
        let rows = self.client.select(&query)?;
        Ok((rows.len() as u64).min(cap))
    }

    fn nth_match(&self, pattern: &TriplePattern, offset: u64) -> EndpointResult<Option<Triple>> {
        concrete_terms_only(pattern)?;
        let query = query::nth_match_query(pattern, offset);
        trace!("sample query on {}: {}", self.uri(), query);
        Ok(self.client.construct(&query)?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Bindings;
    use crate::rdf::{BlankNode, Literal, NamedNode, RdfPredicate};
    use std::sync::Mutex;

    /// Replays canned results and records the queries it receives
    struct CannedClient {
        rows: Vec<Bindings>,
        triples: Vec<Triple>,
        queries: Mutex<Vec<String>>,
    }

    impl SparqlClient for CannedClient {
        fn endpoint_uri(&self) -> &str {
            "http://example.org/sparql"
        }
        fn select(&self, query: &str) -> EndpointResult<Vec<Bindings>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.rows.clone())
        }
        fn construct(&self, query: &str) -> EndpointResult<Vec<Triple>> {
            self.queries.lock().unwrap().push(query.to_string());
            Ok(self.triples.clone())
        }
        fn update(&self, _update: &str) -> EndpointResult<()> {
            Ok(())
        }
    }

    fn pattern() -> TriplePattern {
        TriplePattern::new(
            Node::var("s").unwrap(),
            NamedNode::new("http://example.org/p").unwrap(),
            Node::var("o").unwrap(),
        )
    }

    fn count_row(column: &str, value: &str) -> Bindings {
        let mut row = Bindings::default();
        row.insert(column.to_string(), RdfTerm::Literal(Literal::new_simple_literal(value)));
        row
    }

    #[test]
    fn test_count_matches() {
        let endpoint = RemoteEndpoint::new(CannedClient {
            rows: vec![count_row("count", "17")],
            triples: vec![],
            queries: Mutex::new(vec![]),
        });
        assert_eq!(endpoint.count_matches(&pattern()).unwrap(), 17);
        let queries = endpoint.client().queries.lock().unwrap();
        assert!(queries[0].contains("COUNT(*)"));
    }

    #[test]
    fn test_count_renamed_column() {
        let endpoint = RemoteEndpoint::new(CannedClient {
            rows: vec![count_row("callret-0", "3")],
            triples: vec![],
            queries: Mutex::new(vec![]),
        });
        assert_eq!(endpoint.count_matches(&pattern()).unwrap(), 3);
    }

    #[test]
    fn test_bad_count() {
        let endpoint = RemoteEndpoint::new(CannedClient {
            rows: vec![count_row("count", "many")],
            triples: vec![],
            queries: Mutex::new(vec![]),
        });
        assert!(matches!(
            endpoint.count_matches(&pattern()),
            Err(EndpointError::UnexpectedResults(_))
        ));
    }

    #[test]
    fn test_lower_bound_and_nth_match() {
        let triple = Triple::new(
            NamedNode::new("http://example.org/a").unwrap().into(),
            RdfPredicate::new("http://example.org/p").unwrap(),
            NamedNode::new("http://example.org/b").unwrap().into(),
        );
        let endpoint = RemoteEndpoint::new(CannedClient {
            rows: vec![Bindings::default(); 4],
            triples: vec![triple.clone()],
            queries: Mutex::new(vec![]),
        });
        assert_eq!(endpoint.count_matches_lower_bound(&pattern(), 10).unwrap(), 4);
        assert_eq!(endpoint.nth_match(&pattern(), 2).unwrap(), Some(triple));
        let queries = endpoint.client().queries.lock().unwrap();
        assert!(queries[0].ends_with("LIMIT 10"));
        assert!(queries[1].contains("OFFSET 2 LIMIT 1"));
    }

    #[test]
    fn test_blank_nodes_are_rejected() {
        let endpoint = RemoteEndpoint::new(CannedClient {
            rows: vec![],
            triples: vec![],
            queries: Mutex::new(vec![]),
        });
        let pattern = TriplePattern::new(
            Node::Blank(BlankNode::from_str("b0").unwrap()),
            NamedNode::new("http://example.org/p").unwrap(),
            Node::var("o").unwrap(),
        );
        assert!(matches!(endpoint.count_matches(&pattern), Err(EndpointError::Unsupported(_))));
        assert!(matches!(
            endpoint.count_matches_lower_bound(&pattern, 10),
            Err(EndpointError::Unsupported(_))
        ));
        assert!(matches!(endpoint.nth_match(&pattern, 0), Err(EndpointError::Unsupported(_))));
        assert!(endpoint.client().queries.lock().unwrap().is_empty());
    }
}

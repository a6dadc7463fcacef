//! In-process triple endpoint

use super::{EndpointError, EndpointResult, TripleEndpoint};
use crate::rdf::{self, RdfStore, Triple, TriplePattern};
use std::sync::{PoisonError, RwLock};

/// Endpoint answering from an in-memory [`RdfStore`]
///
/// Matches are enumerated in insertion order, so `nth_match` is stable.
pub struct MemoryEndpoint {
    uri: String,
    store: RwLock<RdfStore>,
    count_supported: bool,
}

impl MemoryEndpoint {
    pub fn new(uri: impl Into<String>, store: RdfStore) -> Self {
        Self {
            uri: uri.into(),
            store: RwLock::new(store),
            count_supported: true,
        }
    }

    pub fn from_triples(uri: impl Into<String>, triples: impl IntoIterator<Item = Triple>) -> Self {
        Self::new(uri, RdfStore::from_triples(triples))
    }

    /// Load an N-Triples or Turtle document
    pub fn from_turtle(uri: impl Into<String>, text: &str) -> EndpointResult<Self> {
        Ok(Self::from_triples(uri, rdf::parse_turtle(text)?))
    }

    /// Make `count_matches` fail, as a service without aggregate support would
    pub fn without_count(mut self) -> Self {
        self.count_supported = false;
        self
    }

    /// Add a triple; returns false if it was already present
    pub fn insert(&self, triple: Triple) -> bool {
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(triple)
            .is_ok()
    }

    /// Remove a triple; returns false if it was absent
    pub fn remove(&self, triple: &Triple) -> bool {
        self.store
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(triple)
            .is_ok()
    }

    pub fn len(&self) -> usize {
        self.store.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn with_matches<T>(&self, pattern: &TriplePattern, f: impl FnOnce(&mut dyn Iterator<Item = &Triple>) -> T) -> T {
        let store = self.store.read().unwrap_or_else(PoisonError::into_inner);
        let mut matches = store.matching(pattern).filter(|t| !t.binds_blank_node(pattern));
        f(&mut matches)
    }
}

impl TripleEndpoint for MemoryEndpoint {
    fn uri(&self) -> &str {
        &self.uri
    }

    fn count_matches(&self, pattern: &TriplePattern) -> EndpointResult<u64> {
        if !self.count_supported {
            return Err(EndpointError::Unsupported(format!("{} does not support COUNT", self.uri)));
        }
        Ok(self.with_matches(pattern, |matches| matches.count() as u64))
    }

    fn count_matches_lower_bound(&self, pattern: &TriplePattern, cap: u64) -> EndpointResult<u64> {
        Ok(self.with_matches(pattern, |matches| {
            matches.take(usize::try_from(cap).unwrap_or(usize::MAX)).count() as u64
        }))
    }

    fn nth_match(&self, pattern: &TriplePattern, offset: u64) -> EndpointResult<Option<Triple>> {
        let Ok(offset) = usize::try_from(offset) else {
            return Ok(None);
        };
        Ok(self.with_matches(pattern, |matches| matches.nth(offset).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{NamedNode, Node};

    const DATA: &str = r#"
        @prefix ex: <http://example.org/> .
        ex:a ex:knows ex:b .
        ex:a ex:knows ex:c .
        ex:b ex:knows ex:c .
        _:x ex:knows ex:a .
        ex:c ex:name "C" .
    "#;

    fn knows_pattern() -> TriplePattern {
        TriplePattern::new(
            Node::var("s").unwrap(),
            NamedNode::new("http://example.org/knows").unwrap(),
            Node::var("o").unwrap(),
        )
    }

    #[test]
    fn test_counts_exclude_blank_nodes() {
        let endpoint = MemoryEndpoint::from_turtle("mem:test", DATA).unwrap();
        assert_eq!(endpoint.len(), 5);
        assert_eq!(endpoint.count_matches(&knows_pattern()).unwrap(), 3);
        assert_eq!(endpoint.count_matches_lower_bound(&knows_pattern(), 2).unwrap(), 2);
        assert_eq!(endpoint.count_matches_lower_bound(&knows_pattern(), 100).unwrap(), 3);
    }

    #[test]
    fn test_nth_match_is_stable() {
        let endpoint = MemoryEndpoint::from_turtle("mem:test", DATA).unwrap();
        let second = endpoint.nth_match(&knows_pattern(), 1).unwrap().unwrap();
        assert_eq!(second.object.to_string(), "<http://example.org/c>");
        assert_eq!(endpoint.nth_match(&knows_pattern(), 1).unwrap(), Some(second));
        assert_eq!(endpoint.nth_match(&knows_pattern(), 3).unwrap(), None);
    }

    #[test]
    fn test_without_count() {
        let endpoint = MemoryEndpoint::from_turtle("mem:test", DATA).unwrap().without_count();
        assert!(matches!(
            endpoint.count_matches(&knows_pattern()),
            Err(EndpointError::Unsupported(_))
        ));
        assert_eq!(endpoint.count_matches_lower_bound(&knows_pattern(), 10).unwrap(), 3);
    }
}

//! In-memory RDF triple store
//!
//! Triples are grouped by predicate and kept in insertion order, so the n-th
//! match of a pattern is stable across calls. This is what makes offset-based
//! sampling against an in-memory endpoint reproducible.

use super::types::{NamedNode, Triple, TriplePattern};
use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

/// RDF store errors
#[derive(Error, Debug)]
pub enum RdfStoreError {
    /// Triple not found
    #[error("Triple not found")]
    TripleNotFound,

    /// Duplicate triple
    #[error("Duplicate triple")]
    DuplicateTriple,
}

pub type RdfStoreResult<T> = Result<T, RdfStoreError>;

/// RDF triple store with a predicate index
#[derive(Clone, Debug, Default)]
pub struct RdfStore {
    /// Predicate -> triples using it, in insertion order
    by_predicate: IndexMap<NamedNode, IndexSet<Triple>>,

    len: usize,
}

impl RdfStore {
    /// Create a new empty RDF store
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from triples, skipping duplicates
    pub fn from_triples(triples: impl IntoIterator<Item = Triple>) -> Self {
        let mut store = Self::new();
        for triple in triples {
            let _ = store.insert(triple);
        }
        store
    }

    /// Insert a triple into the store
    pub fn insert(&mut self, triple: Triple) -> RdfStoreResult<()> {
        let bucket = self
            .by_predicate
            .entry(triple.predicate.as_named_node().clone())
            .or_default();
        if !bucket.insert(triple) {
            return Err(RdfStoreError::DuplicateTriple);
        }
        self.len += 1;
        Ok(())
    }

    /// Remove a triple from the store
    pub fn remove(&mut self, triple: &Triple) -> RdfStoreResult<()> {
        let bucket = self
            .by_predicate
            .get_mut(triple.predicate.as_named_node())
            .ok_or(RdfStoreError::TripleNotFound)?;
        if !bucket.shift_remove(triple) {
            return Err(RdfStoreError::TripleNotFound);
        }
        self.len -= 1;
        Ok(())
    }

    /// Check if a triple exists in the store
    pub fn contains(&self, triple: &Triple) -> bool {
        self.by_predicate
            .get(triple.predicate.as_named_node())
            .is_some_and(|bucket| bucket.contains(triple))
    }

    /// Get the total number of triples
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Clear all triples
    pub fn clear(&mut self) {
        self.by_predicate.clear();
        self.len = 0;
    }

    /// Iterate over triples matching a pattern, in stable order
    pub fn matching<'a>(&'a self, pattern: &'a TriplePattern) -> Box<dyn Iterator<Item = &'a Triple> + 'a> {
        match pattern.predicate.as_named_node() {
            Some(predicate) => Box::new(
                self.by_predicate
                    .get(predicate)
                    .into_iter()
                    .flatten()
                    .filter(move |t| pattern.matches(t)),
            ),
            None => Box::new(self.iter().filter(move |t| pattern.matches(t))),
        }
    }

    /// Query triples matching a pattern
    pub fn query(&self, pattern: &TriplePattern) -> Vec<Triple> {
        self.matching(pattern).cloned().collect()
    }

    /// Get an iterator over all triples
    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.by_predicate.values().flatten()
    }

    /// Get all distinct predicates, in first-seen order
    pub fn predicates(&self) -> Vec<NamedNode> {
        self.by_predicate
            .iter()
            .filter(|(_, bucket)| !bucket.is_empty())
            .map(|(p, _)| p.clone())
            .collect()
    }
}

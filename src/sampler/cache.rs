//! Upper sample limit cache

use crate::rdf::{PatternShape, TriplePattern};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

/// Memoized match counts keyed by endpoint URI and pattern shape
///
/// Patterns that differ only in variable names share an entry. Two threads
/// missing on the same key both compute the count; the later write wins.
pub struct UpperSampleLimitCache {
    entries: Mutex<LruCache<(String, PatternShape), u64>>,
}

impl UpperSampleLimitCache {
    /// Create a cache holding at most `capacity` entries (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, endpoint: &str, pattern: &TriplePattern) -> Option<u64> {
        let key = (endpoint.to_string(), pattern.shape());
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .copied()
    }

    pub fn insert(&self, endpoint: &str, pattern: &TriplePattern, limit: u64) {
        let key = (endpoint.to_string(), pattern.shape());
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, limit);
    }

    /// Forget the entry of one pattern shape at an endpoint
    pub fn invalidate(&self, endpoint: &str, pattern: &TriplePattern) {
        let key = (endpoint.to_string(), pattern.shape());
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop(&key);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rdf::{NamedNode, Node};

    fn pattern(s: &str, o: &str) -> TriplePattern {
        TriplePattern::new(
            Node::var(s).unwrap(),
            NamedNode::new("http://example.org/p").unwrap(),
            Node::var(o).unwrap(),
        )
    }

    #[test]
    fn test_shape_sharing() {
        let cache = UpperSampleLimitCache::new(8);
        cache.insert("http://a.example.org/sparql", &pattern("x", "y"), 42);
        assert_eq!(cache.get("http://a.example.org/sparql", &pattern("a", "b")), Some(42));
        assert_eq!(cache.get("http://b.example.org/sparql", &pattern("a", "b")), None);
    }

    #[test]
    fn test_eviction() {
        let cache = UpperSampleLimitCache::new(1);
        cache.insert("e1", &pattern("x", "y"), 1);
        cache.insert("e2", &pattern("x", "y"), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("e1", &pattern("x", "y")), None);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let cache = UpperSampleLimitCache::new(0);
        cache.insert("e", &pattern("x", "y"), 3);
        assert_eq!(cache.get("e", &pattern("s", "o")), Some(3));
    }

    #[test]
    fn test_invalidate() {
        let cache = UpperSampleLimitCache::new(8);
        cache.insert("e1", &pattern("x", "y"), 1);
        cache.insert("e2", &pattern("x", "y"), 2);
        cache.invalidate("e1", &pattern("a", "b"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("e2", &pattern("x", "y")), Some(2));
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_self_loop_has_its_own_entry() {
        let cache = UpperSampleLimitCache::new(8);
        cache.insert("e", &pattern("x", "y"), 10);
        assert_eq!(cache.get("e", &pattern("x", "x")), None);
    }
}

//! RDF data model
//!
//! This module provides the terms, triples and triple patterns the planner
//! works on, together with:
//! - an insertion-ordered in-memory triple store
//! - N-Triples / Turtle parsing
//! - basic graph pattern extraction from SPARQL queries
//!
//! # Example
//!
//! ```rust
//! use bgp_planner::rdf::{RdfStore, Triple, NamedNode, Literal, RdfPredicate, Node, TriplePattern};
//!
//! let mut store = RdfStore::new();
//!
//! let subject = NamedNode::new("http://example.org/alice").unwrap();
//! let predicate = RdfPredicate::new("http://xmlns.com/foaf/0.1/name").unwrap();
//! let object = Literal::new_simple_literal("Alice");
//!
//! let triple = Triple::new(subject.clone().into(), predicate.clone(), object.into());
//! store.insert(triple).unwrap();
//!
//! let pattern = TriplePattern::new(subject, predicate.as_named_node().clone(), Node::var("name").unwrap());
//! assert_eq!(store.query(&pattern).len(), 1);
//! ```

mod bgp;
mod ntriples;
mod store;
mod types;

pub use types::{
    BlankNode, Literal, NamedNode, Node, PatternShape, RdfError, RdfObject, RdfPredicate,
    RdfResult, RdfSubject, RdfTerm, Triple, TriplePattern, Variable,
};

pub use store::{RdfStore, RdfStoreError, RdfStoreResult};

pub use ntriples::{parse_ntriples, parse_turtle};

pub use bgp::parse_bgp;

/// IRI of `rdf:type`
pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

/// Check whether a predicate is `rdf:type`
pub fn is_rdf_type(predicate: &NamedNode) -> bool {
    predicate.as_str() == RDF_TYPE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rdf_module_exports() {
        let _store: RdfStore = RdfStore::new();
        let rdf_type = NamedNode::new(RDF_TYPE).unwrap();
        assert!(is_rdf_type(&rdf_type));
        assert!(!is_rdf_type(&NamedNode::new("http://example.org/p").unwrap()));
    }
}

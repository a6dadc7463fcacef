//! Triple endpoints
//!
//! An endpoint answers the three query shapes the sampler and the statistics
//! collector need: an exact match count, a capped match count, and the n-th
//! matching triple. Remote endpoints are reached through a [`SparqlClient`];
//! [`MemoryEndpoint`] answers from an in-memory store.
//!
//! [`EndpointRegistry`] tracks which endpoints can answer a pattern and their
//! health.

mod http;
mod memory;
pub mod query;
mod registry;
mod remote;

pub use http::HttpSparqlClient;
pub use memory::MemoryEndpoint;
pub use registry::{EndpointCapabilities, EndpointRegistry, StaticRegistry};
pub use remote::RemoteEndpoint;

use crate::rdf::{RdfError, RdfTerm, Triple, TriplePattern};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Endpoint errors
#[derive(Error, Debug)]
pub enum EndpointError {
    /// Transport failure (connection refused, timeout, ...)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Endpoint answered with a non-success status
    #[error("Endpoint {uri} returned status {status}: {body}")]
    Status {
        uri: String,
        status: u16,
        body: String,
    },

    /// Response body could not be parsed
    #[error("Parse error: {0}")]
    Parse(String),

    /// Response parsed but did not have the expected form
    #[error("Unexpected results: {0}")]
    UnexpectedResults(String),

    /// Query shape not supported by this endpoint
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
}

impl From<RdfError> for EndpointError {
    fn from(e: RdfError) -> Self {
        EndpointError::Parse(e.to_string())
    }
}

pub type EndpointResult<T> = Result<T, EndpointError>;

/// Health of a known endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EndpointStatus {
    #[default]
    Ok,
    /// Answers, but aggregate queries are too expensive to issue
    Slow,
    /// Failed; skipped by the sampler
    Dead,
}

impl fmt::Display for EndpointStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointStatus::Ok => write!(f, "OK"),
            EndpointStatus::Slow => write!(f, "SLOW"),
            EndpointStatus::Dead => write!(f, "DEAD"),
        }
    }
}

/// One row of a SELECT result: variable name -> bound term
pub type Bindings = FxHashMap<String, RdfTerm>;

/// Low-level SPARQL protocol access
pub trait SparqlClient: Send + Sync {
    /// URI of the service
    fn endpoint_uri(&self) -> &str;

    /// Run a SELECT query
    fn select(&self, query: &str) -> EndpointResult<Vec<Bindings>>;

    /// Run a CONSTRUCT query
    fn construct(&self, query: &str) -> EndpointResult<Vec<Triple>>;

    /// Run a SPARQL update
    fn update(&self, update: &str) -> EndpointResult<()>;
}

/// Triple-pattern matching service
///
/// Every operation ignores matches that bind a blank node to a subject or
/// object variable.
pub trait TripleEndpoint: Send + Sync {
    /// URI identifying the endpoint
    fn uri(&self) -> &str;

    /// Exact number of matches
    fn count_matches(&self, pattern: &TriplePattern) -> EndpointResult<u64>;

    /// Number of matches, counting at most `cap`
    fn count_matches_lower_bound(&self, pattern: &TriplePattern, cap: u64) -> EndpointResult<u64>;

    /// The match at position `offset`, if there is one
    fn nth_match(&self, pattern: &TriplePattern, offset: u64) -> EndpointResult<Option<Triple>>;
}

impl fmt::Debug for dyn TripleEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TripleEndpoint({})", self.uri())
    }
}

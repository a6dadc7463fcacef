//! Endpoint capability registry
//!
//! The registry answers two questions for the sampler: which endpoints could
//! hold triples matching a pattern, and whether an endpoint is healthy.

use super::{EndpointError, EndpointResult, EndpointStatus, TripleEndpoint};
use crate::rdf::{NamedNode, Node, RdfObject, RdfSubject, Triple, TriplePattern};
use indexmap::IndexMap;
use regex::Regex;
use rustc_hash::FxHashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Registry of endpoints and their health
pub trait EndpointRegistry: Send + Sync {
    /// Endpoints whose declared capabilities could match the pattern
    fn find_endpoints(&self, pattern: &TriplePattern) -> Vec<Arc<dyn TripleEndpoint>>;

    /// Current status of an endpoint
    fn status(&self, uri: &str) -> EndpointStatus;

    /// Record a new status for an endpoint
    fn set_status(&self, uri: &str, status: EndpointStatus) -> EndpointResult<()>;

    /// Whether `set_status` is allowed
    fn is_writable(&self) -> bool;

    /// Whether a concrete triple fits the declared capabilities of an endpoint
    fn matches(&self, uri: &str, triple: &Triple) -> bool;
}

/// What an endpoint declares it can answer
#[derive(Debug, Clone, Default)]
pub struct EndpointCapabilities {
    /// Predicates served; empty means any
    pub predicates: Vec<NamedNode>,
    /// Pattern that subject URIs match
    pub subject_regex: Option<Regex>,
    /// Pattern that object URIs match
    pub object_regex: Option<Regex>,
}

impl EndpointCapabilities {
    /// Capabilities that accept everything
    pub fn any() -> Self {
        Self::default()
    }

    pub fn with_predicates(mut self, predicates: impl IntoIterator<Item = NamedNode>) -> Self {
        self.predicates = predicates.into_iter().collect();
        self
    }

    pub fn with_subject_regex(mut self, pattern: &str) -> EndpointResult<Self> {
        self.subject_regex = Some(compile(pattern)?);
        Ok(self)
    }

    pub fn with_object_regex(mut self, pattern: &str) -> EndpointResult<Self> {
        self.object_regex = Some(compile(pattern)?);
        Ok(self)
    }

    fn serves_predicate(&self, predicate: &NamedNode) -> bool {
        self.predicates.is_empty() || self.predicates.contains(predicate)
    }

    // Regexes only constrain URIs; literals and blank nodes always pass.
    fn uri_allowed(regex: &Option<Regex>, uri: Option<&NamedNode>) -> bool {
        match (regex, uri) {
            (Some(regex), Some(uri)) => regex.is_match(uri.as_str()),
            _ => true,
        }
    }

    /// Whether a pattern could match data at this endpoint
    pub fn could_match(&self, pattern: &TriplePattern) -> bool {
        let predicate_ok = match &pattern.predicate {
            Node::Uri(p) => self.serves_predicate(p),
            Node::Variable(_) | Node::Any => true,
            _ => false,
        };
        predicate_ok
            && Self::uri_allowed(&self.subject_regex, pattern.subject.as_named_node())
            && Self::uri_allowed(&self.object_regex, pattern.object.as_named_node())
    }

    /// Whether a triple fits these capabilities
    pub fn matches_triple(&self, triple: &Triple) -> bool {
        let subject = match &triple.subject {
            RdfSubject::NamedNode(n) => Some(n),
            RdfSubject::BlankNode(_) => None,
        };
        let object = match &triple.object {
            RdfObject::NamedNode(n) => Some(n),
            _ => None,
        };
        self.serves_predicate(triple.predicate.as_named_node())
            && Self::uri_allowed(&self.subject_regex, subject)
            && Self::uri_allowed(&self.object_regex, object)
    }
}

fn compile(pattern: &str) -> EndpointResult<Regex> {
    Regex::new(pattern).map_err(|e| EndpointError::Parse(format!("invalid capability regex: {}", e)))
}

struct Registered {
    endpoint: Arc<dyn TripleEndpoint>,
    capabilities: EndpointCapabilities,
}

#[derive(Debug, Clone, Copy)]
struct StatusEntry {
    status: EndpointStatus,
    since: Instant,
}

/// Registry with a fixed set of endpoints and in-memory status tracking
///
/// With a DEAD TTL configured, a DEAD endpoint reports `Ok` again once the
/// TTL has elapsed, so it gets one more chance; another failure marks it
/// DEAD for a further TTL.
pub struct StaticRegistry {
    endpoints: IndexMap<String, Registered>,
    statuses: RwLock<FxHashMap<String, StatusEntry>>,
    dead_ttl: Option<Duration>,
    writable: bool,
}

impl StaticRegistry {
    pub fn new() -> Self {
        Self {
            endpoints: IndexMap::new(),
            statuses: RwLock::new(FxHashMap::default()),
            dead_ttl: None,
            writable: true,
        }
    }

    pub fn with_dead_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.dead_ttl = ttl;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.writable = false;
        self
    }

    /// Register an endpoint, replacing any previous one with the same URI
    pub fn register(&mut self, endpoint: Arc<dyn TripleEndpoint>, capabilities: EndpointCapabilities) {
        let uri = endpoint.uri().to_string();
        debug!("registering endpoint {}", uri);
        self.endpoints.insert(uri, Registered { endpoint, capabilities });
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl Default for StaticRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EndpointRegistry for StaticRegistry {
    fn find_endpoints(&self, pattern: &TriplePattern) -> Vec<Arc<dyn TripleEndpoint>> {
        self.endpoints
            .values()
            .filter(|r| r.capabilities.could_match(pattern))
            .map(|r| Arc::clone(&r.endpoint))
            .collect()
    }

    fn status(&self, uri: &str) -> EndpointStatus {
        let statuses = self.statuses.read().unwrap_or_else(PoisonError::into_inner);
        match statuses.get(uri) {
            None => EndpointStatus::Ok,
            Some(StatusEntry { status: EndpointStatus::Dead, since }) => match self.dead_ttl {
                Some(ttl) if since.elapsed() >= ttl => {
                    debug!("DEAD status of {} expired, allowing a retry", uri);
                    EndpointStatus::Ok
                }
                _ => EndpointStatus::Dead,
            },
            Some(entry) => entry.status,
        }
    }

    fn set_status(&self, uri: &str, status: EndpointStatus) -> EndpointResult<()> {
        if !self.writable {
            return Err(EndpointError::Unsupported("registry is read-only".to_string()));
        }
        info!("setting status of {} to {}", uri, status);
        self.statuses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(uri.to_string(), StatusEntry { status, since: Instant::now() });
        Ok(())
    }

    fn is_writable(&self) -> bool {
        self.writable
    }

    fn matches(&self, uri: &str, triple: &Triple) -> bool {
        self.endpoints
            .get(uri)
            .is_some_and(|r| r.capabilities.matches_triple(triple))
    }
}

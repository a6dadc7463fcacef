//! Endpoint sampler
//!
//! Draws one uniformly chosen matching triple for a pattern, either from a
//! single endpoint or from the pool of endpoints a registry offers for the
//! pattern. The population size (the *upper sample limit*) is an exact
//! COUNT where the endpoint affords one and a capped row count otherwise;
//! with the cap, matches past it are never drawn.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use bgp_planner::config::SamplerSettings;
//! use bgp_planner::endpoint::MemoryEndpoint;
//! use bgp_planner::rdf::{NamedNode, Node, TriplePattern};
//! use bgp_planner::sampler::TripleSampler;
//!
//! let endpoint = MemoryEndpoint::from_turtle(
//!     "mem:people",
//!     "<http://example.org/alice> <http://xmlns.com/foaf/0.1/knows> <http://example.org/bob> .",
//! ).unwrap();
//! let sampler = TripleSampler::for_endpoint(Arc::new(endpoint), &SamplerSettings::default());
//!
//! let knows = NamedNode::new("http://xmlns.com/foaf/0.1/knows").unwrap();
//! let pattern = TriplePattern::new(Node::var("s").unwrap(), knows, Node::var("o").unwrap());
//! let triple = sampler.sample(&pattern).unwrap();
//! assert_eq!(triple.subject.to_string(), "<http://example.org/alice>");
//! ```

mod cache;

pub use cache::UpperSampleLimitCache;

use crate::config::SamplerSettings;
use crate::endpoint::{EndpointError, EndpointRegistry, EndpointStatus, TripleEndpoint};
use crate::rdf::{NamedNode, Node, RdfObject, RdfSubject, Triple, TriplePattern, Variable};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Sampler errors
#[derive(Error, Debug)]
pub enum SamplerError {
    /// No match, or the fetched match failed validation
    #[error("No sample available: {0}")]
    NoSampleAvailable(String),

    /// Every attempt of the retry policy failed
    #[error("Exceeded {attempts} sampling attempts for {pattern}")]
    ExceededMaxAttempts { attempts: usize, pattern: String },

    /// Endpoint failure in single-endpoint mode
    #[error("Endpoint error: {0}")]
    Endpoint(#[from] EndpointError),
}

pub type SamplerResult<T> = Result<T, SamplerError>;

/// How the endpoint pool is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed endpoints tolerated before giving up
    pub max_attempts: usize,
    /// Pause after each failed attempt
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, backoff: Duration) -> Self {
        Self { max_attempts, backoff }
    }

    pub fn from_settings(settings: &SamplerSettings) -> Self {
        Self::new(settings.max_attempts, Duration::from_millis(settings.backoff_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::ZERO)
    }
}

enum Source {
    Registry(Arc<dyn EndpointRegistry>),
    Endpoint(Arc<dyn TripleEndpoint>),
}

/// Random triple sampler
pub struct TripleSampler {
    source: Source,
    cache: UpperSampleLimitCache,
    rng: Mutex<StdRng>,
    retry: RetryPolicy,
    lower_bound_cap: u64,
}

impl TripleSampler {
    /// Sample from whichever endpoints the registry offers for a pattern
    pub fn with_registry(registry: Arc<dyn EndpointRegistry>, settings: &SamplerSettings) -> Self {
        Self::build(Source::Registry(registry), settings)
    }

    /// Sample from one endpoint
    pub fn for_endpoint(endpoint: Arc<dyn TripleEndpoint>, settings: &SamplerSettings) -> Self {
        Self::build(Source::Endpoint(endpoint), settings)
    }

    fn build(source: Source, settings: &SamplerSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            source,
            cache: UpperSampleLimitCache::new(settings.cache_capacity),
            rng: Mutex::new(rng),
            retry: RetryPolicy::from_settings(settings),
            lower_bound_cap: settings.lower_bound_cap,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn cache(&self) -> &UpperSampleLimitCache {
        &self.cache
    }

    fn registry(&self) -> Option<&dyn EndpointRegistry> {
        match &self.source {
            Source::Registry(registry) => Some(registry.as_ref()),
            Source::Endpoint(_) => None,
        }
    }

    fn random_index(&self, bound: usize) -> usize {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .gen_range(0..bound)
    }

    /// Draw one matching triple
    pub fn sample(&self, pattern: &TriplePattern) -> SamplerResult<Triple> {
        match &self.source {
            Source::Endpoint(endpoint) => self.sample_from_endpoint(pattern, endpoint.as_ref()),
            Source::Registry(registry) => self.sample_from_pool(pattern, registry.as_ref()),
        }
    }

    fn sample_from_pool(&self, pattern: &TriplePattern, registry: &dyn EndpointRegistry) -> SamplerResult<Triple> {
        let mut candidates = registry.find_endpoints(pattern);
        let mut attempts = 0;

        while attempts < self.retry.max_attempts {
            if candidates.is_empty() {
                return Err(SamplerError::NoSampleAvailable(format!(
                    "no live endpoint can answer {}",
                    pattern
                )));
            }

            let endpoint = candidates.swap_remove(self.random_index(candidates.len()));
            if registry.status(endpoint.uri()) == EndpointStatus::Dead {
                debug!("skipping DEAD endpoint {}", endpoint.uri());
                continue;
            }

            match self.sample_from_endpoint(pattern, endpoint.as_ref()) {
                Ok(triple) => return Ok(triple),
                Err(e) => {
                    warn!("sampling {} from {} failed: {}", pattern, endpoint.uri(), e);
                    if registry.is_writable() {
                        if let Err(e) = registry.set_status(endpoint.uri(), EndpointStatus::Dead) {
                            warn!("could not mark {} DEAD: {}", endpoint.uri(), e);
                        }
                    }
                    attempts += 1;
                    if !self.retry.backoff.is_zero() {
                        std::thread::sleep(self.retry.backoff);
                    }
                }
            }
        }

        Err(SamplerError::ExceededMaxAttempts {
            attempts,
            pattern: pattern.to_string(),
        })
    }

    /// Draw one matching triple from a specific endpoint
    pub fn sample_from_endpoint(&self, pattern: &TriplePattern, endpoint: &dyn TripleEndpoint) -> SamplerResult<Triple> {
        let triple = match self.draw(pattern, endpoint)? {
            Some(triple) => triple,
            None => {
                // The cached limit overshoots the data; count again and redraw once
                debug!("stale upper sample limit for {} at {}", pattern.shape(), endpoint.uri());
                self.cache.invalidate(endpoint.uri(), pattern);
                self.draw(pattern, endpoint)?.ok_or_else(|| {
                    SamplerError::NoSampleAvailable(format!(
                        "{} returned no match within its count for {}",
                        endpoint.uri(),
                        pattern
                    ))
                })?
            }
        };

        if let Some(registry) = self.registry() {
            if !registry.matches(endpoint.uri(), &triple) {
                return Err(SamplerError::NoSampleAvailable(format!(
                    "{} returned {} outside its declared capabilities",
                    endpoint.uri(),
                    triple
                )));
            }
        }
        Ok(triple)
    }

    /// The match at a random offset below the upper sample limit
    fn draw(&self, pattern: &TriplePattern, endpoint: &dyn TripleEndpoint) -> SamplerResult<Option<Triple>> {
        let limit = self.upper_sample_limit(pattern, endpoint)?;
        if limit == 0 {
            return Err(SamplerError::NoSampleAvailable(format!(
                "{} has no matches for {}",
                endpoint.uri(),
                pattern
            )));
        }

        let offset = if limit == 1 {
            0
        } else {
            let bound = usize::try_from(limit).unwrap_or(usize::MAX);
            self.random_index(bound) as u64
        };
        debug!("fetching match {} of {} for {} from {}", offset, limit, pattern, endpoint.uri());
        Ok(endpoint.nth_match(pattern, offset)?)
    }

    /// Number of matches to sample from; cached per endpoint and pattern shape
    pub fn upper_sample_limit(&self, pattern: &TriplePattern, endpoint: &dyn TripleEndpoint) -> SamplerResult<u64> {
        let uri = endpoint.uri();
        if let Some(limit) = self.cache.get(uri, pattern) {
            return Ok(limit);
        }

        let status = self
            .registry()
            .map(|registry| registry.status(uri))
            .unwrap_or_default();

        let limit = if status == EndpointStatus::Slow {
            debug!("{} is SLOW, using a lower bound for {}", uri, pattern);
            endpoint.count_matches_lower_bound(pattern, self.lower_bound_cap)?
        } else {
            match endpoint.count_matches(pattern) {
                Ok(count) => count,
                Err(e) => {
                    warn!("COUNT for {} failed at {}, using a lower bound: {}", pattern, uri, e);
                    endpoint.count_matches_lower_bound(pattern, self.lower_bound_cap)?
                }
            }
        };

        info!("upper sample limit for {} at {} is {}", pattern.shape(), uri, limit);
        self.cache.insert(uri, pattern, limit);
        Ok(limit)
    }

    /// A subject that occurs with `predicate`
    pub fn sample_subject(&self, predicate: &NamedNode) -> SamplerResult<RdfSubject> {
        Ok(self.sample(&open_pattern(predicate))?.subject)
    }

    /// An object that occurs with `predicate`
    pub fn sample_object(&self, predicate: &NamedNode) -> SamplerResult<RdfObject> {
        Ok(self.sample(&open_pattern(predicate))?.object)
    }
}

/// `?s <predicate> ?o`
fn open_pattern(predicate: &NamedNode) -> TriplePattern {
    TriplePattern::new(
        Node::Variable(Variable::canonical("s")),
        predicate.clone(),
        Node::Variable(Variable::canonical("o")),
    )
}

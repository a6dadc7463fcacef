//! BGP Planner
//!
//! Cost-based join ordering for basic graph pattern (BGP) queries evaluated
//! against remote triple-pattern endpoints.
//!
//! # Components
//!
//! - [`stats`]: per-predicate selectivity and time statistics, with global
//!   averages as fallback, kept in memory or in a SPARQL store
//! - [`sampler`]: draws random matching triples from endpoints, which the
//!   [`stats::StatsCollector`] turns into statistics
//! - [`optimizer`]: orders the patterns of a BGP so every pattern joins on
//!   bindings produced before it, cheapest first
//!
//! Supporting modules: [`rdf`] (terms, patterns, parsing), [`endpoint`]
//! (SPARQL protocol client, in-memory endpoint, capability registry) and
//! [`config`].
//!
//! ## Example Usage
//!
//! ```rust
//! use bgp_planner::{JoinOrderOptimizer, OptimizerSettings, PredicateStatsDb};
//! use bgp_planner::rdf::parse_bgp;
//! use bgp_planner::stats::{Direction, GlobalAverages};
//!
//! let stats = PredicateStatsDb::in_memory();
//! stats.seed_global_averages(GlobalAverages::uniform(5.0, 500.0)).unwrap();
//!
//! // rdf:type is never evaluated from the class side
//! let bgp = parse_bgp(
//!     "SELECT * WHERE {
//!         ?person a <http://xmlns.com/foaf/0.1/Person> .
//!         <http://example.org/alice> <http://xmlns.com/foaf/0.1/knows> ?person .
//!     }",
//! ).unwrap();
//!
//! let optimizer = JoinOrderOptimizer::new(&stats, OptimizerSettings::default());
//! let plan = optimizer.plan(&bgp, &Default::default()).unwrap();
//! assert_eq!(plan.order(), vec![1, 0]);
//! assert_eq!(plan.steps[0].direction, Some(Direction::Forward));
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod endpoint;
pub mod optimizer;
pub mod rdf;
pub mod sampler;
pub mod stats;

// Re-export main types for convenience
pub use config::{ConfigError, DisconnectedPolicy, OptimizerSettings, PlannerConfig};

pub use endpoint::{
    EndpointCapabilities, EndpointError, EndpointRegistry, EndpointStatus, HttpSparqlClient,
    MemoryEndpoint, RemoteEndpoint, SparqlClient, StaticRegistry, TripleEndpoint,
};

pub use optimizer::{JoinOrderOptimizer, JoinPlan, OptimizerError, PlanStep, QueryContext};

pub use sampler::{RetryPolicy, SamplerError, TripleSampler, UpperSampleLimitCache};

pub use stats::{PredicateStatsDb, StatsCollector, StatsError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.1.0");
    }
}

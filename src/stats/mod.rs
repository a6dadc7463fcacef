//! Per-predicate statistics
//!
//! For every predicate four observables are kept: selectivity and time, each
//! in the forward (subject to object) and reverse (object to subject)
//! direction. Samples are appended by the [`StatsCollector`] and averaged on
//! read by [`PredicateStatsDb`]; the optimizer reads them to cost patterns.
//!
//! # Example
//!
//! ```rust
//! use bgp_planner::rdf::NamedNode;
//! use bgp_planner::stats::{Direction, GlobalAverages, PredicateStatsDb, Sample, StatKind, StatValue};
//!
//! let stats = PredicateStatsDb::in_memory();
//! let knows = NamedNode::new("http://xmlns.com/foaf/0.1/knows").unwrap();
//!
//! stats.record_sample(&knows, StatKind::Time, Direction::Forward, Sample::Value(120.0)).unwrap();
//! stats.record_sample(&knows, StatKind::Time, Direction::Forward, Sample::Value(80.0)).unwrap();
//! assert_eq!(stats.stat(&knows, StatKind::Time, Direction::Forward).unwrap(), StatValue::Finite(100.0));
//!
//! stats.seed_global_averages(GlobalAverages::uniform(10.0, 1000.0)).unwrap();
//! assert_eq!(stats.global_average(StatKind::Time, Direction::Reverse).unwrap(), 1000.0);
//! ```

mod backend;
mod collector;
mod sparql;
mod store;

pub use backend::{MemoryBackend, SampleBackend, SlotSummary};
pub use collector::{CollectionReport, StatsCollector};
pub use sparql::SparqlSampleBackend;
pub use store::{Estimate, PredicateStatsDb};

use crate::endpoint::EndpointError;
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Raw value reserved for INFINITY
pub const INFINITY_SENTINEL: f64 = -1.0;

/// Statistics errors
#[derive(Error, Debug)]
pub enum StatsError {
    /// The backing store could not be read or written
    #[error("Statistics store I/O error: {0}")]
    StoreIo(String),

    /// Global averages were never seeded
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A sample value that is neither a non-negative number nor the sentinel
    #[error("Invalid sample value: {0}")]
    InvalidSample(f64),

    /// A predicate IRI that does not parse
    #[error("Invalid predicate: {0}")]
    InvalidPredicate(String),
}

impl From<EndpointError> for StatsError {
    fn from(e: EndpointError) -> Self {
        StatsError::StoreIo(e.to_string())
    }
}

pub type StatsResult<T> = Result<T, StatsError>;

/// Which observable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatKind {
    /// Expected number of matches
    Selectivity,
    /// Expected evaluation time in milliseconds
    Time,
}

impl StatKind {
    pub const ALL: [StatKind; 2] = [StatKind::Selectivity, StatKind::Time];
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatKind::Selectivity => write!(f, "selectivity"),
            StatKind::Time => write!(f, "time"),
        }
    }
}

/// Evaluation direction of a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Subject known, objects wanted
    Forward,
    /// Object known, subjects wanted
    Reverse,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Forward, Direction::Reverse];

    pub fn is_forward(self) -> bool {
        self == Direction::Forward
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

/// One observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Value(f64),
    /// Unboundedly many matches, or too slow to measure
    Infinite,
}

impl Sample {
    /// Decode a stored value; the sentinel becomes [`Sample::Infinite`]
    pub fn from_raw(raw: f64) -> StatsResult<Self> {
        if raw == INFINITY_SENTINEL {
            Ok(Sample::Infinite)
        } else if raw.is_finite() && raw >= 0.0 {
            Ok(Sample::Value(raw))
        } else {
            Err(StatsError::InvalidSample(raw))
        }
    }

    /// Encode for storage
    pub fn to_raw(self) -> f64 {
        match self {
            Sample::Value(v) => v,
            Sample::Infinite => INFINITY_SENTINEL,
        }
    }

    pub fn is_infinite(self) -> bool {
        matches!(self, Sample::Infinite)
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sample::Value(v) => write!(f, "{}", v),
            Sample::Infinite => write!(f, "INFINITY"),
        }
    }
}

/// A stored sample with the time it was taken
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleRecord {
    pub sample: Sample,
    pub timestamp: DateTime<Utc>,
}

/// Result of a statistics lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatValue {
    /// Mean of the recorded samples
    Finite(f64),
    Infinite,
    /// Nothing recorded; use the global average
    NoSamples,
}

/// Means of each observable across all predicates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalAverages {
    pub forward_selectivity: f64,
    pub reverse_selectivity: f64,
    pub forward_time: f64,
    pub reverse_time: f64,
}

impl GlobalAverages {
    /// Same selectivity and time in both directions
    pub fn uniform(selectivity: f64, time: f64) -> Self {
        Self {
            forward_selectivity: selectivity,
            reverse_selectivity: selectivity,
            forward_time: time,
            reverse_time: time,
        }
    }

    pub fn get(&self, kind: StatKind, direction: Direction) -> f64 {
        match (kind, direction) {
            (StatKind::Selectivity, Direction::Forward) => self.forward_selectivity,
            (StatKind::Selectivity, Direction::Reverse) => self.reverse_selectivity,
            (StatKind::Time, Direction::Forward) => self.forward_time,
            (StatKind::Time, Direction::Reverse) => self.reverse_time,
        }
    }

    pub fn set(&mut self, kind: StatKind, direction: Direction, value: f64) {
        let slot = match (kind, direction) {
            (StatKind::Selectivity, Direction::Forward) => &mut self.forward_selectivity,
            (StatKind::Selectivity, Direction::Reverse) => &mut self.reverse_selectivity,
            (StatKind::Time, Direction::Forward) => &mut self.forward_time,
            (StatKind::Time, Direction::Reverse) => &mut self.reverse_time,
        };
        *slot = value;
    }
}

/// Raw per-predicate statistics, one value per slot (−1 for INFINITY)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredicateSnapshot {
    pub forward_selectivity: Option<f64>,
    pub reverse_selectivity: Option<f64>,
    pub forward_time: Option<f64>,
    pub reverse_time: Option<f64>,
}

impl PredicateSnapshot {
    pub fn get(&self, kind: StatKind, direction: Direction) -> Option<f64> {
        match (kind, direction) {
            (StatKind::Selectivity, Direction::Forward) => self.forward_selectivity,
            (StatKind::Selectivity, Direction::Reverse) => self.reverse_selectivity,
            (StatKind::Time, Direction::Forward) => self.forward_time,
            (StatKind::Time, Direction::Reverse) => self.reverse_time,
        }
    }
}

/// Statistics as exchanged in YAML files
///
/// ```yaml
/// averages:
///   forward_selectivity: 3.5
///   reverse_selectivity: 3.7
///   forward_time: 1500
///   reverse_time: 1500
/// predicates:
///   http://example.org/a: { forward_selectivity: 5, reverse_selectivity: -1, forward_time: 1000, reverse_time: -1 }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSnapshot {
    pub averages: Option<GlobalAverages>,
    pub predicates: IndexMap<String, PredicateSnapshot>,
}

impl StatsSnapshot {
    pub fn from_yaml_str(yaml: &str) -> crate::config::ConfigResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}

//! Predicate statistics database

use super::backend::{MemoryBackend, SampleBackend};
use super::{Direction, GlobalAverages, Sample, StatKind, StatValue, StatsError, StatsResult, StatsSnapshot};
use crate::rdf::{is_rdf_type, NamedNode};
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// A statistic with the global-average fallback already applied
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Estimate {
    Finite(f64),
    Infinite,
}

impl Estimate {
    /// The value as a float, with INFINITY mapped to `f64::INFINITY`
    pub fn as_f64(self) -> f64 {
        match self {
            Estimate::Finite(v) => v,
            Estimate::Infinite => f64::INFINITY,
        }
    }

    pub fn is_infinite(self) -> bool {
        matches!(self, Estimate::Infinite)
    }
}

/// Per-predicate statistics over a [`SampleBackend`]
///
/// Slot averages are computed on every read. Global averages are read from the
/// backend once and cached until they are recomputed or re-seeded.
pub struct PredicateStatsDb {
    backend: Arc<dyn SampleBackend>,
    averages: RwLock<Option<GlobalAverages>>,
}

impl PredicateStatsDb {
    pub fn new(backend: Arc<dyn SampleBackend>) -> Self {
        Self {
            backend,
            averages: RwLock::new(None),
        }
    }

    /// Statistics held in process memory
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Append one observation
    pub fn record_sample(
        &self,
        predicate: &NamedNode,
        kind: StatKind,
        direction: Direction,
        sample: Sample,
    ) -> StatsResult<()> {
        debug!("recording {} {} sample {} for {}", direction, kind, sample, predicate);
        self.backend.record(predicate, kind, direction, sample, Utc::now())
    }

    /// Append one observation given as a raw number (−1 for INFINITY)
    pub fn record_raw(&self, predicate: &NamedNode, kind: StatKind, direction: Direction, raw: f64) -> StatsResult<()> {
        self.record_sample(predicate, kind, direction, Sample::from_raw(raw)?)
    }

    /// Mean of the recorded samples of a slot
    ///
    /// Reverse `rdf:type` is always infinite. A slot with any infinite sample
    /// is infinite.
    pub fn stat(&self, predicate: &NamedNode, kind: StatKind, direction: Direction) -> StatsResult<StatValue> {
        if is_rdf_type(predicate) && direction == Direction::Reverse {
            return Ok(StatValue::Infinite);
        }
        Ok(self.backend.summary(predicate, kind, direction)?.to_stat_value())
    }

    /// [`stat`](Self::stat) with missing samples and store failures replaced by the global average
    ///
    /// Only a missing global average is an error.
    pub fn stat_or_average(&self, predicate: &NamedNode, kind: StatKind, direction: Direction) -> StatsResult<Estimate> {
        match self.stat(predicate, kind, direction) {
            Ok(StatValue::Finite(v)) => Ok(Estimate::Finite(v)),
            Ok(StatValue::Infinite) => Ok(Estimate::Infinite),
            Ok(StatValue::NoSamples) => Ok(Estimate::Finite(self.global_average(kind, direction)?)),
            Err(StatsError::StoreIo(e)) => {
                warn!(
                    "failed to read {} {} for {}, using global average: {}",
                    direction, kind, predicate, e
                );
                Ok(Estimate::Finite(self.global_average(kind, direction)?))
            }
            Err(e) => Err(e),
        }
    }

    /// Average of a kind and direction across all predicates
    pub fn global_average(&self, kind: StatKind, direction: Direction) -> StatsResult<f64> {
        if let Some(averages) = *self.averages.read().unwrap_or_else(PoisonError::into_inner) {
            return Ok(averages.get(kind, direction));
        }

        let mut cache = self.averages.write().unwrap_or_else(PoisonError::into_inner);
        let averages = match *cache {
            Some(averages) => averages,
            None => {
                let loaded = self.backend.load_averages()?.ok_or_else(|| {
                    StatsError::Configuration("global average statistics have not been seeded".to_string())
                })?;
                debug!("loaded global averages: {:?}", loaded);
                *cache = Some(loaded);
                loaded
            }
        };
        Ok(averages.get(kind, direction))
    }

    /// Whether a slot is infinite
    pub fn is_infinite(&self, predicate: &NamedNode, kind: StatKind, direction: Direction) -> StatsResult<bool> {
        Ok(self.stat(predicate, kind, direction)? == StatValue::Infinite)
    }

    /// Recompute the global averages from all finite samples and persist them
    ///
    /// Slots without finite samples keep their previous average; if there is
    /// none this fails with a configuration error.
    pub fn update_average_stats(&self) -> StatsResult<GlobalAverages> {
        let previous = self.backend.load_averages()?;
        let mut averages = previous.unwrap_or(GlobalAverages::uniform(f64::NAN, f64::NAN));
        for kind in StatKind::ALL {
            for direction in Direction::ALL {
                match self.backend.global_mean(kind, direction)? {
                    Some(mean) => averages.set(kind, direction, mean),
                    None if previous.is_some() => {
                        debug!("no {} {} samples, keeping previous average", direction, kind);
                    }
                    None => {
                        return Err(StatsError::Configuration(format!(
                            "no {} {} samples to compute a global average from",
                            direction, kind
                        )))
                    }
                }
            }
        }
        self.seed_global_averages(averages)?;
        info!("updated global averages: {:?}", averages);
        Ok(averages)
    }

    /// Persist explicit global averages
    pub fn seed_global_averages(&self, averages: GlobalAverages) -> StatsResult<()> {
        self.backend.store_averages(&averages)?;
        *self.averages.write().unwrap_or_else(PoisonError::into_inner) = Some(averages);
        Ok(())
    }

    /// Number of samples recorded for a slot
    pub fn sample_count(&self, predicate: &NamedNode, kind: StatKind, direction: Direction) -> StatsResult<usize> {
        Ok(self.backend.summary(predicate, kind, direction)?.total())
    }

    pub fn remove_stats_for_predicate(&self, predicate: &NamedNode) -> StatsResult<()> {
        info!("removing statistics for {}", predicate);
        self.backend.remove_predicate(predicate)
    }

    /// Drop the samples of a predicate taken before `cutoff`
    pub fn remove_stale_samples(&self, predicate: &NamedNode, cutoff: DateTime<Utc>) -> StatsResult<()> {
        debug!("removing samples for {} older than {}", predicate, cutoff);
        self.backend.remove_older_than(predicate, cutoff)
    }

    /// Drop all samples and averages
    pub fn clear(&self) -> StatsResult<()> {
        self.backend.clear()?;
        *self.averages.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    /// Whether every kind and direction has at least one finite sample
    pub fn is_populated(&self) -> StatsResult<bool> {
        for kind in StatKind::ALL {
            for direction in Direction::ALL {
                if self.backend.global_mean(kind, direction)?.is_none() {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Record one sample per value in the snapshot and seed its averages
    ///
    /// Without averages in the snapshot they are computed from the samples.
    pub fn import(&self, snapshot: &StatsSnapshot) -> StatsResult<()> {
        for (iri, stats) in &snapshot.predicates {
            let predicate = NamedNode::new(iri).map_err(|e| StatsError::InvalidPredicate(e.to_string()))?;
            for kind in StatKind::ALL {
                for direction in Direction::ALL {
                    if let Some(raw) = stats.get(kind, direction) {
                        self.record_raw(&predicate, kind, direction, raw)?;
                    }
                }
            }
        }
        match snapshot.averages {
            Some(averages) => self.seed_global_averages(averages),
            None => self.update_average_stats().map(|_| ()),
        }
    }
}

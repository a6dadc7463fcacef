//! Sample storage backends

use super::{Direction, GlobalAverages, Sample, SampleRecord, StatKind, StatValue, StatsResult};
use crate::rdf::NamedNode;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use std::sync::{PoisonError, RwLock};

/// Aggregate view of one (predicate, kind, direction) slot
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SlotSummary {
    /// Mean of the finite samples
    pub finite_mean: Option<f64>,
    pub finite_count: usize,
    pub infinite_count: usize,
}

impl SlotSummary {
    pub fn total(&self) -> usize {
        self.finite_count + self.infinite_count
    }

    /// Any infinite sample makes the slot infinite
    pub fn to_stat_value(&self) -> StatValue {
        if self.infinite_count > 0 {
            StatValue::Infinite
        } else {
            match self.finite_mean {
                Some(mean) => StatValue::Finite(mean),
                None => StatValue::NoSamples,
            }
        }
    }
}

/// Persistent storage of samples and global averages
pub trait SampleBackend: Send + Sync {
    /// Append one sample
    fn record(
        &self,
        predicate: &NamedNode,
        kind: StatKind,
        direction: Direction,
        sample: Sample,
        timestamp: DateTime<Utc>,
    ) -> StatsResult<()>;

    /// Aggregate one slot
    fn summary(&self, predicate: &NamedNode, kind: StatKind, direction: Direction) -> StatsResult<SlotSummary>;

    /// Mean of all finite samples of a kind and direction, over every predicate
    fn global_mean(&self, kind: StatKind, direction: Direction) -> StatsResult<Option<f64>>;

    /// Persisted global averages, if any were ever stored
    fn load_averages(&self) -> StatsResult<Option<GlobalAverages>>;

    /// Replace the persisted global averages
    fn store_averages(&self, averages: &GlobalAverages) -> StatsResult<()>;

    /// Drop every sample of a predicate
    fn remove_predicate(&self, predicate: &NamedNode) -> StatsResult<()>;

    /// Drop the samples of a predicate taken before `cutoff`
    fn remove_older_than(&self, predicate: &NamedNode, cutoff: DateTime<Utc>) -> StatsResult<()>;

    /// Drop all samples and averages
    fn clear(&self) -> StatsResult<()>;
}

type SlotKey = (NamedNode, StatKind, Direction);

/// In-process backend
#[derive(Default)]
pub struct MemoryBackend {
    samples: RwLock<FxHashMap<SlotKey, Vec<SampleRecord>>>,
    averages: RwLock<Option<GlobalAverages>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn summarize<'a>(records: impl Iterator<Item = &'a SampleRecord>) -> SlotSummary {
    let mut summary = SlotSummary::default();
    let mut sum = 0.0;
    for record in records {
        match record.sample {
            Sample::Value(v) => {
                sum += v;
                summary.finite_count += 1;
            }
            Sample::Infinite => summary.infinite_count += 1,
        }
    }
    if summary.finite_count > 0 {
        summary.finite_mean = Some(sum / summary.finite_count as f64);
    }
    summary
}

impl SampleBackend for MemoryBackend {
    fn record(
        &self,
        predicate: &NamedNode,
        kind: StatKind,
        direction: Direction,
        sample: Sample,
        timestamp: DateTime<Utc>,
    ) -> StatsResult<()> {
        self.samples
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((predicate.clone(), kind, direction))
            .or_default()
            .push(SampleRecord { sample, timestamp });
        Ok(())
    }

    fn summary(&self, predicate: &NamedNode, kind: StatKind, direction: Direction) -> StatsResult<SlotSummary> {
        let samples = self.samples.read().unwrap_or_else(PoisonError::into_inner);
        let key = (predicate.clone(), kind, direction);
        Ok(summarize(samples.get(&key).into_iter().flatten()))
    }

    fn global_mean(&self, kind: StatKind, direction: Direction) -> StatsResult<Option<f64>> {
        let samples = self.samples.read().unwrap_or_else(PoisonError::into_inner);
        let records = samples
            .iter()
            .filter(|((_, k, d), _)| *k == kind && *d == direction)
            .flat_map(|(_, records)| records);
        Ok(summarize(records).finite_mean)
    }

    fn load_averages(&self) -> StatsResult<Option<GlobalAverages>> {
        Ok(*self.averages.read().unwrap_or_else(PoisonError::into_inner))
    }

    fn store_averages(&self, averages: &GlobalAverages) -> StatsResult<()> {
        *self.averages.write().unwrap_or_else(PoisonError::into_inner) = Some(*averages);
        Ok(())
    }

    fn remove_predicate(&self, predicate: &NamedNode) -> StatsResult<()> {
        self.samples
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(p, _, _), _| p != predicate);
        Ok(())
    }

    fn remove_older_than(&self, predicate: &NamedNode, cutoff: DateTime<Utc>) -> StatsResult<()> {
        let mut samples = self.samples.write().unwrap_or_else(PoisonError::into_inner);
        for ((p, _, _), records) in samples.iter_mut() {
            if p == predicate {
                records.retain(|r| r.timestamp >= cutoff);
            }
        }
        Ok(())
    }

    fn clear(&self) -> StatsResult<()> {
        self.samples.write().unwrap_or_else(PoisonError::into_inner).clear();
        *self.averages.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn pred(name: &str) -> NamedNode {
        NamedNode::new(&format!("http://example.org/{}", name)).unwrap()
    }

    #[test]
    fn test_summary() {
        let backend = MemoryBackend::new();
        let now = Utc::now();
        let p = pred("p");
        backend.record(&p, StatKind::Time, Direction::Forward, Sample::Value(10.0), now).unwrap();
        backend.record(&p, StatKind::Time, Direction::Forward, Sample::Value(30.0), now).unwrap();

        let summary = backend.summary(&p, StatKind::Time, Direction::Forward).unwrap();
        assert_eq!(summary.finite_mean, Some(20.0));
        assert_eq!(summary.total(), 2);
        assert_eq!(summary.to_stat_value(), StatValue::Finite(20.0));

        backend.record(&p, StatKind::Time, Direction::Forward, Sample::Infinite, now).unwrap();
        let summary = backend.summary(&p, StatKind::Time, Direction::Forward).unwrap();
        assert_eq!(summary.to_stat_value(), StatValue::Infinite);

        let empty = backend.summary(&p, StatKind::Time, Direction::Reverse).unwrap();
        assert_eq!(empty.to_stat_value(), StatValue::NoSamples);
    }

    #[test]
    fn test_global_mean_ignores_infinite() {
        let backend = MemoryBackend::new();
        let now = Utc::now();
        backend.record(&pred("a"), StatKind::Selectivity, Direction::Forward, Sample::Value(2.0), now).unwrap();
        backend.record(&pred("b"), StatKind::Selectivity, Direction::Forward, Sample::Value(4.0), now).unwrap();
        backend.record(&pred("b"), StatKind::Selectivity, Direction::Forward, Sample::Infinite, now).unwrap();
        backend.record(&pred("b"), StatKind::Selectivity, Direction::Reverse, Sample::Value(100.0), now).unwrap();

        assert_eq!(backend.global_mean(StatKind::Selectivity, Direction::Forward).unwrap(), Some(3.0));
        assert_eq!(backend.global_mean(StatKind::Time, Direction::Forward).unwrap(), None);
    }

    #[test]
    fn test_remove_older_than() {
        let backend = MemoryBackend::new();
        let now = Utc::now();
        let p = pred("p");
        backend.record(&p, StatKind::Time, Direction::Forward, Sample::Value(1.0), now - Duration::days(30)).unwrap();
        backend.record(&p, StatKind::Time, Direction::Forward, Sample::Value(2.0), now).unwrap();
        backend.remove_older_than(&p, now - Duration::days(1)).unwrap();

        let summary = backend.summary(&p, StatKind::Time, Direction::Forward).unwrap();
        assert_eq!(summary.total(), 1);
        assert_eq!(summary.finite_mean, Some(2.0));
    }

    #[test]
    fn test_clear() {
        let backend = MemoryBackend::new();
        backend.store_averages(&GlobalAverages::uniform(1.0, 1.0)).unwrap();
        backend.record(&pred("p"), StatKind::Time, Direction::Forward, Sample::Value(1.0), Utc::now()).unwrap();
        backend.clear().unwrap();
        assert!(backend.load_averages().unwrap().is_none());
        assert_eq!(backend.summary(&pred("p"), StatKind::Time, Direction::Forward).unwrap().total(), 0);
    }
}

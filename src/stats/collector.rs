//! Statistics collection
//!
//! Populates a [`PredicateStatsDb`] by measuring live endpoints. Each measurement
//! picks a real subject (forward) or object (reverse) of the predicate,
//! counts the matches of `<subject> <p> ?o` or `?s <p> <object>` up to the
//! results limit, and records the count as selectivity and the elapsed
//! wall-clock time as time. Measurements that hit the limit record INFINITY.

use super::{Direction, GlobalAverages, PredicateStatsDb, Sample, StatKind, StatsResult};
use crate::config::CollectorSettings;
use crate::endpoint::{EndpointResult, TripleEndpoint};
use crate::rdf::{NamedNode, Node, TriplePattern, Variable};
use crate::sampler::{SamplerResult, TripleSampler};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// What one collection run recorded
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionReport {
    /// Predicates visited
    pub predicates: usize,
    /// Finite samples recorded
    pub samples_recorded: usize,
    /// INFINITY samples recorded
    pub infinite_recorded: usize,
    /// Measurements with no results
    pub empty_measurements: usize,
    /// Directions abandoned after a sampler or endpoint failure
    pub directions_aborted: usize,
    /// Global averages after the run, if recomputed
    pub averages: Option<GlobalAverages>,
}

impl CollectionReport {
    fn merge(&mut self, other: CollectionReport) {
        self.predicates += other.predicates;
        self.samples_recorded += other.samples_recorded;
        self.infinite_recorded += other.infinite_recorded;
        self.empty_measurements += other.empty_measurements;
        self.directions_aborted += other.directions_aborted;
    }
}

/// Gathers selectivity and time samples for predicates
pub struct StatsCollector {
    sampler: Arc<TripleSampler>,
    stats: Arc<PredicateStatsDb>,
    count_endpoints: Vec<Arc<dyn TripleEndpoint>>,
    settings: CollectorSettings,
}

impl StatsCollector {
    pub fn new(
        sampler: Arc<TripleSampler>,
        stats: Arc<PredicateStatsDb>,
        count_endpoints: Vec<Arc<dyn TripleEndpoint>>,
        settings: CollectorSettings,
    ) -> Self {
        Self {
            sampler,
            stats,
            count_endpoints,
            settings,
        }
    }

    pub fn stats(&self) -> &PredicateStatsDb {
        &self.stats
    }

    /// Top up every slot of a predicate to `num_samples` samples
    ///
    /// Samples taken before `stale_before` are dropped first.
    pub fn collect_for_predicate(
        &self,
        predicate: &NamedNode,
        num_samples: usize,
        stale_before: Option<DateTime<Utc>>,
    ) -> StatsResult<CollectionReport> {
        if let Some(cutoff) = stale_before {
            self.stats.remove_stale_samples(predicate, cutoff)?;
        }

        let mut report = CollectionReport {
            predicates: 1,
            ..Default::default()
        };
        for direction in Direction::ALL {
            self.collect_direction(predicate, direction, num_samples, &mut report)?;
        }
        info!(
            "collected {} finite and {} infinite samples for {}",
            report.samples_recorded, report.infinite_recorded, predicate
        );
        Ok(report)
    }

    fn collect_direction(
        &self,
        predicate: &NamedNode,
        direction: Direction,
        num_samples: usize,
        report: &mut CollectionReport,
    ) -> StatsResult<()> {
        let need_selectivity =
            num_samples.saturating_sub(self.stats.sample_count(predicate, StatKind::Selectivity, direction)?);
        let need_time = num_samples.saturating_sub(self.stats.sample_count(predicate, StatKind::Time, direction)?);
        let runs = need_selectivity.max(need_time);
        debug!("{} {} measurements needed for {}", runs, direction, predicate);

        for i in 0..runs {
            let pattern = match self.measurement_pattern(predicate, direction) {
                Ok(pattern) => pattern,
                Err(e) => {
                    warn!("no {} input term for {}: {}", direction, predicate, e);
                    report.directions_aborted += 1;
                    return Ok(());
                }
            };

            let start = Instant::now();
            let count = match self.count_bounded(&pattern) {
                Ok(count) => count,
                Err(e) => {
                    warn!("counting {} failed: {}", pattern, e);
                    report.directions_aborted += 1;
                    return Ok(());
                }
            };
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

            if count == 0 {
                warn!("{} returned no results, skipping", pattern);
                report.empty_measurements += 1;
                continue;
            }

            let (selectivity, time) = if count >= self.settings.results_limit {
                (Sample::Infinite, Sample::Infinite)
            } else {
                (Sample::Value(count as f64), Sample::Value(elapsed_ms))
            };
            if i < need_selectivity {
                self.record(predicate, StatKind::Selectivity, direction, selectivity, report)?;
            }
            if i < need_time {
                self.record(predicate, StatKind::Time, direction, time, report)?;
            }
        }
        Ok(())
    }

    fn record(
        &self,
        predicate: &NamedNode,
        kind: StatKind,
        direction: Direction,
        sample: Sample,
        report: &mut CollectionReport,
    ) -> StatsResult<()> {
        self.stats.record_sample(predicate, kind, direction, sample)?;
        if sample.is_infinite() {
            report.infinite_recorded += 1;
        } else {
            report.samples_recorded += 1;
        }
        Ok(())
    }

    /// `<subject> <p> ?o` for forward, `?s <p> <object>` for reverse
    fn measurement_pattern(&self, predicate: &NamedNode, direction: Direction) -> SamplerResult<TriplePattern> {
        Ok(match direction {
            Direction::Forward => TriplePattern::new(
                Node::from(self.sampler.sample_subject(predicate)?),
                predicate.clone(),
                Node::Variable(Variable::canonical("o")),
            ),
            Direction::Reverse => TriplePattern::new(
                Node::Variable(Variable::canonical("s")),
                predicate.clone(),
                Node::from(self.sampler.sample_object(predicate)?),
            ),
        })
    }

    fn count_bounded(&self, pattern: &TriplePattern) -> EndpointResult<u64> {
        let mut total = 0;
        for endpoint in &self.count_endpoints {
            total += endpoint.count_matches_lower_bound(pattern, self.settings.results_limit)?;
        }
        Ok(total)
    }

    /// Collect for each predicate, then recompute the global averages
    pub fn collect_for_predicates<'a>(
        &self,
        predicates: impl IntoIterator<Item = &'a NamedNode>,
        num_samples: usize,
        stale_before: Option<DateTime<Utc>>,
    ) -> StatsResult<CollectionReport> {
        let mut report = CollectionReport::default();
        for predicate in predicates {
            report.merge(self.collect_for_predicate(predicate, num_samples, stale_before)?);
        }
        report.averages = Some(self.stats.update_average_stats()?);
        Ok(report)
    }

    /// [`collect_for_predicates`](Self::collect_for_predicates) with the configured sample count
    pub fn collect_default<'a>(
        &self,
        predicates: impl IntoIterator<Item = &'a NamedNode>,
    ) -> StatsResult<CollectionReport> {
        self.collect_for_predicates(predicates, self.settings.samples_per_predicate, None)
    }
}

//! Sample storage in a named graph of a SPARQL store
//!
//! Layout, with `ns:` the configured vocabulary namespace:
//!
//! ```text
//! <pred>   ns:selectivitySample <sample> .     # or ns:timeSample
//! <sample> ns:directionIsForward "true" .
//! <sample> ns:selectivity 12 .                 # or ns:time; −1 is INFINITY
//! <sample> ns:timestamp "..."^^xsd:dateTime .
//! <graph>  ns:averageForwardSelectivity 3.5 .  # and the three other averages
//! ```

use super::backend::{SampleBackend, SlotSummary};
use super::{Direction, GlobalAverages, Sample, StatKind, StatsError, StatsResult};
use crate::config::StatsSettings;
use crate::endpoint::{Bindings, SparqlClient};
use crate::rdf::{NamedNode, RdfTerm};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::trace;
use uuid::Uuid;

const XSD_DATETIME: &str = "http://www.w3.org/2001/XMLSchema#dateTime";

/// [`SampleBackend`] that reads and writes a SPARQL store
pub struct SparqlSampleBackend<C: SparqlClient> {
    client: C,
    settings: StatsSettings,
}

impl<C: SparqlClient> SparqlSampleBackend<C> {
    pub fn new(client: C, settings: StatsSettings) -> Self {
        Self { client, settings }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn term(&self, local: &str) -> String {
        format!("<{}{}>", self.settings.namespace, local)
    }

    fn graph(&self) -> String {
        format!("<{}>", self.settings.graph)
    }

    fn link_property(&self, kind: StatKind) -> String {
        match kind {
            StatKind::Selectivity => self.term("selectivitySample"),
            StatKind::Time => self.term("timeSample"),
        }
    }

    fn value_property(&self, kind: StatKind) -> String {
        match kind {
            StatKind::Selectivity => self.term("selectivity"),
            StatKind::Time => self.term("time"),
        }
    }

    fn average_property(&self, kind: StatKind, direction: Direction) -> String {
        let local = match (kind, direction) {
            (StatKind::Selectivity, Direction::Forward) => "averageForwardSelectivity",
            (StatKind::Selectivity, Direction::Reverse) => "averageReverseSelectivity",
            (StatKind::Time, Direction::Forward) => "averageForwardTime",
            (StatKind::Time, Direction::Reverse) => "averageReverseTime",
        };
        self.term(local)
    }

    fn raw(&self, sample: Sample) -> f64 {
        match sample {
            Sample::Value(v) => v,
            Sample::Infinite => self.settings.infinity_sentinel,
        }
    }

    /// Sample triples of a slot; `predicate` is a bound IRI or a variable
    fn slot_pattern(&self, predicate: &str, kind: StatKind, direction: Direction) -> String {
        format!(
            "{} {} ?sample . ?sample {} \"{}\" . ?sample {} ?stat .",
            predicate,
            self.link_property(kind),
            self.term("directionIsForward"),
            direction.is_forward(),
            self.value_property(kind)
        )
    }

    fn select(&self, query: &str) -> StatsResult<Vec<Bindings>> {
        trace!("statistics query: {}", query);
        Ok(self.client.select(query)?)
    }

    fn update(&self, update: &str) -> StatsResult<()> {
        trace!("statistics update: {}", update);
        Ok(self.client.update(update)?)
    }

    fn count(&self, rows: &[Bindings], var: &str) -> StatsResult<usize> {
        Ok(number(rows, var)?.map(|n| n as usize).unwrap_or(0))
    }
}

/// A numeric binding of the first row, if bound
fn number(rows: &[Bindings], var: &str) -> StatsResult<Option<f64>> {
    match rows.first().and_then(|row| row.get(var)) {
        None => Ok(None),
        Some(RdfTerm::Literal(l)) => l
            .value()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| StatsError::StoreIo(format!("?{} is not a number: {}", var, l.value()))),
        Some(other) => Err(StatsError::StoreIo(format!("?{} is not a literal: {}", var, other))),
    }
}

impl<C: SparqlClient> SampleBackend for SparqlSampleBackend<C> {
    fn record(
        &self,
        predicate: &NamedNode,
        kind: StatKind,
        direction: Direction,
        sample: Sample,
        timestamp: DateTime<Utc>,
    ) -> StatsResult<()> {
        let node = format!("<{}sample-{}>", self.settings.namespace, Uuid::new_v4());
        let update = format!(
            "INSERT DATA {{ GRAPH {} {{ {} {} {} . {} {} \"{}\" . {} {} {} . {} {} \"{}\"^^<{}> . }} }}",
            self.graph(),
            predicate,
            self.link_property(kind),
            node,
            node,
            self.term("directionIsForward"),
            direction.is_forward(),
            node,
            self.value_property(kind),
            self.raw(sample),
            node,
            self.term("timestamp"),
            timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            XSD_DATETIME
        );
        self.update(&update)
    }

    fn summary(&self, predicate: &NamedNode, kind: StatKind, direction: Direction) -> StatsResult<SlotSummary> {
        let pattern = self.slot_pattern(&predicate.to_string(), kind, direction);
        let sentinel = self.settings.infinity_sentinel;
        let finite = self.select(&format!(
            "SELECT (AVG(?stat) AS ?avg) (COUNT(?stat) AS ?n) WHERE {{ GRAPH {} {{ {} FILTER(?stat != {}) }} }}",
            self.graph(),
            pattern,
            sentinel
        ))?;
        let infinite = self.select(&format!(
            "SELECT (COUNT(?stat) AS ?n) WHERE {{ GRAPH {} {{ {} FILTER(?stat = {}) }} }}",
            self.graph(),
            pattern,
            sentinel
        ))?;
        let finite_count = self.count(&finite, "n")?;
        Ok(SlotSummary {
            finite_mean: if finite_count > 0 { number(&finite, "avg")? } else { None },
            finite_count,
            infinite_count: self.count(&infinite, "n")?,
        })
    }

    fn global_mean(&self, kind: StatKind, direction: Direction) -> StatsResult<Option<f64>> {
        // AVG over no rows is 0, not unbound
        let rows = self.select(&format!(
            "SELECT (AVG(?stat) AS ?avg) (COUNT(?stat) AS ?n) WHERE {{ GRAPH {} {{ {} FILTER(?stat != {}) }} }}",
            self.graph(),
            self.slot_pattern("?predicate", kind, direction),
            self.settings.infinity_sentinel
        ))?;
        if self.count(&rows, "n")? == 0 {
            return Ok(None);
        }
        number(&rows, "avg")
    }

    fn load_averages(&self) -> StatsResult<Option<GlobalAverages>> {
        let graph = self.graph();
        let rows = self.select(&format!(
            "SELECT ?fs ?rs ?ft ?rt WHERE {{ GRAPH {g} {{ {g} {} ?fs ; {} ?rs ; {} ?ft ; {} ?rt . }} }} LIMIT 1",
            self.average_property(StatKind::Selectivity, Direction::Forward),
            self.average_property(StatKind::Selectivity, Direction::Reverse),
            self.average_property(StatKind::Time, Direction::Forward),
            self.average_property(StatKind::Time, Direction::Reverse),
            g = graph
        ))?;
        let values = (
            number(&rows, "fs")?,
            number(&rows, "rs")?,
            number(&rows, "ft")?,
            number(&rows, "rt")?,
        );
        match values {
            (Some(forward_selectivity), Some(reverse_selectivity), Some(forward_time), Some(reverse_time)) => {
                Ok(Some(GlobalAverages {
                    forward_selectivity,
                    reverse_selectivity,
                    forward_time,
                    reverse_time,
                }))
            }
            _ => Ok(None),
        }
    }

    fn store_averages(&self, averages: &GlobalAverages) -> StatsResult<()> {
        let graph = self.graph();
        let mut properties = Vec::new();
        let mut triples = String::new();
        for kind in StatKind::ALL {
            for direction in Direction::ALL {
                let property = self.average_property(kind, direction);
                triples.push_str(&format!("{} {} {} . ", graph, property, averages.get(kind, direction)));
                properties.push(property);
            }
        }
        self.update(&format!(
            "WITH {g} DELETE {{ {g} ?p ?o . }} WHERE {{ {g} ?p ?o . FILTER(?p IN ({})) }} ; \
             INSERT DATA {{ GRAPH {g} {{ {}}} }}",
            properties.join(", "),
            triples,
            g = graph
        ))
    }

    fn remove_predicate(&self, predicate: &NamedNode) -> StatsResult<()> {
        self.update(&format!(
            "WITH {} DELETE {{ {p} ?link ?sample . ?sample ?sp ?so . }} \
             WHERE {{ {p} ?link ?sample . FILTER(?link IN ({}, {})) ?sample ?sp ?so . }}",
            self.graph(),
            self.link_property(StatKind::Selectivity),
            self.link_property(StatKind::Time),
            p = predicate
        ))
    }

    fn remove_older_than(&self, predicate: &NamedNode, cutoff: DateTime<Utc>) -> StatsResult<()> {
        self.update(&format!(
            "WITH {} DELETE {{ {p} ?link ?sample . ?sample ?sp ?so . }} \
             WHERE {{ {p} ?link ?sample . FILTER(?link IN ({}, {})) \
             ?sample {} ?t . FILTER(?t < \"{}\"^^<{}>) ?sample ?sp ?so . }}",
            self.graph(),
            self.link_property(StatKind::Selectivity),
            self.link_property(StatKind::Time),
            self.term("timestamp"),
            cutoff.to_rfc3339_opts(SecondsFormat::Millis, true),
            XSD_DATETIME,
            p = predicate
        ))
    }

    fn clear(&self) -> StatsResult<()> {
        self.update(&format!("CLEAR SILENT GRAPH {}", self.graph()))
    }
}

//! Pattern cost model
//!
//! A pattern is weighted by the time to evaluate it from its bound side times
//! the estimated number of bindings of that side. Constants and variables
//! bound by the query context count as a single binding.

use super::OptimizerResult;
use crate::rdf::{NamedNode, Node, TriplePattern, Variable};
use crate::stats::{Direction, Estimate, PredicateStatsDb, StatKind};
use rustc_hash::FxHashMap;

/// Estimated number of distinct bindings per bound variable
pub(crate) type Cardinalities = FxHashMap<Variable, f64>;

/// A pattern that can be scheduled now
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub cost: f64,
    /// `None` for an existence check
    pub direction: Option<Direction>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Eligibility {
    Ready(Candidate),
    /// One side is bound but the predicate is INFINITY in that direction
    Blocked(Direction),
    /// Neither side is bound
    Unreachable,
}

/// `a × b`, where zero wins over infinity
fn weight(a: f64, b: f64) -> f64 {
    if a == 0.0 || b == 0.0 {
        0.0
    } else {
        a * b
    }
}

/// Bindings of a position, or `None` if it is an unbound variable or the wildcard
pub(crate) fn cardinality(node: &Node, bound: &Cardinalities) -> Option<f64> {
    match node {
        Node::Uri(_) | Node::Literal(_) | Node::Blank(_) => Some(1.0),
        Node::Variable(v) => bound.get(v).copied(),
        Node::Any => None,
    }
}

/// Whether a position is a variable already bound
pub(crate) fn shares_bound_variable(pattern: &TriplePattern, bound: &Cardinalities) -> bool {
    [&pattern.subject, &pattern.object]
        .into_iter()
        .filter_map(Node::as_variable)
        .any(|v| bound.contains_key(v))
}

/// Statistics lookups for one optimization run
pub(crate) struct CostModel<'a> {
    stats: &'a PredicateStatsDb,
    existence_check_cost: f64,
    estimates: FxHashMap<(NamedNode, StatKind, Direction), Estimate>,
}

impl<'a> CostModel<'a> {
    pub fn new(stats: &'a PredicateStatsDb, existence_check_cost: f64) -> Self {
        Self {
            stats,
            existence_check_cost,
            estimates: FxHashMap::default(),
        }
    }

    fn estimate(&mut self, predicate: &NamedNode, kind: StatKind, direction: Direction) -> OptimizerResult<Estimate> {
        let key = (predicate.clone(), kind, direction);
        if let Some(estimate) = self.estimates.get(&key) {
            return Ok(*estimate);
        }
        let estimate = self.stats.stat_or_average(predicate, kind, direction)?;
        self.estimates.insert(key, estimate);
        Ok(estimate)
    }

    /// Cost of scheduling `pattern` next
    pub fn evaluate(
        &mut self,
        pattern: &TriplePattern,
        predicate: &NamedNode,
        bound: &Cardinalities,
    ) -> OptimizerResult<Eligibility> {
        let subject = cardinality(&pattern.subject, bound);
        let object = cardinality(&pattern.object, bound);
        let (direction, input) = match (subject, object) {
            (Some(_), Some(_)) => {
                return Ok(Eligibility::Ready(Candidate {
                    cost: self.existence_check_cost,
                    direction: None,
                }))
            }
            (Some(card), None) => (Direction::Forward, card),
            (None, Some(card)) => (Direction::Reverse, card),
            (None, None) => return Ok(Eligibility::Unreachable),
        };

        match self.estimate(predicate, StatKind::Time, direction)? {
            Estimate::Infinite => Ok(Eligibility::Blocked(direction)),
            Estimate::Finite(time) => Ok(Eligibility::Ready(Candidate {
                cost: weight(time, input),
                direction: Some(direction),
            })),
        }
    }

    /// Bind the output variable of a pattern evaluated in `direction`
    pub fn bind(
        &mut self,
        pattern: &TriplePattern,
        predicate: &NamedNode,
        direction: Direction,
        bound: &mut Cardinalities,
    ) -> OptimizerResult<()> {
        let (input, output) = match direction {
            Direction::Forward => (&pattern.subject, &pattern.object),
            Direction::Reverse => (&pattern.object, &pattern.subject),
        };
        let Some(var) = output.as_variable() else {
            return Ok(());
        };
        if bound.contains_key(var) {
            return Ok(());
        }
        let input = cardinality(input, bound).unwrap_or(1.0);
        let selectivity = self.estimate(predicate, StatKind::Selectivity, direction)?.as_f64();
        bound.insert(var.clone(), weight(input, selectivity));
        Ok(())
    }
}

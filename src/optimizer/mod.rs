//! Join-order optimizer for basic graph patterns
//!
//! Patterns are ordered greedily, in the manner of Prim's algorithm: starting
//! from the bound variables (constants and the query context), repeatedly
//! schedule the cheapest pattern that joins on something already bound,
//! then mark the variable it produces as bound. See [`cost`] for weights.
//!
//! A predicate whose required direction is INFINITY is held back until its
//! other side gets bound through a different pattern, so an `rdf:type` with
//! only the class known is scheduled as a check instead of a scan.
//!
//! # Example
//!
//! ```rust
//! use bgp_planner::config::OptimizerSettings;
//! use bgp_planner::optimizer::JoinOrderOptimizer;
//! use bgp_planner::rdf::{NamedNode, Node, TriplePattern};
//! use bgp_planner::stats::{GlobalAverages, PredicateStatsDb};
//!
//! let stats = PredicateStatsDb::in_memory();
//! stats.seed_global_averages(GlobalAverages::uniform(10.0, 100.0)).unwrap();
//!
//! let p = NamedNode::new("http://example.org/p").unwrap();
//! let bgp = vec![
//!     TriplePattern::new(Node::var("y").unwrap(), p.clone(), Node::var("z").unwrap()),
//!     TriplePattern::new(Node::uri("http://example.org/x").unwrap(), p, Node::var("y").unwrap()),
//! ];
//!
//! let optimizer = JoinOrderOptimizer::new(&stats, OptimizerSettings::default());
//! let ordered = optimizer.optimize(&bgp).unwrap();
//! assert_eq!(ordered[0], bgp[1]);
//! ```

mod cost;

use crate::config::{DisconnectedPolicy, OptimizerSettings};
use crate::rdf::{NamedNode, Node, TriplePattern, Variable};
use crate::stats::{Direction, PredicateStatsDb, StatsError};
use cost::{shares_bound_variable, Candidate, Cardinalities, CostModel, Eligibility};
use indexmap::IndexSet;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Optimizer errors
#[derive(Error, Debug)]
pub enum OptimizerError {
    /// Predicate variables are not supported
    #[error("Pattern {index} has a variable predicate: {pattern}")]
    VariablePredicate { index: usize, pattern: String },

    /// Predicate position holds a literal or blank node
    #[error("Pattern {index} has an invalid predicate: {pattern}")]
    InvalidPredicate { index: usize, pattern: String },

    /// Some patterns share no variable with the rest, under [`DisconnectedPolicy::Reject`]
    #[error("Basic graph pattern is disconnected: {remaining} patterns cannot be joined")]
    Disconnected { remaining: usize },

    /// Global averages were never seeded
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Statistics error: {0}")]
    Statistics(String),
}

impl From<StatsError> for OptimizerError {
    fn from(e: StatsError) -> Self {
        match e {
            StatsError::Configuration(msg) => OptimizerError::Configuration(msg),
            other => OptimizerError::Statistics(other.to_string()),
        }
    }
}

pub type OptimizerResult<T> = Result<T, OptimizerError>;

/// Variables bound before the BGP is evaluated
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryContext {
    bound: IndexSet<Variable>,
}

impl QueryContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bound(variables: impl IntoIterator<Item = Variable>) -> Self {
        Self {
            bound: variables.into_iter().collect(),
        }
    }

    pub fn bind(&mut self, variable: Variable) {
        self.bound.insert(variable);
    }

    pub fn is_bound(&self, variable: &Variable) -> bool {
        self.bound.contains(variable)
    }

    pub fn bound(&self) -> impl Iterator<Item = &Variable> {
        self.bound.iter()
    }
}

/// One scheduled pattern
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlanStep {
    /// Position in the input
    pub index: usize,
    /// Estimated cost; INFINITY for forced and appended patterns
    pub cost: f64,
    /// Direction the predicate is evaluated in; `None` for checks and appended patterns
    pub direction: Option<Direction>,
}

/// Result of ordering a BGP
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JoinPlan {
    pub steps: Vec<PlanStep>,
    /// Patterns appended without a join, under [`DisconnectedPolicy::AppendRemainder`]
    pub stranded: usize,
}

impl JoinPlan {
    /// Input positions in execution order
    pub fn order(&self) -> Vec<usize> {
        self.steps.iter().map(|step| step.index).collect()
    }

    /// Reorder `patterns` by this plan
    pub fn apply(&self, patterns: &[TriplePattern]) -> Vec<TriplePattern> {
        self.steps.iter().map(|step| patterns[step.index].clone()).collect()
    }

    pub fn total_cost(&self) -> f64 {
        self.steps.iter().map(|step| step.cost).sum()
    }

    pub fn is_connected(&self) -> bool {
        self.stranded == 0
    }
}

/// Cost-based BGP join-order optimizer
///
/// Holds no state between calls; the statistics are only read.
pub struct JoinOrderOptimizer<'a> {
    stats: &'a PredicateStatsDb,
    settings: OptimizerSettings,
}

impl<'a> JoinOrderOptimizer<'a> {
    pub fn new(stats: &'a PredicateStatsDb, settings: OptimizerSettings) -> Self {
        Self { stats, settings }
    }

    /// Reorder a BGP with nothing bound in advance
    pub fn optimize(&self, patterns: &[TriplePattern]) -> OptimizerResult<Vec<TriplePattern>> {
        self.optimize_with_context(patterns, &QueryContext::default())
    }

    /// Reorder a BGP given variables bound by the surrounding query
    pub fn optimize_with_context(
        &self,
        patterns: &[TriplePattern],
        context: &QueryContext,
    ) -> OptimizerResult<Vec<TriplePattern>> {
        Ok(self.plan(patterns, context)?.apply(patterns))
    }

    /// Compute the execution order with per-step costs
    pub fn plan(&self, patterns: &[TriplePattern], context: &QueryContext) -> OptimizerResult<JoinPlan> {
        let predicates = predicates(patterns)?;
        let mut model = CostModel::new(self.stats, self.settings.existence_check_cost);
        let mut bound: Cardinalities = context.bound().map(|v| (v.clone(), 1.0)).collect();
        let mut remaining: Vec<usize> = (0..patterns.len()).collect();
        let mut plan = JoinPlan::default();
        let mut component_start = true;

        while !remaining.is_empty() {
            let mut best: Option<(usize, Candidate)> = None;
            let mut connected_blocked: Option<(usize, Direction)> = None;
            let mut any_blocked: Option<(usize, Direction)> = None;
            let mut first_unreachable: Option<usize> = None;

            for (pos, &index) in remaining.iter().enumerate() {
                match model.evaluate(&patterns[index], predicates[index], &bound)? {
                    // Strict comparison keeps the earliest input on ties
                    Eligibility::Ready(candidate) => {
                        if best.map_or(true, |(_, b)| candidate.cost < b.cost) {
                            best = Some((pos, candidate));
                        }
                    }
                    Eligibility::Blocked(direction) => {
                        any_blocked.get_or_insert((pos, direction));
                        if shares_bound_variable(&patterns[index], &bound) {
                            connected_blocked.get_or_insert((pos, direction));
                        }
                    }
                    Eligibility::Unreachable => {
                        first_unreachable.get_or_insert(pos);
                    }
                }
            }

            let forced = match (connected_blocked, component_start) {
                (Some(blocked), _) => Some(blocked),
                (None, true) if first_unreachable.is_none() => any_blocked,
                (None, _) => None,
            };
            let (pos, cost, direction) = if let Some((pos, candidate)) = best {
                (pos, candidate.cost, candidate.direction)
            } else if let Some((pos, direction)) = forced {
                debug!("forcing {} with INFINITY {} cost", patterns[remaining[pos]], direction);
                (pos, f64::INFINITY, Some(direction))
            } else if let (true, Some(pos)) = (component_start, first_unreachable) {
                let index = remaining[pos];
                self.start(&mut model, &patterns[index], predicates[index], &mut bound, pos)?
            } else {
                match self.settings.disconnected {
                    DisconnectedPolicy::Reject => {
                        return Err(OptimizerError::Disconnected {
                            remaining: remaining.len(),
                        })
                    }
                    DisconnectedPolicy::AppendRemainder => {
                        warn!(
                            "basic graph pattern is disconnected, appending {} patterns in input order",
                            remaining.len()
                        );
                        plan.stranded = remaining.len();
                        plan.steps.extend(remaining.drain(..).map(|index| PlanStep {
                            index,
                            cost: f64::INFINITY,
                            direction: None,
                        }));
                        break;
                    }
                    DisconnectedPolicy::OptimizeComponents => {
                        info!("basic graph pattern is disconnected, ordering the next component");
                        component_start = true;
                        continue;
                    }
                }
            };

            let index = remaining.remove(pos);
            if let Some(direction) = direction {
                model.bind(&patterns[index], predicates[index], direction, &mut bound)?;
            }
            debug!("step {}: {} (cost {})", plan.steps.len(), patterns[index], cost);
            plan.steps.push(PlanStep { index, cost, direction });
            component_start = false;
        }

        info!(
            "ordered {} patterns, total estimated cost {}",
            plan.steps.len(),
            plan.total_cost()
        );
        Ok(plan)
    }

    /// Open a component at a pattern with nothing bound
    ///
    /// The subject variable (or, failing that, the object variable) is taken
    /// as a start node with a single binding.
    fn start(
        &self,
        model: &mut CostModel<'_>,
        pattern: &TriplePattern,
        predicate: &NamedNode,
        bound: &mut Cardinalities,
        pos: usize,
    ) -> OptimizerResult<(usize, f64, Option<Direction>)> {
        let Some(seed) = pattern.subject.as_variable().or_else(|| pattern.object.as_variable()) else {
            debug!("starting from {} without a join variable", pattern);
            return Ok((pos, f64::INFINITY, None));
        };
        debug!("starting from {} with {} as start node", pattern, seed);
        bound.insert(seed.clone(), 1.0);
        Ok(match model.evaluate(pattern, predicate, bound)? {
            Eligibility::Ready(candidate) => (pos, candidate.cost, candidate.direction),
            Eligibility::Blocked(direction) => (pos, f64::INFINITY, Some(direction)),
            Eligibility::Unreachable => (pos, f64::INFINITY, None),
        })
    }
}

/// The constant predicate of each pattern
fn predicates(patterns: &[TriplePattern]) -> OptimizerResult<Vec<&NamedNode>> {
    patterns
        .iter()
        .enumerate()
        .map(|(index, pattern)| match &pattern.predicate {
            Node::Uri(predicate) => Ok(predicate),
            Node::Variable(_) | Node::Any => Err(OptimizerError::VariablePredicate {
                index,
                pattern: pattern.to_string(),
            }),
            Node::Literal(_) | Node::Blank(_) => Err(OptimizerError::InvalidPredicate {
                index,
                pattern: pattern.to_string(),
            }),
        })
        .collect()
}

//! Join-order optimizer tests

use bgp_planner::config::{DisconnectedPolicy, OptimizerSettings};
use bgp_planner::optimizer::{JoinOrderOptimizer, JoinPlan, OptimizerError, QueryContext};
use bgp_planner::rdf::{parse_bgp, NamedNode, Node, TriplePattern, Variable, RDF_TYPE};
use bgp_planner::stats::{Direction, GlobalAverages, PredicateStatsDb, StatKind};
use std::collections::HashSet;

const EX: &str = "http://example.org/";

fn iri(local: &str) -> NamedNode {
    NamedNode::new(&format!("{}{}", EX, local)).unwrap()
}

fn v(name: &str) -> Node {
    Node::var(name).unwrap()
}

fn c(local: &str) -> Node {
    Node::Uri(iri(local))
}

/// Statistics of the seven-predicate scenario; −1 marks an INFINITY direction
fn scenario_stats() -> PredicateStatsDb {
    let rows = [
        ("a", 5.0, -1.0, 1000.0, -1.0),
        ("b", 4.0, 3.0, 1500.0, 1500.0),
        ("c", 3.0, -1.0, 2000.0, -1.0),
        ("d", 2.0, -1.0, 1000.0, -1.0),
        ("e", 1.0, 4.0, 500.0, 2000.0),
        ("f", 4.0, 4.0, 1000.0, 1000.0),
        ("g", 4.0, -1.0, 3000.0, -1.0),
    ];
    let stats = PredicateStatsDb::in_memory();
    for (name, fs, rs, ft, rt) in rows {
        let p = iri(name);
        stats.record_raw(&p, StatKind::Selectivity, Direction::Forward, fs).unwrap();
        stats.record_raw(&p, StatKind::Selectivity, Direction::Reverse, rs).unwrap();
        stats.record_raw(&p, StatKind::Time, Direction::Forward, ft).unwrap();
        stats.record_raw(&p, StatKind::Time, Direction::Reverse, rt).unwrap();
    }
    stats.update_average_stats().unwrap();
    stats
}

fn scenario_bgp() -> Vec<TriplePattern> {
    vec![
        TriplePattern::new(c("const"), iri("a"), v("v1")),
        TriplePattern::new(c("const"), iri("b"), v("v2")),
        TriplePattern::new(v("v1"), iri("f"), v("v4")),
        TriplePattern::new(v("v1"), iri("c"), v("v3")),
        TriplePattern::new(v("v2"), iri("d"), v("v1")),
        TriplePattern::new(v("v3"), iri("e"), v("v2")),
        TriplePattern::new(v("v4"), iri("g"), v("v3")),
    ]
}

fn predicate_names(patterns: &[TriplePattern]) -> Vec<String> {
    patterns
        .iter()
        .map(|p| {
            p.predicate
                .as_named_node()
                .unwrap()
                .as_str()
                .trim_start_matches(EX)
                .to_string()
        })
        .collect()
}

fn seeded() -> PredicateStatsDb {
    let stats = PredicateStatsDb::in_memory();
    stats
        .seed_global_averages(GlobalAverages::uniform(10.0, 100.0))
        .unwrap();
    stats
}

/// Every scheduled pattern has a constant or an already covered variable in subject or object
fn assert_connected(patterns: &[TriplePattern], plan: &JoinPlan) {
    let mut covered: HashSet<Variable> = HashSet::new();
    for step in &plan.steps {
        let pattern = &patterns[step.index];
        if !covered.is_empty() {
            let joined = [&pattern.subject, &pattern.object].into_iter().any(|node| match node {
                Node::Variable(var) => covered.contains(var),
                Node::Any => false,
                _ => true,
            });
            assert!(joined, "{} does not join on earlier patterns", pattern);
        }
        covered.extend(pattern.variables().cloned());
    }
}

fn assert_permutation(len: usize, plan: &JoinPlan) {
    let mut order = plan.order();
    order.sort_unstable();
    assert_eq!(order, (0..len).collect::<Vec<_>>());
}

#[test]
fn test_end_to_end_scenario() {
    let stats = scenario_stats();
    let optimizer = JoinOrderOptimizer::new(&stats, OptimizerSettings::default());
    let bgp = scenario_bgp();

    let ordered = optimizer.optimize(&bgp).unwrap();
    let names = predicate_names(&ordered);
    assert_eq!(&names[..5], &["a", "b", "d", "f", "e"]);
    let tail: HashSet<_> = names[5..].iter().map(String::as_str).collect();
    assert_eq!(tail, HashSet::from(["c", "g"]));

    // Ties keep input order
    assert_eq!(names, vec!["a", "b", "d", "f", "e", "c", "g"]);
}

#[test]
fn test_end_to_end_from_sparql() {
    let stats = scenario_stats();
    let optimizer = JoinOrderOptimizer::new(&stats, OptimizerSettings::default());
    let bgp = parse_bgp(
        "PREFIX ex: <http://example.org/>
         SELECT * WHERE {
            ex:const ex:a ?v1 . ex:const ex:b ?v2 . ?v1 ex:f ?v4 . ?v1 ex:c ?v3 .
            ?v2 ex:d ?v1 . ?v3 ex:e ?v2 . ?v4 ex:g ?v3 .
         }",
    )
    .unwrap();
    assert_eq!(bgp, scenario_bgp());
    let plan = optimizer.plan(&bgp, &QueryContext::new()).unwrap();
    assert_eq!(plan.order(), vec![0, 1, 4, 2, 5, 3, 6]);
    assert_eq!(plan.steps[0].cost, 1000.0);
    assert_eq!(plan.steps[2].direction, None);
    assert!(plan.is_connected());
}

#[test]
fn test_deterministic() {
    let stats = scenario_stats();
    let optimizer = JoinOrderOptimizer::new(&stats, OptimizerSettings::default());
    let bgp = scenario_bgp();
    let first = optimizer.plan(&bgp, &QueryContext::new()).unwrap();
    for _ in 0..5 {
        assert_eq!(optimizer.plan(&bgp, &QueryContext::new()).unwrap(), first);
    }
}

#[test]
fn test_connectivity_and_permutation() {
    let stats = scenario_stats();
    let optimizer = JoinOrderOptimizer::new(&stats, OptimizerSettings::default());

    let mut bgp = scenario_bgp();
    for rotation in 0..bgp.len() {
        bgp.rotate_left(1);
        let plan = optimizer.plan(&bgp, &QueryContext::new()).unwrap();
        assert_permutation(bgp.len(), &plan);
        assert_connected(&bgp, &plan);
        assert!(plan.is_connected(), "rotation {}", rotation);

        let ordered = plan.apply(&bgp);
        let input: HashSet<_> = bgp.iter().collect();
        let output: HashSet<_> = ordered.iter().collect();
        assert_eq!(input, output);
    }
}

#[test]
fn test_duplicate_patterns_are_kept() {
    let stats = seeded();
    let optimizer = JoinOrderOptimizer::new(&stats, OptimizerSettings::default());
    let pattern = TriplePattern::new(c("s"), iri("p"), v("o"));
    let ordered = optimizer.optimize(&[pattern.clone(), pattern.clone()]).unwrap();
    assert_eq!(ordered, vec![pattern.clone(), pattern]);
}

#[test]
fn test_reverse_type_is_held_back() {
    let stats = seeded();
    let optimizer = JoinOrderOptimizer::new(&stats, OptimizerSettings::default());
    let rdf_type = NamedNode::new(RDF_TYPE).unwrap();
    let bgp = vec![
        TriplePattern::new(v("x"), rdf_type, c("Person")),
        TriplePattern::new(v("x"), iri("knows"), v("y")),
        TriplePattern::new(c("alice"), iri("knows"), v("x")),
    ];
    let plan = optimizer.plan(&bgp, &QueryContext::new()).unwrap();
    assert_eq!(plan.order()[0], 2);
    // Once ?x is bound the type pattern is a cheap check
    assert_eq!(plan.order()[1], 0);
    assert_eq!(plan.steps[1].direction, None);
    assert_connected(&bgp, &plan);
}

#[test]
fn test_type_only_with_unbound_subject_starts_elsewhere() {
    let stats = seeded();
    let optimizer = JoinOrderOptimizer::new(&stats, OptimizerSettings::default());
    let rdf_type = NamedNode::new(RDF_TYPE).unwrap();
    let bgp = vec![
        TriplePattern::new(v("x"), rdf_type, c("Person")),
        TriplePattern::new(v("x"), iri("name"), v("n")),
    ];
    let plan = optimizer.plan(&bgp, &QueryContext::new()).unwrap();
    assert_eq!(plan.order(), vec![1, 0]);
    assert!(plan.total_cost().is_finite());
}

#[test]
fn test_query_context_bindings() {
    let stats = seeded();
    let optimizer = JoinOrderOptimizer::new(&stats, OptimizerSettings::default());
    let bgp = vec![
        TriplePattern::new(v("a"), iri("p"), v("b")),
        TriplePattern::new(v("b"), iri("q"), v("c")),
        TriplePattern::new(v("c"), iri("r"), v("d")),
    ];
    let context = QueryContext::with_bound([Variable::new("c").unwrap()]);
    let plan = optimizer.plan(&bgp, &context).unwrap();
    assert_eq!(plan.order()[0], 1);
    assert_eq!(plan.steps[0].direction, Some(Direction::Reverse));
    assert_permutation(bgp.len(), &plan);
}

fn two_component_bgp() -> Vec<TriplePattern> {
    vec![
        TriplePattern::new(c("c"), iri("p"), v("x")),
        TriplePattern::new(v("x"), iri("q"), v("y")),
        TriplePattern::new(v("z"), iri("v"), v("w")),
        TriplePattern::new(v("x2"), iri("u"), v("y2")),
        TriplePattern::new(v("y2"), iri("t"), v("z")),
    ]
}

#[test]
fn test_disconnected_append_remainder() {
    let stats = seeded();
    let optimizer = JoinOrderOptimizer::new(&stats, OptimizerSettings::default());
    let plan = optimizer.plan(&two_component_bgp(), &QueryContext::new()).unwrap();
    assert_eq!(plan.order(), vec![0, 1, 2, 3, 4]);
    assert_eq!(plan.stranded, 3);
    assert!(!plan.is_connected());
    assert!(plan.steps[2..].iter().all(|s| s.cost.is_infinite() && s.direction.is_none()));
}

#[test]
fn test_disconnected_optimize_components() {
    let stats = seeded();
    let settings = OptimizerSettings {
        disconnected: DisconnectedPolicy::OptimizeComponents,
        ..Default::default()
    };
    let optimizer = JoinOrderOptimizer::new(&stats, settings);
    let bgp = two_component_bgp();
    let plan = optimizer.plan(&bgp, &QueryContext::new()).unwrap();
    assert_eq!(plan.order(), vec![0, 1, 2, 4, 3]);
    assert!(plan.is_connected());
    assert_permutation(bgp.len(), &plan);
}

#[test]
fn test_disconnected_reject() {
    let stats = seeded();
    let settings = OptimizerSettings {
        disconnected: DisconnectedPolicy::Reject,
        ..Default::default()
    };
    let optimizer = JoinOrderOptimizer::new(&stats, settings);
    match optimizer.optimize(&two_component_bgp()) {
        Err(OptimizerError::Disconnected { remaining }) => assert_eq!(remaining, 3),
        other => panic!("expected a disconnected error, got {:?}", other),
    }
}

#[test]
fn test_variable_predicate() {
    let stats = seeded();
    let optimizer = JoinOrderOptimizer::new(&stats, OptimizerSettings::default());
    let bgp = parse_bgp("SELECT * WHERE { ?s ?p ?o }").unwrap();
    assert!(matches!(
        optimizer.optimize(&bgp),
        Err(OptimizerError::VariablePredicate { index: 0, .. })
    ));
}

#[test]
fn test_existence_check_cost_setting() {
    let stats = seeded();
    let settings = OptimizerSettings {
        existence_check_cost: 5000.0,
        ..Default::default()
    };
    let optimizer = JoinOrderOptimizer::new(&stats, settings);
    let bgp = vec![
        TriplePattern::new(c("a"), iri("p"), c("b")),
        TriplePattern::new(c("a"), iri("q"), v("x")),
    ];
    let plan = optimizer.plan(&bgp, &QueryContext::new()).unwrap();
    assert_eq!(plan.order(), vec![1, 0]);
    assert_eq!(plan.steps[1].cost, 5000.0);
}

#[test]
fn test_concurrent_optimization() {
    let stats = scenario_stats();
    let bgp = scenario_bgp();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    let optimizer = JoinOrderOptimizer::new(&stats, OptimizerSettings::default());
                    optimizer.plan(&bgp, &QueryContext::new()).unwrap().order()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), vec![0, 1, 4, 2, 5, 3, 6]);
        }
    });
}

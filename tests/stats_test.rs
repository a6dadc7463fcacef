//! Predicate statistics tests

use bgp_planner::config::{CollectorSettings, SamplerSettings};
use bgp_planner::endpoint::{MemoryEndpoint, TripleEndpoint};
use bgp_planner::optimizer::{JoinOrderOptimizer, QueryContext};
use bgp_planner::rdf::{NamedNode, Node, TriplePattern, RDF_TYPE};
use bgp_planner::sampler::TripleSampler;
use bgp_planner::stats::{
    Direction, Estimate, GlobalAverages, PredicateStatsDb, StatKind, StatValue, StatsCollector, StatsError,
    StatsSnapshot,
};
use std::sync::Arc;

fn iri(local: &str) -> NamedNode {
    NamedNode::new(&format!("http://example.org/{}", local)).unwrap()
}

#[test]
fn test_missing_samples_equal_global_average() {
    let stats = PredicateStatsDb::in_memory();
    stats.record_raw(&iri("p"), StatKind::Time, Direction::Forward, 40.0).unwrap();
    stats.record_raw(&iri("q"), StatKind::Time, Direction::Forward, 60.0).unwrap();
    stats
        .seed_global_averages(GlobalAverages::uniform(1.0, 1.0))
        .unwrap();
    let averages = stats.update_average_stats().unwrap();
    assert_eq!(averages.forward_time, 50.0);

    let unseen = iri("unseen");
    for kind in StatKind::ALL {
        for direction in Direction::ALL {
            assert_eq!(stats.stat(&unseen, kind, direction).unwrap(), StatValue::NoSamples);
            assert_eq!(
                stats.stat_or_average(&unseen, kind, direction).unwrap(),
                Estimate::Finite(stats.global_average(kind, direction).unwrap())
            );
        }
    }
}

#[test]
fn test_reverse_type_is_always_infinite() {
    let stats = PredicateStatsDb::in_memory();
    let rdf_type = NamedNode::new(RDF_TYPE).unwrap();
    assert!(stats.is_infinite(&rdf_type, StatKind::Time, Direction::Reverse).unwrap());
    assert!(stats.is_infinite(&rdf_type, StatKind::Selectivity, Direction::Reverse).unwrap());
    // No averages are needed for it
    assert_eq!(
        stats.stat_or_average(&rdf_type, StatKind::Time, Direction::Reverse).unwrap(),
        Estimate::Infinite
    );
}

#[test]
fn test_concurrent_recording() {
    let stats = PredicateStatsDb::in_memory();
    let p = iri("p");
    std::thread::scope(|scope| {
        for t in 0..8 {
            let stats = &stats;
            let p = &p;
            scope.spawn(move || {
                for i in 0..25 {
                    stats
                        .record_raw(p, StatKind::Selectivity, Direction::Forward, (t * 25 + i) as f64)
                        .unwrap();
                }
            });
        }
    });
    assert_eq!(stats.sample_count(&p, StatKind::Selectivity, Direction::Forward).unwrap(), 200);
    assert_eq!(
        stats.stat(&p, StatKind::Selectivity, Direction::Forward).unwrap(),
        StatValue::Finite(99.5)
    );
}

#[test]
fn test_unseeded_store_is_a_configuration_error() {
    let stats = PredicateStatsDb::in_memory();
    assert!(matches!(
        stats.global_average(StatKind::Selectivity, Direction::Forward),
        Err(StatsError::Configuration(_))
    ));
}

#[test]
fn test_snapshot_drives_optimizer() {
    let snapshot = StatsSnapshot::from_yaml_str(
        "averages: { forward_selectivity: 2, reverse_selectivity: 2, forward_time: 100, reverse_time: 100 }\n\
         predicates:\n\
         \x20 http://example.org/cheap: { forward_time: 10, reverse_time: 10 }\n\
         \x20 http://example.org/dear: { forward_time: 5000, reverse_time: 5000 }\n",
    )
    .unwrap();
    let stats = PredicateStatsDb::in_memory();
    stats.import(&snapshot).unwrap();

    let start = Node::uri("http://example.org/start").unwrap();
    let bgp = vec![
        TriplePattern::new(start.clone(), iri("dear"), Node::var("x").unwrap()),
        TriplePattern::new(start, iri("cheap"), Node::var("y").unwrap()),
    ];
    let optimizer = JoinOrderOptimizer::new(&stats, Default::default());
    let plan = optimizer.plan(&bgp, &QueryContext::new()).unwrap();
    assert_eq!(plan.order(), vec![1, 0]);
}

#[test]
fn test_collected_statistics_feed_the_optimizer() {
    // Every hub has many members; every member belongs to one hub
    let mut data = String::new();
    for hub in 0..3 {
        for member in 0..6 {
            data.push_str(&format!(
                "<http://example.org/hub{h}> <http://example.org/hasMember> <http://example.org/m{h}_{m}> .\n\
                 <http://example.org/m{h}_{m}> <http://example.org/memberOf> <http://example.org/hub{h}> .\n",
                h = hub,
                m = member
            ));
        }
    }
    let endpoint = Arc::new(MemoryEndpoint::from_turtle("mem:hubs", &data).unwrap());
    let sampler = TripleSampler::for_endpoint(
        endpoint.clone(),
        &SamplerSettings {
            seed: Some(3),
            ..Default::default()
        },
    );
    let stats = Arc::new(PredicateStatsDb::in_memory());
    let counted: Arc<dyn TripleEndpoint> = endpoint;
    let collector = StatsCollector::new(Arc::new(sampler), stats.clone(), vec![counted], CollectorSettings::default());

    let predicates = [iri("hasMember"), iri("memberOf")];
    let report = collector.collect_for_predicates(&predicates, 4, None).unwrap();
    assert_eq!(report.predicates, 2);
    assert_eq!(report.directions_aborted, 0);

    assert_eq!(
        stats.stat(&iri("hasMember"), StatKind::Selectivity, Direction::Forward).unwrap(),
        StatValue::Finite(6.0)
    );
    assert_eq!(
        stats.stat(&iri("memberOf"), StatKind::Selectivity, Direction::Forward).unwrap(),
        StatValue::Finite(1.0)
    );
    let averages = report.averages.unwrap();
    assert_eq!(averages.forward_selectivity, 3.5);
}

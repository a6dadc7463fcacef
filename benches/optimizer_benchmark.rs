use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use bgp_planner::config::OptimizerSettings;
use bgp_planner::optimizer::{JoinOrderOptimizer, QueryContext};
use bgp_planner::rdf::{NamedNode, Node, TriplePattern};
use bgp_planner::stats::{Direction, GlobalAverages, PredicateStatsDb, StatKind};

fn predicate(i: usize) -> NamedNode {
    NamedNode::new(&format!("http://example.org/p{}", i)).unwrap()
}

fn var(name: String) -> Node {
    Node::var(&name).unwrap()
}

/// Statistics for `size` predicates with varied costs
fn stats(size: usize) -> PredicateStatsDb {
    let stats = PredicateStatsDb::in_memory();
    for i in 0..size {
        let p = predicate(i);
        let spread = (i % 7 + 1) as f64;
        stats.record_raw(&p, StatKind::Selectivity, Direction::Forward, spread).unwrap();
        stats.record_raw(&p, StatKind::Selectivity, Direction::Reverse, 8.0 - spread).unwrap();
        stats.record_raw(&p, StatKind::Time, Direction::Forward, 100.0 * spread).unwrap();
        stats.record_raw(&p, StatKind::Time, Direction::Reverse, 800.0 - 100.0 * spread).unwrap();
    }
    stats.seed_global_averages(GlobalAverages::uniform(4.0, 400.0)).unwrap();
    stats
}

/// `<start> p0 ?v0 . ?v0 p1 ?v1 . ...`, shuffled by reversing
fn chain(size: usize) -> Vec<TriplePattern> {
    let mut bgp: Vec<_> = (0..size)
        .map(|i| {
            let subject = if i == 0 {
                Node::uri("http://example.org/start").unwrap()
            } else {
                var(format!("v{}", i - 1))
            };
            TriplePattern::new(subject, predicate(i), var(format!("v{}", i)))
        })
        .collect();
    bgp.reverse();
    bgp
}

/// `?hub p_i ?leaf_i` for every i, plus one constant anchor
fn star(size: usize) -> Vec<TriplePattern> {
    let mut bgp: Vec<_> = (1..size)
        .map(|i| TriplePattern::new(var("hub".to_string()), predicate(i), var(format!("leaf{}", i))))
        .collect();
    bgp.push(TriplePattern::new(
        Node::uri("http://example.org/anchor").unwrap(),
        predicate(0),
        var("hub".to_string()),
    ));
    bgp
}

/// Benchmark ordering of chain-shaped BGPs
fn bench_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize_chain");

    for size in [4, 16, 64].iter() {
        let stats = stats(*size);
        let bgp = chain(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let optimizer = JoinOrderOptimizer::new(&stats, OptimizerSettings::default());
            b.iter(|| {
                let plan = optimizer.plan(&bgp, &QueryContext::new()).unwrap();
                criterion::black_box(plan.steps.len());
            });
        });
    }
    group.finish();
}

/// Benchmark ordering of star-shaped BGPs
fn bench_star(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimize_star");

    for size in [4, 16, 64].iter() {
        let stats = stats(*size);
        let bgp = star(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let optimizer = JoinOrderOptimizer::new(&stats, OptimizerSettings::default());
            b.iter(|| {
                let plan = optimizer.plan(&bgp, &QueryContext::new()).unwrap();
                criterion::black_box(plan.steps.len());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_chain, bench_star);
criterion_main!(benches);

//! bgp-planner CLI: join-order planning and statistics collection against
//! SPARQL endpoints
//!
//! Talks to SPARQL endpoints directly; there is no server to connect to.

use anyhow::{bail, Context, Result};
use bgp_planner::config::PlannerConfig;
use bgp_planner::endpoint::{HttpSparqlClient, RemoteEndpoint, TripleEndpoint};
use bgp_planner::optimizer::{JoinOrderOptimizer, QueryContext};
use bgp_planner::rdf::{parse_bgp, NamedNode, TriplePattern, Variable};
use bgp_planner::sampler::TripleSampler;
use bgp_planner::stats::{CollectionReport, PredicateStatsDb, SparqlSampleBackend, StatsCollector, StatsSnapshot};
use chrono::Utc;
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bgp-planner", version, about = "Cost-based join-order planner for basic graph patterns")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "BGP_PLANNER_CONFIG")]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Order the basic graph pattern of a SPARQL query
    Optimize {
        /// File holding the SPARQL query
        query: PathBuf,

        /// YAML statistics snapshot
        #[arg(long, conflicts_with = "stats_endpoint", required_unless_present = "stats_endpoint")]
        stats_file: Option<PathBuf>,

        /// SPARQL endpoint holding the statistics graph
        #[arg(long)]
        stats_endpoint: Option<String>,

        /// Variable bound before the query runs (repeatable, without `?`)
        #[arg(long = "bound", value_name = "VAR")]
        bound: Vec<String>,
    },
    /// Draw one random triple matching a pattern
    Sample {
        /// SPARQL endpoint to sample from
        #[arg(long)]
        endpoint: String,

        /// Triple pattern in SPARQL syntax, e.g. "?s <http://xmlns.com/foaf/0.1/knows> ?o"
        #[arg(long)]
        pattern: String,
    },
    /// Gather selectivity and time statistics for predicates
    Collect {
        /// SPARQL endpoint holding the data
        #[arg(long)]
        endpoint: String,

        /// SPARQL endpoint holding the statistics graph
        #[arg(long)]
        stats_endpoint: String,

        /// Update endpoint of the statistics store, if it differs from the query endpoint
        #[arg(long)]
        stats_update_endpoint: Option<String>,

        /// Predicate IRI (repeatable)
        #[arg(long = "predicate", required = true)]
        predicates: Vec<String>,

        /// Samples per predicate and slot
        #[arg(long)]
        samples: Option<usize>,

        /// Drop samples older than this many days first
        #[arg(long)]
        max_age_days: Option<i64>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => PlannerConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PlannerConfig::default(),
    };

    match cli.command {
        Commands::Optimize {
            query,
            stats_file,
            stats_endpoint,
            bound,
        } => {
            let stats = match (stats_file, stats_endpoint) {
                (Some(file), _) => stats_from_file(&file)?,
                (None, Some(uri)) => stats_from_endpoint(&uri, None, &config)?,
                (None, None) => bail!("either --stats-file or --stats-endpoint is required"),
            };
            run_optimize(&query, &stats, &bound, &config, &cli.format)
        }
        Commands::Sample { endpoint, pattern } => run_sample(&endpoint, &pattern, &config, &cli.format),
        Commands::Collect {
            endpoint,
            stats_endpoint,
            stats_update_endpoint,
            predicates,
            samples,
            max_age_days,
        } => {
            let stats = stats_from_endpoint(&stats_endpoint, stats_update_endpoint, &config)?;
            run_collect(
                &endpoint,
                Arc::new(stats),
                &predicates,
                samples.unwrap_or(config.collector.samples_per_predicate),
                max_age_days,
                &config,
                &cli.format,
            )
        }
    }
}

fn stats_from_file(path: &Path) -> Result<PredicateStatsDb> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let snapshot = StatsSnapshot::from_yaml_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    let stats = PredicateStatsDb::in_memory();
    stats.import(&snapshot)?;
    info!("loaded statistics for {} predicates", snapshot.predicates.len());
    Ok(stats)
}

fn stats_from_endpoint(uri: &str, update_uri: Option<String>, config: &PlannerConfig) -> Result<PredicateStatsDb> {
    let mut client = HttpSparqlClient::new(uri, &config.http)?;
    if let Some(update_uri) = update_uri {
        client = client.with_update_uri(update_uri);
    }
    let backend = SparqlSampleBackend::new(client, config.stats.clone());
    Ok(PredicateStatsDb::new(Arc::new(backend)))
}

fn remote_endpoint(uri: &str, config: &PlannerConfig) -> Result<Arc<dyn TripleEndpoint>> {
    let client = HttpSparqlClient::new(uri, &config.http)?;
    Ok(Arc::new(RemoteEndpoint::new(client)))
}

fn run_optimize(
    query: &Path,
    stats: &PredicateStatsDb,
    bound: &[String],
    config: &PlannerConfig,
    format: &OutputFormat,
) -> Result<()> {
    let text = std::fs::read_to_string(query).with_context(|| format!("reading {}", query.display()))?;
    let bgp = parse_bgp(&text)?;
    let context = QueryContext::with_bound(
        bound
            .iter()
            .map(|name| Variable::new(name.trim_start_matches('?')))
            .collect::<Result<Vec<_>, _>>()?,
    );

    let optimizer = JoinOrderOptimizer::new(stats, config.optimizer.clone());
    let plan = optimizer.plan(&bgp, &context)?;

    match format {
        OutputFormat::Json => {
            let steps: Vec<_> = plan
                .steps
                .iter()
                .map(|step| {
                    serde_json::json!({
                        "index": step.index,
                        "pattern": bgp[step.index].to_string(),
                        "direction": step.direction,
                        "cost": step.cost,
                    })
                })
                .collect();
            let output = serde_json::json!({ "steps": steps, "stranded": plan.stranded });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["#", "Input", "Pattern", "Direction", "Cost"]);
            for (position, step) in plan.steps.iter().enumerate() {
                table.add_row(vec![
                    position.to_string(),
                    step.index.to_string(),
                    bgp[step.index].to_string(),
                    step.direction.map_or_else(|| "check".to_string(), |d| d.to_string()),
                    format_cost(step.cost),
                ]);
            }
            println!("{}", table);
            if plan.stranded > 0 {
                println!("{} pattern(s) appended without a join", plan.stranded);
            }
        }
    }
    Ok(())
}

fn format_cost(cost: f64) -> String {
    if cost.is_infinite() {
        "INFINITY".to_string()
    } else {
        format!("{:.1}", cost)
    }
}

/// Parse a single triple pattern written in SPARQL syntax
fn parse_pattern(pattern: &str) -> Result<TriplePattern> {
    let mut patterns = parse_bgp(&format!("SELECT * WHERE {{ {} }}", pattern))?;
    if patterns.len() != 1 {
        bail!("expected exactly one triple pattern, got {}", patterns.len());
    }
    Ok(patterns.remove(0))
}

fn run_sample(endpoint: &str, pattern: &str, config: &PlannerConfig, format: &OutputFormat) -> Result<()> {
    let pattern = parse_pattern(pattern)?;
    let sampler = TripleSampler::for_endpoint(remote_endpoint(endpoint, config)?, &config.sampler);
    let triple = sampler.sample(&pattern)?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "subject": triple.subject.to_string(),
                "predicate": triple.predicate.to_string(),
                "object": triple.object.to_string(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Table => println!("{}", triple),
    }
    Ok(())
}

fn run_collect(
    endpoint: &str,
    stats: Arc<PredicateStatsDb>,
    predicates: &[String],
    samples: usize,
    max_age_days: Option<i64>,
    config: &PlannerConfig,
    format: &OutputFormat,
) -> Result<()> {
    let predicates = predicates
        .iter()
        .map(|iri| NamedNode::new(iri).with_context(|| format!("invalid predicate {}", iri)))
        .collect::<Result<Vec<_>>>()?;

    let data = remote_endpoint(endpoint, config)?;
    let sampler = TripleSampler::for_endpoint(Arc::clone(&data), &config.sampler);
    let collector = StatsCollector::new(Arc::new(sampler), stats, vec![data], config.collector.clone());

    let stale_before = max_age_days.map(|days| Utc::now() - chrono::Duration::days(days));
    let report = collector.collect_for_predicates(&predicates, samples, stale_before)?;
    print_report(&report, format)
}

fn print_report(report: &CollectionReport, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Metric", "Value"]);
            table.add_row(vec!["Predicates".to_string(), report.predicates.to_string()]);
            table.add_row(vec!["Finite samples".to_string(), report.samples_recorded.to_string()]);
            table.add_row(vec!["INFINITY samples".to_string(), report.infinite_recorded.to_string()]);
            table.add_row(vec!["Empty measurements".to_string(), report.empty_measurements.to_string()]);
            table.add_row(vec!["Aborted directions".to_string(), report.directions_aborted.to_string()]);
            if let Some(averages) = &report.averages {
                table.add_row(vec!["Avg forward selectivity".to_string(), format_cost(averages.forward_selectivity)]);
                table.add_row(vec!["Avg reverse selectivity".to_string(), format_cost(averages.reverse_selectivity)]);
                table.add_row(vec!["Avg forward time (ms)".to_string(), format_cost(averages.forward_time)]);
                table.add_row(vec!["Avg reverse time (ms)".to_string(), format_cost(averages.reverse_time)]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}

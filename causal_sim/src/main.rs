//! Causal Delivery Simulator CLI
//!
//! Replay built-in scenarios, generated traces or trace files under any of
//! the three clock algorithms.

use causal_core::{ClockKind, SesMergePolicy};
use causal_sim::scenarios::ScenarioId;
use causal_sim::{EventTrace, ScenarioResult, ScenarioRunner, SimConfig, SimError, TraceExport};
use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Causal delivery replay CLI
#[derive(Parser, Debug)]
#[command(name = "causal-sim")]
#[command(about = "Replay causal delivery traces under vector, matrix and SES clocks", long_about = None)]
struct Args {
    /// Scenario to run (independent, dependency, chain, classroom, random, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Clock algorithm (vector, matrix, ses, all)
    #[arg(short, long, default_value = "all")]
    clock: String,

    /// When SES clocks absorb piggybacked history (examine, deliver)
    #[arg(long, default_value = "examine")]
    ses_policy: String,

    /// Seed for generated traces (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Send and broadcast events in a generated trace
    #[arg(short, long, default_value = "20")]
    events: usize,

    /// Number of processes in a generated trace
    #[arg(short, long, default_value = "3")]
    processes: usize,

    /// Probability that a generated send is a broadcast
    #[arg(long, default_value = "1.0")]
    broadcast_ratio: f64,

    /// Replay a JSON trace file instead of a scenario
    #[arg(short, long)]
    trace: Option<String>,

    /// Export the replay to a JSON file for an external visualizer
    #[arg(long)]
    export: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,
}

/// What to replay.
enum Source {
    Scenario(ScenarioId),
    Random,
    File(String, EventTrace),
}

impl Source {
    fn name(&self) -> String {
        match self {
            Source::Scenario(id) => id.name().to_string(),
            Source::Random => "random".to_string(),
            Source::File(path, _) => path.clone(),
        }
    }
}

fn parse_sources(args: &Args) -> Result<Vec<Source>, SimError> {
    if let Some(path) = &args.trace {
        return Ok(vec![Source::File(path.clone(), EventTrace::read_json(path)?)]);
    }

    Ok(match args.scenario.as_str() {
        "all" => ScenarioId::all().into_iter().map(Source::Scenario).collect(),
        "random" => vec![Source::Random],
        name => vec![Source::Scenario(name.parse()?)],
    })
}

fn parse_clocks(name: &str) -> Result<Vec<ClockKind>, SimError> {
    if name == "all" {
        Ok(ClockKind::all())
    } else {
        Ok(vec![name.parse()?])
    }
}

fn run_one(runner: &ScenarioRunner, source: &Source) -> Result<(ScenarioResult, TraceExport), SimError> {
    match source {
        Source::Scenario(id) => runner.run_with_export(*id),
        Source::Random => runner.run_random(),
        Source::File(path, trace) => runner.run_trace(path, trace.clone()),
    }
}

fn write_export(export: &TraceExport, path: &str) -> Result<(), SimError> {
    export.write_to_file(path)?;
    info!("Exported {} steps to {}", export.steps.len(), path);
    Ok(())
}

fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("Causal Delivery Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let sources = parse_sources(&args).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("Available scenarios: independent, dependency, chain, classroom, random, all");
        std::process::exit(1);
    });
    let clocks = parse_clocks(&args.clock).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        eprintln!("Available clocks: vector, matrix, ses, all");
        std::process::exit(1);
    });
    let ses_policy: SesMergePolicy = args.ses_policy.parse().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    if args.export.is_some() && sources.len() * clocks.len() > 1 {
        eprintln!("Error: --export needs a single scenario and a single clock");
        std::process::exit(1);
    }

    // Determine seed
    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;
    let mut export_failed = false;

    for clock in &clocks {
        let config = SimConfig::default()
            .with_seed(seed)
            .with_processes(args.processes)
            .with_events(args.events)
            .with_broadcast_ratio(args.broadcast_ratio)
            .with_clock(*clock)
            .with_ses_policy(ses_policy);
        let runner = ScenarioRunner::new(config).with_notification_log(args.verbose);

        for source in &sources {
            let (result, export) = match run_one(&runner, source) {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("✗ {} ({}) could not run: {}", source.name(), clock, e);
                    std::process::exit(1);
                }
            };

            if let Some(path) = &args.export {
                if let Err(e) = write_export(&export, path) {
                    error!("Failed to write export to {}: {}", path, e);
                    export_failed = true;
                }
            }

            if !args.json {
                if result.passed {
                    info!(
                        "✓ {} ({}) PASSED: {} steps, {} delivered, {} buffered, {} cascaded",
                        result.scenario,
                        clock,
                        result.steps,
                        result.stats.delivered,
                        result.stats.buffered,
                        result.stats.cascaded
                    );
                } else {
                    error!(
                        "✗ {} ({}) FAILED: {}",
                        result.scenario,
                        clock,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }

            all_results.push(result);
        }
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        // JSON output for CI parsing
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results,
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} runs passed!", total);
        } else {
            error!("❌ {}/{} runs failed!", failed_count, total);

            for result in &all_results {
                if !result.passed {
                    error!(
                        "  - {} ({}): {}",
                        result.scenario,
                        result.clock,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 || export_failed {
        std::process::exit(1);
    }
}

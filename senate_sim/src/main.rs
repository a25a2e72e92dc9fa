//! Senate Bus Simulator CLI
//!
//! Runs the bus and passenger generators against the wall clock, fast-forwards
//! them on a virtual clock, or checks the built-in protocol scenarios.

use clap::Parser;
use senate_core::{EventSink, JsonLinesSink, TracingSink};
use senate_env::TokioContext;
use senate_sim::scenarios::ScenarioId;
use senate_sim::{RunSummary, ScenarioResult, ScenarioRunner, SimConfig, SimContext, SimError, SimWorld};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Senate Bus rendezvous simulator
#[derive(Parser, Debug)]
#[command(name = "senate-sim")]
#[command(about = "Simulate buses and passengers meeting at a stop", long_about = None)]
struct Args {
    /// Master seed for the arrival schedules (0 = random)
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Seats per bus
    #[arg(short, long, default_value = "50")]
    capacity: usize,

    /// Mean minutes between buses
    #[arg(long, default_value = "20.0")]
    bus_mean: f64,

    /// Mean minutes between passengers
    #[arg(long, default_value = "0.5")]
    passenger_mean: f64,

    /// Maximum number of passengers at the stop at once
    #[arg(short, long, default_value = "10")]
    workers: usize,

    /// Real seconds per simulated minute
    #[arg(long, default_value = "60.0")]
    time_scale: f64,

    /// Stop after this many simulated minutes (default: run until Ctrl-C)
    #[arg(short, long)]
    duration: Option<f64>,

    /// Fast-forward on a virtual clock instead of waiting in real time
    #[arg(long)]
    fast: bool,

    /// Check protocol scenarios instead of simulating
    /// (capacity_overflow, empty_stop, sequential_arrivals, mass_boarding,
    /// abandonment, steady_state, all)
    #[arg(short = 'S', long)]
    scenario: Option<String>,

    /// Number of consecutive seeds to check scenarios with
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output (events as JSON lines, summary as JSON)
    #[arg(long)]
    json: bool,
}

/// Minutes simulated by `--fast` when no duration is given.
const FAST_DEFAULT_MINUTES: f64 = 8.0 * 60.0;

fn main() {
    let args = Args::parse();

    // Initialize logging; stdout stays free for --json output
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    let result = match &args.scenario {
        Some(scenario) => run_scenarios(&args, scenario),
        None => simulate(&args).map(|()| 0),
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Resolves seed 0 to a seed taken from the clock.
fn resolve_seed(seed: u64) -> u64 {
    if seed != 0 {
        return seed;
    }
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(1)
}

fn minutes(minute: Duration, count: f64) -> Result<Duration, SimError> {
    Duration::try_from_secs_f64(minute.as_secs_f64() * count)
        .map_err(|e| SimError::invalid(format!("duration of {} minutes: {}", count, e)))
}

fn simulate(args: &Args) -> Result<(), SimError> {
    let minute = Duration::try_from_secs_f64(args.time_scale)
        .map_err(|e| SimError::invalid(format!("time scale {}: {}", args.time_scale, e)))?;

    let config = SimConfig::default()
        .with_seed(args.seed)
        .with_capacity(args.capacity)
        .with_means(args.bus_mean, args.passenger_mean)
        .with_workers(args.workers)
        .with_minute(minute);
    config.validate()?;

    let sink: Arc<dyn EventSink> = if args.json {
        Arc::new(JsonLinesSink::stdout())
    } else {
        Arc::new(TracingSink)
    };

    let summary = if args.fast {
        let seed = resolve_seed(config.seed);
        let config = config.with_seed(seed).with_minute(Duration::from_secs(60));
        let limit = minutes(config.minute, args.duration.unwrap_or(FAST_DEFAULT_MINUTES))?;
        info!("Fast-forwarding {:.0} simulated minutes (seed={})", limit.as_secs_f64() / 60.0, seed);

        let runtime = SimContext::runtime()?;
        runtime.block_on(async move {
            let context = SimContext::shared(seed);
            let world = SimWorld::new(config, context, sink)?;
            world.run_for(limit).await
        })?
    } else {
        let limit = args.duration.map(|m| minutes(config.minute, m)).transpose()?;
        info!(
            "Running in real time, one simulated minute = {:.1}s (Ctrl-C to stop)",
            config.minute.as_secs_f64()
        );

        let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
        runtime.block_on(async move {
            let context = Arc::new(TokioContext::seeded(config.seed));
            let world = SimWorld::new(config, context, sink)?;
            world
                .run_until(async move {
                    let interrupted = async {
                        if let Err(e) = tokio::signal::ctrl_c().await {
                            error!("Failed to listen for Ctrl-C: {}", e);
                            std::future::pending::<()>().await;
                        }
                    };
                    match limit {
                        Some(limit) => tokio::select! {
                            _ = tokio::time::sleep(limit) => {}
                            _ = interrupted => {}
                        },
                        None => interrupted.await,
                    }
                })
                .await
        })?
    };

    report_summary(&summary, args.json);
    Ok(())
}

fn report_summary(summary: &RunSummary, json: bool) {
    if json {
        match serde_json::to_string(summary) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to encode summary: {}", e),
        }
        return;
    }

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!(
        "{:.1} simulated minutes: {} buses, {} passengers arrived, {} boarded",
        summary.simulated_minutes, summary.buses, summary.passengers_spawned, summary.passengers_boarded
    );
}

fn run_scenarios(args: &Args, scenario: &str) -> Result<i32, SimError> {
    let scenarios: Vec<ScenarioId> = if scenario == "all" {
        ScenarioId::all()
    } else {
        vec![scenario.parse().map_err(SimError::InvalidConfig)?]
    };

    let base_seed = resolve_seed(args.seed);
    let duration = args.duration.unwrap_or(FAST_DEFAULT_MINUTES);

    if !args.json {
        info!("Senate Bus scenario check v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed)
            .with_capacity(args.capacity)
            .with_duration(duration);

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED - {}", scenario.name(), seed, scenario.description());
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            all_results.push(result);
        }
    }

    let total = all_results.len();
    let failed = all_results.iter().filter(|r| !r.passed).count();

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": total - failed,
            "failed": failed,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "departures": r.departures,
                    "simulated_minutes": r.simulated_minutes,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", summary);
    } else if failed == 0 {
        info!("✅ All {} scenario runs passed!", total);
    } else {
        error!("❌ {}/{} scenario runs failed!", failed, total);
    }

    Ok(if failed > 0 { 1 } else { 0 })
}

mod report;

use anyhow::{Context, Result};
use clap::Parser;
use perf_core::{
    ApiPath, Catalog, Comparison, Config, Dispatcher, EntityRequest, HttpJsonInvoker, LoadTestConfig,
    LoadTester, MetricsRegistry, MockInvoker, PathInvoker, RequestSource, TestResult, TrafficMix,
};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "driver")]
#[command(about = "Compares REST-style calls against in-process action dispatch under load")]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path A mode: mock or http
    #[arg(long, default_value = "mock")]
    mode: String,

    /// Parallel workers per path (overrides config)
    #[arg(long)]
    concurrency: Option<u32>,

    /// Test duration in seconds (overrides config)
    #[arg(long)]
    duration: Option<u64>,

    /// Simulated path A latency in mock mode
    #[arg(long, default_value = "5")]
    mock_latency_ms: u64,

    /// Directory for the JSON result file (overrides config)
    #[arg(long)]
    results_dir: Option<String>,

    /// Do not write a result file
    #[arg(long)]
    no_write: bool,

    /// Print progress every N milliseconds (0 disables)
    #[arg(long, default_value = "1000")]
    print_every_ms: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct RunReport {
    timestamp: String,
    mode: String,
    duration_ms: i64,
    result: TestResult,
    comparison: Comparison,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };
    if let Some(concurrency) = args.concurrency {
        config.load_test.concurrency = concurrency;
    }
    if let Some(duration) = args.duration {
        config.load_test.duration_seconds = duration;
    }
    if let Some(dir) = &args.results_dir {
        config.output.results_dir = dir.clone();
    }
    config.validate().context("Invalid configuration")?;

    let path_a: Arc<dyn PathInvoker> = match args.mode.as_str() {
        "mock" => Arc::new(MockInvoker::new(args.mock_latency_ms)),
        "http" => Arc::new(
            HttpJsonInvoker::new(
                &config.target.base_urls,
                config.target.timeout_ms,
                TrafficMix::rest_calls(),
            )
            .context("Failed to create HTTP invoker")?,
        ),
        _ => anyhow::bail!("Invalid mode: {}, must be 'mock' or 'http'", args.mode),
    };
    info!("Path A invoker: {}", path_a.name());

    let metrics = Arc::new(MetricsRegistry::new());
    let catalog = Arc::new(Catalog::seeded());
    let mut builder = Dispatcher::<EntityRequest>::builder();
    catalog
        .register_handlers(&mut builder)
        .context("Failed to register action handlers")?;
    info!("Registered {} action handlers", builder.len());
    let dispatcher = Arc::new(builder.build(Arc::clone(&metrics)));

    let mix = Arc::new(TrafficMix::new());
    let source: RequestSource<EntityRequest> = Arc::new(move |rng: &mut StdRng| mix.next_request(rng));

    let tester = Arc::new(LoadTester::new(
        metrics,
        dispatcher,
        path_a,
        source,
        config.orchestrator_options(),
    ));

    let lt = config.load_test_config();
    let result = run_with_progress(&tester, lt, args.print_every_ms).await?;

    let comparison = tester.comparison();
    println!();
    println!("=== Load Test Summary ===");
    println!("Concurrency: {} workers per path", lt.concurrency);
    println!("Configured duration: {}s", lt.duration_seconds);
    println!("Actual duration: {}ms", result.duration_ms());
    println!("{}", report::format_snapshot(ApiPath::A, &comparison.path_a));
    println!("{}", report::format_snapshot(ApiPath::B, &comparison.path_b));
    println!();
    print!("{}", report::format_table(&comparison));
    println!();

    if !args.no_write {
        let output_path = save_report(&config.output.results_dir, &args.mode, result, comparison)?;
        info!("Results written to {}", output_path.display());
    }

    Ok(())
}

async fn run_with_progress(
    tester: &Arc<LoadTester<EntityRequest>>,
    config: LoadTestConfig,
    print_every_ms: u64,
) -> Result<TestResult> {
    let progress = (print_every_ms > 0).then(|| {
        let tester = Arc::clone(tester);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(print_every_ms));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                print_progress(&tester);
            }
        })
    });

    let result = tester.run_load_test(config).await;

    if let Some(handle) = progress {
        handle.abort();
    }
    Ok(result?)
}

fn print_progress(tester: &LoadTester<EntityRequest>) {
    let a = tester.metrics(ApiPath::A);
    let b = tester.metrics(ApiPath::B);
    info!(
        "Progress: A requests={} avg={:.2}ms ok={:.1}% | B requests={} avg={:.3}ms ok={:.1}%",
        a.total_requests,
        a.average_execution_time_ms,
        a.success_rate,
        b.total_requests,
        b.average_execution_time_ms,
        b.success_rate
    );
}

fn save_report(
    results_dir: &str,
    mode: &str,
    result: TestResult,
    comparison: Comparison,
) -> Result<PathBuf> {
    let timestamp = chrono::Utc::now();
    let output_path = PathBuf::from(results_dir)
        .join(format!("loadtest_{}.json", timestamp.format("%Y%m%d_%H%M%S")));

    std::fs::create_dir_all(results_dir)
        .with_context(|| format!("Failed to create {results_dir}"))?;
    let report = RunReport {
        timestamp: timestamp.to_rfc3339(),
        mode: mode.to_string(),
        duration_ms: result.duration_ms(),
        result,
        comparison,
    };
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&output_path, json)
        .with_context(|| format!("Failed to write {}", output_path.display()))?;
    Ok(output_path)
}

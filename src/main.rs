//! This file defines the fetchbench binary entry point.

use fetchbench::bench::BenchmarkRunner;
use fetchbench::cli;
use fetchbench::error::FetchBenchError;
use fetchbench::report;
use fetchbench::tracing;

/// Application entry point
#[tokio::main]
async fn main() {
    let args = cli::parse();
    tracing::init_tracing();
    if let Err(error) = run(&args).await {
        eprintln!("fetchbench failed: {}", error);
        std::process::exit(1);
    }
}

/// Run the benchmark described by the command line arguments and write the
/// CSV report.
async fn run(args: &cli::CommandLineArgs) -> Result<(), FetchBenchError> {
    let plan = args.benchmark_plan()?;
    let system = plan.system_name.clone();
    let source = plan.source_name.clone();
    let format = plan.format.clone();
    let mut runner = BenchmarkRunner::new(plan, args.credentials(), args.memory_limit()?).await?;
    let table = runner.run().await?;
    report::write_report(&table, &args.output_dir, &system, &source, &format)?;
    Ok(())
}

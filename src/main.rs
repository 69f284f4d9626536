use anyhow::{Context, Result};
use clap::Parser;
use plotters::prelude::*;
use std::cmp;
use std::str::FromStr;
use std::time::Instant;
use tracing::{error, info};

use crawlfreq::aggregate::{aggregate, AggregatedCount, Frequency};
use crawlfreq::plot::{render_crawl_frequency, GraphType};
use crawlfreq::{args::Args, dataset, report, utils};

fn run(args: &Args) -> Result<()> {
    let freq = Frequency::from_str(&args.freq)?;
    let graph_type = GraphType::from_str(&args.graph)?;

    let workers = args
        .workers
        .unwrap_or_else(|| cmp::min(num_cpus::get(), 8));
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build_global()
        .context("failed to configure worker pool")?;
    info!(
        action = "configure",
        component = "main",
        worker_count = workers,
        "Using workers for processing"
    );

    let total_start = Instant::now();
    let (dataset, load_stats) = dataset::load_derivative(&args.input)?;

    let summary = report::summarize_dataset(&dataset, args.top);
    report::print_summary(&summary, &load_stats, args.redact);

    let rows = aggregate(&dataset, args.top, freq, args.start_date, args.end_date)?;

    render_to_file(args, &rows, graph_type)?;

    info!(
        action = "complete",
        component = "main",
        duration_ms = total_start.elapsed().as_millis(),
        "Analysis completed"
    );
    println!("\nFigure written to {}", args.output.display());
    Ok(())
}

fn render_to_file(args: &Args, rows: &[AggregatedCount], graph_type: GraphType) -> Result<()> {
    let dimensions = (args.width, args.height);
    let svg = args
        .output
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("svg"))
        .unwrap_or(false);

    if svg {
        let root = SVGBackend::new(&args.output, dimensions).into_drawing_area();
        render_crawl_frequency(&root, rows, graph_type, args.inflation_exponent)?;
        root.present()
            .map_err(|e| anyhow::anyhow!("failed to write figure: {e}"))?;
    } else {
        let root = BitMapBackend::new(&args.output, dimensions).into_drawing_area();
        render_crawl_frequency(&root, rows, graph_type, args.inflation_exponent)?;
        root.present()
            .map_err(|e| anyhow::anyhow!("failed to write figure: {e}"))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    utils::setup_logging(args.verbose);
    utils::validate_args(&args)?;

    match run(&args) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!(error = %e, "Analysis failed");
            std::process::exit(1);
        }
    }
}

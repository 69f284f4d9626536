use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;

use crate::plot::DEFAULT_INFLATION_EXPONENT;

#[derive(Parser, Debug)]
#[command(
    name = "crawlfreq",
    about = "Analyze web-archive derivative datasets and plot domain crawl frequency over time",
    version,
    long_about = None
)]
pub struct Args {
    /// Derivative CSV file to analyze
    pub input: PathBuf,

    /// Number of top domains to select
    #[arg(short, long, default_value_t = 10)]
    pub top: usize,

    /// Bucket frequency: daily, weekly or monthly
    #[arg(short, long, default_value = "monthly")]
    pub freq: String,

    /// First date of interest (YYYY-MM-DD); defaults to the earliest crawl date
    #[arg(long)]
    pub start_date: Option<NaiveDate>,

    /// Last date of interest (YYYY-MM-DD); defaults to the latest crawl date
    #[arg(long)]
    pub end_date: Option<NaiveDate>,

    /// Style of visualization: 2D or 3D
    #[arg(short, long, default_value = "3D")]
    pub graph: String,

    /// Exponent applied to counts when sizing 2D markers
    #[arg(long, default_value_t = DEFAULT_INFLATION_EXPONENT)]
    pub inflation_exponent: f64,

    /// Output figure path (.png or .svg)
    #[arg(short, long, default_value = "crawl_frequency.png")]
    pub output: PathBuf,

    /// Figure width in pixels
    #[arg(long, default_value_t = 1600)]
    pub width: u32,

    /// Figure height in pixels
    #[arg(long, default_value_t = 1200)]
    pub height: u32,

    /// Number of worker threads
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Redact domain names for privacy
    #[arg(long)]
    pub redact: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

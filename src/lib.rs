pub mod aggregate;
pub mod args;
pub mod dataset;
pub mod error;
pub mod plot;
pub mod report;
pub mod stats;
pub mod utils;

pub use aggregate::{aggregate, AggregatedCount, Frequency};
pub use args::Args;
pub use dataset::{load_derivative, read_derivative, Dataset, Record};
pub use error::AnalyzeError;
pub use plot::{render_crawl_frequency, GraphType};
pub use stats::{DatasetSummary, LoadStats};

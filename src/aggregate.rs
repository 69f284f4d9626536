use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::time::Instant;
use tracing::info;

use crate::dataset::{Dataset, Record};
use crate::error::{AnalyzeError, Result};

/// Width of the calendar-aligned buckets crawl events are grouped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    /// Start date of the bucket containing `ts`.
    ///
    /// Weekly buckets start on Monday, monthly buckets on the first of the
    /// month.
    pub fn bucket_start(&self, ts: NaiveDateTime) -> NaiveDate {
        let date = ts.date();
        match self {
            Frequency::Daily => date,
            Frequency::Weekly => {
                date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
            }
            // day 1 always exists
            Frequency::Monthly => date.with_day(1).unwrap_or(date),
        }
    }
}

impl FromStr for Frequency {
    type Err = AnalyzeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "day" | "d" | "1d" => Ok(Frequency::Daily),
            "weekly" | "week" | "w" | "1w" => Ok(Frequency::Weekly),
            "monthly" | "month" | "m" | "1m" => Ok(Frequency::Monthly),
            _ => Err(AnalyzeError::InvalidFrequency(s.to_string())),
        }
    }
}

/// Number of crawl events for one domain in one time bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedCount {
    pub domain: String,
    pub bucket: NaiveDate,
    pub count: u64,
}

/// Rank domains by descending record count.
///
/// Equal counts keep first-appearance order, so repeated runs over the same
/// file select the same domains.
pub fn rank_domains<'a, I>(records: I) -> Vec<(String, u64)>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut counts: HashMap<&str, (u64, usize)> = HashMap::new();
    for (index, record) in records.into_iter().enumerate() {
        let entry = counts.entry(record.domain.as_str()).or_insert((0, index));
        entry.0 += 1;
    }

    let mut ranked: Vec<(&str, (u64, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    ranked
        .into_iter()
        .map(|(domain, (count, _))| (domain.to_string(), count))
        .collect()
}

/// Aggregate crawl counts for the `top_n` most crawled domains.
///
/// Records are filtered to `start_date..=end_date` (bounds default to the
/// dataset's observed extremes, comparison at date granularity), the top
/// `top_n` domains by in-range count are selected, and each domain's records
/// are counted per calendar-aligned bucket. Buckets with no records are
/// omitted, so every returned count is positive.
pub fn aggregate(
    dataset: &Dataset,
    top_n: usize,
    freq: Frequency,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Result<Vec<AggregatedCount>> {
    let start_time = Instant::now();

    let observed = dataset.date_range();
    let start = start_date.or_else(|| observed.map(|(min, _)| min.date()));
    let end = end_date.or_else(|| observed.map(|(_, max)| max.date()));
    let (start, end) = match (start, end) {
        (Some(start), Some(end)) => (start, end),
        // only reachable when the dataset itself is empty
        _ => return Err(AnalyzeError::EmptyDataset),
    };
    if start > end {
        return Err(AnalyzeError::InvalidRange { start, end });
    }

    // Inclusive on both ends: a record dated exactly on either bound stays.
    let in_range: Vec<&Record> = dataset
        .records()
        .iter()
        .filter(|r| {
            let date = r.crawl_timestamp.date();
            date >= start && date <= end
        })
        .collect();
    if in_range.is_empty() {
        return Err(AnalyzeError::EmptyDataset);
    }

    let selected: Vec<(String, u64)> = rank_domains(in_range.iter().copied())
        .into_iter()
        .take(top_n)
        .collect();

    let mut rows = Vec::new();
    for (domain, _) in &selected {
        let mut buckets: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for record in in_range.iter().filter(|r| &r.domain == domain) {
            *buckets
                .entry(freq.bucket_start(record.crawl_timestamp))
                .or_insert(0) += 1;
        }
        for (bucket, count) in buckets {
            rows.push(AggregatedCount {
                domain: domain.clone(),
                bucket,
                count,
            });
        }
    }

    info!(
        action = "complete",
        component = "aggregation",
        domain_count = selected.len(),
        row_count = rows.len(),
        record_count = in_range.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Aggregated crawl counts"
    );
    Ok(rows)
}

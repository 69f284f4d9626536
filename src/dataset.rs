use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use regex::Regex;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{info, warn};

use crate::stats::LoadStats;

/// One crawled-page event from a derivative file.
#[derive(Debug, Clone)]
pub struct Record {
    pub crawl_timestamp: NaiveDateTime,
    pub domain: String,
    pub url: String,
}

/// An ordered collection of records sharing the derivative schema.
///
/// Owned by the caller; aggregation only reads it.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Observed minimum and maximum crawl timestamps.
    pub fn date_range(&self) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let min = self.records.iter().map(|r| r.crawl_timestamp).min()?;
        let max = self.records.iter().map(|r| r.crawl_timestamp).max()?;
        Some((min, max))
    }
}

/// Raw CSV row as written by the derivative generator.
///
/// Extra columns such as `content` are ignored; `domain` and `url` default
/// to empty when a derivative omits them.
#[derive(Debug, Deserialize)]
struct RawRow {
    crawl_date: String,
    #[serde(default)]
    domain: String,
    #[serde(default)]
    url: String,
}

/// Timestamp layout used by a derivative file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFormat {
    /// 14-digit `%Y%m%d%H%M%S`
    CompactDateTime,
    /// 8-digit `%Y%m%d`
    CompactDate,
    /// ISO-style date or datetime, tried in order
    Iso,
}

fn digit_run() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"^[0-9]+$").expect("literal pattern"))
}

/// Detect the timestamp layout from a sample value.
///
/// The layout is uniform within a derivative file, so the first data row is
/// enough to decide for the whole load.
pub fn detect_date_format(sample: &str) -> DateFormat {
    let sample = sample.trim();
    if digit_run().is_match(sample) {
        match sample.len() {
            14 => DateFormat::CompactDateTime,
            8 => DateFormat::CompactDate,
            _ => DateFormat::Iso,
        }
    } else {
        DateFormat::Iso
    }
}

/// Parse one timestamp value under the detected layout.
pub fn parse_timestamp(value: &str, format: DateFormat) -> Option<NaiveDateTime> {
    let value = value.trim();
    match format {
        DateFormat::CompactDateTime => {
            NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M%S").ok()
        }
        DateFormat::CompactDate => NaiveDate::parse_from_str(value, "%Y%m%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        DateFormat::Iso => parse_iso_timestamp(value),
    }
}

fn parse_iso_timestamp(value: &str) -> Option<NaiveDateTime> {
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(ts);
        }
    }
    // Zoned variants, including the `yyyy/MM/dd HH:mm:ss ZZ` layout the
    // archive toolkit writes into CSV derivatives.
    for fmt in ["%Y/%m/%d %H:%M:%S %z", "%Y-%m-%dT%H:%M:%S%z"] {
        if let Ok(ts) = chrono::DateTime::parse_from_str(value, fmt) {
            return Some(ts.naive_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Recover a domain label from the record's url column.
pub fn domain_from_url(raw: &str) -> Option<String> {
    let url = url::Url::parse(raw.trim()).ok()?;
    url.host_str().map(|host| host.to_string())
}

/// Load a derivative CSV file into a typed dataset.
pub fn load_derivative(path: &Path) -> Result<(Dataset, LoadStats)> {
    let file = File::open(path)
        .with_context(|| format!("failed to open derivative file {:?}", path))?;
    read_derivative(file)
}

/// Read derivative records from any CSV source.
///
/// Rows with an unparseable timestamp, or with an empty domain that cannot
/// be recovered from the url column, are skipped and counted rather than
/// aborting the load.
pub fn read_derivative<R: Read>(reader: R) -> Result<(Dataset, LoadStats)> {
    let start_time = Instant::now();
    info!(action = "start", component = "derivative_load", "Loading derivative records");

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let rows: Vec<RawRow> = csv_reader
        .deserialize()
        .collect::<std::result::Result<_, _>>()
        .context("failed to parse derivative CSV")?;

    let read_time = start_time.elapsed();
    info!(
        action = "read",
        component = "derivative_load",
        row_count = rows.len(),
        duration_ms = read_time.as_millis(),
        "Read derivative rows"
    );

    let format = rows
        .first()
        .map(|row| detect_date_format(&row.crawl_date))
        .unwrap_or(DateFormat::Iso);
    info!(action = "configure", component = "derivative_load", date_format = ?format, "Detected timestamp format");

    let processing_start = Instant::now();

    // Indexed parallel map keeps the original row order, which the stable
    // top-N tie-break depends on.
    let parsed: Vec<Option<Record>> = rows
        .into_par_iter()
        .map(|row| {
            let crawl_timestamp = parse_timestamp(&row.crawl_date, format)?;
            let domain = if row.domain.trim().is_empty() {
                domain_from_url(&row.url)?
            } else {
                row.domain.trim().to_string()
            };
            Some(Record {
                crawl_timestamp,
                domain,
                url: row.url,
            })
        })
        .collect();

    let mut records = Vec::with_capacity(parsed.len());
    let mut records_skipped: u32 = 0;
    for record in parsed {
        match record {
            Some(record) => records.push(record),
            None => records_skipped += 1,
        }
    }

    if records_skipped > 0 {
        warn!(
            action = "skip",
            component = "derivative_load",
            records_skipped,
            "Dropped rows with unparseable timestamp or missing domain"
        );
    }

    let total_time = start_time.elapsed();
    info!(
        action = "complete",
        component = "derivative_load",
        records_loaded = records.len(),
        records_skipped,
        processing_time_ms = processing_start.elapsed().as_millis(),
        total_time_ms = total_time.as_millis(),
        "Derivative load completed"
    );

    let stats = LoadStats {
        records_loaded: records.len(),
        records_skipped,
    };
    Ok((Dataset::new(records), stats))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_compact_datetime_format() {
        assert_eq!(detect_date_format("20150905120314"), DateFormat::CompactDateTime);
    }

    #[test]
    fn detects_compact_date_format() {
        assert_eq!(detect_date_format("20150905"), DateFormat::CompactDate);
    }

    #[test]
    fn falls_back_to_iso_format() {
        assert_eq!(detect_date_format("2015-09-05 12:03:14"), DateFormat::Iso);
        assert_eq!(detect_date_format("201509"), DateFormat::Iso);
    }

    #[test]
    fn parses_compact_timestamps() {
        let ts = parse_timestamp("20150905120314", DateFormat::CompactDateTime).unwrap();
        assert_eq!(ts.to_string(), "2015-09-05 12:03:14");

        let ts = parse_timestamp("20150905", DateFormat::CompactDate).unwrap();
        assert_eq!(ts.to_string(), "2015-09-05 00:00:00");
    }

    #[test]
    fn parses_iso_and_zoned_timestamps() {
        let ts = parse_timestamp("2015-09-05 12:03:14", DateFormat::Iso).unwrap();
        assert_eq!(ts.to_string(), "2015-09-05 12:03:14");

        let ts = parse_timestamp("2015/09/05 12:03:14 +0000", DateFormat::Iso).unwrap();
        assert_eq!(ts.to_string(), "2015-09-05 12:03:14");

        let ts = parse_timestamp("2015-09-05", DateFormat::Iso).unwrap();
        assert_eq!(ts.to_string(), "2015-09-05 00:00:00");
    }

    #[test]
    fn rejects_garbage_timestamps() {
        assert!(parse_timestamp("not a date", DateFormat::Iso).is_none());
        assert!(parse_timestamp("209912", DateFormat::CompactDateTime).is_none());
    }

    #[test]
    fn recovers_domain_from_url() {
        assert_eq!(domain_from_url("https://example.com/a/b?q=1"), Some("example.com".to_string()));
        assert_eq!(domain_from_url("not a url"), None);
    }

    #[test]
    fn reads_rows_and_counts_skips_in_order() {
        let csv_data = "crawl_date,domain,url,content\n\
                        20150901120000,a.com,https://a.com/1,x\n\
                        garbage,a.com,https://a.com/2,x\n\
                        20150902130000,,https://b.com/1,x\n\
                        20150903140000,,not a url,x\n\
                        20150904150000,c.com,https://c.com/1,x\n";
        let (dataset, stats) = read_derivative(csv_data.as_bytes()).unwrap();

        assert_eq!(stats.records_loaded, 3);
        assert_eq!(stats.records_skipped, 2);
        let domains: Vec<&str> = dataset.records().iter().map(|r| r.domain.as_str()).collect();
        assert_eq!(domains, vec!["a.com", "b.com", "c.com"]);
    }

    #[test]
    fn empty_file_loads_as_empty_dataset() {
        let (dataset, stats) = read_derivative("crawl_date,domain,url,content\n".as_bytes()).unwrap();
        assert!(dataset.is_empty());
        assert_eq!(stats.records_skipped, 0);
        assert!(dataset.date_range().is_none());
    }

    #[test]
    fn date_range_covers_observed_extremes() {
        let csv_data = "crawl_date,domain,url,content\n\
                        20150903000000,a.com,https://a.com/,x\n\
                        20150901000000,b.com,https://b.com/,x\n\
                        20150902000000,a.com,https://a.com/,x\n";
        let (dataset, _) = read_derivative(csv_data.as_bytes()).unwrap();
        let (min, max) = dataset.date_range().unwrap();
        assert_eq!(min.to_string(), "2015-09-01 00:00:00");
        assert_eq!(max.to_string(), "2015-09-03 00:00:00");
    }
}

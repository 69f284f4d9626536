use crate::aggregate::rank_domains;
use crate::dataset::Dataset;
use crate::stats::{DatasetSummary, LoadStats};
use crate::utils::{format_number, redact_domain};

/// Build the terminal summary for a loaded dataset.
pub fn summarize_dataset(dataset: &Dataset, top: usize) -> DatasetSummary {
    let date_range = match dataset.date_range() {
        Some((earliest, latest)) => (
            earliest.format("%B %-d, %Y").to_string(),
            latest.format("%B %-d, %Y").to_string(),
            (latest - earliest).num_days(),
        ),
        None => (
            "No data available".to_string(),
            "No data available".to_string(),
            0,
        ),
    };

    let ranked = rank_domains(dataset.records());
    DatasetSummary {
        date_range,
        total_records: dataset.len(),
        unique_domains: ranked.len(),
        top_domains: ranked.into_iter().take(top).collect(),
    }
}

pub fn print_summary(summary: &DatasetSummary, load: &LoadStats, redact: bool) {
    let (earliest_date, latest_date, days_between) = &summary.date_range;

    println!("\n--- Derivative Crawl Analysis ---");

    if *days_between > 0 {
        println!(
            "Date range: {} to {} ({} days)",
            earliest_date,
            latest_date,
            format_number(*days_between as u64)
        );
    } else {
        println!("Date range: {} to {}", earliest_date, latest_date);
    }

    println!(
        "Total records: {}",
        format_number(summary.total_records as u64)
    );
    println!(
        "Unique domains: {}",
        format_number(summary.unique_domains as u64)
    );
    if load.records_skipped > 0 {
        println!(
            "Records skipped (bad timestamp or missing domain): {}",
            format_number(u64::from(load.records_skipped))
        );
    }

    if !summary.top_domains.is_empty() {
        println!("\nTop {} most crawled domains:", summary.top_domains.len());
        for (domain, count) in &summary.top_domains {
            let display_domain = if redact {
                redact_domain(domain)
            } else {
                domain.to_string()
            };
            println!("- {}: {} crawls", display_domain, format_number(*count));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;
    use chrono::NaiveDateTime;

    fn record(ts: &str, domain: &str) -> Record {
        Record {
            crawl_timestamp: NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S").unwrap(),
            domain: domain.to_string(),
            url: format!("https://{domain}/"),
        }
    }

    #[test]
    fn summary_ranks_top_domains_descending() {
        let dataset = Dataset::new(vec![
            record("2015-01-01 00:00:00", "a.com"),
            record("2015-01-02 00:00:00", "b.com"),
            record("2015-01-03 00:00:00", "b.com"),
            record("2015-02-01 00:00:00", "c.com"),
        ]);
        let summary = summarize_dataset(&dataset, 2);

        assert_eq!(summary.total_records, 4);
        assert_eq!(summary.unique_domains, 3);
        assert_eq!(
            summary.top_domains,
            vec![("b.com".to_string(), 2), ("a.com".to_string(), 1)]
        );
        assert_eq!(summary.date_range.0, "January 1, 2015");
        assert_eq!(summary.date_range.2, 31);
    }

    #[test]
    fn empty_dataset_summary_has_placeholder_range() {
        let summary = summarize_dataset(&Dataset::default(), 5);
        assert_eq!(summary.date_range.0, "No data available");
        assert!(summary.top_domains.is_empty());
    }
}

/// Counters from loading a derivative file.
#[derive(Debug, Clone, Copy)]
pub struct LoadStats {
    pub records_loaded: usize,
    pub records_skipped: u32,
}

#[derive(Debug)]
pub struct DatasetSummary {
    pub date_range: (String, String, i64),
    pub total_records: usize,
    pub unique_domains: usize,
    pub top_domains: Vec<(String, u64)>,
}

use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDate};
use plotters::coord::Shift;
use plotters::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use tracing::info;

use crate::aggregate::AggregatedCount;
use crate::error::AnalyzeError;

/// Spacing multiplier between domain layers in the 3D plots. Both
/// projections use the same step so the two views stay comparable.
pub const DOMAIN_SPACING: i32 = 2;

/// Default exponent applied to counts before mapping them to marker area in
/// the 2D plot. Nonlinear scaling exaggerates count differences so sparse
/// crawls stay visible next to dense ones.
pub const DEFAULT_INFLATION_EXPONENT: f64 = 2.5;

/// Requested style of crawl-frequency figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphType {
    TwoD,
    ThreeD,
}

impl FromStr for GraphType {
    type Err = AnalyzeError;

    fn from_str(s: &str) -> std::result::Result<Self, AnalyzeError> {
        match s.trim().to_lowercase().as_str() {
            "2d" => Ok(GraphType::TwoD),
            "3d" => Ok(GraphType::ThreeD),
            _ => Err(AnalyzeError::UnsupportedGraphType(s.to_string())),
        }
    }
}

/// Domains ordered ascending by total crawl count.
///
/// Ties fall back to the domain name so axis placement and colors are stable
/// across runs. Both renderers share this order.
pub fn domain_ordering(rows: &[AggregatedCount]) -> Vec<String> {
    let mut totals: BTreeMap<&str, u64> = BTreeMap::new();
    for row in rows {
        *totals.entry(row.domain.as_str()).or_insert(0) += row.count;
    }
    let mut domains: Vec<(&str, u64)> = totals.into_iter().collect();
    domains.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(b.0)));
    domains.into_iter().map(|(domain, _)| domain.to_string()).collect()
}

/// Distinct bucket starts across all rows, ascending.
pub fn bucket_axis(rows: &[AggregatedCount]) -> Vec<NaiveDate> {
    rows.iter()
        .map(|row| row.bucket)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Close a per-domain (bucket index, count) series into a "skyline" polygon
/// by dropping to zero at the first and last bucket present.
///
/// A single-bucket series yields a degenerate closed triangle rather than
/// failing.
pub fn skyline_polygon(points: &[(usize, u64)]) -> Vec<(usize, u64)> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Vec::new();
    };
    let mut polygon = Vec::with_capacity(points.len() + 2);
    polygon.push((first.0, 0));
    polygon.extend_from_slice(points);
    polygon.push((last.0, 0));
    polygon
}

/// Marker area for a count under the inflation exponent.
pub fn marker_area(count: u64, exponent: f64) -> f64 {
    (count as f64).powf(exponent)
}

/// Pixel radius of a marker with the given area.
pub fn marker_radius(area: f64) -> u32 {
    (area / std::f64::consts::PI).sqrt().round().max(1.0) as u32
}

/// Counts represented in the 2D size legend: distinct, ascending, zero
/// excluded. A run where every bucket has the same count yields exactly one
/// entry.
pub fn legend_counts(rows: &[AggregatedCount]) -> Vec<u64> {
    rows.iter()
        .map(|row| row.count)
        .filter(|count| *count > 0)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Recover the count a legend marker stands for from its area.
pub fn legend_label(area: f64, exponent: f64) -> u64 {
    // small slack tolerates powf round-trip error for non-integral exponents
    (area.powf(1.0 / exponent) - 1e-9).ceil() as u64
}

/// Fill color for the domain at `index` of the ordering.
///
/// A monotone hue ramp keeps neighbouring layers distinguishable and gives
/// the same domain the same color in every projection.
pub fn domain_color(index: usize, domain_count: usize) -> HSLColor {
    let span = domain_count.max(2) - 1;
    HSLColor(0.08 + 0.66 * index as f64 / span as f64, 0.55, 0.45)
}

fn domain_rows<'a>(rows: &'a [AggregatedCount], domain: &str) -> Vec<&'a AggregatedCount> {
    let mut selected: Vec<&AggregatedCount> =
        rows.iter().filter(|row| row.domain == domain).collect();
    selected.sort_by_key(|row| row.bucket);
    selected
}

fn draw_err<E: std::fmt::Display>(err: E) -> anyhow::Error {
    anyhow!("drawing failed: {err}")
}

/// Render the aggregated counts in the requested style.
pub fn render_crawl_frequency<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    rows: &[AggregatedCount],
    graph_type: GraphType,
    inflation_exponent: f64,
) -> Result<()> {
    match graph_type {
        GraphType::TwoD => render_scatter(root, rows, inflation_exponent),
        GraphType::ThreeD => render_layered(root, rows),
    }
}

/// 2D bubble-scatter: one row of markers per domain, marker area encoding
/// the bucket's crawl count, with a size legend mapping representative
/// markers back to counts.
pub fn render_scatter<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    rows: &[AggregatedCount],
    inflation_exponent: f64,
) -> Result<()> {
    let domains = domain_ordering(rows);
    let buckets = bucket_axis(rows);
    let (Some(&first_bucket), Some(&last_bucket)) = (buckets.first(), buckets.last()) else {
        return Err(anyhow!("nothing to plot: aggregation produced no rows"));
    };
    root.fill(&WHITE).map_err(draw_err)?;

    // pad the date axis so edge markers are not clipped
    let pad = Duration::days(((last_bucket - first_bucket).num_days() / 20).max(2));
    let x_range = (first_bucket - pad)..(last_bucket + pad);

    let mut chart = ChartBuilder::on(root)
        .caption("Crawl frequency by domain", ("sans-serif", 28))
        .margin(12)
        .x_label_area_size(44)
        .y_label_area_size(150)
        .build_cartesian_2d(x_range, -1..domains.len() as i32)
        .map_err(draw_err)?;

    let label_domains = domains.clone();
    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_labels(domains.len() + 2)
        .y_label_formatter(&move |y: &i32| {
            usize::try_from(*y)
                .ok()
                .and_then(|i| label_domains.get(i).cloned())
                .unwrap_or_default()
        })
        .x_label_formatter(&|d: &NaiveDate| d.format("%Y-%m-%d").to_string())
        .x_desc("crawl date")
        .draw()
        .map_err(draw_err)?;

    for (position, domain) in domains.iter().enumerate() {
        let color = domain_color(position, domains.len());
        let series = domain_rows(rows, domain);
        chart
            .draw_series(series.iter().map(|row| {
                let radius = marker_radius(marker_area(row.count, inflation_exponent));
                Circle::new((row.bucket, position as i32), radius, color.mix(0.8).filled())
            }))
            .map_err(draw_err)?;
    }

    // Size legend: empty series carrying one representative marker each,
    // labeled with the count recovered from the marker area.
    for count in legend_counts(rows) {
        let area = marker_area(count, inflation_exponent);
        let radius = marker_radius(area);
        let label = legend_label(area, inflation_exponent);
        chart
            .draw_series(std::iter::empty::<Circle<(NaiveDate, i32), u32>>())
            .map_err(draw_err)?
            .label(format!("{label} crawls"))
            .legend(move |(x, y)| Circle::new((x, y), radius, BLACK.mix(0.6).filled()));
    }
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .label_font(("sans-serif", 15))
        .draw()
        .map_err(draw_err)?;

    info!(
        action = "complete",
        component = "scatter_render",
        domain_count = domains.len(),
        bucket_count = buckets.len(),
        "Rendered 2D crawl-frequency figure"
    );
    Ok(())
}

#[derive(Clone, Copy)]
enum LayerAxis {
    DomainMajor,
    TimeMajor,
}

/// 3D layered-area figure: two stacked sub-plots over the same skyline
/// polygons, one extruded along the domain axis and one along the time
/// axis.
pub fn render_layered<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    rows: &[AggregatedCount],
) -> Result<()> {
    let domains = domain_ordering(rows);
    let buckets = bucket_axis(rows);
    if domains.is_empty() || buckets.is_empty() {
        return Err(anyhow!("nothing to plot: aggregation produced no rows"));
    }
    root.fill(&WHITE).map_err(draw_err)?;

    let bucket_index: BTreeMap<NaiveDate, usize> =
        buckets.iter().enumerate().map(|(i, d)| (*d, i)).collect();
    let max_count = rows.iter().map(|row| row.count).max().unwrap_or(0);

    // one closed skyline polygon per domain, shared by both projections
    let polygons: Vec<Vec<(usize, u64)>> = domains
        .iter()
        .map(|domain| {
            let points: Vec<(usize, u64)> = domain_rows(rows, domain)
                .iter()
                .map(|row| (bucket_index[&row.bucket], row.count))
                .collect();
            skyline_polygon(&points)
        })
        .collect();

    let bucket_labels: Vec<String> = buckets
        .iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect();
    let domain_extent = DOMAIN_SPACING * domains.len() as i32;
    let bucket_extent = buckets.len() as i32;

    let areas = root.split_evenly((2, 1));
    for (area, axis) in areas.iter().zip([LayerAxis::DomainMajor, LayerAxis::TimeMajor]) {
        render_projection(
            area,
            axis,
            &domains,
            &bucket_labels,
            &polygons,
            domain_extent,
            bucket_extent,
            max_count,
        )?;
    }

    info!(
        action = "complete",
        component = "layered_render",
        domain_count = domains.len(),
        bucket_count = buckets.len(),
        "Rendered 3D crawl-frequency figure"
    );
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn render_projection<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    axis: LayerAxis,
    domains: &[String],
    bucket_labels: &[String],
    polygons: &[Vec<(usize, u64)>],
    domain_extent: i32,
    bucket_extent: i32,
    max_count: u64,
) -> Result<()> {
    let caption = match axis {
        LayerAxis::DomainMajor => "Crawl frequency, domain-major",
        LayerAxis::TimeMajor => "Crawl frequency, time-major",
    };
    // plotters keeps the vertical axis on y; the crawl counts go there and
    // the domain/bucket indices share the ground plane
    let (x_extent, z_extent) = match axis {
        LayerAxis::DomainMajor => (domain_extent, bucket_extent),
        LayerAxis::TimeMajor => (bucket_extent, domain_extent),
    };

    let mut chart = ChartBuilder::on(area)
        .caption(caption, ("sans-serif", 24))
        .margin(16)
        .build_cartesian_3d(0..x_extent, 0i64..max_count as i64 + 1, 0..z_extent)
        .map_err(draw_err)?;
    chart.with_projection(|mut pb| {
        pb.pitch = 0.25;
        pb.yaw = 0.6;
        pb.scale = 0.85;
        pb.into_matrix()
    });

    match axis {
        LayerAxis::DomainMajor => {
            chart
                .configure_axes()
                .x_labels(x_extent as usize + 1)
                .z_labels(z_extent as usize + 1)
                .y_labels(5)
                .x_formatter(&|x| spaced_label(*x, domains))
                .z_formatter(&|z| indexed_label(*z, bucket_labels))
                .label_style(("sans-serif", 12))
                .draw()
                .map_err(draw_err)?;
        }
        LayerAxis::TimeMajor => {
            chart
                .configure_axes()
                .x_labels(x_extent as usize + 1)
                .z_labels(z_extent as usize + 1)
                .y_labels(5)
                .x_formatter(&|x| indexed_label(*x, bucket_labels))
                .z_formatter(&|z| spaced_label(*z, domains))
                .label_style(("sans-serif", 12))
                .draw()
                .map_err(draw_err)?;
        }
    }

    for (position, polygon) in polygons.iter().enumerate() {
        let layer = DOMAIN_SPACING * position as i32;
        let color = domain_color(position, polygons.len());
        let vertices: Vec<(i32, i64, i32)> = polygon
            .iter()
            .map(|&(bucket, count)| match axis {
                LayerAxis::DomainMajor => (layer, count as i64, bucket as i32),
                LayerAxis::TimeMajor => (bucket as i32, count as i64, layer),
            })
            .collect();
        chart
            .draw_series(std::iter::once(Polygon::new(vertices, color.mix(0.7).filled())))
            .map_err(draw_err)?;
    }

    area.draw(&Text::new("crawls", (16, 40), ("sans-serif", 16)))
        .map_err(draw_err)?;
    Ok(())
}

/// Tick label for a domain axis position; domains sit every
/// `DOMAIN_SPACING` units, intermediate ticks stay blank.
fn spaced_label(value: i32, domains: &[String]) -> String {
    if value % DOMAIN_SPACING != 0 {
        return String::new();
    }
    usize::try_from(value / DOMAIN_SPACING)
        .ok()
        .and_then(|i| domains.get(i).cloned())
        .unwrap_or_default()
}

/// Tick label for a bucket axis position.
fn indexed_label(value: i32, labels: &[String]) -> String {
    usize::try_from(value)
        .ok()
        .and_then(|i| labels.get(i).cloned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(domain: &str, bucket: &str, count: u64) -> AggregatedCount {
        AggregatedCount {
            domain: domain.to_string(),
            bucket: bucket.parse().unwrap(),
            count,
        }
    }

    #[test]
    fn ordering_is_ascending_by_total_count() {
        let rows = vec![
            row("big.com", "2015-01-01", 10),
            row("big.com", "2015-02-01", 10),
            row("small.com", "2015-01-01", 1),
            row("mid.com", "2015-01-01", 5),
        ];
        assert_eq!(domain_ordering(&rows), vec!["small.com", "mid.com", "big.com"]);
    }

    #[test]
    fn ordering_breaks_ties_by_name() {
        let rows = vec![
            row("b.com", "2015-01-01", 3),
            row("a.com", "2015-01-01", 3),
            row("c.com", "2015-01-01", 3),
        ];
        assert_eq!(domain_ordering(&rows), vec!["a.com", "b.com", "c.com"]);
    }

    #[test]
    fn bucket_axis_is_sorted_and_distinct() {
        let rows = vec![
            row("a.com", "2015-03-01", 1),
            row("b.com", "2015-01-01", 1),
            row("a.com", "2015-01-01", 1),
        ];
        let buckets = bucket_axis(&rows);
        assert_eq!(
            buckets,
            vec!["2015-01-01".parse().unwrap(), "2015-03-01".parse().unwrap()]
        );
    }

    #[test]
    fn skyline_closes_to_zero_at_both_ends() {
        let polygon = skyline_polygon(&[(0, 4), (1, 7), (3, 2)]);
        assert_eq!(polygon, vec![(0, 0), (0, 4), (1, 7), (3, 2), (3, 0)]);
    }

    #[test]
    fn single_bucket_skyline_is_a_degenerate_triangle() {
        let polygon = skyline_polygon(&[(3, 7)]);
        assert_eq!(polygon, vec![(3, 0), (3, 7), (3, 0)]);
    }

    #[test]
    fn empty_skyline_is_empty() {
        assert!(skyline_polygon(&[]).is_empty());
    }

    #[test]
    fn legend_recovers_counts_at_exponent_two() {
        let rows = vec![
            row("a.com", "2015-01-01", 1),
            row("a.com", "2015-02-01", 4),
            row("b.com", "2015-01-01", 9),
        ];
        let recovered: Vec<u64> = legend_counts(&rows)
            .into_iter()
            .map(|count| legend_label(marker_area(count, 2.0), 2.0))
            .collect();
        assert_eq!(recovered, vec![1, 4, 9]);
    }

    #[test]
    fn legend_recovers_counts_at_default_exponent() {
        for count in [1u64, 2, 7, 36, 120] {
            let area = marker_area(count, DEFAULT_INFLATION_EXPONENT);
            assert_eq!(legend_label(area, DEFAULT_INFLATION_EXPONENT), count);
        }
    }

    #[test]
    fn equal_counts_collapse_to_one_legend_entry() {
        let rows = vec![
            row("a.com", "2015-01-01", 3),
            row("a.com", "2015-02-01", 3),
            row("b.com", "2015-01-01", 3),
        ];
        assert_eq!(legend_counts(&rows), vec![3]);
    }

    #[test]
    fn marker_radius_never_collapses_to_zero() {
        assert!(marker_radius(marker_area(1, 2.5)) >= 1);
        assert!(marker_radius(0.0) >= 1);
    }

    #[test]
    fn ordering_positions_get_distinct_hues() {
        let hues: Vec<f64> = (0..8).map(|i| domain_color(i, 8).0).collect();
        assert!(hues.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn graph_type_parses_case_insensitively() {
        assert_eq!("3D".parse::<GraphType>().unwrap(), GraphType::ThreeD);
        assert_eq!("2d".parse::<GraphType>().unwrap(), GraphType::TwoD);
    }

    #[test]
    fn unknown_graph_type_is_rejected() {
        let err = "4D".parse::<GraphType>().unwrap_err();
        assert_eq!(err, AnalyzeError::UnsupportedGraphType("4D".to_string()));
    }

    #[test]
    fn domain_axis_ticks_land_on_spaced_positions() {
        let domains = vec!["a.com".to_string(), "b.com".to_string()];
        assert_eq!(spaced_label(0, &domains), "a.com");
        assert_eq!(spaced_label(1, &domains), "");
        assert_eq!(spaced_label(2, &domains), "b.com");
        assert_eq!(spaced_label(6, &domains), "");
    }
}

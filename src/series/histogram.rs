//! Windowed-mean downsampling for fragment-length and TSS coverage curves.

use super::{AbsentReason, PlotDataset, PlotKind, PlotOutcome, Point, ReferenceSeries, Series};
use crate::store::{ExperimentRecord, MetricsStore};

/// Mean of each consecutive `resolution`-sized window; the trailing window
/// is averaged over however many values it holds. Produces `ceil(n/r)` values.
pub fn windowed_means(values: &[f64], resolution: usize) -> Vec<f64> {
    values
        .chunks(resolution.max(1))
        .map(|w| w.iter().sum::<f64>() / w.len() as f64)
        .collect()
}

/// Shared x-domain: the shortest fragment-length histogram among `records`.
pub fn shared_length(records: &[&ExperimentRecord]) -> usize {
    records
        .iter()
        .map(|r| r.fragment_lengths.len())
        .min()
        .unwrap_or(0)
}

fn window_points(values: &[f64], resolution: usize, origin: f64) -> Vec<Point> {
    let resolution = resolution.max(1);
    windowed_means(values, resolution)
        .into_iter()
        .enumerate()
        .map(|(i, y)| Point {
            x: (i * resolution) as f64 - origin,
            y,
        })
        .collect()
}

pub fn fragment_length(
    store: &MetricsStore,
    records: &[&ExperimentRecord],
    resolution: usize,
) -> PlotOutcome {
    let n = shared_length(records);
    let mut ds = PlotDataset::new(PlotKind::FragmentLength);
    ds.x_max = n as f64;

    for record in records {
        let fractions = &record.fragment_lengths.fractions()[..n];
        ds.push(Series::new(record, window_points(fractions, resolution, 0.0)));
    }

    if let Some(reference) = &store.references().fragment_length {
        let fractions: Vec<f64> = (0..n).map(|bin| reference.histogram.fraction(bin)).collect();
        ds.reference = Some(ReferenceSeries {
            source: reference.source.clone(),
            points: window_points(&fractions, resolution, 0.0),
        });
    }

    PlotOutcome::Ready(ds)
}

/// Coverage is symmetric about its center index, which becomes x = 0.
pub fn tss_enrichment(records: &[&ExperimentRecord], resolution: usize) -> PlotOutcome {
    let mut ds = PlotDataset::new(PlotKind::TssEnrichment);
    let mut any = false;

    for record in records {
        let Some(coverage) = &record.tss_coverage else {
            continue;
        };
        let half = (coverage.len() as f64 - 1.0) / 2.0;
        if !any || -half < ds.x_min {
            ds.x_min = -half;
        }
        if !any || half > ds.x_max {
            ds.x_max = half;
        }
        any = true;
        ds.push(Series::new(record, window_points(coverage, resolution, half)));
    }

    if !any {
        return PlotOutcome::Absent(AbsentReason::NoTssCoverage);
    }
    PlotOutcome::Ready(ds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::fixtures::{record, store};
    use serde_json::json;

    #[test]
    fn test_windowed_means_point_count_and_values() {
        let values: Vec<f64> = (0..23).map(|v| v as f64).collect();
        for r in 1..=25 {
            let means = windowed_means(&values, r);
            assert_eq!(means.len(), (values.len() + r - 1) / r, "resolution {}", r);
            for (i, m) in means.iter().enumerate() {
                let window = &values[i * r..((i + 1) * r).min(values.len())];
                let expected = window.iter().sum::<f64>() / window.len() as f64;
                assert!((m - expected).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_mean_not_sum() {
        let means = windowed_means(&[0.1, 0.1, 0.1, 0.1], 2);
        assert_eq!(means.len(), 2);
        assert!((means[0] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_domain_is_minimum_histogram_length() {
        let s = store(json!({"a": record("S", 1000), "b": record("T", 500)}));
        let a = s.get("a").unwrap();
        let b = s.get("b").unwrap();

        let PlotOutcome::Ready(both) = fragment_length(&s, &[a, b], 10) else {
            panic!("expected ready");
        };
        assert_eq!(both.x_max, 500.0);
        assert_eq!(both.series["a"].points.len(), 50);

        let PlotOutcome::Ready(only_a) = fragment_length(&s, &[a], 10) else {
            panic!("expected ready");
        };
        assert_eq!(only_a.x_max, 1000.0);
        assert_eq!(only_a.series["a"].points.len(), 100);
    }

    #[test]
    fn test_reference_uses_shared_domain() {
        let s = store(json!({
            "fragment_length_reference": {
                "source": "ref",
                "distribution": [[0, 1, 0.4], [1, 1, 0.6]]
            },
            "metrics": {"a": record("S", 6)}
        }));
        let a = s.get("a").unwrap();
        let PlotOutcome::Ready(ds) = fragment_length(&s, &[a], 2) else {
            panic!("expected ready");
        };
        let reference = ds.reference.unwrap();
        assert_eq!(reference.source, "ref");
        // bins past the reference's end count as zero
        assert_eq!(reference.points.len(), 3);
        assert!((reference.points[0].y - 0.5).abs() < 1e-12);
        assert_eq!(reference.points[2].y, 0.0);
    }

    #[test]
    fn test_tss_recentered_and_absent_without_coverage() {
        let mut with = record("S", 5);
        with["tss_coverage"] = json!([1.0, 1.0, 2.0, 4.0, 2.0, 1.0, 1.0]);
        let s = store(json!({"a": with, "b": record("T", 5)}));
        let a = s.get("a").unwrap();
        let b = s.get("b").unwrap();

        let PlotOutcome::Ready(ds) = tss_enrichment(&[a, b], 2) else {
            panic!("expected ready");
        };
        assert!(!ds.series.contains_key("b"));
        assert_eq!(ds.x_min, -3.0);
        assert_eq!(ds.x_max, 3.0);
        let xs: Vec<f64> = ds.series["a"].points.iter().map(|p| p.x).collect();
        assert_eq!(xs, vec![-3.0, -1.0, 1.0, 3.0]);
        assert!((ds.series["a"].points[1].y - 3.0).abs() < 1e-12);

        assert_eq!(
            tss_enrichment(&[b], 2),
            PlotOutcome::Absent(AbsentReason::NoTssCoverage)
        );
    }
}

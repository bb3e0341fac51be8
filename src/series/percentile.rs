//! Cumulative peak percentile curves.
//!
//! Stored arrays already hold cumulative fractions, one per percentile.
//! Arrays shorter than 100 entries are extended by repeating the last known
//! value; cumulative fractions never decrease, so the flat tail is a lower
//! bound rather than invented data.

use super::{AbsentReason, PlotDataset, PlotKind, PlotOutcome, Point, ReferenceSeries, Series};
use crate::store::{ExperimentRecord, MetricsStore, PeakPercentiles, MAX_PERCENTILES};

pub const PERCENTILE_POINTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeakMeasure {
    ReadCounts,
    Territory,
}

impl PeakMeasure {
    pub fn plot_kind(&self) -> PlotKind {
        match self {
            PeakMeasure::ReadCounts => PlotKind::PeakReadCounts,
            PeakMeasure::Territory => PlotKind::PeakTerritory,
        }
    }

    pub fn select<'a>(&self, p: &'a PeakPercentiles) -> &'a [f64] {
        match self {
            PeakMeasure::ReadCounts => &p.read_counts,
            PeakMeasure::Territory => &p.territory,
        }
    }
}

/// `x = percentile + 1`, holding the last value flat past the end of `values`.
/// Emits 100 points, or 101 when the array carries the 100th percentile.
pub fn hold_last(values: &[f64]) -> Vec<Point> {
    let n = values.len().clamp(PERCENTILE_POINTS, MAX_PERCENTILES);
    let mut last = 0.0;
    (0..n)
        .map(|p| {
            if let Some(v) = values.get(p) {
                last = *v;
            }
            Point {
                x: (p + 1) as f64,
                y: last,
            }
        })
        .collect()
}

pub fn peak_curves(
    store: &MetricsStore,
    records: &[&ExperimentRecord],
    measure: PeakMeasure,
) -> PlotOutcome {
    let mut ds = PlotDataset::new(measure.plot_kind());

    for record in records {
        let Some(values) = record
            .peak_percentiles
            .as_ref()
            .map(|p| measure.select(p))
            .filter(|v| !v.is_empty())
        else {
            continue;
        };
        let points = hold_last(values);
        ds.x_max = ds.x_max.max(points.len() as f64);
        ds.push(Series::new(record, points));
    }

    if ds.series.is_empty() {
        return PlotOutcome::Absent(AbsentReason::NoPeaks);
    }

    if let Some(reference) = &store.references().peaks {
        let values = measure.select(&reference.percentiles);
        if !values.is_empty() {
            ds.reference = Some(ReferenceSeries {
                source: reference.source.clone(),
                points: hold_last(values),
            });
        }
    }

    PlotOutcome::Ready(ds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::fixtures::{record, store};
    use serde_json::json;

    #[test]
    fn test_hold_last_fills_to_one_hundred() {
        let points = hold_last(&[0.1, 0.3, 0.35]);
        assert_eq!(points.len(), 100);
        assert_eq!(points[0], Point { x: 1.0, y: 0.1 });
        assert_eq!(points[2].y, 0.35);
        assert_eq!(points[99], Point { x: 100.0, y: 0.35 });
    }

    #[test]
    fn test_hold_last_keeps_hundredth_percentile() {
        let values: Vec<f64> = (0..101).map(|p| p as f64 / 100.0).collect();
        let points = hold_last(&values);
        assert_eq!(points.len(), 101);
        assert_eq!(points[100], Point { x: 101.0, y: 1.0 });
    }

    #[test]
    fn test_no_peaks_anywhere_is_absent() {
        let s = store(json!({"a": record("S", 5), "b": record("T", 5)}));
        let recs: Vec<_> = s.experiments().collect();
        assert_eq!(
            peak_curves(&s, &recs, PeakMeasure::ReadCounts),
            PlotOutcome::Absent(AbsentReason::NoPeaks)
        );
    }

    #[test]
    fn test_only_experiments_with_peaks_contribute() {
        let mut a = record("S", 5);
        a["peak_percentiles"] = json!({
            "cumulative_fraction_of_hqaa": [0.2, 0.4],
            "cumulative_fraction_of_territory": [0.01, 0.02, 0.03]
        });
        let s = store(json!({
            "reference_peak_metrics": {"source": "ref", "cumulative_fraction_of_hqaa": [0.5]},
            "metrics": {"a": a, "b": record("T", 5)}
        }));
        let recs: Vec<_> = s.experiments().collect();

        let PlotOutcome::Ready(ds) = peak_curves(&s, &recs, PeakMeasure::ReadCounts) else {
            panic!("expected ready");
        };
        assert_eq!(ds.series.len(), 1);
        assert_eq!(ds.series["a"].points[50].y, 0.4);
        assert_eq!(ds.reference.as_ref().unwrap().points[99].y, 0.5);
        assert_eq!(ds.x_max, 100.0);

        // the territory reference is empty, so no reference series
        let PlotOutcome::Ready(ds) = peak_curves(&s, &recs, PeakMeasure::Territory) else {
            panic!("expected ready");
        };
        assert!(ds.reference.is_none());
        assert_eq!(ds.series["a"].points[2].y, 0.03);
    }
}

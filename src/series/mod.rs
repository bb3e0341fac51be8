//! Series Transformation Engine.
//!
//! Pure functions from (store, active ids, config) to one [`PlotOutcome`] per
//! [`PlotKind`]. Nothing here depends on render state; the same inputs always
//! produce the same datasets.
//!
//! ```text
//! MetricsStore ──► compute_plots ──► PlotSet ──► render surface
//!                     │
//!                     ├─ histogram   (fragment length, TSS)
//!                     ├─ percentile  (peak read counts, peak territory)
//!                     ├─ mapq
//!                     └─ scatter     (fragment-length distance vs y metric)
//! ```

pub mod histogram;
pub mod mapq;
pub mod percentile;
pub mod scatter;

use serde::Serialize;
use std::collections::BTreeMap;

use crate::logging::log_plot_absent;
use crate::store::{ExperimentRecord, MetricsStore};
pub use scatter::{YMetricTable, YTransform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotKind {
    FragmentLengthDistance,
    FragmentLength,
    TssEnrichment,
    PeakReadCounts,
    PeakTerritory,
    Mapq,
}

impl PlotKind {
    pub const ALL: [PlotKind; 6] = [
        PlotKind::FragmentLengthDistance,
        PlotKind::FragmentLength,
        PlotKind::TssEnrichment,
        PlotKind::PeakReadCounts,
        PlotKind::PeakTerritory,
        PlotKind::Mapq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlotKind::FragmentLengthDistance => "fragment_length_distance",
            PlotKind::FragmentLength => "fragment_length",
            PlotKind::TssEnrichment => "tss_enrichment",
            PlotKind::PeakReadCounts => "peak_read_counts",
            PlotKind::PeakTerritory => "peak_territory",
            PlotKind::Mapq => "mapq",
        }
    }

    pub fn x_label(&self) -> &'static str {
        match self {
            PlotKind::FragmentLengthDistance => "Fragment length distance",
            PlotKind::FragmentLength => "Fragment length (bp)",
            PlotKind::TssEnrichment => "Position relative to TSS",
            PlotKind::PeakReadCounts | PlotKind::PeakTerritory => "Peak percentile",
            PlotKind::Mapq => "Mapping quality",
        }
    }

    pub fn y_label(&self) -> &'static str {
        match self {
            // replaced by the chosen metric's label
            PlotKind::FragmentLengthDistance => "",
            PlotKind::FragmentLength => "Fraction of all reads",
            PlotKind::TssEnrichment => "Enrichment",
            PlotKind::PeakReadCounts => "Cumulative fraction of high-quality autosomal reads",
            PlotKind::PeakTerritory => "Cumulative fraction of peak territory",
            PlotKind::Mapq => "Fraction of all reads",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub experiment_id: String,
    pub sample: String,
    pub library: String,
    pub description: String,
    pub points: Vec<Point>,
}

impl Series {
    pub fn new(record: &ExperimentRecord, points: Vec<Point>) -> Self {
        Self {
            experiment_id: record.id.clone(),
            sample: record.sample().to_string(),
            library: record.library_label().to_string(),
            description: record.library.description.clone(),
            points,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceSeries {
    pub source: String,
    pub points: Vec<Point>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlotDataset {
    pub kind: PlotKind,
    pub series: BTreeMap<String, Series>,
    pub reference: Option<ReferenceSeries>,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub x_label: String,
    pub y_label: String,
}

impl PlotDataset {
    pub fn new(kind: PlotKind) -> Self {
        Self {
            kind,
            series: BTreeMap::new(),
            reference: None,
            x_min: 0.0,
            x_max: 0.0,
            y_min: 0.0,
            y_max: 0.0,
            x_label: kind.x_label().to_string(),
            y_label: kind.y_label().to_string(),
        }
    }

    pub fn push(&mut self, series: Series) {
        self.series.insert(series.experiment_id.clone(), series);
    }

    fn all_points(&self) -> impl Iterator<Item = &Point> + '_ {
        self.series
            .values()
            .flat_map(|s| s.points.iter())
            .chain(self.reference.iter().flat_map(|r| r.points.iter()))
    }

    /// y bounds over every series and the reference, anchored at zero.
    fn refresh_y_bounds(&mut self) {
        let (lo, hi) = self
            .all_points()
            .map(|p| p.y)
            .filter(|y| y.is_finite())
            .fold((0.0f64, 0.0f64), |(lo, hi), y| (lo.min(y), hi.max(y)));
        self.y_min = lo;
        self.y_max = hi;
    }

    fn scale_y(&mut self, exponent: i32) {
        if exponent == 0 {
            return;
        }
        let factor = 10f64.powi(exponent);
        for s in self.series.values_mut() {
            for p in &mut s.points {
                p.y *= factor;
            }
        }
        if let Some(r) = &mut self.reference {
            for p in &mut r.points {
                p.y *= factor;
            }
        }
        self.y_label = format!("{} (x1e{})", self.y_label, exponent);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentReason {
    NoActiveExperiments,
    NoPeaks,
    NoTssCoverage,
    NoScatterValues,
}

impl AbsentReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbsentReason::NoActiveExperiments => "no_active_experiments",
            AbsentReason::NoPeaks => "no_peaks",
            AbsentReason::NoTssCoverage => "no_tss_coverage",
            AbsentReason::NoScatterValues => "no_scatter_values",
        }
    }
}

/// A plot is either ready to draw or must be omitted by the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum PlotOutcome {
    Ready(PlotDataset),
    Absent(AbsentReason),
}

impl PlotOutcome {
    pub fn ready(&self) -> Option<&PlotDataset> {
        match self {
            PlotOutcome::Ready(ds) => Some(ds),
            PlotOutcome::Absent(_) => None,
        }
    }

    pub fn absent_reason(&self) -> Option<AbsentReason> {
        match self {
            PlotOutcome::Ready(_) => None,
            PlotOutcome::Absent(reason) => Some(*reason),
        }
    }
}

pub type PlotSet = BTreeMap<PlotKind, PlotOutcome>;

#[derive(Debug, Clone)]
pub struct SeriesConfig {
    pub resolution: usize,
    pub resolution_overrides: BTreeMap<PlotKind, usize>,
    pub y_metric: String,
    /// Every y value is multiplied by `10^y_exponent`.
    pub y_exponent: i32,
    pub show_reference: bool,
    pub y_metrics: YMetricTable,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            resolution: 10,
            resolution_overrides: BTreeMap::new(),
            y_metric: "short_mononucleosomal_ratio".to_string(),
            y_exponent: 0,
            show_reference: true,
            y_metrics: YMetricTable::default(),
        }
    }
}

impl SeriesConfig {
    pub fn resolution_for(&self, kind: PlotKind) -> usize {
        self.resolution_overrides
            .get(&kind)
            .copied()
            .unwrap_or(self.resolution)
            .max(1)
    }
}

/// Compute every plot kind for the given active ids. Ids unknown to the
/// store are skipped.
pub fn compute_plots(store: &MetricsStore, active: &[String], cfg: &SeriesConfig) -> PlotSet {
    let records: Vec<&ExperimentRecord> = active.iter().filter_map(|id| store.get(id)).collect();
    PlotKind::ALL
        .iter()
        .map(|kind| (*kind, compute_plot(*kind, store, &records, cfg)))
        .collect()
}

pub fn compute_plot(
    kind: PlotKind,
    store: &MetricsStore,
    records: &[&ExperimentRecord],
    cfg: &SeriesConfig,
) -> PlotOutcome {
    if records.is_empty() {
        return PlotOutcome::Absent(AbsentReason::NoActiveExperiments);
    }

    let resolution = cfg.resolution_for(kind);
    let outcome = match kind {
        PlotKind::FragmentLengthDistance => scatter::fragment_length_distance(records, cfg),
        PlotKind::FragmentLength => histogram::fragment_length(store, records, resolution),
        PlotKind::TssEnrichment => histogram::tss_enrichment(records, resolution),
        PlotKind::PeakReadCounts => {
            percentile::peak_curves(store, records, percentile::PeakMeasure::ReadCounts)
        }
        PlotKind::PeakTerritory => {
            percentile::peak_curves(store, records, percentile::PeakMeasure::Territory)
        }
        PlotKind::Mapq => mapq::mapq(records),
    };

    match outcome {
        PlotOutcome::Ready(mut ds) => {
            if !cfg.show_reference {
                ds.reference = None;
            }
            ds.scale_y(cfg.y_exponent);
            ds.refresh_y_bounds();
            PlotOutcome::Ready(ds)
        }
        PlotOutcome::Absent(reason) => {
            log_plot_absent(kind.as_str(), reason.as_str());
            PlotOutcome::Absent(reason)
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::store::MetricsStore;
    use serde_json::{json, Value};

    /// A record with `bins` fragment-length bins, each carrying fraction `bin/1000`.
    pub fn record(sample: &str, bins: usize) -> Value {
        let fl: Vec<Value> = (0..bins)
            .map(|b| json!([b, b * 10, b as f64 / 1000.0]))
            .collect();
        json!({
            "library": {
                "library": format!("lib-{}", sample),
                "sample": sample,
                "description": "desc"
            },
            "total_reads": 1000,
            "total_autosomal_reads": 500,
            "duplicate_autosomal_reads": 50,
            "short_mononucleosomal_ratio": 1.5,
            "hqaa": 200,
            "fragment_length_distance": 0.12,
            "fragment_length_counts": fl,
            "mapq_counts": [[0, 100], [30, 400], [60, 500]]
        })
    }

    pub fn store(records: Value) -> MetricsStore {
        MetricsStore::from_value(records).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{record, store};
    use super::*;
    use serde_json::json;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_empty_active_set_is_absent_everywhere() {
        let s = store(json!({"a": record("S", 20)}));
        let plots = compute_plots(&s, &[], &SeriesConfig::default());
        assert_eq!(plots.len(), PlotKind::ALL.len());
        for outcome in plots.values() {
            assert_eq!(outcome.absent_reason(), Some(AbsentReason::NoActiveExperiments));
        }
    }

    #[test]
    fn test_unknown_ids_are_skipped() {
        let s = store(json!({"a": record("S", 20)}));
        let plots = compute_plots(&s, &ids(&["a", "ghost"]), &SeriesConfig::default());
        let fl = plots[&PlotKind::FragmentLength].ready().unwrap();
        assert_eq!(fl.series.keys().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_compute_is_deterministic() {
        let s = store(json!({"a": record("S", 50), "b": record("T", 30)}));
        let cfg = SeriesConfig::default();
        let first = compute_plots(&s, &ids(&["a", "b"]), &cfg);
        let second = compute_plots(&s, &ids(&["a", "b"]), &cfg);
        assert_eq!(first, second);
    }

    #[test]
    fn test_y_exponent_scales_values_and_label() {
        let s = store(json!({"a": record("S", 20)}));
        let base = compute_plots(&s, &ids(&["a"]), &SeriesConfig::default());
        let cfg = SeriesConfig {
            y_exponent: 2,
            ..SeriesConfig::default()
        };
        let scaled = compute_plots(&s, &ids(&["a"]), &cfg);
        let b = base[&PlotKind::Mapq].ready().unwrap();
        let c = scaled[&PlotKind::Mapq].ready().unwrap();
        assert!((c.y_max - b.y_max * 100.0).abs() < 1e-9);
        assert!(c.y_label.ends_with("(x1e2)"));
    }

    #[test]
    fn test_y_bounds_cover_all_points() {
        let s = store(json!({"a": record("S", 40)}));
        let plots = compute_plots(&s, &ids(&["a"]), &SeriesConfig::default());
        for ds in plots.values().filter_map(|o| o.ready()) {
            for series in ds.series.values() {
                for p in &series.points {
                    assert!(p.y <= ds.y_max + 1e-12);
                    assert!(p.y >= ds.y_min - 1e-12);
                }
            }
        }
    }
}

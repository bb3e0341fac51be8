//! Fragment-length distance against a selectable y metric.
//!
//! How a metric becomes a y value is looked up in [`YMetricTable`]: ratios
//! are plotted as stored, counts as a percentage of some denominator field.

use serde::Serialize;
use std::collections::BTreeMap;

use super::{AbsentReason, PlotDataset, PlotKind, PlotOutcome, Point, Series, SeriesConfig};
use crate::store::ExperimentRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "denominator", rename_all = "snake_case")]
pub enum YTransform {
    /// Already a ratio or score.
    AsIs,
    /// `100 * metric / field`; a zero or missing field counts as 1.
    PercentOf(String),
}

#[derive(Debug, Clone)]
pub struct YMetricTable {
    entries: BTreeMap<String, YTransform>,
    fallback: YTransform,
}

impl Default for YMetricTable {
    fn default() -> Self {
        let mut table = Self {
            entries: BTreeMap::new(),
            fallback: YTransform::PercentOf("total_reads".to_string()),
        };
        for ratio in [
            "short_mononucleosomal_ratio",
            "tss_enrichment",
            "max_fraction_reads_from_single_autosome",
            "duplicate_fraction_in_peaks",
            "duplicate_fraction_not_in_peaks",
            "peak_duplicate_ratio",
        ] {
            table.register(ratio, YTransform::AsIs);
        }
        table.register(
            "duplicate_autosomal_reads",
            YTransform::PercentOf("total_autosomal_reads".to_string()),
        );
        table
    }
}

impl YMetricTable {
    pub fn register(&mut self, metric: &str, transform: YTransform) {
        self.entries.insert(metric.to_string(), transform);
    }

    pub fn transform_for(&self, metric: &str) -> &YTransform {
        self.entries.get(metric).unwrap_or(&self.fallback)
    }

    pub fn y_value(&self, record: &ExperimentRecord, metric: &str) -> Option<f64> {
        let value = record.scalar(metric)?;
        let y = match self.transform_for(metric) {
            YTransform::AsIs => value,
            YTransform::PercentOf(field) => {
                let denom = record.scalar(field).filter(|d| *d != 0.0).unwrap_or(1.0);
                100.0 * value / denom
            }
        };
        Some(y).filter(|y| y.is_finite())
    }

    pub fn label(&self, metric: &str) -> String {
        let name = metric.replace('_', " ");
        match self.transform_for(metric) {
            YTransform::AsIs => name,
            YTransform::PercentOf(field) => format!("{} (% of {})", name, field.replace('_', " ")),
        }
    }
}

pub fn fragment_length_distance(records: &[&ExperimentRecord], cfg: &SeriesConfig) -> PlotOutcome {
    let mut ds = PlotDataset::new(PlotKind::FragmentLengthDistance);
    ds.y_label = cfg.y_metrics.label(&cfg.y_metric);

    let mut x_bounds: Option<(f64, f64)> = None;
    for record in records {
        let Some(x) = record.fragment_length_distance.filter(|x| x.is_finite()) else {
            continue;
        };
        let Some(y) = cfg.y_metrics.y_value(record, &cfg.y_metric) else {
            continue;
        };
        x_bounds = Some(match x_bounds {
            Some((lo, hi)) => (lo.min(x), hi.max(x)),
            None => (x, x),
        });
        ds.push(Series::new(record, vec![Point { x, y }]));
    }

    let Some((lo, hi)) = x_bounds else {
        return PlotOutcome::Absent(AbsentReason::NoScatterValues);
    };
    ds.x_min = lo.min(0.0);
    ds.x_max = hi;
    PlotOutcome::Ready(ds)
}

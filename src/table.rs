//! Normalized rows for the sortable metric tables and the experiment list.
//!
//! A numeric column may be divided by another field of the same record
//! (`Denominator`) or expressed as a percentage of it (`Percentage`). A zero
//! or missing divisor is treated as 1 so the raw value passes through.
//! Raw integer columns keep whole-number fields as integers.

use serde::Serialize;

use crate::store::{ExperimentRecord, FieldValue, MetricsStore};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum Normalization {
    Raw,
    Denominator(String),
    Percentage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Number,
    Text,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSpec {
    pub key: String,
    pub kind: ColumnKind,
    pub normalization: Normalization,
    /// Hidden when the session asks for less redundant tables.
    pub redundant: bool,
}

impl ColumnSpec {
    fn new(key: &str, kind: ColumnKind) -> Self {
        Self {
            key: key.to_string(),
            kind,
            normalization: Normalization::Raw,
            redundant: false,
        }
    }

    pub fn text(key: &str) -> Self {
        Self::new(key, ColumnKind::Text)
    }

    pub fn integer(key: &str) -> Self {
        Self::new(key, ColumnKind::Integer)
    }

    pub fn number(key: &str) -> Self {
        Self::new(key, ColumnKind::Number)
    }

    pub fn per(mut self, field: &str) -> Self {
        self.kind = ColumnKind::Number;
        self.normalization = Normalization::Denominator(field.to_string());
        self
    }

    pub fn percent_of(mut self, field: &str) -> Self {
        self.kind = ColumnKind::Number;
        self.normalization = Normalization::Percentage(field.to_string());
        self
    }

    pub fn redundant(mut self) -> Self {
        self.redundant = true;
        self
    }
}

/// Columns of the read-accounting table shown by default.
pub fn default_columns() -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::text("name"),
        ColumnSpec::text("library.sample"),
        ColumnSpec::integer("total_reads"),
        ColumnSpec::number("hqaa").percent_of("total_reads"),
        ColumnSpec::integer("hqaa").redundant(),
        ColumnSpec::number("duplicate_reads").percent_of("total_reads"),
        ColumnSpec::number("duplicate_autosomal_reads").percent_of("total_autosomal_reads"),
        ColumnSpec::number("total_mitochondrial_reads").percent_of("total_reads"),
        ColumnSpec::number("short_mononucleosomal_ratio"),
        ColumnSpec::number("tss_enrichment"),
        ColumnSpec::integer("total_peaks"),
        ColumnSpec::number("hqaa_in_peaks").per("total_peaks"),
    ]
}

fn divisor(record: &ExperimentRecord, field: &str) -> f64 {
    record
        .scalar(field)
        .filter(|d| *d != 0.0 && d.is_finite())
        .unwrap_or(1.0)
}

pub fn normalize(record: &ExperimentRecord, column: &ColumnSpec) -> FieldValue {
    match (record.field(&column.key), &column.normalization) {
        (FieldValue::Number(v), Normalization::Denominator(field)) => {
            FieldValue::Number(v / divisor(record, field))
        }
        (FieldValue::Number(v), Normalization::Percentage(field)) => {
            let pct = record
                .scalar(field)
                .filter(|d| *d != 0.0 && d.is_finite())
                .map(|d| d / 100.0)
                .unwrap_or(1.0);
            FieldValue::Number(v / pct)
        }
        (FieldValue::Number(v), Normalization::Raw)
            if column.kind == ColumnKind::Integer && record.is_integer(&column.key) =>
        {
            FieldValue::Integer(v as i64)
        }
        (value, _) => value,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Extreme {
    Min,
    Max,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub key: String,
    pub value: FieldValue,
    pub mark: Option<Extreme>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRow {
    pub experiment_id: String,
    pub sample: String,
    /// Hover text for every cell of the row.
    pub title: String,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<TableRow>,
}

pub fn build_table(
    store: &MetricsStore,
    active: &[String],
    columns: &[ColumnSpec],
    less_redundant: bool,
) -> Table {
    let columns: Vec<ColumnSpec> = columns
        .iter()
        .filter(|c| !(less_redundant && c.redundant))
        .cloned()
        .collect();

    let mut rows: Vec<TableRow> = active
        .iter()
        .filter_map(|id| store.get(id))
        .map(|record| TableRow {
            experiment_id: record.id.clone(),
            sample: record.sample().to_string(),
            title: record
                .description
                .clone()
                .unwrap_or_else(|| record.library.description.clone()),
            cells: columns
                .iter()
                .map(|c| Cell {
                    key: c.key.clone(),
                    value: normalize(record, c),
                    mark: None,
                })
                .collect(),
        })
        .collect();

    mark_extremes(&mut rows, columns.len());
    Table { columns, rows }
}

/// Cells holding a column's minimum or maximum get marked, unless every
/// value in the column is equal.
fn mark_extremes(rows: &mut [TableRow], width: usize) {
    for col in 0..width {
        let values = rows
            .iter()
            .filter_map(|r| r.cells[col].value.as_f64())
            .filter(|v| v.is_finite());
        let Some((lo, hi)) = values.fold(None, |acc: Option<(f64, f64)>, v| {
            Some(acc.map_or((v, v), |(lo, hi)| (lo.min(v), hi.max(v))))
        }) else {
            continue;
        };
        if lo == hi {
            continue;
        }
        for row in rows.iter_mut() {
            let cell = &mut row.cells[col];
            if let Some(v) = cell.value.as_f64() {
                if v == hi {
                    cell.mark = Some(Extreme::Max);
                } else if v == lo {
                    cell.mark = Some(Extreme::Min);
                }
            }
        }
    }
}

/// One entry of the filterable experiment list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentListRow {
    pub experiment_id: String,
    pub name: String,
    pub organism: String,
    pub sample: String,
    pub library: String,
    pub library_description: String,
    pub description: String,
    pub url: Option<String>,
}

pub fn experiment_list(store: &MetricsStore) -> Vec<ExperimentListRow> {
    store
        .experiments()
        .map(|r| ExperimentListRow {
            experiment_id: r.id.clone(),
            name: r.display_name().to_string(),
            organism: r.organism.clone().unwrap_or_default(),
            sample: r.sample().to_string(),
            library: r.library_label().to_string(),
            library_description: r.library.description.clone(),
            description: r.description.clone().unwrap_or_default(),
            url: r.url.clone(),
        })
        .collect()
}

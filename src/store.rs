//! Metrics Store: the immutable-per-session mapping of experiment id to its
//! already-produced QC metrics record.
//!
//! The loader accepts either a session document
//! (`{"description", "fragment_length_reference", "reference_peak_metrics", "metrics": {..}}`)
//! or a bare `{id: record}` mapping. Distribution fields are validated here,
//! once, so the transformation engine can rely on dense 0-indexed histograms.

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::logging::log_load;

/// Peak percentile arrays hold at most percentiles 0..=100.
pub const MAX_PERCENTILES: usize = 101;

/// Largest histogram bin accepted; histograms are stored dense.
pub const MAX_BIN: usize = u16::MAX as usize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LibraryInfo {
    pub library: String,
    pub sample: String,
    pub description: String,
}

/// Dense histogram indexed by bin. Bins absent from the source are zero
/// but remain distinguishable from bins listed with a zero count.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Histogram {
    counts: Vec<f64>,
    fractions: Vec<f64>,
    #[serde(skip)]
    listed: Vec<bool>,
}

impl Histogram {
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn count(&self, bin: usize) -> f64 {
        self.counts.get(bin).copied().unwrap_or(0.0)
    }

    pub fn fraction(&self, bin: usize) -> f64 {
        self.fractions.get(bin).copied().unwrap_or(0.0)
    }

    pub fn fractions(&self) -> &[f64] {
        &self.fractions
    }

    pub fn is_listed(&self, bin: usize) -> bool {
        self.listed.get(bin).copied().unwrap_or(false)
    }

    /// Bins present in the source, zero counts included, ascending.
    pub fn listed(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.counts
            .iter()
            .zip(&self.listed)
            .enumerate()
            .filter(|(_, (_, listed))| **listed)
            .map(|(bin, (c, _))| (bin, *c))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeakPercentiles {
    /// Cumulative fraction of high-quality autosomal reads per percentile.
    pub read_counts: Vec<f64>,
    /// Cumulative fraction of peak territory per percentile.
    pub territory: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentRecord {
    pub id: String,
    pub name: Option<String>,
    pub organism: Option<String>,
    pub description: Option<String>,
    pub url: Option<String>,
    pub library: LibraryInfo,
    pub scalars: BTreeMap<String, f64>,
    integer_fields: BTreeSet<String>,
    pub fragment_lengths: Histogram,
    pub mapq: Histogram,
    pub tss_coverage: Option<Vec<f64>>,
    pub peak_percentiles: Option<PeakPercentiles>,
    pub fragment_length_distance: Option<f64>,
}

/// A value looked up by column key for tables.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Number(f64),
    Text(String),
    Missing,
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(v) => Some(*v as f64),
            FieldValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

impl ExperimentRecord {
    /// Grouping key; the experiment id when the library carries no sample.
    pub fn sample(&self) -> &str {
        if self.library.sample.is_empty() {
            &self.id
        } else {
            &self.library.sample
        }
    }

    pub fn library_label(&self) -> &str {
        if !self.library.library.is_empty() {
            &self.library.library
        } else {
            self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&self.id)
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().filter(|n| !n.is_empty()).unwrap_or(&self.id)
    }

    pub fn scalar(&self, field: &str) -> Option<f64> {
        self.scalars.get(field).copied()
    }

    pub fn is_integer(&self, field: &str) -> bool {
        self.integer_fields.contains(field)
    }

    pub fn total_reads(&self) -> f64 {
        self.scalar("total_reads").unwrap_or(0.0)
    }

    pub fn has_peaks(&self) -> bool {
        self.peak_percentiles.is_some()
    }

    /// Lookup by column key: a scalar name, a top-level text field, or a
    /// dotted path into the library sub-record.
    pub fn field(&self, key: &str) -> FieldValue {
        let text = |s: &str| FieldValue::Text(s.to_string());
        match key {
            "name" => text(self.display_name()),
            "organism" => self.organism.as_deref().map(text).unwrap_or(FieldValue::Missing),
            "description" => self.description.as_deref().map(text).unwrap_or(FieldValue::Missing),
            "url" => self.url.as_deref().map(text).unwrap_or(FieldValue::Missing),
            "library.library" => text(self.library_label()),
            "library.sample" => text(self.sample()),
            "library.description" => text(&self.library.description),
            _ => self
                .scalar(key)
                .map(FieldValue::Number)
                .unwrap_or(FieldValue::Missing),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceDistribution {
    pub source: String,
    pub histogram: Histogram,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferencePeaks {
    pub source: String,
    pub percentiles: PeakPercentiles,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct References {
    pub fragment_length: Option<ReferenceDistribution>,
    pub peaks: Option<ReferencePeaks>,
}

#[derive(Debug, Clone, Default)]
pub struct MetricsStore {
    description: Option<String>,
    references: References,
    experiments: BTreeMap<String, ExperimentRecord>,
}

impl MetricsStore {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read metrics file {}", path.display()))?;
        let store = Self::from_json_str(&text)
            .with_context(|| format!("invalid metrics file {}", path.display()))?;
        store.log_loaded(&path.display().to_string());
        Ok(store)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).context("metrics document is not JSON")?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut doc) = value else {
            bail!("metrics document must be a JSON object");
        };

        let is_session = matches!(doc.get("metrics"), Some(Value::Object(_)));
        let (records, description, references) = if is_session {
            let references = References {
                fragment_length: doc
                    .remove("fragment_length_reference")
                    .filter(|v| !v.is_null())
                    .map(parse_reference_distribution)
                    .transpose()
                    .context("fragment_length_reference")?,
                peaks: doc
                    .remove("reference_peak_metrics")
                    .filter(|v| !v.is_null())
                    .map(parse_reference_peaks)
                    .transpose()
                    .context("reference_peak_metrics")?,
            };
            let description = doc.remove("description").and_then(as_string);
            let records = match doc.remove("metrics") {
                Some(Value::Object(records)) => records,
                _ => bail!("metrics must be an object keyed by experiment id"),
            };
            (records, description, references)
        } else {
            (doc, None, References::default())
        };

        let mut experiments = BTreeMap::new();
        for (id, record) in records {
            let parsed = parse_record(&id, record)
                .with_context(|| format!("experiment {:?}", id))?;
            experiments.insert(id, parsed);
        }

        Ok(Self {
            description,
            references,
            experiments,
        })
    }

    pub fn log_loaded(&self, source: &str) {
        let with_peaks = self.experiments.values().filter(|e| e.has_peaks()).count();
        let with_tss = self
            .experiments
            .values()
            .filter(|e| e.tss_coverage.is_some())
            .count();
        log_load(source, self.experiments.len(), with_peaks, with_tss);
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn references(&self) -> &References {
        &self.references
    }

    pub fn get(&self, id: &str) -> Option<&ExperimentRecord> {
        self.experiments.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.experiments.contains_key(id)
    }

    /// Experiment ids in ascending lexical order.
    pub fn ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.experiments.keys().map(|k| k.as_str())
    }

    pub fn experiments(&self) -> impl Iterator<Item = &ExperimentRecord> + '_ {
        self.experiments.values()
    }

    pub fn len(&self) -> usize {
        self.experiments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
    }
}

fn as_string(v: Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s),
        _ => None,
    }
}

fn str_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(|s| s.to_string())
}

fn parse_record(id: &str, value: Value) -> Result<ExperimentRecord> {
    let Value::Object(obj) = value else {
        bail!("record must be a JSON object");
    };

    let library = match obj.get("library") {
        Some(Value::Object(lib)) => LibraryInfo {
            library: str_field(lib, "library").unwrap_or_default(),
            sample: str_field(lib, "sample").unwrap_or_default(),
            description: str_field(lib, "description").unwrap_or_default(),
        },
        _ => LibraryInfo::default(),
    };

    let mut scalars = BTreeMap::new();
    let mut integer_fields = BTreeSet::new();
    for (key, v) in &obj {
        if let Some(n) = v.as_f64() {
            if v.is_i64() || v.is_u64() {
                integer_fields.insert(key.clone());
            }
            scalars.insert(key.clone(), n);
        }
    }
    let total_reads = scalars.get("total_reads").copied().unwrap_or(0.0);

    let fragment_lengths = match obj.get("fragment_length_counts") {
        Some(v) => parse_histogram(v, total_reads).context("fragment_length_counts")?,
        None => bail!("missing required distribution fragment_length_counts"),
    };
    let mapq = match obj.get("mapq_counts") {
        Some(v) => parse_histogram(v, total_reads).context("mapq_counts")?,
        None => bail!("missing required distribution mapq_counts"),
    };

    let tss_coverage = match obj.get("tss_coverage") {
        None | Some(Value::Null) => None,
        Some(v) => {
            let coverage = parse_coverage(v).context("tss_coverage")?;
            if coverage.is_empty() {
                None
            } else {
                Some(coverage)
            }
        }
    };

    let peak_percentiles = match obj.get("peak_percentiles") {
        None | Some(Value::Null) => None,
        Some(v) => parse_peak_percentiles(v).context("peak_percentiles")?,
    };

    Ok(ExperimentRecord {
        id: id.to_string(),
        name: str_field(&obj, "name"),
        organism: str_field(&obj, "organism"),
        description: str_field(&obj, "description"),
        url: str_field(&obj, "url"),
        library,
        scalars,
        integer_fields,
        fragment_lengths,
        mapq,
        tss_coverage,
        peak_percentiles,
        fragment_length_distance: obj.get("fragment_length_distance").and_then(|v| v.as_f64()),
    })
}

/// `[[bin, count(, fraction)], ..]` into a dense histogram. A missing
/// fraction is derived from `total` (or the count sum when `total` is 0).
fn parse_histogram(value: &Value, total: f64) -> Result<Histogram> {
    let entries = value
        .as_array()
        .ok_or_else(|| anyhow!("distribution must be an array of [bin, count, fraction?]"))?;

    let mut rows: BTreeMap<usize, (f64, Option<f64>)> = BTreeMap::new();
    for (i, entry) in entries.iter().enumerate() {
        let tuple = entry
            .as_array()
            .filter(|t| t.len() >= 2)
            .ok_or_else(|| anyhow!("entry {} is not a [bin, count] tuple", i))?;
        let bin = tuple[0]
            .as_f64()
            .filter(|b| *b >= 0.0 && b.fract() == 0.0)
            .ok_or_else(|| anyhow!("entry {} has invalid bin {}", i, tuple[0]))?;
        if bin > MAX_BIN as f64 {
            bail!("entry {} has bin {} beyond {}", i, bin, MAX_BIN);
        }
        let bin = bin as usize;
        let count = tuple[1].as_f64().unwrap_or(0.0);
        let fraction = tuple.get(2).and_then(|f| f.as_f64());
        if rows.insert(bin, (count, fraction)).is_some() {
            bail!("bin {} appears more than once", bin);
        }
    }

    let len = rows.keys().next_back().map(|b| b + 1).unwrap_or(0);
    let sum: f64 = rows.values().map(|(c, _)| c).sum();
    let denom = if total > 0.0 {
        total
    } else if sum > 0.0 {
        sum
    } else {
        1.0
    };

    let mut counts = vec![0.0; len];
    let mut fractions = vec![0.0; len];
    let mut listed = vec![false; len];
    for (bin, (count, fraction)) in rows {
        counts[bin] = count;
        fractions[bin] = fraction.unwrap_or(count / denom);
        listed[bin] = true;
    }
    Ok(Histogram {
        counts,
        fractions,
        listed,
    })
}

/// Accepts `[[position, value], ..]` or bare numbers.
fn parse_coverage(value: &Value) -> Result<Vec<f64>> {
    let entries = value
        .as_array()
        .ok_or_else(|| anyhow!("coverage must be an array"))?;
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| match entry {
            Value::Number(n) => n.as_f64().ok_or_else(|| anyhow!("entry {} is not finite", i)),
            Value::Array(pair) if pair.len() >= 2 => pair[1]
                .as_f64()
                .ok_or_else(|| anyhow!("entry {} has a non-numeric value", i)),
            Value::Null => Ok(0.0),
            other => Err(anyhow!("entry {} is not a coverage value: {}", i, other)),
        })
        .collect()
}

/// Null entries (undefined fractions upstream) hold the previous value.
fn parse_cumulative(value: Option<&Value>) -> Result<Vec<f64>> {
    let Some(value) = value.filter(|v| !v.is_null()) else {
        return Ok(Vec::new());
    };
    let entries = value
        .as_array()
        .ok_or_else(|| anyhow!("cumulative fractions must be an array"))?;
    if entries.len() > MAX_PERCENTILES {
        bail!(
            "{} percentile entries, at most {} allowed",
            entries.len(),
            MAX_PERCENTILES
        );
    }
    let mut out = Vec::with_capacity(entries.len());
    let mut last = 0.0;
    for (i, entry) in entries.iter().enumerate() {
        let v = match entry {
            Value::Null => last,
            v => v
                .as_f64()
                .ok_or_else(|| anyhow!("percentile {} is not a number", i))?,
        };
        last = v;
        out.push(v);
    }
    Ok(out)
}

fn parse_peak_percentiles(value: &Value) -> Result<Option<PeakPercentiles>> {
    let obj = value
        .as_object()
        .ok_or_else(|| anyhow!("peak_percentiles must be an object"))?;
    let read_counts = parse_cumulative(obj.get("cumulative_fraction_of_hqaa"))
        .context("cumulative_fraction_of_hqaa")?;
    let territory = parse_cumulative(obj.get("cumulative_fraction_of_territory"))
        .context("cumulative_fraction_of_territory")?;
    if read_counts.is_empty() && territory.is_empty() {
        return Ok(None);
    }
    Ok(Some(PeakPercentiles {
        read_counts,
        territory,
    }))
}

fn parse_reference_distribution(value: Value) -> Result<ReferenceDistribution> {
    let obj = value
        .as_object()
        .ok_or_else(|| anyhow!("reference must be an object"))?;
    let distribution = obj
        .get("distribution")
        .ok_or_else(|| anyhow!("reference has no distribution"))?;
    Ok(ReferenceDistribution {
        source: str_field(obj, "source").unwrap_or_default(),
        histogram: parse_histogram(distribution, 0.0)?,
    })
}

fn parse_reference_peaks(value: Value) -> Result<ReferencePeaks> {
    let source = value
        .get("source")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let percentiles = parse_peak_percentiles(&value)?.unwrap_or_default();
    Ok(ReferencePeaks {
        source,
        percentiles,
    })
}

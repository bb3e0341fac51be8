//! Highlight Index: identifier → rendered handles, rebuilt after every draw.

use std::collections::{BTreeMap, BTreeSet};

use crate::logging::{log_noop, Domain};
use crate::render::{HandleId, VisualHandle};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighlightIndex {
    by_experiment: BTreeMap<String, Vec<HandleId>>,
    by_sample: BTreeMap<String, Vec<HandleId>>,
    legend_by_sample: BTreeMap<String, Vec<HandleId>>,
    sample_of: BTreeMap<String, String>,
    handle_count: usize,
}

impl HighlightIndex {
    pub fn rebuild(handles: &[VisualHandle]) -> Self {
        let mut index = Self {
            handle_count: handles.len(),
            ..Self::default()
        };
        for h in handles {
            if h.is_legend() {
                if let Some(sample) = &h.sample {
                    index.legend_by_sample.entry(sample.clone()).or_default().push(h.id);
                }
                continue;
            }
            if let Some(id) = &h.experiment_id {
                index.by_experiment.entry(id.clone()).or_default().push(h.id);
                if let Some(sample) = &h.sample {
                    index.sample_of.insert(id.clone(), sample.clone());
                }
            }
            if let Some(sample) = &h.sample {
                index.by_sample.entry(sample.clone()).or_default().push(h.id);
            }
        }
        index
    }

    fn lookup<'a>(map: &'a BTreeMap<String, Vec<HandleId>>, key: &str) -> &'a [HandleId] {
        map.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Plot handles of the experiment plus legend handles of its sample.
    pub fn item_targets(&self, id: &str) -> BTreeSet<HandleId> {
        let mut targets: BTreeSet<HandleId> =
            Self::lookup(&self.by_experiment, id).iter().copied().collect();
        if let Some(sample) = self.sample_of.get(id) {
            targets.extend(Self::lookup(&self.legend_by_sample, sample));
        }
        if targets.is_empty() {
            log_noop(Domain::Highlight, "item_targets", id);
        }
        targets
    }

    /// Plot and legend handles of every experiment in the sample.
    pub fn sample_targets(&self, sample: &str) -> BTreeSet<HandleId> {
        let targets: BTreeSet<HandleId> = Self::lookup(&self.by_sample, sample)
            .iter()
            .chain(Self::lookup(&self.legend_by_sample, sample))
            .copied()
            .collect();
        if targets.is_empty() {
            log_noop(Domain::Highlight, "sample_targets", sample);
        }
        targets
    }

    pub fn handle_count(&self) -> usize {
        self.handle_count
    }
}

/// The currently highlighted handles.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HighlightMarks {
    marked: BTreeSet<HandleId>,
}

impl HighlightMarks {
    /// Clear prior marks, then mark `targets`. Returns whether the set changed.
    pub fn apply(&mut self, targets: BTreeSet<HandleId>) -> bool {
        let changed = self.marked != targets;
        self.marked = targets;
        changed
    }

    pub fn clear(&mut self) -> bool {
        self.apply(BTreeSet::new())
    }

    pub fn marked(&self) -> &BTreeSet<HandleId> {
        &self.marked
    }

    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }
}

//! Selection State: which experiments are compared and which samples are shown.
//!
//! Every mutator returns whether anything changed so the session can skip
//! the refresh pass on no-ops. Identifiers unknown to the store are ignored.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::logging::{log_noop, Domain};
use crate::store::MetricsStore;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectionState {
    active: BTreeSet<String>,
    /// Superset of the samples seen among active experiments. Samples missing
    /// from the map count as visible.
    sample_visible: BTreeMap<String, bool>,
}

impl SelectionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&mut self, store: &MetricsStore, id: &str) -> bool {
        if !store.contains(id) {
            log_noop(Domain::Selection, "activate", id);
            return false;
        }
        let changed = self.active.insert(id.to_string());
        if changed {
            self.reconcile_samples(store);
        }
        changed
    }

    pub fn deactivate(&mut self, id: &str) -> bool {
        let changed = self.active.remove(id);
        if !changed {
            log_noop(Domain::Selection, "deactivate", id);
        }
        changed
    }

    pub fn toggle(&mut self, store: &MetricsStore, id: &str) -> bool {
        if self.active.contains(id) {
            self.deactivate(id)
        } else {
            self.activate(store, id)
        }
    }

    /// Activate every id in `ids`, normally those visible under the current filter.
    pub fn activate_all<'a, I>(&mut self, store: &MetricsStore, ids: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut changed = false;
        for id in ids {
            if store.contains(id) {
                changed |= self.active.insert(id.to_string());
            }
        }
        if changed {
            self.reconcile_samples(store);
        }
        changed
    }

    pub fn deactivate_all<'a, I>(&mut self, ids: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut changed = false;
        for id in ids {
            changed |= self.active.remove(id);
        }
        changed
    }

    /// Flip one sample. A sample never seen before starts out visible.
    pub fn toggle_sample_visibility(&mut self, sample: &str) -> bool {
        let entry = self.sample_visible.entry(sample.to_string()).or_insert(true);
        *entry = !*entry;
        true
    }

    pub fn set_all_samples(&mut self, visible: bool) -> bool {
        let mut changed = false;
        for v in self.sample_visible.values_mut() {
            if *v != visible {
                *v = visible;
                changed = true;
            }
        }
        changed
    }

    pub fn is_sample_visible(&self, sample: &str) -> bool {
        self.sample_visible.get(sample).copied().unwrap_or(true)
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains(id)
    }

    /// Active ids in ascending order.
    pub fn active_ids(&self) -> Vec<String> {
        self.active.iter().cloned().collect()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn sample_visibility(&self) -> &BTreeMap<String, bool> {
        &self.sample_visible
    }

    /// Add a visible entry for every sample of an active experiment not yet
    /// in the map. Existing entries are kept, including those of samples no
    /// longer active.
    pub fn reconcile_samples(&mut self, store: &MetricsStore) -> bool {
        let mut changed = false;
        for id in &self.active {
            if let Some(record) = store.get(id) {
                if !self.sample_visible.contains_key(record.sample()) {
                    self.sample_visible.insert(record.sample().to_string(), true);
                    changed = true;
                }
            }
        }
        changed
    }
}

/// Sample → experiment ids of the active set, derived from scratch.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SampleGroups {
    groups: BTreeMap<String, Vec<String>>,
}

impl SampleGroups {
    pub fn derive(store: &MetricsStore, active: &[String]) -> Self {
        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for record in active.iter().filter_map(|id| store.get(id)) {
            groups
                .entry(record.sample().to_string())
                .or_default()
                .push(record.id.clone());
        }
        for ids in groups.values_mut() {
            ids.sort();
        }
        Self { groups }
    }

    pub fn samples(&self) -> impl Iterator<Item = &str> + '_ {
        self.groups.keys().map(String::as_str)
    }

    pub fn members(&self, sample: &str) -> &[String] {
        self.groups.get(sample).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

//! Filter Evaluator: free-text query AND sample visibility.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::logging::log_filter_pass;
use crate::render::{HandleId, VisualHandle};
use crate::selection::SelectionState;
use crate::store::{ExperimentRecord, MetricsStore};

/// Case-insensitive substring query; empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchQuery(String);

impl SearchQuery {
    pub fn parse(raw: &str) -> Self {
        Self(raw.trim().to_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, fields: &[&str]) -> bool {
        self.is_empty() || fields.iter().any(|f| f.to_lowercase().contains(&self.0))
    }
}

/// Name (or id), organism, sample, library and description.
pub fn searchable_fields(record: &ExperimentRecord) -> [&str; 6] {
    [
        record.display_name(),
        record.organism.as_deref().unwrap_or(""),
        record.sample(),
        record.library_label(),
        record.library.description.as_str(),
        record.description.as_deref().unwrap_or(""),
    ]
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOutcome {
    /// Series handles of experiments failing the predicate.
    pub hidden: BTreeSet<HandleId>,
    /// Legend handles whose sample is switched off.
    pub dimmed_legend: BTreeSet<HandleId>,
    /// Active experiments still shown, ascending.
    pub visible_experiments: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FilterEvaluator {
    query: SearchQuery,
}

impl FilterEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn query(&self) -> &SearchQuery {
        &self.query
    }

    pub fn set_query(&mut self, query: SearchQuery) -> bool {
        if self.query == query {
            return false;
        }
        self.query = query;
        true
    }

    pub fn is_visible(&self, fields: &[&str], sample_visible: bool) -> bool {
        sample_visible && self.query.matches(fields)
    }

    pub fn record_visible(&self, record: &ExperimentRecord, selection: &SelectionState) -> bool {
        self.is_visible(
            &searchable_fields(record),
            selection.is_sample_visible(record.sample()),
        )
    }

    /// Ids across the whole store passing the predicate; what "select all"
    /// operates on.
    pub fn visible_ids(&self, store: &MetricsStore, selection: &SelectionState) -> Vec<String> {
        store
            .experiments()
            .filter(|r| self.record_visible(r, selection))
            .map(|r| r.id.clone())
            .collect()
    }

    /// One pass over every rendered handle.
    pub fn evaluate(
        &self,
        handles: &[VisualHandle],
        store: &MetricsStore,
        selection: &SelectionState,
    ) -> FilterOutcome {
        let mut outcome = FilterOutcome::default();

        for handle in handles {
            if handle.is_legend() {
                if let Some(sample) = &handle.sample {
                    if !selection.is_sample_visible(sample) {
                        outcome.dimmed_legend.insert(handle.id);
                    }
                }
                continue;
            }
            let Some(record) = handle.experiment_id.as_deref().and_then(|id| store.get(id)) else {
                continue;
            };
            if !self.record_visible(record, selection) {
                outcome.hidden.insert(handle.id);
            }
        }

        outcome.visible_experiments = selection
            .active_ids()
            .into_iter()
            .filter(|id| store.get(id).is_some_and(|r| self.record_visible(r, selection)))
            .collect();

        let query = (!self.query.is_empty()).then(|| self.query.as_str());
        log_filter_pass(query, outcome.hidden.len(), outcome.visible_experiments.len());
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HandleKind;
    use crate::series::fixtures::{record, store};
    use crate::series::PlotKind;
    use serde_json::json;

    #[test]
    fn test_parse_trims_and_lowercases() {
        let q = SearchQuery::parse("  LiVeR ");
        assert_eq!(q.as_str(), "liver");
        assert!(q.matches(&["Mouse liver, rep 2"]));
        assert!(!q.matches(&["kidney"]));
        assert!(SearchQuery::parse("   ").matches(&[]));
    }

    #[test]
    fn test_and_composition() {
        let mut f = FilterEvaluator::new();
        f.set_query(SearchQuery::parse("foo"));
        // sample A visible, B hidden; both match the query
        assert!(f.is_visible(&["foo-a"], true));
        assert!(!f.is_visible(&["foo-b"], false));
        assert!(!f.is_visible(&["bar"], true));
    }

    #[test]
    fn test_set_query_reports_change() {
        let mut f = FilterEvaluator::new();
        assert!(!f.set_query(SearchQuery::parse("")));
        assert!(f.set_query(SearchQuery::parse("x")));
        assert!(!f.set_query(SearchQuery::parse(" X ")));
    }

    #[test]
    fn test_evaluate_hides_series_and_dims_legend() {
        let mut a = record("A", 5);
        a["name"] = json!("foo one");
        let mut b = record("B", 5);
        b["name"] = json!("foo two");
        let mut c = record("A", 5);
        c["name"] = json!("bar");
        let s = store(json!({"a": a, "b": b, "c": c}));

        let mut sel = SelectionState::new();
        sel.activate_all(&s, ["a", "b", "c"]);
        sel.toggle_sample_visibility("B");

        let handle = |id: u64, exp: Option<&str>, sample: &str, kind: HandleKind| VisualHandle {
            id,
            kind,
            experiment_id: exp.map(str::to_string),
            sample: Some(sample.to_string()),
        };
        let series = HandleKind::Series(PlotKind::Mapq);
        let handles = vec![
            handle(1, Some("a"), "A", series),
            handle(2, Some("b"), "B", series),
            handle(3, Some("c"), "A", series),
            handle(4, None, "A", HandleKind::Legend),
            handle(5, None, "B", HandleKind::Legend),
        ];

        let mut f = FilterEvaluator::new();
        f.set_query(SearchQuery::parse("FOO"));
        let out = f.evaluate(&handles, &s, &sel);
        assert_eq!(out.hidden, BTreeSet::from([2, 3]));
        assert_eq!(out.dimmed_legend, BTreeSet::from([5]));
        assert_eq!(out.visible_experiments, vec!["a"]);

        assert_eq!(f.visible_ids(&s, &sel), vec!["a"]);
    }
}

//! Comparison session: owns every piece of mutable state and runs the
//! refresh pass.
//!
//! Any change to the active set, sample visibility, committed query or a
//! transformation parameter runs the whole pass, in this order:
//!
//! 1. sort active ids
//! 2. derive sample groups
//! 3. transform every plot kind (and the table)
//! 4. destroy and redraw
//! 5. rebuild the highlight index
//! 6. filter pass
//!
//! then publishes `SelectionChanged`. Operations that change nothing skip
//! the pass entirely. Hover never refreshes; it schedules one highlight
//! frame, applied on the next `tick`. A redraw request (a resized surface)
//! is debounced and runs the pass once its quiet period ends.

use serde::Serialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::bus::{Channel, Subscriber, SubscriberId, SyncBus, SyncEvent};
use crate::config::Config;
use crate::filter::{FilterEvaluator, FilterOutcome, SearchQuery};
use crate::highlight::{HighlightIndex, HighlightMarks};
use crate::logging::{log, log_noop, log_refresh, obj, v_str, Domain, Level, ProfileScope};
use crate::render::{
    HeadlessSurface, LegendEntry, ListView, RenderFrame, RenderSurface, TableView, VisualHandle,
};
use crate::schedule::{Debouncer, FrameScheduler};
use crate::selection::{SampleGroups, SelectionState};
use crate::series::{compute_plots, PlotSet, SeriesConfig};
use crate::store::MetricsStore;
use crate::table::{build_table, default_columns, experiment_list, ColumnSpec, Table};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Empty,
    Populated,
}

/// `filtered` is orthogonal to the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub phase: Phase,
    pub filtered: bool,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match (self.phase, self.filtered) {
            (Phase::Empty, false) => "empty",
            (Phase::Empty, true) => "empty_filtered",
            (Phase::Populated, false) => "populated",
            (Phase::Populated, true) => "populated_filtered",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    pub transforms: u64,
    pub renders: u64,
    pub index_rebuilds: u64,
    pub filter_passes: u64,
    pub highlight_frames: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum HoverTarget {
    Item(String),
    Sample(String),
    Clear,
}

pub struct Session<S: RenderSurface = HeadlessSurface> {
    store: Arc<MetricsStore>,
    selection: SelectionState,
    groups: SampleGroups,
    series_cfg: SeriesConfig,
    columns: Vec<ColumnSpec>,
    less_redundant: bool,
    plots: PlotSet,
    table: Table,
    handles: Vec<VisualHandle>,
    index: HighlightIndex,
    marks: HighlightMarks,
    filter: FilterEvaluator,
    filter_outcome: FilterOutcome,
    query_debounce: Debouncer<SearchQuery>,
    redraw_debounce: Debouncer<()>,
    frames: FrameScheduler,
    frame_ms: u64,
    clock_ms: u64,
    hover: Option<HoverTarget>,
    bus: SyncBus,
    surface: S,
    table_view: Option<Box<dyn TableView>>,
    list_view: Option<Box<dyn ListView>>,
    stats: PassStats,
}

impl<S: RenderSurface> Session<S> {
    /// Starts `Empty` with one initial pass so every plot reports absent.
    pub fn new(store: Arc<MetricsStore>, config: &Config, surface: S) -> Self {
        let mut session = Self {
            store,
            selection: SelectionState::new(),
            groups: SampleGroups::default(),
            series_cfg: config.series_config(),
            columns: default_columns(),
            less_redundant: config.less_redundant,
            plots: PlotSet::new(),
            table: Table {
                columns: Vec::new(),
                rows: Vec::new(),
            },
            handles: Vec::new(),
            index: HighlightIndex::default(),
            marks: HighlightMarks::default(),
            filter: FilterEvaluator::new(),
            filter_outcome: FilterOutcome::default(),
            query_debounce: Debouncer::new(config.search_debounce_ms),
            redraw_debounce: Debouncer::new(config.redraw_debounce_ms),
            frames: FrameScheduler::new(),
            frame_ms: config.frame_ms,
            clock_ms: 0,
            hover: None,
            bus: SyncBus::new(),
            surface,
            table_view: None,
            list_view: None,
            stats: PassStats::default(),
        };
        session.refresh("init");
        session.flush();
        session
    }

    pub fn with_columns(mut self, columns: Vec<ColumnSpec>) -> Self {
        self.columns = columns;
        self.refresh("columns");
        self.flush();
        self
    }

    pub fn with_table_view(mut self, mut view: Box<dyn TableView>) -> Self {
        view.replace_rows(&self.table);
        view.apply_text_filter(self.filter.query().as_str());
        self.table_view = Some(view);
        self
    }

    pub fn with_list_view(mut self, mut view: Box<dyn ListView>) -> Self {
        view.replace_items(&experiment_list(&self.store));
        view.apply_text_filter(self.filter.query().as_str());
        self.list_view = Some(view);
        self
    }

    pub fn subscribe(
        &mut self,
        channels: &[Channel],
        subscriber: Box<dyn Subscriber>,
    ) -> SubscriberId {
        self.bus.subscribe(channels, subscriber)
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) -> bool {
        self.bus.unsubscribe(id)
    }

    // ----- selection -----

    pub fn activate(&mut self, id: &str) -> bool {
        let changed = self.selection.activate(&self.store, id);
        self.after_mutation(changed, "activate")
    }

    pub fn deactivate(&mut self, id: &str) -> bool {
        let changed = self.selection.deactivate(id);
        self.after_mutation(changed, "deactivate")
    }

    pub fn toggle_experiment(&mut self, id: &str) -> bool {
        let changed = self.selection.toggle(&self.store, id);
        self.after_mutation(changed, "toggle_experiment")
    }

    /// Activates every experiment visible under the committed query.
    pub fn activate_all(&mut self) -> bool {
        let visible = self.filter.visible_ids(&self.store, &self.selection);
        let changed = self
            .selection
            .activate_all(&self.store, visible.iter().map(String::as_str));
        self.after_mutation(changed, "activate_all")
    }

    /// Deactivates the active experiments visible under the committed query.
    pub fn deactivate_all(&mut self) -> bool {
        let visible = self.filter_outcome.visible_experiments.clone();
        let changed = self.selection.deactivate_all(visible.iter().map(String::as_str));
        self.after_mutation(changed, "deactivate_all")
    }

    pub fn toggle_sample_visibility(&mut self, sample: &str) -> bool {
        let changed = self.selection.toggle_sample_visibility(sample);
        if changed {
            self.bus.publish(SyncEvent::SampleVisibilityChanged {
                sample: sample.to_string(),
                visible: self.selection.is_sample_visible(sample),
            });
        }
        self.after_mutation(changed, "toggle_sample_visibility")
    }

    pub fn show_all_samples(&mut self) -> bool {
        let changed = self.selection.set_all_samples(true);
        self.after_mutation(changed, "show_all_samples")
    }

    pub fn hide_all_samples(&mut self) -> bool {
        let changed = self.selection.set_all_samples(false);
        self.after_mutation(changed, "hide_all_samples")
    }

    // ----- search -----

    /// Schedules the query; it takes effect on the first `tick` at or after
    /// the debounce deadline. A newer query replaces a pending one.
    pub fn set_query(&mut self, now_ms: u64, text: &str) {
        self.query_debounce.schedule(now_ms, SearchQuery::parse(text));
    }

    pub fn clear_query(&mut self, now_ms: u64) {
        self.set_query(now_ms, "");
    }

    // ----- transformation parameters -----

    pub fn set_resolution(&mut self, resolution: usize) -> bool {
        let resolution = resolution.max(1);
        let changed = self.series_cfg.resolution != resolution;
        self.series_cfg.resolution = resolution;
        self.after_mutation(changed, "set_resolution")
    }

    pub fn set_y_metric(&mut self, metric: &str) -> bool {
        let changed = self.series_cfg.y_metric != metric;
        if changed {
            self.series_cfg.y_metric = metric.to_string();
        }
        self.after_mutation(changed, "set_y_metric")
    }

    pub fn set_y_exponent(&mut self, exponent: i32) -> bool {
        let changed = self.series_cfg.y_exponent != exponent;
        self.series_cfg.y_exponent = exponent;
        self.after_mutation(changed, "set_y_exponent")
    }

    pub fn set_show_reference(&mut self, show: bool) -> bool {
        let changed = self.series_cfg.show_reference != show;
        self.series_cfg.show_reference = show;
        self.after_mutation(changed, "set_show_reference")
    }

    pub fn set_less_redundant(&mut self, less: bool) -> bool {
        let changed = self.less_redundant != less;
        self.less_redundant = less;
        self.after_mutation(changed, "set_less_redundant")
    }

    // ----- hover -----

    pub fn hover_item(&mut self, now_ms: u64, id: Option<&str>) {
        self.clock_ms = now_ms;
        self.bus.publish(SyncEvent::ItemHovered {
            id: id.map(str::to_string),
        });
        self.flush();
    }

    pub fn hover_sample(&mut self, now_ms: u64, sample: Option<&str>) {
        self.clock_ms = now_ms;
        self.bus.publish(SyncEvent::SampleHovered {
            sample: sample.map(str::to_string),
        });
        self.flush();
    }

    // ----- redraw -----

    /// The surface changed size; redraw once requests stop arriving for
    /// `redraw_debounce_ms`.
    pub fn request_redraw(&mut self, now_ms: u64) {
        self.clock_ms = now_ms;
        self.redraw_debounce.schedule(now_ms, ());
    }

    // ----- time -----

    /// Commit a due query, run a due redraw, then a pending highlight frame.
    pub fn tick(&mut self, now_ms: u64) {
        self.clock_ms = now_ms;
        if let Some(query) = self.query_debounce.poll(now_ms) {
            self.commit_query(query);
        }
        if self.redraw_debounce.poll(now_ms).is_some() {
            self.refresh("redraw");
        }
        if self.frames.take() {
            self.highlight_frame();
        }
        self.flush();
    }

    /// Earliest absolute time `tick` has work to do. Depends only on what is
    /// pending, so asking again later returns the same answer.
    pub fn next_deadline(&self) -> Option<u64> {
        [
            self.query_debounce.deadline(),
            self.redraw_debounce.deadline(),
            self.frames.deadline(self.frame_ms),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn commit_query(&mut self, query: SearchQuery) {
        let text = query.as_str().to_string();
        if !self.filter.set_query(query) {
            log_noop(Domain::Filter, "commit_query", &text);
            return;
        }
        self.bus.publish(SyncEvent::QueryApplied { query: text });
        self.refresh("query");
    }

    fn highlight_frame(&mut self) {
        let targets = match &self.hover {
            Some(HoverTarget::Item(id)) => self.index.item_targets(id),
            Some(HoverTarget::Sample(sample)) => self.index.sample_targets(sample),
            Some(HoverTarget::Clear) | None => Default::default(),
        };
        if self.marks.apply(targets) {
            self.surface.apply_highlight(self.marks.marked());
        }
        self.stats.highlight_frames += 1;
    }

    // ----- pass -----

    fn after_mutation(&mut self, changed: bool, trigger: &str) -> bool {
        if changed {
            self.refresh(trigger);
        }
        self.flush();
        changed
    }

    fn legend_entries(&self) -> Vec<LegendEntry> {
        self.groups
            .samples()
            .map(|sample| LegendEntry {
                sample: sample.to_string(),
                libraries: self
                    .groups
                    .members(sample)
                    .iter()
                    .filter_map(|id| self.store.get(id))
                    .map(|r| r.library_label().to_string())
                    .collect(),
                visible: self.selection.is_sample_visible(sample),
            })
            .collect()
    }

    fn refresh(&mut self, trigger: &str) {
        let _scope = ProfileScope::with_context("refresh", &[("trigger", v_str(trigger))]);

        let active = self.selection.active_ids();
        self.groups = SampleGroups::derive(&self.store, &active);

        self.plots = compute_plots(&self.store, &active, &self.series_cfg);
        self.table = build_table(&self.store, &active, &self.columns, self.less_redundant);
        self.stats.transforms += 1;

        let legend = self.legend_entries();
        self.surface.destroy();
        self.handles = self.surface.draw(&RenderFrame {
            plots: &self.plots,
            legend: &legend,
        });
        if let Some(view) = &mut self.table_view {
            view.replace_rows(&self.table);
        }
        self.stats.renders += 1;

        // marks referred to the destroyed drawing
        self.index = HighlightIndex::rebuild(&self.handles);
        self.marks.clear();
        self.stats.index_rebuilds += 1;

        self.filter_pass();

        log_refresh(
            trigger,
            self.state().as_str(),
            active.len(),
            self.groups.len(),
            self.handles.len(),
        );
        self.bus.publish(SyncEvent::SelectionChanged { active });
    }

    fn filter_pass(&mut self) {
        self.filter_outcome = self.filter.evaluate(&self.handles, &self.store, &self.selection);
        self.surface
            .apply_visibility(&self.filter_outcome.hidden, &self.filter_outcome.dimmed_legend);
        let query = self.filter.query().as_str();
        if let Some(view) = &mut self.table_view {
            view.apply_text_filter(query);
        }
        if let Some(view) = &mut self.list_view {
            view.apply_text_filter(query);
        }
        self.stats.filter_passes += 1;
    }

    /// Deliver queued events. Hover events are also consumed here to
    /// schedule the highlight frame.
    fn flush(&mut self) {
        for envelope in self.bus.dispatch() {
            let target = match &envelope.event {
                SyncEvent::ItemHovered { id } => id.clone().map(HoverTarget::Item),
                SyncEvent::SampleHovered { sample } => sample.clone().map(HoverTarget::Sample),
                _ => continue,
            };
            self.hover = Some(target.unwrap_or(HoverTarget::Clear));
            self.frames.request(self.clock_ms);
        }
    }

    // ----- read side -----

    pub fn state(&self) -> SessionState {
        SessionState {
            phase: if self.selection.is_empty() {
                Phase::Empty
            } else {
                Phase::Populated
            },
            filtered: !self.filter.query().is_empty(),
        }
    }

    pub fn store(&self) -> &MetricsStore {
        &self.store
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn groups(&self) -> &SampleGroups {
        &self.groups
    }

    pub fn series_config(&self) -> &SeriesConfig {
        &self.series_cfg
    }

    pub fn plots(&self) -> &PlotSet {
        &self.plots
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn handles(&self) -> &[VisualHandle] {
        &self.handles
    }

    pub fn index(&self) -> &HighlightIndex {
        &self.index
    }

    pub fn marks(&self) -> &HighlightMarks {
        &self.marks
    }

    pub fn query(&self) -> &SearchQuery {
        self.filter.query()
    }

    pub fn filter_outcome(&self) -> &FilterOutcome {
        &self.filter_outcome
    }

    /// Active experiments that pass the committed query and sample visibility.
    pub fn visible_experiment_ids(&self) -> &[String] {
        &self.filter_outcome.visible_experiments
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn stats(&self) -> PassStats {
        self.stats
    }

    /// Hex SHA-256 over the active set, the sample map and the current plots.
    pub fn fingerprint(&self) -> String {
        let snapshot = json!({
            "active": self.selection.active_ids(),
            "samples": self.selection.sample_visibility(),
            "plots": self.plots,
        });
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&snapshot).unwrap_or_default());
        let digest = hex::encode(hasher.finalize());
        log(
            Level::Trace,
            Domain::Selection,
            "fingerprint",
            obj(&[("digest", v_str(&digest))]),
        );
        digest
    }
}

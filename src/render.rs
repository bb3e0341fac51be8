//! Collaborator seams for whatever actually draws.
//!
//! The core only needs every drawn primitive to come back as a
//! [`VisualHandle`] tagged with its experiment and sample so the highlight
//! index and the filter pass can address it.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::series::{PlotKind, PlotSet};
use crate::table::{ExperimentListRow, Table};

pub type HandleId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "plot", rename_all = "snake_case")]
pub enum HandleKind {
    Series(PlotKind),
    Reference(PlotKind),
    Legend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisualHandle {
    pub id: HandleId,
    pub kind: HandleKind,
    pub experiment_id: Option<String>,
    pub sample: Option<String>,
}

impl VisualHandle {
    pub fn is_legend(&self) -> bool {
        self.kind == HandleKind::Legend
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegendEntry {
    pub sample: String,
    pub libraries: Vec<String>,
    pub visible: bool,
}

/// Everything a surface needs for one draw.
#[derive(Debug, Clone, Copy)]
pub struct RenderFrame<'a> {
    pub plots: &'a PlotSet,
    pub legend: &'a [LegendEntry],
}

pub trait RenderSurface {
    /// Remove everything drawn by the previous `draw`.
    fn destroy(&mut self);
    fn draw(&mut self, frame: &RenderFrame<'_>) -> Vec<VisualHandle>;
    /// Replace the highlighted set.
    fn apply_highlight(&mut self, marked: &BTreeSet<HandleId>);
    /// `hidden` plot primitives are not shown; `dimmed` legend entries stay
    /// shown but greyed out.
    fn apply_visibility(&mut self, hidden: &BTreeSet<HandleId>, dimmed: &BTreeSet<HandleId>);
}

pub trait TableView {
    fn replace_rows(&mut self, table: &Table);
    fn apply_text_filter(&mut self, query: &str);
}

pub trait ListView {
    fn replace_items(&mut self, rows: &[ExperimentListRow]);
    fn apply_text_filter(&mut self, query: &str);
}

/// Surface that draws nothing and remembers what it was asked to do.
#[derive(Debug, Default)]
pub struct HeadlessSurface {
    next_id: HandleId,
    handles: Vec<VisualHandle>,
    highlighted: BTreeSet<HandleId>,
    hidden: BTreeSet<HandleId>,
    dimmed: BTreeSet<HandleId>,
    draws: usize,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }

    fn issue(&mut self, kind: HandleKind, experiment_id: Option<&str>, sample: Option<&str>) {
        self.next_id += 1;
        self.handles.push(VisualHandle {
            id: self.next_id,
            kind,
            experiment_id: experiment_id.map(str::to_string),
            sample: sample.map(str::to_string),
        });
    }

    pub fn handles(&self) -> &[VisualHandle] {
        &self.handles
    }

    pub fn highlighted(&self) -> &BTreeSet<HandleId> {
        &self.highlighted
    }

    pub fn hidden(&self) -> &BTreeSet<HandleId> {
        &self.hidden
    }

    pub fn dimmed(&self) -> &BTreeSet<HandleId> {
        &self.dimmed
    }

    pub fn draws(&self) -> usize {
        self.draws
    }
}

impl RenderSurface for HeadlessSurface {
    fn destroy(&mut self) {
        self.handles.clear();
        self.highlighted.clear();
        self.hidden.clear();
        self.dimmed.clear();
    }

    fn draw(&mut self, frame: &RenderFrame<'_>) -> Vec<VisualHandle> {
        self.draws += 1;
        for (kind, outcome) in frame.plots {
            let Some(ds) = outcome.ready() else {
                continue;
            };
            for series in ds.series.values() {
                self.issue(
                    HandleKind::Series(*kind),
                    Some(&series.experiment_id),
                    Some(&series.sample),
                );
            }
            if ds.reference.is_some() {
                self.issue(HandleKind::Reference(*kind), None, None);
            }
        }
        for entry in frame.legend {
            self.issue(HandleKind::Legend, None, Some(&entry.sample));
        }
        self.handles.clone()
    }

    fn apply_highlight(&mut self, marked: &BTreeSet<HandleId>) {
        self.highlighted = marked.clone();
    }

    fn apply_visibility(&mut self, hidden: &BTreeSet<HandleId>, dimmed: &BTreeSet<HandleId>) {
        self.hidden = hidden.clone();
        self.dimmed = dimmed.clone();
    }
}

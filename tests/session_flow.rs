use qc_compare::bus::{Channel, Subscriber, SyncEvent};
use qc_compare::config::Config;
use qc_compare::render::{HandleKind, HeadlessSurface, ListView, TableView};
use qc_compare::series::{AbsentReason, PlotKind};
use qc_compare::session::{Phase, Session};
use qc_compare::store::MetricsStore;
use qc_compare::table::{ExperimentListRow, Table};
use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use std::sync::Arc;

fn record(name: &str, sample: &str, bins: usize, peaks: bool) -> Value {
    let fl: Vec<Value> = (0..bins).map(|b| json!([b, 1])).collect();
    let mut rec = json!({
        "name": name,
        "organism": "human",
        "library": {"library": name, "sample": sample, "description": format!("{} ATAC", sample)},
        "total_reads": bins,
        "hqaa": bins / 2,
        "short_mononucleosomal_ratio": 0.8,
        "fragment_length_distance": 0.05,
        "fragment_length_counts": fl,
        "mapq_counts": [[0, 5], [42, 20]]
    });
    if peaks {
        rec["peak_percentiles"] = json!({
            "cumulative_fraction_of_hqaa": [0.1, 0.3, 0.6],
            "cumulative_fraction_of_territory": [0.01, 0.02]
        });
    }
    rec
}

fn store() -> Arc<MetricsStore> {
    Arc::new(
        MetricsStore::from_value(json!({
            "a": record("liver rep 1", "liver", 1000, true),
            "b": record("liver rep 2", "liver", 800, false),
            "c": record("heart rep 1", "heart", 500, false)
        }))
        .unwrap(),
    )
}

fn session() -> Session {
    Session::new(store(), &Config::default(), HeadlessSurface::new())
}

#[derive(Default)]
struct Views {
    table_rows: Vec<String>,
    table_filters: Vec<String>,
    list_items: usize,
    list_filters: Vec<String>,
}

struct SpyTable(Rc<RefCell<Views>>);
struct SpyList(Rc<RefCell<Views>>);

impl TableView for SpyTable {
    fn replace_rows(&mut self, table: &Table) {
        self.0.borrow_mut().table_rows =
            table.rows.iter().map(|r| r.experiment_id.clone()).collect();
    }
    fn apply_text_filter(&mut self, query: &str) {
        self.0.borrow_mut().table_filters.push(query.to_string());
    }
}

impl ListView for SpyList {
    fn replace_items(&mut self, rows: &[ExperimentListRow]) {
        self.0.borrow_mut().list_items = rows.len();
    }
    fn apply_text_filter(&mut self, query: &str) {
        self.0.borrow_mut().list_filters.push(query.to_string());
    }
}

struct Recorder(Rc<RefCell<Vec<SyncEvent>>>);

impl Subscriber for Recorder {
    fn on_event(&mut self, event: &SyncEvent) {
        self.0.borrow_mut().push(event.clone());
    }
}

#[test]
fn fragment_domain_follows_active_set() {
    let mut s = session();
    s.activate("a");
    s.activate("c");
    let fl = s.plots()[&PlotKind::FragmentLength].ready().unwrap();
    assert_eq!(fl.x_max, 500.0);

    s.deactivate("c");
    let fl = s.plots()[&PlotKind::FragmentLength].ready().unwrap();
    assert_eq!(fl.x_max, 1000.0);
}

#[test]
fn peaks_plot_absent_until_an_experiment_has_peaks() {
    let mut s = session();
    s.activate("b");
    assert_eq!(
        s.plots()[&PlotKind::PeakReadCounts].absent_reason(),
        Some(AbsentReason::NoPeaks)
    );
    s.activate("a");
    let ds = s.plots()[&PlotKind::PeakReadCounts].ready().unwrap();
    assert_eq!(ds.series.keys().collect::<Vec<_>>(), vec!["a"]);
}

#[test]
fn state_machine_axes_are_independent() {
    let mut s = session();
    assert_eq!(s.state().phase, Phase::Empty);
    s.set_query(0, "liver");
    s.tick(500);
    assert_eq!(s.state().phase, Phase::Empty);
    assert!(s.state().filtered);

    s.activate_all();
    assert_eq!(s.state().phase, Phase::Populated);
    assert_eq!(s.selection().active_ids(), vec!["a", "b"]);

    s.deactivate_all();
    assert_eq!(s.state().phase, Phase::Empty);
    assert!(s.state().filtered);
}

#[test]
fn highlight_after_render_three_experiments_two_samples() {
    let mut s = session();
    s.activate_all();
    s.hover_item(0, Some("b"));
    s.tick(0);

    let expected: BTreeSet<u64> = s
        .handles()
        .iter()
        .filter(|h| {
            h.experiment_id.as_deref() == Some("b")
                || (h.kind == HandleKind::Legend && h.sample.as_deref() == Some("liver"))
        })
        .map(|h| h.id)
        .collect();
    assert_eq!(s.marks().marked(), &expected);
    assert_eq!(s.surface().highlighted(), &expected);
}

#[test]
fn refresh_clears_stale_highlight() {
    let mut s = session();
    s.activate_all();
    s.hover_sample(0, Some("heart"));
    s.tick(0);
    assert!(!s.marks().is_empty());
    s.set_resolution(5);
    assert!(s.marks().is_empty());
}

#[test]
fn views_receive_rows_and_filters() {
    let views = Rc::new(RefCell::new(Views::default()));
    let mut s = session()
        .with_table_view(Box::new(SpyTable(views.clone())))
        .with_list_view(Box::new(SpyList(views.clone())));
    assert_eq!(views.borrow().list_items, 3);

    s.activate("c");
    s.activate("a");
    assert_eq!(views.borrow().table_rows, vec!["a", "c"]);

    s.set_query(10, "Heart");
    s.tick(10);
    s.tick(200);
    assert_eq!(views.borrow().table_filters.last().map(String::as_str), Some("heart"));
    assert_eq!(views.borrow().list_filters.last().map(String::as_str), Some("heart"));
}

#[test]
fn subscribers_see_events_in_order() {
    let events = Rc::new(RefCell::new(Vec::new()));
    let mut s = session();
    s.subscribe(
        &[Channel::SelectionChanged, Channel::SampleVisibilityChanged, Channel::QueryApplied],
        Box::new(Recorder(events.clone())),
    );

    s.activate("a");
    s.toggle_sample_visibility("liver");
    s.set_query(0, "rep");
    s.tick(1000);

    let seen = events.borrow();
    assert_eq!(
        seen[0],
        SyncEvent::SelectionChanged { active: vec!["a".into()] }
    );
    assert_eq!(
        seen[1],
        SyncEvent::SampleVisibilityChanged { sample: "liver".into(), visible: false }
    );
    assert!(matches!(seen[2], SyncEvent::SelectionChanged { .. }));
    assert_eq!(seen[3], SyncEvent::QueryApplied { query: "rep".into() });
    assert_eq!(seen.len(), 5);
}

#[test]
fn hover_does_not_refresh() {
    let mut s = session();
    s.activate_all();
    let stats = s.stats();
    let fp = s.fingerprint();
    for t in 0..10 {
        s.hover_item(t, Some("a"));
        s.hover_item(t, None);
    }
    assert_eq!(s.next_deadline(), Some(Config::default().frame_ms));
    s.tick(10);
    assert_eq!(s.stats().transforms, stats.transforms);
    assert_eq!(s.stats().highlight_frames, stats.highlight_frames + 1);
    assert_eq!(s.fingerprint(), fp);
}

#[test]
fn redraw_requests_settle_into_one_pass() {
    let events = Rc::new(RefCell::new(Vec::new()));
    let mut s = session();
    s.activate("a");
    s.subscribe(&[Channel::SelectionChanged], Box::new(Recorder(events.clone())));
    let wait = Config::default().redraw_debounce_ms;
    let renders = s.stats().renders;
    for t in (0..wait).step_by(50) {
        s.request_redraw(t);
        s.tick(t);
    }
    assert!(events.borrow().is_empty());
    let due = s.next_deadline().unwrap();
    s.tick(due);
    assert_eq!(s.stats().renders, renders + 1);
    assert_eq!(events.borrow().len(), 1);
}

//! Replay UI actions against a loaded metrics file.
//!
//! ```text
//! qc-compare metrics.json < actions.jsonl
//! ```
//!
//! Each stdin line is one action, e.g. `{"type":"activate","id":"lib-1"}`.
//! Debounced queries, redraws and highlight frames fire on real timers, so a
//! `query` line followed quickly by another only commits the second. A
//! `snapshot` line prints the current state; the final state is printed
//! once stdin closes and nothing is left pending.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{sleep_until, Duration, Instant};

use qc_compare::config::Config;
use qc_compare::logging::{log, obj, v_str, Domain, Level};
use qc_compare::render::{HeadlessSurface, RenderSurface};
use qc_compare::session::Session;
use qc_compare::store::MetricsStore;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Action {
    Activate { id: String },
    Deactivate { id: String },
    Toggle { id: String },
    ActivateAll,
    DeactivateAll,
    ToggleSample { sample: String },
    ShowAllSamples,
    HideAllSamples,
    Query { text: String },
    ClearQuery,
    Resolution { value: usize },
    YMetric { name: String },
    YExponent { value: i32 },
    ShowReference { value: bool },
    HoverItem { id: Option<String> },
    HoverSample { sample: Option<String> },
    Redraw,
    Snapshot,
}

fn apply<S: RenderSurface>(session: &mut Session<S>, action: Action, now_ms: u64) -> Result<()> {
    match action {
        Action::Activate { id } => {
            session.activate(&id);
        }
        Action::Deactivate { id } => {
            session.deactivate(&id);
        }
        Action::Toggle { id } => {
            session.toggle_experiment(&id);
        }
        Action::ActivateAll => {
            session.activate_all();
        }
        Action::DeactivateAll => {
            session.deactivate_all();
        }
        Action::ToggleSample { sample } => {
            session.toggle_sample_visibility(&sample);
        }
        Action::ShowAllSamples => {
            session.show_all_samples();
        }
        Action::HideAllSamples => {
            session.hide_all_samples();
        }
        Action::Query { text } => session.set_query(now_ms, &text),
        Action::ClearQuery => session.clear_query(now_ms),
        Action::Resolution { value } => {
            session.set_resolution(value);
        }
        Action::YMetric { name } => {
            session.set_y_metric(&name);
        }
        Action::YExponent { value } => {
            session.set_y_exponent(value);
        }
        Action::ShowReference { value } => {
            session.set_show_reference(value);
        }
        Action::HoverItem { id } => session.hover_item(now_ms, id.as_deref()),
        Action::HoverSample { sample } => session.hover_sample(now_ms, sample.as_deref()),
        Action::Redraw => session.request_redraw(now_ms),
        Action::Snapshot => print_snapshot(session)?,
    }
    Ok(())
}

fn print_snapshot<S: RenderSurface>(session: &Session<S>) -> Result<()> {
    let snapshot = json!({
        "state": session.state(),
        "stats": session.stats(),
        "fingerprint": session.fingerprint(),
        "active": session.selection().active_ids(),
        "visible": session.visible_experiment_ids(),
        "highlighted": session.marks().marked(),
        "plots": session.plots(),
        "table": session.table(),
    });
    println!("{}", serde_json::to_string(&snapshot)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| anyhow!("usage: qc-compare <metrics.json> < actions.jsonl"))?;
    let cfg = Config::from_env();
    let store = Arc::new(MetricsStore::load(Path::new(&path))?);
    let mut session = Session::new(store, &cfg, HeadlessSurface::new());

    let started = Instant::now();
    let now_ms = || started.elapsed().as_millis() as u64;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        let deadline = session.next_deadline();
        if !input_open && deadline.is_none() {
            break;
        }
        let wake = started + Duration::from_millis(deadline.unwrap_or(0));

        tokio::select! {
            line = lines.next_line(), if input_open => {
                let Some(line) = line? else {
                    input_open = false;
                    continue;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<Action>(&line) {
                    Ok(action) => apply(&mut session, action, now_ms())?,
                    Err(err) => log(
                        Level::Warn,
                        Domain::System,
                        "bad_action",
                        obj(&[("line", v_str(&line)), ("error", v_str(&err.to_string()))]),
                    ),
                }
            }
            _ = sleep_until(wake), if deadline.is_some() => {
                session.tick(now_ms());
            }
        }
    }

    print_snapshot(&session)
}

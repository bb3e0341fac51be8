//! Emit random UI actions as JSONL for the `qc-compare` replay binary.
//!
//! ```text
//! SEED=7 EVENTS=200 fuzz metrics.json | qc-compare metrics.json
//! ```
//!
//! With a metrics file the ids and samples come from it; without one the
//! generator makes up `exp-N` ids, which exercises the unknown-id paths.
//! A small share of ids are always bogus.

use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::env;
use std::path::Path;

use qc_compare::store::MetricsStore;

const QUERIES: [&str; 6] = ["", "rep", "liver", "s1", "  ATAC ", "zzz"];
const Y_METRICS: [&str; 4] = [
    "short_mononucleosomal_ratio",
    "duplicate_autosomal_reads",
    "hqaa",
    "tss_enrichment",
];

fn pick<'a>(rng: &mut StdRng, pool: &'a [String]) -> &'a str {
    pool.choose(rng).map(String::as_str).unwrap_or("missing")
}

fn main() -> Result<()> {
    let seed = env::var("SEED").ok().and_then(|v| v.parse().ok()).unwrap_or(42u64);
    let events = env::var("EVENTS").ok().and_then(|v| v.parse().ok()).unwrap_or(50usize);
    let mut rng = StdRng::seed_from_u64(seed);

    let (mut ids, mut samples): (Vec<String>, Vec<String>) = match env::args().nth(1) {
        Some(path) => {
            let store = MetricsStore::load(Path::new(&path))?;
            let ids = store.ids().map(str::to_string).collect();
            let mut samples: Vec<String> =
                store.experiments().map(|r| r.sample().to_string()).collect();
            samples.sort();
            samples.dedup();
            (ids, samples)
        }
        None => (
            (0..8).map(|i| format!("exp-{}", i)).collect(),
            (0..3).map(|i| format!("sample-{}", i)).collect(),
        ),
    };
    ids.push("ghost".to_string());
    samples.push("ghost-sample".to_string());

    for _ in 0..events {
        let roll = rng.gen_range(0..100);
        let action: Value = if roll < 25 {
            json!({"type": "toggle", "id": pick(&mut rng, &ids)})
        } else if roll < 35 {
            json!({"type": "activate", "id": pick(&mut rng, &ids)})
        } else if roll < 42 {
            json!({"type": "deactivate", "id": pick(&mut rng, &ids)})
        } else if roll < 45 {
            json!({"type": "activate_all"})
        } else if roll < 47 {
            json!({"type": "deactivate_all"})
        } else if roll < 55 {
            json!({"type": "toggle_sample", "sample": pick(&mut rng, &samples)})
        } else if roll < 57 {
            let kind = if rng.gen_bool(0.5) { "show_all_samples" } else { "hide_all_samples" };
            json!({"type": kind})
        } else if roll < 67 {
            json!({"type": "query", "text": QUERIES.choose(&mut rng).copied().unwrap_or("")})
        } else if roll < 69 {
            json!({"type": "clear_query"})
        } else if roll < 72 {
            json!({"type": "resolution", "value": rng.gen_range(1..=25)})
        } else if roll < 74 {
            let name = Y_METRICS.choose(&mut rng).copied().unwrap_or("hqaa");
            json!({"type": "y_metric", "name": name})
        } else if roll < 76 {
            json!({"type": "y_exponent", "value": rng.gen_range(-3..=3)})
        } else if roll < 78 {
            json!({"type": "show_reference", "value": rng.gen_bool(0.5)})
        } else if roll < 90 {
            let id = rng.gen_bool(0.8).then(|| pick(&mut rng, &ids).to_string());
            json!({"type": "hover_item", "id": id})
        } else if roll < 95 {
            let sample = rng.gen_bool(0.8).then(|| pick(&mut rng, &samples).to_string());
            json!({"type": "hover_sample", "sample": sample})
        } else if roll < 97 {
            json!({"type": "redraw"})
        } else {
            json!({"type": "snapshot"})
        };
        println!("{}", action);
    }
    Ok(())
}

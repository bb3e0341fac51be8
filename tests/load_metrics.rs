use qc_compare::store::MetricsStore;
use serde_json::json;
use std::fs;
use tempfile::TempDir;

fn write(dir: &TempDir, name: &str, body: &serde_json::Value) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body.to_string()).unwrap();
    path
}

#[test]
fn loads_session_document_from_disk() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "session.json",
        &json!({
            "description": "liver panel",
            "reference_peak_metrics": {
                "source": "encode",
                "cumulative_fraction_of_hqaa": [0.1, 0.2]
            },
            "metrics": {
                "lib-1": {
                    "name": "liver rep 1",
                    "library": {"library": "L1", "sample": "liver"},
                    "total_reads": 100,
                    "fragment_length_counts": [[0, 10], [2, 30]],
                    "mapq_counts": [[60, 100]],
                    "tss_coverage": [[-1, 1.0], [0, 3.0], [1, 1.0]]
                }
            }
        }),
    );

    let store = MetricsStore::load(&path).unwrap();
    assert_eq!(store.len(), 1);
    assert_eq!(store.description(), Some("liver panel"));
    assert!(store.references().peaks.is_some());

    let rec = store.get("lib-1").unwrap();
    assert_eq!(rec.fragment_lengths.len(), 3);
    assert_eq!(rec.fragment_lengths.count(1), 0.0);
    assert!((rec.fragment_lengths.fraction(2) - 0.3).abs() < 1e-12);
    assert_eq!(rec.tss_coverage.as_deref(), Some(&[1.0, 3.0, 1.0][..]));
    assert!(rec.is_integer("total_reads"));
}

#[test]
fn loads_bare_mapping() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "bare.json",
        &json!({
            "x": {"fragment_length_counts": [], "mapq_counts": []}
        }),
    );
    let store = MetricsStore::load(&path).unwrap();
    let rec = store.get("x").unwrap();
    assert_eq!(rec.sample(), "x");
    assert!(rec.fragment_lengths.is_empty());
}

#[test]
fn missing_distribution_names_the_experiment() {
    let dir = TempDir::new().unwrap();
    let path = write(
        &dir,
        "broken.json",
        &json!({"metrics": {"bad-lib": {"fragment_length_counts": [[0, 1]]}}}),
    );
    let err = format!("{:#}", MetricsStore::load(&path).unwrap_err());
    assert!(err.contains("bad-lib"), "{}", err);
    assert!(err.contains("mapq_counts"), "{}", err);
}

#[test]
fn duplicate_bin_is_rejected() {
    let err = MetricsStore::from_value(json!({
        "a": {"fragment_length_counts": [[1, 1], [1, 2]], "mapq_counts": []}
    }))
    .unwrap_err();
    assert!(format!("{:#}", err).contains("more than once"));
}

#[test]
fn unreadable_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    assert!(MetricsStore::load(&dir.path().join("nope.json")).is_err());

    let path = dir.path().join("garbage.json");
    fs::write(&path, "{not json").unwrap();
    assert!(MetricsStore::load(&path).is_err());
}

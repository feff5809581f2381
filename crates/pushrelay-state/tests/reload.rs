// State must survive a process restart: whatever one store instance wrote,
// a fresh instance opened on the same files must see.

use chrono::{Duration, Utc};
use pushrelay_state::{ForwardedStore, PollStateStore};

#[test]
fn forwarded_records_survive_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forwarded_history.json");

    {
        let mut store = ForwardedStore::open(&path);
        store.record("m-1", Some("Job-1"), "fwd-1").unwrap();
        store.record("m-2", None, "fwd-2").unwrap();
    }

    let mut store = ForwardedStore::open(&path);
    assert!(store.contains("m-1"));
    assert!(store.contains("m-2"));
    assert!(store.contains_job("JOB-1"));
    assert!(store.contains_job("job-1"));
    assert_eq!(store.all_job_ids().len(), 1);

    // Still idempotent after reload.
    assert!(!store.record("m-1", Some("other"), "fwd-x").unwrap());
    assert!(!ForwardedStore::open(&path).contains_job("other"));
}

#[test]
fn poll_cursors_survive_reload_and_stay_monotonic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("poll_state.json");
    let first = Utc::now();

    {
        let mut store = PollStateStore::open(&path);
        store.set("19:a", first).unwrap();
    }

    let mut store = PollStateStore::open(&path);
    assert_eq!(store.get("19:a"), Some(first));
    assert!(!store.set("19:a", first - Duration::minutes(5)).unwrap());
    assert_eq!(PollStateStore::open(&path).get("19:a"), Some(first));
}

#[test]
fn stores_are_independent_files() {
    let dir = tempfile::tempdir().unwrap();
    let poll_path = dir.path().join("poll_state.json");
    let fwd_path = dir.path().join("forwarded_history.json");

    PollStateStore::open(&poll_path)
        .set("19:a", Utc::now())
        .unwrap();
    assert!(poll_path.exists());
    assert!(!fwd_path.exists());
    assert!(ForwardedStore::open(&fwd_path).is_empty());
}

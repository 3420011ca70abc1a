use alertfold::{Inbound, StateWatcher};
use crossbeam_channel::RecvTimeoutError;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

const WINDOW: Duration = Duration::from_millis(400);
const PATIENCE: Duration = Duration::from_secs(5);

fn write_burst(path: &Path, writes: usize) {
    for i in 0..writes {
        fs::write(path, format!(r#"{{"total": {i}}}"#)).unwrap();
        thread::sleep(Duration::from_millis(40));
    }
}

#[test]
fn test_burst_collapses_into_one_change() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    let (sender, receiver) = crossbeam_channel::unbounded();
    let _watcher = StateWatcher::spawn(&path, WINDOW, sender).unwrap();

    write_burst(&path, 5);

    assert_eq!(receiver.recv_timeout(PATIENCE), Ok(Inbound::StateFileChanged));
    assert_eq!(
        receiver.recv_timeout(WINDOW * 3),
        Err(RecvTimeoutError::Timeout),
        "one burst must produce one change"
    );

    // After the quiet period, the next edit is reported again.
    write_burst(&path, 2);
    assert_eq!(receiver.recv_timeout(PATIENCE), Ok(Inbound::StateFileChanged));
    assert_eq!(
        receiver.recv_timeout(WINDOW * 3),
        Err(RecvTimeoutError::Timeout)
    );
}

#[test]
fn test_other_files_are_ignored() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    let (sender, receiver) = crossbeam_channel::unbounded();
    let _watcher = StateWatcher::spawn(&path, WINDOW, sender).unwrap();

    write_burst(&dir.path().join("state.json.lock"), 2);
    write_burst(&dir.path().join("notes.txt"), 2);

    assert_eq!(
        receiver.recv_timeout(WINDOW * 3),
        Err(RecvTimeoutError::Timeout)
    );
}

#[test]
fn test_drop_stops_reporting() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    let (sender, receiver) = crossbeam_channel::unbounded();

    drop(StateWatcher::spawn(&path, WINDOW, sender).unwrap());

    // The watcher held the only sender, so the channel is now closed.
    assert_eq!(
        receiver.recv_timeout(PATIENCE),
        Err(RecvTimeoutError::Disconnected)
    );
}

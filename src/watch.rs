use crate::relay::Inbound;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use log::{debug, warn};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Default quiet period before an external edit is acted on.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(5);

/// Watches the state file for edits made by other processes.
///
/// Filesystem events are collapsed: once an event arrives, further events
/// are absorbed until the file has been quiet for the debounce window, and
/// then a single [`Inbound::StateFileChanged`] is sent. The relay's own
/// writes show up here too; the state store recognises them by content hash.
///
/// Dropping the watcher stops watching and joins the debounce thread.
pub struct StateWatcher {
    watcher: Option<RecommendedWatcher>,
    thread: Option<JoinHandle<()>>,
}

impl StateWatcher {
    /// Start watching `state_path`, reporting to `sink`.
    pub fn spawn(state_path: &Path, debounce: Duration, sink: Sender<Inbound>) -> io::Result<Self> {
        let file_name: OsString = state_path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} has no file name", state_path.display()),
                )
            })?;
        let dir = match state_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => Path::new(".").to_path_buf(),
        };

        let (raw_tx, raw_rx) = crossbeam_channel::unbounded::<()>();

        let mut watcher = notify::recommended_watcher(
            move |res: notify::Result<notify::Event>| match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Access(_)) {
                        return;
                    }
                    if event
                        .paths
                        .iter()
                        .any(|p| p.file_name() == Some(file_name.as_os_str()))
                    {
                        let _ = raw_tx.send(());
                    }
                }
                Err(e) => warn!("state file watch error: {e}"),
            },
        )
        .map_err(io::Error::other)?;

        watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(io::Error::other)?;

        let thread = thread::Builder::new()
            .name("alertfold-watch".into())
            .spawn(move || debounce_loop(raw_rx, debounce, sink))?;

        Ok(StateWatcher {
            watcher: Some(watcher),
            thread: Some(thread),
        })
    }
}

impl Drop for StateWatcher {
    fn drop(&mut self) {
        // The debounce thread exits once the watcher's sender is gone.
        drop(self.watcher.take());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn debounce_loop(raw: Receiver<()>, window: Duration, sink: Sender<Inbound>) {
    while raw.recv().is_ok() {
        loop {
            match raw.recv_timeout(window) {
                Ok(()) => continue,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }

        debug!("state file changed on disk");
        if sink.send(Inbound::StateFileChanged).is_err() {
            return;
        }
    }
}

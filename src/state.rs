use crate::path;
use crate::persist;
use log::{debug, warn};
use serde_json::Value;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Callback invoked with the new state after every persisted change.
pub type Subscriber = Box<dyn FnMut(&Value) + Send>;

/// A JSON document persisted to a single file.
///
/// Every mutation is written through to disk before it becomes visible in
/// memory, then announced to subscribers. Writes are atomic (`.tmp` +
/// rename), so a crash never leaves a truncated state file behind.
///
/// The store holds an exclusive advisory lock on `<file>.lock` for its
/// lifetime; a second store on the same file fails with
/// [`io::ErrorKind::AlreadyExists`].
///
/// # Examples
///
/// ```
/// use alertfold::StateStore;
/// use serde_json::json;
///
/// let dir = tempfile::tempdir().unwrap();
/// let mut store = StateStore::open(dir.path().join("state.json"), json!({"total": 0})).unwrap();
///
/// store.update("total", |v| json!(v.and_then(|v| v.as_f64()).unwrap_or(0.0) + 4.99)).unwrap();
/// assert_eq!(store.get("total"), Some(&json!(4.99)));
/// ```
pub struct StateStore {
    path: PathBuf,
    value: Value,
    subscribers: Vec<Subscriber>,
    last_written: Option<u64>,
    _lock: File,
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("path", &self.path)
            .field("value", &self.value)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl StateStore {
    /// Open the store backed by `path`.
    ///
    /// Creates the parent directory if needed. If the file is missing or
    /// cannot be read or parsed, the store starts from `default`; nothing is
    /// written until the first mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or another store
    /// holds the lock on this file.
    pub fn open(path: impl AsRef<Path>, default: Value) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let lock = acquire_lock(&path)?;

        let (value, last_written) = match persist::load_json::<Value>(&path) {
            Ok(Some(loaded)) => (loaded.value, Some(loaded.hash)),
            Ok(None) => (default, None),
            Err(e) => {
                warn!(
                    "state file {} is unreadable ({e}), starting from defaults",
                    path.display()
                );
                (default, None)
            }
        };

        Ok(StateStore {
            path,
            value,
            subscribers: Vec::new(),
            last_written,
            _lock: lock,
        })
    }

    /// Returns the path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The whole current document.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Look up the value at a dotted `path`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        path::get(&self.value, path)
    }

    /// Look up the value at `path`, falling back to `default`.
    pub fn get_or(&self, path: &str, default: Value) -> Value {
        self.get(path).cloned().unwrap_or(default)
    }

    /// Store `value` at `path`, persist, and notify subscribers.
    ///
    /// # Errors
    ///
    /// Returns the write error if persisting fails. The in-memory document is
    /// left unchanged in that case and no notification is sent.
    pub fn set(&mut self, path: &str, value: Value) -> io::Result<()> {
        let mut next = self.value.clone();
        path::set(&mut next, path, value);
        self.commit(next)
    }

    /// Replace the value at `path` with `f` applied to the current one.
    ///
    /// # Errors
    ///
    /// Same as [`StateStore::set`].
    pub fn update<F>(&mut self, path: &str, f: F) -> io::Result<()>
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let value = f(self.get(path));
        self.set(path, value)
    }

    /// Remove the value at `path`.
    ///
    /// Returns `Ok(false)` without writing anything if nothing was there.
    pub fn unset(&mut self, path: &str) -> io::Result<bool> {
        let mut next = self.value.clone();
        if path::unset(&mut next, path).is_none() {
            return Ok(false);
        }
        self.commit(next)?;
        Ok(true)
    }

    /// Re-read the backing file after an external edit.
    ///
    /// Returns `Ok(true)` and notifies subscribers if the document changed.
    /// A file identical to this store's last write, a missing file, or one
    /// that does not parse leaves the state untouched and returns `Ok(false)`.
    pub fn reload(&mut self) -> io::Result<bool> {
        let loaded = match persist::load_json::<Value>(&self.path) {
            Ok(Some(loaded)) => loaded,
            Ok(None) => return Ok(false),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                warn!("ignoring external edit to {}: {e}", self.path.display());
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        if self.last_written == Some(loaded.hash) {
            return Ok(false);
        }
        self.last_written = Some(loaded.hash);

        if loaded.value == self.value {
            return Ok(false);
        }

        debug!("state reloaded from {}", self.path.display());
        self.value = loaded.value;
        self.notify();
        Ok(true)
    }

    /// Register a callback for every change to the document.
    ///
    /// Subscribers run in registration order on the thread that made the
    /// change.
    pub fn subscribe<F>(&mut self, f: F)
    where
        F: FnMut(&Value) + Send + 'static,
    {
        self.subscribers.push(Box::new(f));
    }

    fn commit(&mut self, next: Value) -> io::Result<()> {
        let hash = persist::save_json(&self.path, &next)?;
        self.value = next;
        self.last_written = Some(hash);
        debug!("state changed: {}", self.value);
        self.notify();
        Ok(())
    }

    fn notify(&mut self) {
        for subscriber in &mut self.subscribers {
            subscriber(&self.value);
        }
    }
}

fn acquire_lock(path: &Path) -> io::Result<File> {
    let lock_path = persist::sibling(path, ".lock");
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)?;

    fs2::FileExt::try_lock_exclusive(&file).map_err(|_| {
        io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("another relay holds the lock on {}", path.display()),
        )
    })?;
    Ok(file)
}

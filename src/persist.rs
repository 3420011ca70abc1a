//! Atomic file persistence shared by the state store and the renderer.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// A document read back from disk, with the hash of the bytes it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    /// The parsed document.
    pub value: T,
    /// [`content_hash`] of the raw file contents.
    pub hash: u64,
}

/// xxh64 hash of raw file contents.
///
/// Used to recognise a file this process wrote itself when a watcher
/// reports it as changed.
pub fn content_hash(bytes: &[u8]) -> u64 {
    xxhash_rust::xxh64::xxh64(bytes, 0)
}

/// Path of the scratch file used while replacing `path`.
pub fn tmp_path(path: &Path) -> PathBuf {
    sibling(path, ".tmp")
}

/// `path` with `suffix` appended to its file name.
pub(crate) fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

/// Replace the contents of `path` atomically.
///
/// Writes to a `.tmp` sibling first, syncs, then renames over the final
/// path. If the process crashes mid-write, the previous file survives intact.
/// On error the `.tmp` sibling is removed again.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp_path = tmp_path(path);

    let mut file = fs::File::create(&tmp_path)?;
    let written = file.write_all(contents).and_then(|()| file.sync_data());
    drop(file);

    if let Err(e) = written.and_then(|()| fs::rename(&tmp_path, path)) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}

/// Serialize `value` as two-space indented JSON.
pub fn to_pretty_json<T: Serialize>(value: &T) -> io::Result<Vec<u8>> {
    serde_json::to_vec_pretty(value).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Serialize `value` as pretty JSON and write it atomically.
///
/// Returns the [`content_hash`] of the bytes written.
pub fn save_json<T: Serialize>(path: &Path, value: &T) -> io::Result<u64> {
    let bytes = to_pretty_json(value)?;
    write_atomic(path, &bytes)?;
    Ok(content_hash(&bytes))
}

/// Load a JSON document from disk.
///
/// Returns `Ok(None)` if the file doesn't exist. A file that exists but
/// does not parse is an [`io::ErrorKind::InvalidData`] error.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> io::Result<Option<Loaded<T>>> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let value = serde_json::from_slice(&bytes)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(Loaded {
        value,
        hash: content_hash(&bytes),
    }))
}

//! Dotted-path access into JSON documents.
//!
//! Paths are dot-separated keys (`"stats.today.total"`). A segment that
//! parses as an index addresses an element of an array. The empty path
//! addresses the root.

use serde_json::{Map, Value};

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.').filter(|s| !s.is_empty())
}

/// Look up the value at `path`, if present.
///
/// # Examples
///
/// ```
/// use alertfold::path;
/// use serde_json::json;
///
/// let doc = json!({"goal": {"steps": [10, 25, 50]}});
/// assert_eq!(path::get(&doc, "goal.steps.1"), Some(&json!(25)));
/// assert_eq!(path::get(&doc, "goal.missing"), None);
/// ```
pub fn get<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    segments(path).try_fold(root, |node, seg| match node {
        Value::Object(map) => map.get(seg),
        Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// Store `value` at `path`, creating intermediate objects as needed.
///
/// Any scalar standing in the way of the path is replaced by an object.
pub fn set(root: &mut Value, path: &str, value: Value) {
    let segs: Vec<&str> = segments(path).collect();
    let Some((last, parents)) = segs.split_last() else {
        *root = value;
        return;
    };
    let parent = parents.iter().fold(root, |node, seg| child_mut(node, seg));
    *child_mut(parent, last) = value;
}

/// Remove the value at `path`, returning it if something was removed.
pub fn unset(root: &mut Value, path: &str) -> Option<Value> {
    let segs: Vec<&str> = segments(path).collect();
    let (last, parents) = segs.split_last()?;

    let mut node = root;
    for seg in parents {
        node = existing_mut(node, seg)?;
    }

    match node {
        Value::Object(map) => map.remove(*last),
        Value::Array(items) => {
            let index = last.parse::<usize>().ok().filter(|i| *i < items.len())?;
            Some(items.remove(index))
        }
        _ => None,
    }
}

fn existing_mut<'a>(node: &'a mut Value, seg: &str) -> Option<&'a mut Value> {
    match node {
        Value::Object(map) => map.get_mut(seg),
        Value::Array(items) => seg.parse::<usize>().ok().and_then(move |i| items.get_mut(i)),
        _ => None,
    }
}

fn child_mut<'a>(node: &'a mut Value, seg: &str) -> &'a mut Value {
    let array_index = match (&*node, seg.parse::<usize>()) {
        (Value::Array(items), Ok(index)) if index < items.len() => Some(index),
        _ => None,
    };
    if let Some(index) = array_index {
        return &mut node[index];
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    // Indexing an object by a missing key inserts `null` there.
    &mut node[seg]
}

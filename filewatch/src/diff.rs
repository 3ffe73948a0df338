//! Change Diff Engine (C7): the single mutator of the Entry Index. Given a
//! batch of raw backend observations, emits the canonical `FileChanges` and
//! updates the index atomically (from the caller's point of view — callers
//! hold the index behind a mutex for the duration of one `apply` call, per
//! SPEC_FULL.md §5).

use crate::index::EntryIndex;
use crate::types::{EntryInfo, FileChanges};

/// One raw observation: a path, whether the backend says it currently
/// exists, and (if available) its `EntryInfo`.
#[derive(Debug, Clone)]
pub struct RawChange {
    pub path: String,
    pub exists: bool,
    pub info: Option<EntryInfo>,
}

impl RawChange {
    pub fn new(path: impl Into<String>, exists: bool, info: Option<EntryInfo>) -> Self {
        Self {
            path: path.into(),
            exists,
            info,
        }
    }
}

pub struct DiffEngine;

impl DiffEngine {
    /// Applies one batch to `index`, returning the canonical `FileChanges`.
    ///
    /// Duplicates within the batch collapse to the last observation for a
    /// given path (spec.md §4.3: "if a path appears with `exists=true` then
    /// `exists=false`, net effect is `deleted` if previously present,
    /// nothing otherwise").
    pub fn apply(index: &mut EntryIndex, raw: Vec<RawChange>) -> FileChanges {
        let mut collapsed: Vec<RawChange> = Vec::with_capacity(raw.len());
        for change in raw {
            if let Some(existing) = collapsed.iter_mut().find(|c: &&mut RawChange| c.path == change.path) {
                *existing = change;
            } else {
                collapsed.push(change);
            }
        }

        let mut changes = FileChanges::default();
        for change in collapsed {
            let was_present = index.contains(&change.path);
            match (was_present, change.exists) {
                (false, true) => {
                    let info = change.info.unwrap_or_else(|| EntryInfo {
                        name: basename(&change.path),
                        path: change.path.clone(),
                        exists: Some(true),
                        ..Default::default()
                    });
                    index.insert(change.path.clone(), info.clone());
                    changes.added.insert(change.path, info);
                }
                (false, false) => {
                    // Never present, now absent: nothing to report.
                }
                (true, false) => {
                    if let Some(old) = index.remove(&change.path) {
                        changes.deleted.insert(change.path, old);
                    }
                }
                (true, true) => {
                    let info = change.info.unwrap_or_else(|| {
                        index
                            .get(&change.path)
                            .cloned()
                            .expect("checked contains above")
                    });
                    index.insert(change.path.clone(), info.clone());
                    changes.changed.insert(change.path, info);
                }
            }
        }
        changes
    }
}

fn basename(rel: &str) -> String {
    rel.rsplit('/').next().unwrap_or(rel).to_string()
}

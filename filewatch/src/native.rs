//! Native Watcher (C4): bootstraps from a glob scan, attaches one
//! non-recursive OS directory watch per directory, discovers newly created
//! subdirectories on the fly, and survives partial-failure conditions.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::diff::{DiffEngine, RawChange};
use crate::error::Result;
use crate::index::EntryIndex;
use crate::matcher::{Inclusion, PatternSet};
use crate::scanner::{initial_scan, to_rel_string};
use crate::types::{Callback, EntryInfo, EntryKind, FieldSet, TypePolicy};

/// A live native-backend session. Dropping or calling [`destroy`] aborts
/// the background task, which drops every `notify` watcher in turn,
/// closing the underlying OS handles.
pub struct NativeSession {
    task: JoinHandle<()>,
}

impl NativeSession {
    pub fn destroy(self) {
        self.task.abort();
    }
}

impl Drop for NativeSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub async fn start(
    patterns: Arc<PatternSet>,
    cwd: PathBuf,
    fields: FieldSet,
    policy: TypePolicy,
    absolute: bool,
    dot: bool,
    mut callback: Callback,
) -> Result<NativeSession> {
    let entries = initial_scan(&cwd, &patterns, fields, policy)?;
    info!(count = entries.len(), cwd = %cwd.display(), "native watcher seeded entry index");

    let index = Arc::new(Mutex::new(EntryIndex::new()));
    let raw: Vec<RawChange> = entries
        .iter()
        .map(|e| RawChange::new(e.path.clone(), true, Some(e.clone())))
        .collect();
    let initial_changes = {
        let mut guard = index.lock().await;
        DiffEngine::apply(&mut guard, raw)
    };
    callback(initial_changes.into_presented(&cwd, absolute)).await;

    let watch_dirs = ancestor_closure(&cwd, &entries);

    let (tx, mut rx) = mpsc::channel::<notify::Result<Event>>(1024);

    let task_cwd = cwd.clone();
    let task = tokio::spawn(async move {
        let mut watchers: HashMap<PathBuf, RecommendedWatcher> = HashMap::new();
        let mut watched: HashSet<PathBuf> = HashSet::new();
        for dir in watch_dirs {
            install_watch(&mut watchers, &mut watched, &dir, &tx);
        }

        while let Some(message) = rx.recv().await {
            let event = match message {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "native watcher reported an error; dropping");
                    continue;
                }
            };

            let raw = handle_event(
                &event,
                &task_cwd,
                &patterns,
                fields,
                policy,
                dot,
                &mut watchers,
                &mut watched,
                &tx,
            );
            if raw.is_empty() {
                continue;
            }

            let changes = {
                let mut guard = index.lock().await;
                DiffEngine::apply(&mut guard, raw)
            };
            if !changes.is_empty() {
                callback(changes.into_presented(&task_cwd, absolute)).await;
            }
        }
    });

    Ok(NativeSession { task })
}

/// The closure of `{ dirname(e.path) : e in index }` plus `cwd`, walking up
/// every ancestor so intermediate directories between `cwd` and a deeply
/// nested matched entry are covered too (spec.md §4.4 step 3).
fn ancestor_closure(cwd: &Path, entries: &[EntryInfo]) -> HashSet<PathBuf> {
    let mut dirs = HashSet::new();
    dirs.insert(cwd.to_path_buf());
    for entry in entries {
        let mut dir = cwd.join(&entry.path).parent().map(Path::to_path_buf);
        while let Some(d) = dir {
            let inserted = dirs.insert(d.clone());
            if d == cwd || !inserted {
                break;
            }
            dir = d.parent().map(Path::to_path_buf);
        }
    }
    dirs
}

fn install_watch(
    watchers: &mut HashMap<PathBuf, RecommendedWatcher>,
    watched: &mut HashSet<PathBuf>,
    dir: &Path,
    tx: &mpsc::Sender<notify::Result<Event>>,
) {
    if watched.contains(dir) {
        return;
    }
    let dir_tx = tx.clone();
    let mut watcher = match RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            let _ = dir_tx.blocking_send(res);
        },
        notify::Config::default(),
    ) {
        Ok(watcher) => watcher,
        Err(err) => {
            warn!(path = %dir.display(), error = %err, "failed to create watcher for directory");
            return;
        }
    };

    match watcher.watch(dir, RecursiveMode::NonRecursive) {
        Ok(()) => {
            watched.insert(dir.to_path_buf());
            watchers.insert(dir.to_path_buf(), watcher);
        }
        Err(err) => {
            warn!(path = %dir.display(), error = %err, "failed to install watch; directory not watched");
        }
    }
}

/// Attaches a watch to `dir` and recurses into its existing subdirectories
/// via single non-recursive `read_dir` passes (spec.md §4.4 step 4) — never
/// a full recursive walk.
fn register_subtree_watches(
    watchers: &mut HashMap<PathBuf, RecommendedWatcher>,
    watched: &mut HashSet<PathBuf>,
    dir: &Path,
    tx: &mpsc::Sender<notify::Result<Event>>,
) {
    install_watch(watchers, watched, dir, tx);
    let read_dir = match std::fs::read_dir(dir) {
        Ok(read_dir) => read_dir,
        Err(err) => {
            warn!(path = %dir.display(), error = %err, "failed to read new directory for subtree watches");
            return;
        }
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.is_dir() {
            register_subtree_watches(watchers, watched, &path, tx);
        }
    }
}

fn classify_path(path: &Path) -> (bool, Option<EntryKind>, Option<std::fs::Metadata>) {
    match std::fs::symlink_metadata(path) {
        Ok(meta) => {
            let kind = if meta.is_dir() {
                EntryKind::Dir
            } else if meta.file_type().is_symlink() {
                EntryKind::Symlink
            } else {
                EntryKind::File
            };
            (true, Some(kind), Some(meta))
        }
        Err(_) => (false, None, None),
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_event(
    event: &Event,
    cwd: &Path,
    patterns: &PatternSet,
    fields: FieldSet,
    policy: TypePolicy,
    dot: bool,
    watchers: &mut HashMap<PathBuf, RecommendedWatcher>,
    watched: &mut HashSet<PathBuf>,
    tx: &mpsc::Sender<notify::Result<Event>>,
) -> Vec<RawChange> {
    // Some OSes deliver an event with no paths on queue overflow; the
    // correct recovery (full rescan? error surface?) is an open question
    // upstream (spec.md §9 Open Question 1), so we log and drop.
    if event.paths.is_empty() {
        warn!("native watcher event carried no path; dropping (possible overflow)");
        return Vec::new();
    }

    let mut out = Vec::new();
    for path in &event.paths {
        let Some(rel) = to_rel_string(path, cwd) else {
            continue;
        };
        if rel.is_empty() {
            continue;
        }
        if !dot && PatternSet::is_dot_excluded(&rel) {
            continue;
        }
        if patterns.is_ignored(&rel) {
            continue;
        }

        let (exists, kind, meta) = classify_path(path);

        if exists && kind == Some(EntryKind::Dir) && !watched.contains(path) {
            register_subtree_watches(watchers, watched, path, tx);
        }

        if exists {
            match patterns.check(&rel, kind, policy) {
                Inclusion::Excluded | Inclusion::NeedsStat => continue,
                Inclusion::Included => {}
            }
        }
        // Deletions bypass the type-policy gate: the Diff Engine's index
        // lookup already makes an untracked path's deletion a no-op.

        let info = exists.then(|| {
            let mut info = EntryInfo {
                name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path: rel.clone(),
                exists: Some(true),
                kind: if fields.kind { kind } else { None },
                size: None,
                mtime_ms: None,
            };
            if let Some(meta) = meta {
                if fields.size {
                    info.size = Some(meta.len());
                }
                if fields.mtime {
                    info.mtime_ms = meta
                        .modified()
                        .ok()
                        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                        .map(|d| d.as_millis() as i64);
                }
            }
            info
        });

        out.push(RawChange::new(rel, exists, info));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ancestor_closure_includes_intermediate_directories() {
        let cwd = PathBuf::from("/root");
        let entries = vec![EntryInfo {
            path: "a/b/c.txt".to_string(),
            ..Default::default()
        }];
        let dirs = ancestor_closure(&cwd, &entries);
        assert!(dirs.contains(&PathBuf::from("/root")));
        assert!(dirs.contains(&PathBuf::from("/root/a")));
        assert!(dirs.contains(&PathBuf::from("/root/a/b")));
    }
}

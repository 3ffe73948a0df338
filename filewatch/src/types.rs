//! Data model shared by every backend: `EntryInfo`, `FileChanges`,
//! `WatchOptions`, and the small enums they're built from.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

/// User callback: receives one batch, may return a pending future that is
/// awaited before the next batch is processed (spec.md §5).
pub type Callback = Box<dyn FnMut(FileChanges) -> BoxFuture<'static, ()> + Send>;

/// One of the three filesystem entry kinds the crate distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
}

impl EntryKind {
    /// The single-letter form used on the wire by the external daemon.
    pub fn as_wire(self) -> &'static str {
        match self {
            EntryKind::File => "f",
            EntryKind::Dir => "d",
            EntryKind::Symlink => "l",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "f" => Some(EntryKind::File),
            "d" => Some(EntryKind::Dir),
            "l" => Some(EntryKind::Symlink),
            _ => None,
        }
    }
}

/// Record describing one filesystem entry.
///
/// Optional fields are populated according to the `fields` the caller asked
/// for in `WatchOptions`, not according to what happens to be cheap to
/// gather for a given backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryInfo {
    pub name: String,
    pub path: String,
    pub exists: Option<bool>,
    #[serde(rename = "type")]
    pub kind: Option<EntryKind>,
    pub size: Option<u64>,
    pub mtime_ms: Option<i64>,
}

/// Three keyed sets of entries: `added`, `changed`, `deleted`.
///
/// Invariants (enforced by [`crate::diff::DiffEngine`], never by callers):
/// the three maps are pairwise disjoint; a path's presence before/after the
/// batch is exactly what its classification implies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileChanges {
    pub added: BTreeMap<String, EntryInfo>,
    pub changed: BTreeMap<String, EntryInfo>,
    pub deleted: BTreeMap<String, EntryInfo>,
}

impl FileChanges {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.changed.is_empty() && self.deleted.is_empty()
    }

    /// Rewrites every key and `EntryInfo.path` to an absolute, forward-slash
    /// path when `absolute` is set. The Entry Index and Diff Engine always
    /// key on the root-relative form internally (spec.md §3: "chosen once
    /// at configuration, stable for the lifetime of the watcher"); this is
    /// the presentation-boundary conversion applied right before a batch
    /// reaches the user callback.
    pub fn into_presented(mut self, cwd: &Path, absolute: bool) -> FileChanges {
        if !absolute {
            return self;
        }
        self.added = rekey_absolute(self.added, cwd);
        self.changed = rekey_absolute(self.changed, cwd);
        self.deleted = rekey_absolute(self.deleted, cwd);
        self
    }
}

fn rekey_absolute(map: BTreeMap<String, EntryInfo>, cwd: &Path) -> BTreeMap<String, EntryInfo> {
    map.into_iter()
        .map(|(rel, mut info)| {
            let abs = to_absolute_string(cwd, &rel);
            info.path = abs.clone();
            (abs, info)
        })
        .collect()
}

pub(crate) fn to_absolute_string(cwd: &Path, rel: &str) -> String {
    let mut path = cwd.to_path_buf();
    for segment in rel.split('/') {
        path.push(segment);
    }
    path.to_string_lossy().replace('\\', "/")
}

/// Which optional `EntryInfo` fields a caller wants populated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSet {
    #[serde(rename = "type")]
    pub kind: bool,
    pub size: bool,
    pub mtime: bool,
}

impl FieldSet {
    pub fn needs_stat(&self) -> bool {
        self.size || self.mtime
    }
}

/// Selected backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    External,
    Native,
    OneShot,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::External
    }
}

/// Resolved type filter, derived from `only_files`/`only_directories` via
/// [`WatchOptions::type_policy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypePolicy {
    Any,
    FilesOnly,
    DirsOnly,
}

/// Recognized watch options.
///
/// `only_files`/`only_directories` are `Option<bool>` rather than plain
/// `bool` because their interaction is defined in terms of whether the
/// caller *touched* them at all (SPEC_FULL.md §3 / spec.md §3): `None`
/// means "left at its default", which resolves differently than an
/// explicit `Some(true)` for `only_directories` would. `#[serde(default)]`
/// on every field lets a caller deserialize a partial JSON options object
/// (e.g. loaded from a config file by an embedding application) without
/// supplying every key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchOptions {
    pub mode: Mode,
    pub fields: FieldSet,
    pub absolute: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    pub only_directories: Option<bool>,
    pub only_files: Option<bool>,
    pub dot: bool,
    pub ignore: Vec<String>,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            fields: FieldSet::default(),
            absolute: false,
            cwd: None,
            only_directories: None,
            only_files: None,
            dot: false,
            ignore: Vec::new(),
        }
    }
}

impl WatchOptions {
    /// `cwd` resolved to the process's current directory if unset.
    pub fn resolved_cwd(&self) -> PathBuf {
        self.cwd
            .clone()
            .unwrap_or_else(|| env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }

    /// Resolves `only_files`/`only_directories` per spec.md §3:
    /// "When `onlyDirectories` is true, `onlyFiles` is implicitly false
    /// unless both are set; if both are set true, `onlyFiles` wins."
    pub fn type_policy(&self) -> TypePolicy {
        match (self.only_directories, self.only_files) {
            (Some(true), None) => TypePolicy::DirsOnly,
            (Some(true), Some(true)) => TypePolicy::FilesOnly,
            (Some(true), Some(false)) => TypePolicy::DirsOnly,
            (Some(false) | None, Some(true)) => TypePolicy::FilesOnly,
            (Some(false) | None, Some(false)) => TypePolicy::Any,
            (Some(false) | None, None) => TypePolicy::FilesOnly,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_type_policy_is_files_only() {
        let opts = WatchOptions::default();
        assert_eq!(opts.type_policy(), TypePolicy::FilesOnly);
    }

    #[test]
    fn only_directories_alone_implies_only_files_false() {
        let opts = WatchOptions {
            only_directories: Some(true),
            ..Default::default()
        };
        assert_eq!(opts.type_policy(), TypePolicy::DirsOnly);
    }

    #[test]
    fn both_true_only_files_wins() {
        let opts = WatchOptions {
            only_directories: Some(true),
            only_files: Some(true),
            ..Default::default()
        };
        assert_eq!(opts.type_policy(), TypePolicy::FilesOnly);
    }

    #[test]
    fn explicit_only_directories_with_only_files_false() {
        let opts = WatchOptions {
            only_directories: Some(true),
            only_files: Some(false),
            ..Default::default()
        };
        assert_eq!(opts.type_policy(), TypePolicy::DirsOnly);
    }

    #[test]
    fn both_false_is_any() {
        let opts = WatchOptions {
            only_directories: Some(false),
            only_files: Some(false),
            ..Default::default()
        };
        assert_eq!(opts.type_policy(), TypePolicy::Any);
    }

    #[test]
    fn watch_options_roundtrips_through_json_with_partial_keys() {
        let value: WatchOptions = serde_json::from_str(r#"{"dot":true}"#).unwrap();
        assert!(value.dot);
        assert_eq!(value.type_policy(), TypePolicy::FilesOnly);
    }
}

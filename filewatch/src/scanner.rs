//! Initial Scanner (C2): one-shot recursive directory walk producing an
//! unordered collection of matching entries.

use std::path::Path;
use std::time::UNIX_EPOCH;

use tracing::warn;
use walkdir::WalkDir;

use crate::error::{Result, WatchError};
use crate::matcher::{Inclusion, PatternSet};
use crate::types::{EntryInfo, EntryKind, FieldSet, TypePolicy};

/// Walks `cwd` depth-first, never following symlinks, and returns every
/// entry the [`PatternSet`] admits. Order is not guaranteed (spec.md §4.2).
///
/// A per-entry read/stat failure is logged and that entry is skipped; the
/// walk itself only fails if `cwd` can't be read at all (spec.md §7.4).
pub fn initial_scan(
    cwd: &Path,
    patterns: &PatternSet,
    fields: FieldSet,
    policy: TypePolicy,
) -> Result<Vec<EntryInfo>> {
    let mut out = Vec::new();
    let mut walker = WalkDir::new(cwd).follow_links(false).into_iter();

    // Surface a fatal error only for the root itself; errors on descendants
    // are logged and skipped without aborting the walk.
    match walker.next() {
        Some(Ok(root)) if root.path() == cwd => {}
        Some(Err(err)) => {
            return Err(WatchError::ScanFailed {
                path: cwd.to_path_buf(),
                source: err.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "cannot read root")
                }),
            });
        }
        _ => {}
    }

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "failed to read directory entry during scan");
                continue;
            }
        };

        let rel = match to_rel_string(entry.path(), cwd) {
            Some(rel) => rel,
            None => continue,
        };

        let kind = classify(&entry);

        match patterns.check(&rel, Some(kind), policy) {
            Inclusion::Excluded => continue,
            Inclusion::Included | Inclusion::NeedsStat => {}
        }

        let mut info = EntryInfo {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: rel.clone(),
            exists: Some(true),
            kind: if fields.kind { Some(kind) } else { None },
            size: None,
            mtime_ms: None,
        };

        if fields.needs_stat() {
            match entry.metadata() {
                Ok(meta) => {
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
                Err(err) => {
                    warn!(path = %rel, error = %err, "failed to stat entry during scan");
                    continue;
                }
            }
        }

        out.push(info);
    }

    Ok(out)
}

fn classify(entry: &walkdir::DirEntry) -> EntryKind {
    let file_type = entry.file_type();
    if file_type.is_dir() {
        EntryKind::Dir
    } else if file_type.is_symlink() {
        EntryKind::Symlink
    } else {
        EntryKind::File
    }
}

/// Converts an absolute path under `root` into a root-relative,
/// forward-slash string. Returns `None` for the root itself.
pub fn to_rel_string(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    if rel.as_os_str().is_empty() {
        return None;
    }
    let mut out = String::new();
    for (i, component) in rel.components().enumerate() {
        if i > 0 {
            out.push('/');
        }
        out.push_str(&component.as_os_str().to_string_lossy());
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn scans_nested_ts_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("README.md"), "").unwrap();
        fs::create_dir_all(root.join("src/components")).unwrap();
        fs::write(root.join("src/index.ts"), "").unwrap();
        fs::write(root.join("src/components/button.ts"), "").unwrap();
        fs::write(root.join("src/components/card.ts"), "").unwrap();

        let patterns = PatternSet::compile(&["**/*.ts".to_string()], &[], false).unwrap();
        let entries = initial_scan(root, &patterns, FieldSet::default(), TypePolicy::FilesOnly).unwrap();
        let mut paths: Vec<_> = entries.into_iter().map(|e| e.path).collect();
        paths.sort();
        assert_eq!(
            paths,
            vec![
                "src/components/button.ts".to_string(),
                "src/components/card.ts".to_string(),
                "src/index.ts".to_string(),
            ]
        );
    }

    #[test]
    fn only_directories_matches_dirs() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/components")).unwrap();
        fs::write(root.join("src/index.ts"), "").unwrap();

        let patterns = PatternSet::compile(&["**/*".to_string()], &[], false).unwrap();
        let entries = initial_scan(root, &patterns, FieldSet::default(), TypePolicy::DirsOnly).unwrap();
        let mut paths: Vec<_> = entries.into_iter().map(|e| e.path).collect();
        paths.sort();
        assert_eq!(paths, vec!["src".to_string(), "src/components".to_string()]);
    }

    #[test]
    fn stat_failure_on_one_entry_does_not_abort_scan() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("a.ts"), "").unwrap();
        fs::write(root.join("b.ts"), "").unwrap();

        let patterns = PatternSet::compile(&["**/*.ts".to_string()], &[], false).unwrap();
        let fields = FieldSet { size: true, ..Default::default() };
        let entries = initial_scan(root, &patterns, fields, TypePolicy::FilesOnly).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.size.is_some()));
    }
}

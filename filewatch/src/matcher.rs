//! Glob Matcher (C1): compiles the pattern list and ignore list into a
//! matcher callable over root-relative, forward-slash paths.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::{Result, WatchError};
use crate::types::{EntryKind, TypePolicy};

/// Outcome of checking one candidate path against a [`PatternSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inclusion {
    Included,
    Excluded,
    /// Pattern and dot-policy allow the path, but the type policy can't be
    /// resolved without a stat (spec.md §4.1: "the matcher defers the
    /// decision to the caller, which must stat").
    NeedsStat,
}

/// Immutable compiled representation of the user's patterns + ignore list,
/// with `dot` bound in. Anchored to a `cwd` only in the sense that callers
/// always pass root-relative paths; the matcher itself holds no path state.
#[derive(Debug)]
pub struct PatternSet {
    include: GlobSet,
    ignore: GlobSet,
    dot: bool,
}

impl PatternSet {
    pub fn compile(patterns: &[String], ignore: &[String], dot: bool) -> Result<Self> {
        Ok(Self {
            include: build_glob_set(patterns)?,
            ignore: build_glob_set(ignore)?,
            dot,
        })
    }

    /// True iff any segment of `rel` (basename or intermediate) begins with
    /// `.`, per spec.md §4.1's dot-file policy.
    pub fn is_dot_excluded(rel: &str) -> bool {
        rel.split('/').any(|segment| segment.starts_with('.'))
    }

    fn pattern_matches(&self, rel: &str) -> bool {
        self.include.is_match(rel) && !self.ignore.is_match(rel)
    }

    /// A path matched by any ignore pattern never appears in any emitted
    /// batch (P6), checked independently so callers can short-circuit
    /// before paying for a stat.
    pub fn is_ignored(&self, rel: &str) -> bool {
        self.ignore.is_match(rel)
    }

    /// Full inclusion check: dot-policy, then pattern match, then type
    /// policy. `kind` is `None` when the caller hasn't stat'd the entry
    /// yet; in that case a type policy other than `Any` yields
    /// [`Inclusion::NeedsStat`].
    pub fn check(&self, rel: &str, kind: Option<EntryKind>, policy: TypePolicy) -> Inclusion {
        if !self.dot && Self::is_dot_excluded(rel) {
            return Inclusion::Excluded;
        }
        if !self.pattern_matches(rel) {
            return Inclusion::Excluded;
        }
        match (policy, kind) {
            (TypePolicy::Any, _) => Inclusion::Included,
            (TypePolicy::FilesOnly, Some(EntryKind::File)) => Inclusion::Included,
            (TypePolicy::FilesOnly, Some(_)) => Inclusion::Excluded,
            (TypePolicy::FilesOnly, None) => Inclusion::NeedsStat,
            (TypePolicy::DirsOnly, Some(EntryKind::Dir)) => Inclusion::Included,
            (TypePolicy::DirsOnly, Some(_)) => Inclusion::Excluded,
            (TypePolicy::DirsOnly, None) => Inclusion::NeedsStat,
        }
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob: Glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|source| WatchError::InvalidPattern {
                pattern: pattern.clone(),
                source,
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| WatchError::InvalidPattern {
        pattern: patterns.join(", "),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str], ignore: &[&str], dot: bool) -> PatternSet {
        PatternSet::compile(
            &patterns.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            &ignore.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            dot,
        )
        .unwrap()
    }

    #[test]
    fn recursive_glob_matches_nested_path() {
        let p = set(&["**/*.ts"], &[], false);
        assert_eq!(
            p.check("src/components/button.ts", Some(EntryKind::File), TypePolicy::FilesOnly),
            Inclusion::Included
        );
    }

    #[test]
    fn single_star_does_not_cross_separator() {
        let p = set(&["src/*.ts"], &[], false);
        assert_eq!(
            p.check("src/components/button.ts", Some(EntryKind::File), TypePolicy::FilesOnly),
            Inclusion::Excluded
        );
        assert_eq!(
            p.check("src/index.ts", Some(EntryKind::File), TypePolicy::FilesOnly),
            Inclusion::Included
        );
    }

    #[test]
    fn dot_excluded_by_default_any_segment() {
        let p = set(&["**/*.ts"], &[], false);
        assert_eq!(
            p.check("src/components/.hidden.ts", Some(EntryKind::File), TypePolicy::FilesOnly),
            Inclusion::Excluded
        );
        assert_eq!(
            p.check(".hidden/index.ts", Some(EntryKind::File), TypePolicy::FilesOnly),
            Inclusion::Excluded
        );
    }

    #[test]
    fn dot_true_admits_dotfiles() {
        let p = set(&["**/*.ts"], &[], true);
        assert_eq!(
            p.check("src/components/.hidden.ts", Some(EntryKind::File), TypePolicy::FilesOnly),
            Inclusion::Included
        );
    }

    #[test]
    fn ignore_vetoes_inclusion() {
        let p = set(&["**/*.ts"], &["**/new-file.demo.ts"], false);
        assert!(p.is_ignored("src/components/new-file.demo.ts"));
        assert_eq!(
            p.check(
                "src/components/new-file.demo.ts",
                Some(EntryKind::File),
                TypePolicy::FilesOnly
            ),
            Inclusion::Excluded
        );
    }

    #[test]
    fn only_directories_excludes_files() {
        let p = set(&["**/*"], &[], false);
        assert_eq!(
            p.check("src/index.ts", Some(EntryKind::File), TypePolicy::DirsOnly),
            Inclusion::Excluded
        );
        assert_eq!(
            p.check("src", Some(EntryKind::Dir), TypePolicy::DirsOnly),
            Inclusion::Included
        );
    }

    #[test]
    fn unknown_type_defers_to_caller() {
        let p = set(&["**/*"], &[], false);
        assert_eq!(p.check("src", None, TypePolicy::FilesOnly), Inclusion::NeedsStat);
    }
}

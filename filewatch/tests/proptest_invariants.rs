//! Property tests over a synthetic, in-memory index + diff engine
//! (spec.md §8, invariants P1-P8). Independent of any real filesystem so
//! these run fast and deterministically.

use std::collections::HashSet;

use filewatch::diff::{DiffEngine, RawChange};
use filewatch::index::EntryIndex;
use filewatch::{EntryInfo, EntryKind};
use proptest::prelude::*;

fn entry_info(path: &str) -> EntryInfo {
    EntryInfo {
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        path: path.to_string(),
        exists: Some(true),
        kind: Some(EntryKind::File),
        size: Some(0),
        mtime_ms: Some(0),
    }
}

fn path_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("a.txt".to_string()),
        Just("b.txt".to_string()),
        Just("dir/c.txt".to_string()),
        Just("dir/d.txt".to_string()),
        Just("dir/sub/e.txt".to_string()),
    ]
}

fn raw_change_strategy() -> impl Strategy<Value = (String, bool)> {
    (path_strategy(), any::<bool>())
}

fn batch_strategy() -> impl Strategy<Value = Vec<(String, bool)>> {
    prop::collection::vec(raw_change_strategy(), 0..12)
}

proptest! {
    /// P1: `added`, `changed`, `deleted` are pairwise disjoint in every
    /// emitted batch.
    #[test]
    fn p1_sets_are_pairwise_disjoint(batch in batch_strategy()) {
        let mut index = EntryIndex::new();
        let raw = batch
            .into_iter()
            .map(|(path, exists)| {
                let info = exists.then(|| entry_info(&path));
                RawChange::new(path, exists, info)
            })
            .collect();
        let changes = DiffEngine::apply(&mut index, raw);

        let added: HashSet<_> = changes.added.keys().collect();
        let changed: HashSet<_> = changes.changed.keys().collect();
        let deleted: HashSet<_> = changes.deleted.keys().collect();
        prop_assert!(added.is_disjoint(&changed));
        prop_assert!(added.is_disjoint(&deleted));
        prop_assert!(changed.is_disjoint(&deleted));
    }

    /// P2: after applying a batch, the index exactly reflects what the
    /// batch's final observation per path implied (present iff last-seen
    /// `exists` was true).
    #[test]
    fn p2_index_matches_final_observation_per_path(batch in batch_strategy()) {
        let mut index = EntryIndex::new();
        let mut last_seen: std::collections::HashMap<String, bool> = std::collections::HashMap::new();
        let raw = batch
            .into_iter()
            .map(|(path, exists)| {
                last_seen.insert(path.clone(), exists);
                let info = exists.then(|| entry_info(&path));
                RawChange::new(path, exists, info)
            })
            .collect();
        DiffEngine::apply(&mut index, raw);

        for (path, exists) in last_seen {
            prop_assert_eq!(index.contains(&path), exists);
        }
    }

    /// P3: applying two successive empty-effective batches (every path
    /// absent both before and after) never produces any reported change.
    #[test]
    fn p3_never_present_paths_produce_no_changes(paths in prop::collection::vec(path_strategy(), 0..8)) {
        let mut index = EntryIndex::new();
        let raw = paths.into_iter().map(|p| RawChange::new(p, false, None)).collect();
        let changes = DiffEngine::apply(&mut index, raw);
        prop_assert!(changes.is_empty());
    }

    /// P4: re-applying the exact same batch twice in a row never reports
    /// an `added` the second time for a path the first batch already
    /// added (index consistency across batches).
    #[test]
    fn p4_repeated_batch_does_not_readd(batch in batch_strategy()) {
        let mut index = EntryIndex::new();
        let raw: Vec<RawChange> = batch
            .iter()
            .map(|(path, exists)| {
                let info = exists.then(|| entry_info(path));
                RawChange::new(path.clone(), *exists, info)
            })
            .collect();
        let _first = DiffEngine::apply(&mut index, raw.clone());
        let second = DiffEngine::apply(&mut index, raw);

        // Anything added in the second pass must have been deleted or
        // never-seen after the first pass, never still-present.
        for path in second.added.keys() {
            prop_assert!(
                !batch.iter().any(|(p, exists)| p == path && *exists),
                "path {path} was already present after the first batch; should have been `changed`, not `added`"
            );
        }
    }

    /// P5: duplicate observations of the same path within one batch
    /// collapse to the last one (no path appears twice across the three
    /// maps, which P1 already partially covers, plus the net effect must
    /// match a batch containing only the last observation).
    #[test]
    fn p5_duplicate_within_batch_matches_last_observation_only(
        path in path_strategy(),
        first_exists in any::<bool>(),
        second_exists in any::<bool>(),
    ) {
        let mut index_duped = EntryIndex::new();
        let duped = vec![
            RawChange::new(path.clone(), first_exists, first_exists.then(|| entry_info(&path))),
            RawChange::new(path.clone(), second_exists, second_exists.then(|| entry_info(&path))),
        ];
        let changes_duped = DiffEngine::apply(&mut index_duped, duped);

        let mut index_single = EntryIndex::new();
        let single = vec![RawChange::new(path.clone(), second_exists, second_exists.then(|| entry_info(&path)))];
        let changes_single = DiffEngine::apply(&mut index_single, single);

        prop_assert_eq!(changes_duped.added.len(), changes_single.added.len());
        prop_assert_eq!(changes_duped.changed.len(), changes_single.changed.len());
        prop_assert_eq!(changes_duped.deleted.len(), changes_single.deleted.len());
        prop_assert_eq!(index_duped.contains(&path), index_single.contains(&path));
    }
}

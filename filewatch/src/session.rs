//! Public entry points: `watch`, `find_files`, and the `WatchSession` handle
//! returned by `watch` (spec.md §6.1).

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::error::Result;
use crate::matcher::PatternSet;
use crate::scanner::initial_scan;
use crate::selector::{self, BackendSession};
use crate::types::{self, Callback, WatchOptions};

/// A live watch. Drop without calling [`destroy`](WatchSession::destroy)
/// still tears down the backend (native watches / daemon connection) —
/// the backend session's own `Drop` aborts its background task.
pub struct WatchSession {
    backend: BackendSession,
}

impl WatchSession {
    pub fn destroy(self) {
        info!("destroying watch session");
        self.backend.destroy();
    }
}

/// Starts watching `patterns` under `options.cwd` (or the process cwd),
/// invoking `callback` once synchronously with the initial batch and again
/// for every subsequent change batch, until the session is destroyed.
///
/// `Mode::OneShot` is rejected here — use [`find_files`] for a single scan
/// with no ongoing subscription, matching spec.md §6.1's split between the
/// two operations.
pub async fn watch(
    patterns: Vec<String>,
    options: WatchOptions,
    callback: Callback,
) -> Result<WatchSession> {
    let cwd = options.resolved_cwd();
    let policy = options.type_policy();
    let fields = options.fields;
    let absolute = options.absolute;
    let dot = options.dot;
    let pattern_set = Arc::new(PatternSet::compile(&patterns, &options.ignore, dot)?);

    info!(mode = ?options.mode, cwd = %cwd.display(), "starting watch session");

    let socket_path = daemon_socket_path();
    let backend = selector::resolve_with_fallback(
        options.mode,
        socket_path,
        pattern_set,
        patterns,
        cwd,
        fields,
        policy,
        absolute,
        dot,
        move || callback,
    )
    .await?;

    Ok(WatchSession { backend })
}

/// A single scan with no ongoing subscription (`Mode::OneShot`'s only
/// behavior, and also what every other mode does once to build its initial
/// batch). Returns each matched entry's `path`, root-relative or absolute
/// per `options.absolute`, per spec.md §6.1 / §3.
pub fn find_files(patterns: &[String], options: &WatchOptions) -> Result<Vec<String>> {
    let cwd = options.resolved_cwd();
    let policy = options.type_policy();
    let pattern_set = PatternSet::compile(patterns, &options.ignore, options.dot)?;
    let entries = initial_scan(&cwd, &pattern_set, options.fields, policy)?;
    Ok(entries
        .into_iter()
        .map(|e| {
            if options.absolute {
                types::to_absolute_string(&cwd, &e.path)
            } else {
                e.path
            }
        })
        .collect())
}

/// Resolves the daemon socket path from the `WATCHMAN_SOCK` environment
/// variable. Discovery/spawning of the daemon itself is an external
/// collaborator (spec.md §1); this crate only knows how to connect to an
/// already-running one.
fn daemon_socket_path() -> Option<PathBuf> {
    std::env::var_os("WATCHMAN_SOCK").map(PathBuf::from)
}

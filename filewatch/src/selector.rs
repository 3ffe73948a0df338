//! Backend Selector/Fallback (C6): resolves a requested [`Mode`] into a
//! running backend, falling back from `external` to `native` exactly once
//! (spec.md §4.5 — "never bounces back").

use std::path::PathBuf;
use std::sync::Arc;

#[cfg(any(feature = "native", feature = "watchman"))]
use tracing::warn;

use crate::error::{Result, WatchError};
use crate::matcher::PatternSet;
#[cfg(feature = "native")]
use crate::native::{self, NativeSession};
use crate::types::{Callback, FieldSet, Mode, TypePolicy};
#[cfg(feature = "watchman")]
use crate::watchman;

/// A running backend session, behind a uniform handle so the caller
/// (`WatchSession`) doesn't need to know which backend won.
pub enum BackendSession {
    #[cfg(feature = "native")]
    Native(NativeSession),
    #[cfg(feature = "watchman")]
    Watchman(watchman::WatchmanSession),
}

impl BackendSession {
    pub fn destroy(self) {
        match self {
            #[cfg(feature = "native")]
            BackendSession::Native(session) => session.destroy(),
            #[cfg(feature = "watchman")]
            BackendSession::Watchman(session) => session.destroy(),
        }
    }
}

/// Attempts the external backend, falling back to native exactly once on
/// any connection/capability failure. Takes a callback factory rather than
/// an owned callback because a failed external attempt must not have
/// consumed the one callback the native attempt still needs.
#[allow(clippy::too_many_arguments)]
pub async fn resolve_with_fallback(
    mode: Mode,
    socket_path: Option<PathBuf>,
    patterns: Arc<PatternSet>,
    raw_patterns: Vec<String>,
    cwd: PathBuf,
    fields: FieldSet,
    policy: TypePolicy,
    absolute: bool,
    dot: bool,
    make_callback: impl FnOnce() -> Callback,
) -> Result<BackendSession> {
    match mode {
        Mode::Native => resolve_native(patterns, cwd, fields, policy, absolute, dot, make_callback).await,
        Mode::OneShot => Err(WatchError::InvalidMode(Mode::OneShot)),
        Mode::External => resolve_external(
            socket_path,
            patterns,
            raw_patterns,
            cwd,
            fields,
            policy,
            absolute,
            dot,
            make_callback,
        )
        .await,
    }
}

#[cfg(feature = "native")]
#[allow(clippy::too_many_arguments)]
async fn resolve_native(
    patterns: Arc<PatternSet>,
    cwd: PathBuf,
    fields: FieldSet,
    policy: TypePolicy,
    absolute: bool,
    dot: bool,
    make_callback: impl FnOnce() -> Callback,
) -> Result<BackendSession> {
    let session = native::start(patterns, cwd, fields, policy, absolute, dot, make_callback()).await?;
    Ok(BackendSession::Native(session))
}

/// Without the `native` feature compiled in there is no backend left to
/// serve `Mode::Native`, and no fallback target for a failed `Mode::External`
/// attempt either — both surface the same `InvalidMode` this crate already
/// uses for a mode that can't be serviced.
#[cfg(not(feature = "native"))]
#[allow(clippy::too_many_arguments)]
async fn resolve_native(
    _patterns: Arc<PatternSet>,
    _cwd: PathBuf,
    _fields: FieldSet,
    _policy: TypePolicy,
    _absolute: bool,
    _dot: bool,
    _make_callback: impl FnOnce() -> Callback,
) -> Result<BackendSession> {
    Err(WatchError::InvalidMode(Mode::Native))
}

#[cfg(feature = "watchman")]
#[allow(clippy::too_many_arguments)]
async fn resolve_external(
    socket_path: Option<PathBuf>,
    patterns: Arc<PatternSet>,
    raw_patterns: Vec<String>,
    cwd: PathBuf,
    fields: FieldSet,
    policy: TypePolicy,
    absolute: bool,
    dot: bool,
    make_callback: impl FnOnce() -> Callback,
) -> Result<BackendSession> {
    let external_attempt = match &socket_path {
        Some(path) => {
            watchman::start(
                path,
                patterns.clone(),
                raw_patterns,
                cwd.clone(),
                fields,
                policy,
                absolute,
                dot,
                make_callback(),
            )
            .await
        }
        None => Err(WatchError::DaemonUnavailable(
            "no daemon socket path configured".to_string(),
        )),
    };

    match external_attempt {
        Ok(session) => Ok(BackendSession::Watchman(session)),
        Err(err) => {
            warn!(error = %err, "external daemon unavailable, falling back to native backend");
            resolve_native(patterns, cwd, fields, policy, absolute, dot, make_callback).await
        }
    }
}

/// Without the `watchman` feature compiled in, the daemon is unconditionally
/// unavailable, so `external` mode degrades straight to native — the same
/// observable outcome as a real connection failure, just decided at compile
/// time instead of at connect time.
#[cfg(not(feature = "watchman"))]
#[allow(clippy::too_many_arguments)]
async fn resolve_external(
    _socket_path: Option<PathBuf>,
    patterns: Arc<PatternSet>,
    _raw_patterns: Vec<String>,
    cwd: PathBuf,
    fields: FieldSet,
    policy: TypePolicy,
    absolute: bool,
    dot: bool,
    make_callback: impl FnOnce() -> Callback,
) -> Result<BackendSession> {
    #[cfg(feature = "native")]
    warn!("watchman support not compiled in; falling back to native backend");
    resolve_native(patterns, cwd, fields, policy, absolute, dot, make_callback).await
}

//! External Watcher Adapter (C5): talks to a Watchman-style daemon over a
//! length-prefixed JSON protocol on a Unix domain socket (SPEC_FULL.md §6.2).

pub mod wire;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::SinkExt;
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, info, warn};

use self::wire::{Expr, IncomingMessage, Request};
use crate::diff::{DiffEngine, RawChange};
use crate::error::{Result, WatchError};
use crate::index::EntryIndex;
use crate::matcher::PatternSet;
use crate::types::{Callback, EntryInfo, FieldSet, TypePolicy};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

pub struct WatchmanSession {
    task: JoinHandle<()>,
}

impl WatchmanSession {
    pub fn destroy(self) {
        self.task.abort();
    }
}

impl Drop for WatchmanSession {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Connects to the daemon at `socket_path`, runs capability-check,
/// watch-project, and subscribe, then streams pushed events for the
/// lifetime of the returned session. Any failure up through `subscribe`
/// is surfaced as [`WatchError::DaemonUnavailable`] so the caller (the
/// backend selector) can fall back to the native backend exactly once.
pub async fn start(
    socket_path: &Path,
    patterns: Arc<PatternSet>,
    raw_patterns: Vec<String>,
    cwd: PathBuf,
    fields: FieldSet,
    _policy: TypePolicy,
    absolute: bool,
    dot: bool,
    mut callback: Callback,
) -> Result<WatchmanSession> {
    let stream = tokio::time::timeout(CONNECT_TIMEOUT, UnixStream::connect(socket_path))
        .await
        .map_err(|_| WatchError::DaemonUnavailable(format!("connect timed out: {}", socket_path.display())))?
        .map_err(|err| WatchError::DaemonUnavailable(err.to_string()))?;

    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    send_request(
        &mut framed,
        &Request::CapabilityCheck {
            required: vec!["relative_root".to_string()],
        },
    )
    .await?;
    recv_response(&mut framed).await?;

    send_request(
        &mut framed,
        &Request::WatchProject {
            path: cwd.to_string_lossy().into_owned(),
        },
    )
    .await?;
    let watch_root = recv_response(&mut framed).await?;
    let root = match watch_root {
        wire::Response::WatchProject { watch, .. } => watch,
        _ => cwd.to_string_lossy().into_owned(),
    };

    let subscription_name = "filewatch".to_string();
    send_request(
        &mut framed,
        &Request::Subscribe {
            root: root.clone(),
            name: subscription_name.clone(),
            expression: Expr::from_patterns(&raw_patterns, dot),
            fields: wanted_fields(fields),
            relative_root: String::new(),
        },
    )
    .await?;
    recv_response(&mut framed).await?;

    info!(root = %root, "subscribed to external watch daemon");

    let index = Arc::new(Mutex::new(EntryIndex::new()));
    let task_cwd = cwd.clone();
    let task_patterns = patterns.clone();
    let task = tokio::spawn(async move {
        let mut first_batch = true;
        while let Some(frame) = framed.next().await {
            let bytes = match frame {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(error = %err, "daemon connection read error; ending session");
                    break;
                }
            };
            let message: IncomingMessage = match serde_json::from_slice(&bytes) {
                Ok(message) => message,
                Err(err) => {
                    debug!(error = %err, "dropping unrecognized daemon message");
                    continue;
                }
            };

            let pushed = match message {
                IncomingMessage::Pushed(pushed) if pushed.subscription == subscription_name => pushed,
                IncomingMessage::Pushed(_) => continue,
                IncomingMessage::Response(_) => continue,
            };

            let raw: Vec<RawChange> = pushed
                .files
                .into_iter()
                .filter_map(|file| translate_pushed_file(file, &task_patterns, dot))
                .collect();

            // The first pushed response is the subscription's initial batch
            // (spec.md §4.3/§8 P3: it always fires once, even when empty),
            // so it is delivered unconditionally; later batches suppress an
            // empty diff as usual.
            let is_initial = first_batch;
            first_batch = false;
            if raw.is_empty() && !is_initial {
                continue;
            }

            let changes = {
                let mut guard = index.lock().await;
                DiffEngine::apply(&mut guard, raw)
            };
            if is_initial || !changes.is_empty() {
                callback(changes.into_presented(&task_cwd, absolute)).await;
            }
        }
    });

    Ok(WatchmanSession { task })
}

fn wanted_fields(fields: FieldSet) -> Vec<String> {
    let mut out = vec!["name".to_string(), "exists".to_string()];
    if fields.kind {
        out.push("type".to_string());
    }
    if fields.size {
        out.push("size".to_string());
    }
    if fields.mtime {
        out.push("mtime_ms".to_string());
    }
    out
}

/// Ignore is not expressible in the daemon's query grammar as a negative
/// combinator here, so it is re-applied client-side on every pushed file,
/// matching spec.md §4.1's veto semantics regardless of backend.
fn translate_pushed_file(file: wire::PushedFile, patterns: &PatternSet, dot: bool) -> Option<RawChange> {
    if !dot && PatternSet::is_dot_excluded(&file.name) {
        return None;
    }
    if patterns.is_ignored(&file.name) {
        return None;
    }

    let info = file.exists.then(|| EntryInfo {
        name: file.name.rsplit('/').next().unwrap_or(&file.name).to_string(),
        path: file.name.clone(),
        exists: Some(true),
        kind: file.entry_kind(),
        size: file.size,
        mtime_ms: file.mtime_ms,
    });
    Some(RawChange::new(file.name, file.exists, info))
}

async fn send_request(
    framed: &mut Framed<UnixStream, LengthDelimitedCodec>,
    request: &Request,
) -> Result<()> {
    let payload = serde_json::to_vec(request)
        .map_err(|err| WatchError::DaemonUnavailable(format!("failed to encode request: {err}")))?;
    framed
        .send(payload.into())
        .await
        .map_err(|err| WatchError::DaemonUnavailable(err.to_string()))
}

async fn recv_response(framed: &mut Framed<UnixStream, LengthDelimitedCodec>) -> Result<wire::Response> {
    let frame = framed
        .next()
        .await
        .ok_or_else(|| WatchError::DaemonUnavailable("daemon closed connection".to_string()))?
        .map_err(|err| WatchError::DaemonUnavailable(err.to_string()))?;
    let response: wire::Response = serde_json::from_slice(&frame)
        .map_err(|err| WatchError::DaemonUnavailable(format!("malformed daemon response: {err}")))?;
    match &response {
        wire::Response::Error { error } => Err(WatchError::DaemonUnavailable(error.clone())),
        wire::Response::CapabilityCheck { ok: false, error } => Err(WatchError::DaemonUnavailable(
            error.clone().unwrap_or_else(|| "capability check failed".to_string()),
        )),
        _ => Ok(response),
    }
}

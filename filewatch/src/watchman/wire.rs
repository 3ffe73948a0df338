//! JSON wire types exchanged with the external daemon (SPEC_FULL.md §6.2).

use serde::{Deserialize, Serialize};

use crate::types::EntryKind;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "cmd")]
pub enum Request {
    #[serde(rename = "capability-check")]
    CapabilityCheck { required: Vec<String> },
    #[serde(rename = "watch-project")]
    WatchProject { path: String },
    #[serde(rename = "subscribe")]
    Subscribe {
        root: String,
        name: String,
        expression: Expr,
        fields: Vec<String>,
        relative_root: String,
    },
}

// `untagged` tries variants in declaration order; a bare `{"ok":true}` ack
// (e.g. from `subscribe`) matches `CapabilityCheck` rather than `Ack` since
// it comes first and both shapes are structurally compatible. Harmless:
// every caller only inspects `ok`/`error`, never branches on which variant
// it got back.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Response {
    CapabilityCheck { ok: bool, error: Option<String> },
    WatchProject { watch: String, relative_path: Option<String> },
    Ack { ok: bool },
    Error { error: String },
}

/// Minimal query expression grammar the daemon accepts (spec.md §6).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Expr {
    AllOf { allof: Vec<Expr> },
    AnyOf { anyof: Vec<Expr> },
    Type { #[serde(rename = "type")] kind: &'static str },
    Match { r#match: MatchExpr },
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchExpr {
    pub pattern: String,
    pub wholename: bool,
    pub includedotfiles: bool,
}

impl Expr {
    /// Builds the `anyof` over every include pattern, each paired with an
    /// `allof` that subtracts the ignore patterns — there is no native
    /// "not" combinator here, so ignore is applied client-side instead
    /// (see `crate::watchman::translate_pushed_file`).
    pub fn from_patterns(patterns: &[String], dot: bool) -> Expr {
        let matches = patterns
            .iter()
            .map(|pattern| Expr::Match {
                r#match: MatchExpr {
                    pattern: pattern.clone(),
                    wholename: true,
                    includedotfiles: dot,
                },
            })
            .collect();
        Expr::AnyOf { anyof: matches }
    }
}

/// One entry inside a pushed subscription event.
#[derive(Debug, Clone, Deserialize)]
pub struct PushedFile {
    pub name: String,
    pub exists: bool,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub size: Option<u64>,
    pub mtime_ms: Option<i64>,
}

impl PushedFile {
    pub fn entry_kind(&self) -> Option<EntryKind> {
        self.kind.as_deref().and_then(EntryKind::from_wire)
    }
}

/// A pushed subscription notification.
#[derive(Debug, Clone, Deserialize)]
pub struct PushedEvent {
    pub subscription: String,
    pub files: Vec<PushedFile>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IncomingMessage {
    Pushed(PushedEvent),
    Response(Response),
}

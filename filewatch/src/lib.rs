//! Glob-filtered file watching over a native OS backend or an external
//! Watchman-style daemon, with a one-shot scan mode for when no ongoing
//! subscription is needed.
//!
//! The public surface is small: [`watch`] starts a session that invokes a
//! callback with an initial batch and then every subsequent change batch;
//! [`find_files`] runs a single scan with no subscription at all.

pub mod diff;
pub mod error;
pub mod index;
pub mod matcher;
#[cfg(feature = "native")]
pub mod native;
pub mod scanner;
mod selector;
pub mod session;
pub mod types;
#[cfg(feature = "watchman")]
pub mod watchman;

pub use error::{Result, WatchError};
pub use session::{find_files, watch, WatchSession};
pub use types::{
    Callback, EntryInfo, EntryKind, FieldSet, FileChanges, Mode, TypePolicy, WatchOptions,
};

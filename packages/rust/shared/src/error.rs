//! Error types for pagebot.
//!
//! Library crates use [`PageBotError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Per-page failures never abort a run: the item processor converts every
//! error into an outcome, so most variants end up as report lines.

use std::path::PathBuf;

use crate::types::TableKind;

/// Top-level error type for all pagebot operations.
#[derive(Debug, thiserror::Error)]
pub enum PageBotError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// The page is missing or is a redirect.
    #[error("{0}")]
    NotFound(String),

    /// A required inline marker is absent or duplicated.
    #[error("malformed page: {message}")]
    MalformedDocument { message: String },

    /// No table of the requested kind exists in the page.
    #[error("cannot find {kind} table")]
    TableNotFound { kind: TableKind },

    /// More tables of the requested kind than the kind allows.
    #[error("found {found} {kind} tables, expected {expected}")]
    AmbiguousTable {
        kind: TableKind,
        found: usize,
        expected: usize,
    },

    /// Some missing entries could not be placed into the page.
    #[error("{source}")]
    ReconciliationPartialFailure {
        source: Box<PageBotError>,
        unplaced: Vec<String>,
    },

    /// Transport-level HTTP failure.
    #[error("network error: {0}")]
    Network(String),

    /// The wiki API answered with an error object.
    #[error("api error {code}: {info}")]
    Api { code: String, info: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Catch-all; the message is kept verbatim.
    #[error("{0}")]
    Unexpected(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PageBotError>;

impl PageBotError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a malformed-document error from any displayable message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedDocument {
            message: msg.into(),
        }
    }

    /// Wrap a reconciliation error together with the entries it left out.
    pub fn partial_failure(source: PageBotError, unplaced: Vec<String>) -> Self {
        Self::ReconciliationPartialFailure {
            source: Box::new(source),
            unplaced,
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Entries left unplaced by a partial failure, if any.
    pub fn unplaced(&self) -> Option<&[String]> {
        match self {
            Self::ReconciliationPartialFailure { unplaced, .. } => Some(unplaced),
            _ => None,
        }
    }

    /// Whether a request that failed this way is worth repeating.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Api { code, .. } => matches!(code.as_str(), "maxlag" | "ratelimited" | "readonly"),
            _ => false,
        }
    }
}

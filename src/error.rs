//! Centralized error handling for esdump.
//!
//! Every fallible library operation returns [`Result<T>`], whose error type
//! [`DumpError`] groups failures by how callers are expected to react:
//!
//! - [`DumpError::Config`] is fatal and raised before any network call.
//! - [`DumpError::RemoteFetch`] aborts the current collection only; multi
//!   collection runs report it and move on.
//! - [`DumpError::Serialization`] aborts the current file write and leaves the
//!   snapshot file truncated.
//!
//! ```
//! use esdump::error::DumpError;
//!
//! fn is_fatal(err: &DumpError) -> bool {
//!     !matches!(err, DumpError::RemoteFetch(_))
//! }
//! ```
//!
//! The [`ResultExt`] trait attaches context to any error convertible into
//! [`DumpError`]:
//!
//! ```no_run
//! use esdump::error::ResultExt as _;
//!
//! fn load(path: &str) -> esdump::error::Result<String> {
//!     std::fs::read_to_string(path).with_context(|| format!("Failed to read {path}"))
//! }
//! ```

use std::fmt;

/// Main error type for esdump operations.
#[derive(Debug)]
pub enum DumpError {
    /// I/O errors while reading or writing snapshot files
    Io(std::io::Error),

    /// Missing or contradictory connection settings
    Config(String),

    /// A search, scroll or bulk request failed
    RemoteFetch(String),

    /// A document could not be rendered to its canonical form
    Serialization(String),

    /// A snapshot file does not follow the expected layout
    Snapshot(String),

    /// File not found or invalid path
    InvalidPath(String),

    /// Generic error with context
    Other(String),
}

impl fmt::Display for DumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::RemoteFetch(msg) => write!(f, "Remote fetch error: {msg}"),
            Self::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            Self::Snapshot(msg) => write!(f, "Malformed snapshot: {msg}"),
            Self::InvalidPath(msg) => write!(f, "Invalid path: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for DumpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DumpError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for DumpError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Self::Io(err.into())
        } else {
            Self::Serialization(err.to_string())
        }
    }
}

impl From<reqwest::Error> for DumpError {
    fn from(err: reqwest::Error) -> Self {
        Self::RemoteFetch(err.to_string())
    }
}

impl From<anyhow::Error> for DumpError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(format!("{err:#}"))
    }
}

/// Result type alias for esdump operations.
pub type Result<T> = std::result::Result<T, DumpError>;

/// Extension trait to add context to results.
///
/// The error category is kept so callers can still match on it; only the
/// message gains the context prefix.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, msg: impl Into<String>) -> Result<T>;

    /// Add context using a closure (lazy evaluation).
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<DumpError>,
{
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().prefixed(&msg.into()))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().prefixed(&f()))
    }
}

impl DumpError {
    fn prefixed(self, context: &str) -> Self {
        match self {
            Self::Io(e) => Self::Io(std::io::Error::new(e.kind(), format!("{context}: {e}"))),
            Self::Config(msg) => Self::Config(format!("{context}: {msg}")),
            Self::RemoteFetch(msg) => Self::RemoteFetch(format!("{context}: {msg}")),
            Self::Serialization(msg) => Self::Serialization(format!("{context}: {msg}")),
            Self::Snapshot(msg) => Self::Snapshot(format!("{context}: {msg}")),
            Self::InvalidPath(msg) => Self::InvalidPath(format!("{context}: {msg}")),
            Self::Other(msg) => Self::Other(format!("{context}: {msg}")),
        }
    }

    /// Whether the error only affects the current unit of work (one collection).
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RemoteFetch(_))
    }
}

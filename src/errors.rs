//! Application error model
//!
//! Defines a typed error hierarchy using `thiserror` for internal error
//! handling. Every fallible function in this crate returns [`AppResult`].

use thiserror::Error;

/// Application error type
///
/// Covers all error kinds the monitor, scan subsystem, and store layer may
/// encounter (see spec §7: Network, Authentication, Protocol, Storage,
/// Parse, Validation).
#[derive(Debug, Error)]
pub enum AppError {
    /// TCP connect failure, DNS failure, TLS handshake failure, read/write
    /// timeout, or an IDLE stream terminated by `BYE`.
    #[error("network error: {0}")]
    Network(String),
    /// LOGIN rejected or an XOAUTH2 challenge blob with non-success status.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// `NO`/`BAD` response to a tagged command, or an unparseable response.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// I/O error opening/writing the database, a schema mismatch that
    /// cannot be migrated, or a JSON decode failure on `reasons`.
    #[error("storage error: {0}")]
    Storage(String),
    /// Malformed email address or unparseable RFC-822 headers. Parse errors
    /// in HTML link extraction are never surfaced here — they yield an
    /// empty [`crate::email::AnalysisContext`] instead (spec §3 invariant).
    #[error("parse error: {0}")]
    Parse(String),
    /// Empty mailbox name, empty UID set, or an invalid date string in
    /// search criteria.
    #[error("invalid input: {0}")]
    Validation(String),
    /// Operation timeout distinct from a network-level timeout (e.g. a
    /// bounded wait for DONE on cancellation).
    #[error("operation timed out: {0}")]
    Timeout(String),
    /// Unexpected failure with no more specific classification.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(format!("reasons JSON decode failed: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Type alias for fallible return values
///
/// Use this for all internal functions that can fail. Provides a consistent
/// error type throughout the codebase.
pub type AppResult<T> = Result<T, AppError>;

//! Error kinds for reconciliation runs.
//!
//! `Config` and `Fetch` abort a run before any write. `Store` aborts a run
//! when the vault snapshot cannot be read; write failures are collected per
//! entry instead (see [`crate::reconcile`]).

use thiserror::Error;

/// Errors that abort a reconciliation run.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing identity or credential, detected before any request is made.
    #[error("configuration error: {0}")]
    Config(String),

    /// Non-success response or transport failure from a catalog collaborator.
    /// Transport failures carry status 0.
    #[error("catalog fetch failed (status {status}): {message}")]
    Fetch { status: u16, message: String },

    #[error("local store error: {0}")]
    Store(#[from] StoreError),
}

/// Local store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("entry not found: {0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }

    pub fn fetch(status: u16, message: impl Into<String>) -> Self {
        Error::Fetch {
            status,
            message: message.into(),
        }
    }

    /// Short machine-readable kind for run events
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Fetch { .. } => "fetch",
            Error::Store(_) => "store",
        }
    }
}

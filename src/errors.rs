// src/errors.rs

//! Crate-wide error type and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SciflowError {
    /// A placeholder references a port with no bound value, an out-path
    /// function is missing or returned an empty path, or an input port was
    /// never connected.
    #[error("Template error: {0}")]
    Template(String),

    /// The external shell returned non-zero, or the process could not be
    /// spawned.
    #[error("Execution error: {0}")]
    Exec(String),

    /// Rename, open, or stat failed unexpectedly.
    #[error("IO error: {msg}")]
    Io {
        msg: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SciflowError {
    pub(crate) fn template(msg: impl Into<String>) -> Self {
        SciflowError::Template(msg.into())
    }

    pub(crate) fn exec(msg: impl Into<String>) -> Self {
        SciflowError::Exec(msg.into())
    }

    pub(crate) fn io(msg: impl Into<String>, source: std::io::Error) -> Self {
        SciflowError::Io {
            msg: msg.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SciflowError>;

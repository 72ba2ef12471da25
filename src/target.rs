// src/target.rs

//! File handles with an atomic write protocol.
//!
//! A [`FileTarget`] names a final on-disk path together with its temporary
//! sibling (`<path>.tmp`). Producers write to the temporary path and then
//! [`atomize`](FileTarget::atomize) it; the final path appears with full
//! content in a single rename, so a consumer that observes the final path
//! may rely on the file being complete.

use std::fs;
use std::path::Path;

use tracing::debug;

use crate::errors::{Result, SciflowError};

/// Suffix appended to the final path to form the temporary sidecar.
pub const TEMP_SUFFIX: &str = ".tmp";

/// An immutable handle to a file identified by its final path.
///
/// The handle circulates downstream on output ports once the producing task
/// has atomized the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTarget {
    path: String,
}

impl FileTarget {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        debug_assert!(!path.is_empty(), "FileTarget path must be non-empty");
        Self { path }
    }

    /// The final path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The temporary sibling path, `<path>.tmp`.
    pub fn temp_path(&self) -> String {
        format!("{}{}", self.path, TEMP_SUFFIX)
    }

    /// True iff the final path exists in the filesystem.
    pub fn exists(&self) -> bool {
        Path::new(&self.path).exists()
    }

    /// Write `data` to the temporary path, then atomize it.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        let tmp = self.temp_path();
        fs::write(&tmp, data)
            .map_err(|e| SciflowError::io(format!("writing '{tmp}'"), e))?;
        self.atomize()
    }

    /// Rename the temporary path to the final path.
    ///
    /// The rename is atomic within one filesystem. A stale `.tmp` left over
    /// from an aborted run is simply overwritten by the producer before it
    /// gets here, so no pre-check is made.
    pub fn atomize(&self) -> Result<()> {
        let tmp = self.temp_path();
        debug!(from = %tmp, to = %self.path, "atomizing file target");
        fs::rename(&tmp, &self.path)
            .map_err(|e| SciflowError::io(format!("renaming '{tmp}' to '{}'", self.path), e))
    }

    /// Open the final path for reading.
    pub fn open(&self) -> Result<fs::File> {
        fs::File::open(&self.path)
            .map_err(|e| SciflowError::io(format!("opening '{}'", self.path), e))
    }

    /// Read the full content of the final path.
    pub fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.path)
            .map_err(|e| SciflowError::io(format!("reading '{}'", self.path), e))
    }
}

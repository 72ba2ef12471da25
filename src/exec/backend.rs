// src/exec/backend.rs

//! Pluggable shell backend abstraction.
//!
//! Tasks talk to a `ShellBackend` instead of spawning processes directly.
//! This makes it easy to swap in a recording or faking backend in tests
//! while keeping the production implementation in [`shell`](super::shell).

use async_trait::async_trait;

use crate::errors::Result;

/// Trait abstracting how a formatted command line is executed.
///
/// Production code uses [`RealShellBackend`](super::RealShellBackend);
/// tests can provide their own implementation that records commands or
/// skips execution entirely.
#[async_trait]
pub trait ShellBackend: Send + Sync {
    /// Run `cmd` to completion.
    ///
    /// Returns `Ok(())` only for a zero exit status; a non-zero exit or a
    /// spawn failure is an execution error, fatal for the calling task.
    async fn run_command(&self, cmd: &str) -> Result<()>;
}

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sciflow::errors::Result;
use sciflow::{RealShellBackend, ShellBackend};

/// A shell backend that:
/// - records every formatted command it is asked to run
/// - delegates execution to an inner backend.
pub struct RecordingShellBackend {
    inner: Arc<dyn ShellBackend>,
    executed: Arc<Mutex<Vec<String>>>,
}

impl RecordingShellBackend {
    pub fn new(inner: Arc<dyn ShellBackend>, executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self { inner, executed }
    }

    /// Recording backend that delegates to the real shell.
    pub fn real(executed: Arc<Mutex<Vec<String>>>) -> Self {
        Self::new(Arc::new(RealShellBackend::new()), executed)
    }
}

#[async_trait]
impl ShellBackend for RecordingShellBackend {
    async fn run_command(&self, cmd: &str) -> Result<()> {
        {
            let mut guard = self.executed.lock().unwrap();
            guard.push(cmd.to_string());
        }
        self.inner.run_command(cmd).await
    }
}

// src/exec/shell.rs

//! Real shell backend used in production.

use std::process::Stdio;

use anyhow::Context;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::errors::{Result, SciflowError};

use super::backend::ShellBackend;

/// Environment variable overriding the shell program (POSIX platforms).
pub const SHELL_ENV_VAR: &str = "SCIFLOW_SHELL";

/// Executes commands through an external POSIX shell (`sh -c`, or
/// `cmd /C` on Windows).
#[derive(Debug, Clone)]
pub struct RealShellBackend {
    shell: String,
}

impl RealShellBackend {
    /// Backend using the default shell, honouring `SCIFLOW_SHELL`.
    pub fn new() -> Self {
        let shell = std::env::var(SHELL_ENV_VAR).unwrap_or_else(|_| "sh".to_string());
        Self { shell }
    }

    /// Backend using a specific shell program.
    pub fn with_shell(program: impl Into<String>) -> Self {
        Self {
            shell: program.into(),
        }
    }
}

impl Default for RealShellBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShellBackend for RealShellBackend {
    async fn run_command(&self, cmd: &str) -> Result<()> {
        info!(cmd = %cmd, "executing command");

        // Build a shell command appropriate for the platform.
        let mut command = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(cmd);
            c
        } else {
            let mut c = Command::new(&self.shell);
            c.arg("-c").arg(cmd);
            c
        };

        // No kill-on-drop: a shell invocation that has started always
        // runs to completion, even while the rest of a run is failing.
        command.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = command
            .spawn()
            .with_context(|| format!("spawning shell for command '{cmd}'"))
            .map_err(|e| SciflowError::exec(format!("{e:#}")))?;

        // Consume stdout/stderr so OS buffers don't fill; log at debug.
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(async move {
                let reader = BufReader::new(stdout);
                let mut lines = reader.lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("stdout: {}", line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let reader = BufReader::new(stderr);
                let mut lines = reader.lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("stderr: {}", line);
                }
            });
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for shell running '{cmd}'"))
            .map_err(|e| SciflowError::exec(format!("{e:#}")))?;

        if !status.success() {
            let code = status.code().unwrap_or(-1);
            return Err(SciflowError::exec(format!(
                "command exited with code {code}: {cmd}"
            )));
        }

        debug!(cmd = %cmd, "command succeeded");
        Ok(())
    }
}

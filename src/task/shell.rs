// src/task/shell.rs

//! The shell-command workflow node and its driver loop.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::{Result, SciflowError};
use crate::exec::{RealShellBackend, ShellBackend};
use crate::target::FileTarget;
use crate::template::{self, PortType};

use super::port::{InPort, OutPort, BUFSIZE};
use super::Task;

/// Read-only view of one iteration's input-path and parameter snapshots,
/// handed to out-path functions.
pub struct PortSnapshot<'a> {
    in_paths: &'a BTreeMap<String, String>,
    params: &'a BTreeMap<String, String>,
}

impl PortSnapshot<'_> {
    /// Path received on the named input port this iteration, or `""` when
    /// the port carries no value.
    pub fn in_path(&self, port: &str) -> &str {
        self.in_paths.get(port).map(String::as_str).unwrap_or("")
    }

    /// Value received on the named parameter port this iteration, or `""`
    /// when the port carries no value.
    pub fn param(&self, name: &str) -> &str {
        self.params.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Computes the final path for one output port from the current iteration's
/// snapshots. Must be pure; an empty result is a template error.
pub type OutPathFn = Box<dyn Fn(&PortSnapshot<'_>) -> String + Send + Sync>;

/// A task that formats its command template once per iteration and runs it
/// through an external shell.
///
/// Ports are discovered from the `{i:..}` / `{o:..}` / `{p:..}` placeholders
/// in the template. Each iteration pulls exactly one value from every input
/// and parameter port, computes the output paths, skips execution when every
/// output already exists on disk, and emits one [`FileTarget`] per output
/// port. The task terminates when any input or parameter port closes.
pub struct ShellTask {
    command: String,
    in_ports: BTreeMap<String, InPort<FileTarget>>,
    out_ports: BTreeMap<String, OutPort<FileTarget>>,
    param_ports: BTreeMap<String, InPort<String>>,
    out_path_funcs: BTreeMap<String, OutPathFn>,
    prepend: Option<String>,
    spawn: bool,
    backend: Arc<dyn ShellBackend>,
    pending_params: Vec<(String, String)>,
    // Per-iteration scratch.
    in_paths: BTreeMap<String, String>,
    params: BTreeMap<String, String>,
}

/// One submitted iteration in spawn mode: the running execution (if not
/// skipped) and the outputs to emit once it completes.
struct PendingExec {
    handle: Option<tokio::task::JoinHandle<Result<()>>>,
    outs: BTreeMap<String, FileTarget>,
}

impl ShellTask {
    /// Create a task from a command template, discovering its ports.
    pub fn new(cmd: impl Into<String>) -> Self {
        let mut task = Self::bare(cmd.into());
        for ph in template::placeholders(&task.command) {
            match ph.ty {
                PortType::Input => {
                    task.in_ports.insert(ph.name, InPort::new());
                }
                PortType::Output => {
                    task.out_ports.insert(ph.name, OutPort::new());
                }
                PortType::Param => {
                    task.param_ports.insert(ph.name, InPort::new());
                }
            }
        }
        task
    }

    /// Create a task and feed exactly one value into each named parameter
    /// port; every port closes after its value, so the task runs a single
    /// iteration.
    pub fn with_params<I, K, V>(cmd: impl Into<String>, params: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut task = Self::new(cmd);
        for (name, value) in params {
            let name = name.into();
            if !task.param_ports.contains_key(&name) {
                return Err(SciflowError::template(format!(
                    "parameter '{name}' is not referenced by task '{}'",
                    task.command
                )));
            }
            task.pending_params.push((name, value.into()));
        }
        Ok(task)
    }

    /// Expand a template once from fully-populated maps and return a
    /// port-less task that runs the resulting command a single time.
    ///
    /// Output placeholders are substituted with the mapped path verbatim;
    /// the atomic `.tmp` indirection only applies to streaming tasks.
    pub fn expanded(
        cmd: &str,
        in_paths: &BTreeMap<String, String>,
        out_paths: &BTreeMap<String, String>,
        params: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let command = template::expand_command(cmd, in_paths, out_paths, params)?;
        Ok(Self::bare(command))
    }

    fn bare(command: String) -> Self {
        Self {
            command,
            in_ports: BTreeMap::new(),
            out_ports: BTreeMap::new(),
            param_ports: BTreeMap::new(),
            out_path_funcs: BTreeMap::new(),
            prepend: None,
            spawn: false,
            backend: Arc::new(RealShellBackend::new()),
            pending_params: Vec::new(),
            in_paths: BTreeMap::new(),
            params: BTreeMap::new(),
        }
    }

    /// Register the out-path function for an output port.
    pub fn out_path(
        mut self,
        name: impl Into<String>,
        func: impl Fn(&PortSnapshot<'_>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.out_path_funcs.insert(name.into(), Box::new(func));
        self
    }

    /// Prefix the expanded command with `prefix` and a space.
    pub fn prepend(mut self, prefix: impl Into<String>) -> Self {
        self.prepend = Some(prefix.into());
        self
    }

    /// Run each iteration's command in its own Tokio task.
    ///
    /// Output order is preserved: iterations complete strictly FIFO, with
    /// at most [`BUFSIZE`] executions in flight.
    pub fn spawn(mut self, spawn: bool) -> Self {
        self.spawn = spawn;
        self
    }

    /// Replace the shell backend (tests use recording backends).
    pub fn backend(mut self, backend: Arc<dyn ShellBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn in_port_names(&self) -> Vec<&str> {
        self.in_ports.keys().map(String::as_str).collect()
    }

    pub fn out_port_names(&self) -> Vec<&str> {
        self.out_ports.keys().map(String::as_str).collect()
    }

    pub fn param_port_names(&self) -> Vec<&str> {
        self.param_ports.keys().map(String::as_str).collect()
    }

    /// Wire an upstream output stream into the named input port.
    ///
    /// A port not declared by the template is created on the fly, matching
    /// assignment semantics on the port map.
    pub fn connect_in(&mut self, name: impl Into<String>, rx: mpsc::Receiver<FileTarget>) {
        self.in_ports
            .entry(name.into())
            .or_insert_with(InPort::new)
            .connect(rx);
    }

    /// Wire an upstream string stream into the named parameter port.
    pub fn connect_param(&mut self, name: impl Into<String>, rx: mpsc::Receiver<String>) {
        self.param_ports
            .entry(name.into())
            .or_insert_with(InPort::new)
            .connect(rx);
    }

    /// Sender for feeding file targets into an input port manually.
    pub fn in_sender(&mut self, name: &str) -> Result<mpsc::Sender<FileTarget>> {
        match self.in_ports.get_mut(name) {
            Some(port) => port.sender().ok_or_else(|| {
                SciflowError::template(format!(
                    "input port '{name}' of task '{}' is already connected",
                    self.command
                ))
            }),
            None => Err(SciflowError::template(format!(
                "no input port '{name}' on task '{}'",
                self.command
            ))),
        }
    }

    /// Sender for feeding values into a parameter port manually.
    pub fn param_sender(&mut self, name: &str) -> Result<mpsc::Sender<String>> {
        match self.param_ports.get_mut(name) {
            Some(port) => port.sender().ok_or_else(|| {
                SciflowError::template(format!(
                    "parameter port '{name}' of task '{}' is already connected",
                    self.command
                ))
            }),
            None => Err(SciflowError::template(format!(
                "no parameter port '{name}' on task '{}'",
                self.command
            ))),
        }
    }

    /// Take the receiving half of the named output port for wiring into a
    /// downstream task.
    pub fn out_receiver(&mut self, name: &str) -> Result<mpsc::Receiver<FileTarget>> {
        match self.out_ports.get_mut(name) {
            Some(port) => port.receiver().ok_or_else(|| {
                SciflowError::template(format!(
                    "output port '{name}' of task '{}' is already connected",
                    self.command
                ))
            }),
            None => Err(SciflowError::template(format!(
                "no output port '{name}' on task '{}'",
                self.command
            ))),
        }
    }

    /// Feed queued one-shot parameters and drop the internally held sender
    /// halves so input channels can observe closure.
    async fn prepare_ports(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.pending_params);
        for (name, value) in pending {
            match self.param_ports.get_mut(&name) {
                Some(port) => {
                    port.feed(value).await;
                }
                None => {
                    return Err(SciflowError::template(format!(
                        "parameter '{name}' is not referenced by task '{}'",
                        self.command
                    )))
                }
            }
        }
        for port in self.in_ports.values_mut() {
            port.seal();
        }
        for port in self.param_ports.values_mut() {
            port.seal();
        }
        Ok(())
    }

    /// One receive phase: pull exactly one value from every input and
    /// parameter port into the iteration snapshots.
    ///
    /// Returns `Ok(false)` when any port is closed and drained, which
    /// terminates the task.
    async fn receive_inputs(&mut self) -> Result<bool> {
        for (name, port) in self.in_ports.iter_mut() {
            if !port.is_wired() {
                return Err(SciflowError::template(format!(
                    "input port '{name}' of task '{}' was never connected",
                    self.command
                )));
            }
            match port.recv().await {
                Some(target) => {
                    debug!(port = %name, path = %target.path(), "received input file");
                    self.in_paths.insert(name.clone(), target.path().to_string());
                }
                None => return Ok(false),
            }
        }
        for (name, port) in self.param_ports.iter_mut() {
            if !port.is_wired() {
                return Err(SciflowError::template(format!(
                    "parameter port '{name}' of task '{}' was never connected",
                    self.command
                )));
            }
            match port.recv().await {
                Some(value) => {
                    debug!(port = %name, value = %value, "received parameter");
                    self.params.insert(name.clone(), value);
                }
                None => return Ok(false),
            }
        }
        Ok(true)
    }

    /// Compute one [`FileTarget`] per output port from the current
    /// snapshots.
    fn plan_outputs(&self) -> Result<BTreeMap<String, FileTarget>> {
        let snapshot = PortSnapshot {
            in_paths: &self.in_paths,
            params: &self.params,
        };
        let mut outs = BTreeMap::new();
        for name in self.out_ports.keys() {
            let func = self.out_path_funcs.get(name).ok_or_else(|| {
                SciflowError::template(format!(
                    "missing out-path function for output port '{name}' of task '{}'",
                    self.command
                ))
            })?;
            let path = func(&snapshot);
            if path.is_empty() {
                return Err(SciflowError::template(format!(
                    "out-path function for output port '{name}' of task '{}' returned an empty path",
                    self.command
                )));
            }
            outs.insert(name.clone(), FileTarget::new(path));
        }
        Ok(outs)
    }

    /// Expand the template against the current snapshots. Output
    /// placeholders substitute the temporary path, so the shell writes to
    /// `<final>.tmp` and the driver atomizes after success.
    fn format_command(&self, outs: &BTreeMap<String, FileTarget>) -> Result<String> {
        let expanded = template::expand(&self.command, |ty, name| match ty {
            PortType::Input => self.in_paths.get(name).cloned(),
            PortType::Param => self.params.get(name).cloned(),
            PortType::Output => outs.get(name).map(|t| t.temp_path()),
        })
        .map_err(|missing| {
            SciflowError::template(format!("{missing} in task '{}'", self.command))
        })?;
        Ok(match &self.prepend {
            Some(prefix) => format!("{prefix} {expanded}"),
            None => expanded,
        })
    }

    fn outputs_already_exist(&self, outs: &BTreeMap<String, FileTarget>) -> bool {
        !outs.is_empty() && outs.values().all(|t| t.exists())
    }

    /// Run one iteration inline: skip when every output exists, otherwise
    /// execute the formatted command and atomize every output.
    async fn execute_iteration(&self, outs: &BTreeMap<String, FileTarget>) -> Result<()> {
        if self.outputs_already_exist(outs) {
            info!(cmd = %self.command, "all outputs exist; skipping execution");
            return Ok(());
        }
        let cmd = self.format_command(outs)?;
        self.backend.run_command(&cmd).await?;
        for target in outs.values() {
            target.atomize()?;
        }
        Ok(())
    }

    /// Emit one file target per output port.
    ///
    /// Returns `false` when a downstream receiver has been dropped; the
    /// task then stops iterating and shuts down.
    async fn send_outputs(&mut self, mut outs: BTreeMap<String, FileTarget>) -> bool {
        for (name, port) in self.out_ports.iter_mut() {
            if let Some(target) = outs.remove(name) {
                debug!(port = %name, path = %target.path(), "sending file target");
                if !port.send(target).await {
                    debug!(port = %name, cmd = %self.command, "downstream receiver dropped; stopping");
                    return false;
                }
            }
        }
        true
    }

    fn close_out_ports(&mut self) {
        for port in self.out_ports.values_mut() {
            port.close();
        }
    }

    async fn run_serial(&mut self) -> Result<()> {
        let zero_port = self.in_ports.is_empty() && self.param_ports.is_empty();
        loop {
            if !zero_port && !self.receive_inputs().await? {
                break;
            }
            let outs = self.plan_outputs()?;
            self.execute_iteration(&outs).await?;
            if !self.send_outputs(outs).await {
                break;
            }
            if zero_port {
                break;
            }
        }
        Ok(())
    }

    async fn run_spawning(&mut self) -> Result<()> {
        let zero_port = self.in_ports.is_empty() && self.param_ports.is_empty();
        let mut in_flight: VecDeque<PendingExec> = VecDeque::new();
        let mut downstream_open = true;
        loop {
            if !zero_port && !self.receive_inputs().await? {
                break;
            }
            let outs = self.plan_outputs()?;
            let handle = if self.outputs_already_exist(&outs) {
                info!(cmd = %self.command, "all outputs exist; skipping execution");
                None
            } else {
                let cmd = self.format_command(&outs)?;
                let backend = Arc::clone(&self.backend);
                Some(tokio::spawn(async move { backend.run_command(&cmd).await }))
            };
            in_flight.push_back(PendingExec { handle, outs });

            while in_flight.len() >= BUFSIZE {
                if let Some(pending) = in_flight.pop_front() {
                    if !self.complete_exec(pending).await? {
                        downstream_open = false;
                        break;
                    }
                }
            }
            if !downstream_open || zero_port {
                break;
            }
        }
        // Finish whatever is still in flight; an external shell invocation
        // runs to completion even when the downstream is gone, in which
        // case emission is simply dropped.
        while let Some(pending) = in_flight.pop_front() {
            self.complete_exec(pending).await?;
        }
        Ok(())
    }

    /// Wait for a submitted iteration, atomize its outputs, and emit them.
    async fn complete_exec(&mut self, pending: PendingExec) -> Result<bool> {
        if let Some(handle) = pending.handle {
            handle.await.map_err(anyhow::Error::from)??;
            for target in pending.outs.values() {
                target.atomize()?;
            }
        }
        Ok(self.send_outputs(pending.outs).await)
    }
}

#[async_trait]
impl Task for ShellTask {
    async fn run(mut self: Box<Self>) -> Result<()> {
        debug!(cmd = %self.command, "entering task");
        self.prepare_ports().await?;
        let result = if self.spawn {
            self.run_spawning().await
        } else {
            self.run_serial().await
        };
        self.close_out_ports();
        debug!(cmd = %self.command, "exiting task");
        result
    }

    fn untapped_outputs(&mut self) -> Vec<mpsc::Receiver<FileTarget>> {
        self.out_ports
            .values_mut()
            .filter_map(|port| port.receiver())
            .collect()
    }
}

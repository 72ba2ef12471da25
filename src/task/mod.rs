// src/task/mod.rs

//! Workflow nodes and the ports connecting them.

pub mod port;
pub mod shell;
pub mod source;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::Result;
use crate::target::FileTarget;

pub use port::{InPort, OutPort, BUFSIZE};
pub use shell::{OutPathFn, PortSnapshot, ShellTask};
pub use source::{CartesianParams, FileQueue};

/// A node in the workflow graph.
///
/// Every task runs in its own Tokio task; coordination with other nodes
/// happens exclusively through its ports. A task terminates when any of
/// its input or parameter ports closes, then closes its own output ports
/// so termination propagates downstream.
#[async_trait]
pub trait Task: Send {
    /// Drive the task to completion.
    async fn run(self: Box<Self>) -> Result<()>;

    /// Take the receiving halves of all output ports that have not been
    /// wired into a downstream task.
    ///
    /// `Pipeline::run` uses this to drain the terminal task.
    fn untapped_outputs(&mut self) -> Vec<mpsc::Receiver<FileTarget>> {
        Vec::new()
    }
}

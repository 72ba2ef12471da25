// src/lib.rs

//! Concurrent dataflow engine composing shell commands into streaming
//! task graphs.
//!
//! Tasks are nodes whose shell templates reference named input files,
//! output files, and parameters via `{i:NAME}` / `{o:NAME}` / `{p:NAME}`
//! placeholders; edges are bounded streams connecting output ports to
//! input ports. Every task runs concurrently, pulls one value from each
//! of its ports per iteration, executes the formatted command, and emits
//! file handles downstream. Outputs are materialized through an atomic
//! write protocol (`<path>.tmp` + rename), and iterations whose outputs
//! already exist on disk are skipped.

pub mod errors;
pub mod exec;
pub mod logging;
pub mod pipeline;
pub mod target;
pub mod task;
pub mod template;

pub use errors::{Result, SciflowError};
pub use exec::{RealShellBackend, ShellBackend};
pub use pipeline::Pipeline;
pub use target::FileTarget;
pub use task::{CartesianParams, FileQueue, OutPathFn, PortSnapshot, ShellTask, Task, BUFSIZE};

// src/task/source.rs

//! Source tasks: nodes that produce values without consuming inputs.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::{Result, SciflowError};
use crate::target::FileTarget;

use super::port::OutPort;
use super::Task;

/// Emits one [`FileTarget`] per configured path, in list order, then
/// closes its output port.
pub struct FileQueue {
    file_paths: Vec<String>,
    out: OutPort<FileTarget>,
}

impl FileQueue {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            file_paths: paths.into_iter().map(Into::into).collect(),
            out: OutPort::new(),
        }
    }

    /// Take the receiving half of the output port.
    pub fn receiver(&mut self) -> Result<mpsc::Receiver<FileTarget>> {
        self.out.receiver().ok_or_else(|| {
            SciflowError::template("output of file queue is already connected")
        })
    }
}

#[async_trait]
impl Task for FileQueue {
    async fn run(mut self: Box<Self>) -> Result<()> {
        for path in std::mem::take(&mut self.file_paths) {
            let target = FileTarget::new(path);
            debug!(path = %target.path(), "queueing file");
            if !self.out.send(target).await {
                break;
            }
        }
        self.out.close();
        Ok(())
    }

    fn untapped_outputs(&mut self) -> Vec<mpsc::Receiver<FileTarget>> {
        self.out.receiver().into_iter().collect()
    }
}

struct ParamAxis {
    name: String,
    values: Vec<String>,
    port: OutPort<String>,
}

/// Emits the cartesian product of its axes across N parallel parameter
/// streams.
///
/// For each combination, every axis port receives that combination's value
/// for its axis, so a downstream task pulling one value per port per
/// iteration sees the combinations positionally joined. Combinations are
/// produced in row-major order (the last axis varies fastest); sends go
/// onto bounded streams, so back-pressure throttles the generator to the
/// downstream consumption rate. All ports close after the last combination.
pub struct CartesianParams {
    axes: Vec<ParamAxis>,
}

impl CartesianParams {
    pub fn new<S, V>(axes: Vec<(S, Vec<V>)>) -> Self
    where
        S: Into<String>,
        V: Into<String>,
    {
        Self {
            axes: axes
                .into_iter()
                .map(|(name, values)| ParamAxis {
                    name: name.into(),
                    values: values.into_iter().map(Into::into).collect(),
                    port: OutPort::new(),
                })
                .collect(),
        }
    }

    /// Take the receiving half of the named axis port.
    pub fn receiver(&mut self, name: &str) -> Result<mpsc::Receiver<String>> {
        match self.axes.iter_mut().find(|a| a.name == name) {
            Some(axis) => axis.port.receiver().ok_or_else(|| {
                SciflowError::template(format!(
                    "parameter axis '{name}' is already connected"
                ))
            }),
            None => Err(SciflowError::template(format!(
                "no parameter axis '{name}'"
            ))),
        }
    }
}

/// Step the odometer; returns `false` once every combination was visited.
fn advance(idx: &mut [usize], axes: &[ParamAxis]) -> bool {
    for k in (0..idx.len()).rev() {
        idx[k] += 1;
        if idx[k] < axes[k].values.len() {
            return true;
        }
        idx[k] = 0;
    }
    false
}

#[async_trait]
impl Task for CartesianParams {
    async fn run(mut self: Box<Self>) -> Result<()> {
        let empty = self.axes.is_empty() || self.axes.iter().any(|a| a.values.is_empty());
        if !empty {
            let mut idx = vec![0usize; self.axes.len()];
            'emit: loop {
                for (k, axis) in self.axes.iter_mut().enumerate() {
                    let value = axis.values[idx[k]].clone();
                    debug!(axis = %axis.name, value = %value, "sending parameter");
                    if !axis.port.send(value).await {
                        break 'emit;
                    }
                }
                if !advance(&mut idx, &self.axes) {
                    break;
                }
            }
        }
        for axis in &mut self.axes {
            axis.port.close();
        }
        Ok(())
    }
}

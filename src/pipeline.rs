// src/pipeline.rs

//! Running a set of tasks to completion.

use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::errors::{Result, SciflowError};
use crate::task::Task;

/// A container that owns a set of tasks, starts them concurrently, and
/// blocks until the terminal task drains.
///
/// Tasks are added in dependency order; the terminal task is the last one
/// added. `run` consumes the pipeline; tasks are not reusable across runs.
pub struct Pipeline {
    tasks: Vec<Box<dyn Task>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Append a task. Wiring between tasks is the caller's responsibility
    /// and must happen before the pipeline runs.
    pub fn add_task(&mut self, task: impl Task + 'static) {
        self.tasks.push(Box::new(task));
    }

    /// Start every task concurrently, drain the output ports of the last
    /// added task until they close, then wait for every task to finish.
    ///
    /// Every task is allowed to wind down naturally before the run
    /// returns; a shell invocation already in flight runs to completion
    /// even when a sibling task has failed. The first task error is
    /// returned once everything has stopped.
    pub async fn run(mut self) -> Result<()> {
        if self.tasks.is_empty() {
            return Ok(());
        }

        // Terminal task = last added; take whatever output ports were not
        // wired into a downstream so its sends cannot stall.
        let drains = match self.tasks.last_mut() {
            Some(task) => task.untapped_outputs(),
            None => Vec::new(),
        };

        info!(tasks = self.tasks.len(), "starting pipeline");

        let mut set = JoinSet::new();
        for task in self.tasks {
            set.spawn(task.run());
        }

        // Drain every terminal port concurrently. Draining one port at a
        // time can wedge the terminal task once a sibling port's buffer
        // fills, and that port would then never close.
        let mut drain_handles = Vec::new();
        for mut rx in drains {
            drain_handles.push(tokio::spawn(async move {
                while let Some(target) = rx.recv().await {
                    debug!(path = %target.path(), "drained terminal output");
                }
            }));
        }

        let mut first_err = None;
        while let Some(joined) = set.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(join_err) => Err(SciflowError::Other(anyhow::Error::from(join_err))),
            };
            if let Err(err) = result {
                error!(error = %err, "task failed");
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }

        for handle in drain_handles {
            let _ = handle.await;
        }

        match first_err {
            Some(err) => Err(err),
            None => {
                info!("pipeline finished");
                Ok(())
            }
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stuck-task detection
//!
//! A Running task whose last observed progress or log update is older than
//! the threshold is force-interrupted with a timeout message and its slot
//! released. The sweep is cooperative repair only; an unobservable
//! in-flight handler call is left to finish into a discarded late result.

use crate::error::EngineError;
use crate::supervisor::Supervisor;
use drover_core::{Clock, IdGen, TaskId, TaskStatus, TaskStore};
use std::sync::Arc;
use std::time::Duration;

pub struct Sweeper<C: Clock, I: IdGen> {
    tasks: Arc<dyn TaskStore>,
    supervisor: Supervisor<C, I>,
    clock: C,
}

impl<C: Clock + 'static, I: IdGen + 'static> Sweeper<C, I> {
    pub fn new(tasks: Arc<dyn TaskStore>, supervisor: Supervisor<C, I>, clock: C) -> Self {
        Self {
            tasks,
            supervisor,
            clock,
        }
    }

    /// Interrupt every Running task idle for at least `since`.
    ///
    /// Returns the repaired task ids. Paused tasks are exempt: an operator
    /// chose that state.
    pub fn sweep(&self, since: Duration) -> Result<Vec<TaskId>, EngineError> {
        let mut repaired = Vec::new();
        for task in self.tasks.list_tasks(None)? {
            if task.status != TaskStatus::Running {
                continue;
            }
            // Unknown idle age (freshly restored record) is left alone
            let stale = task.idle_for(&self.clock).is_some_and(|idle| idle >= since);
            if !stale {
                continue;
            }
            let reason = format!("no activity for {}", humantime::format_duration(since));
            self.supervisor.force_interrupt(&task.id, reason)?;
            repaired.push(task.id);
        }
        if !repaired.is_empty() {
            tracing::info!(count = repaired.len(), "stuck tasks interrupted");
        }
        Ok(repaired)
    }
}

#[cfg(test)]
#[path = "sweeper_tests.rs"]
mod tests;

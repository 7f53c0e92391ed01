// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service surface over the engine
//!
//! One struct bundles job/task CRUD, operator control, event intake, and
//! the timer loop's poll entry points. Embedders own the transport; every
//! operation here is a plain method call.

use crate::protocol::{JobListFilter, JobView, TaskDeleteRequest};
use chrono::{DateTime, Utc};
use drover_core::{
    Clock, ControlError, CtrlAction, CtrlCommand, CtrlResponse, Event, EventBus, FiringKind,
    IdGen, Job, JobId, JobStore, JobTriggerSignal, ScheduleError, StoreError, Task, TaskId,
    TaskStatus, TaskStore,
};
use drover_engine::{EngineError, JobTimers, Supervisor, Sweeper};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by service operations
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Control(#[from] ControlError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("invalid job configuration: {0}")]
    Configuration(#[from] ScheduleError),
}

/// The orchestration service: job registry, task records, operator
/// control, event intake, and scheduled firing.
pub struct Service<C: Clock + 'static, I: IdGen + 'static> {
    jobs: Arc<dyn JobStore>,
    tasks: Arc<dyn TaskStore>,
    supervisor: Supervisor<C, I>,
    sweeper: Sweeper<C, I>,
    timers: Mutex<JobTimers>,
    bus: EventBus,
    clock: C,
}

impl<C: Clock + 'static, I: IdGen + 'static> Service<C, I> {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        tasks: Arc<dyn TaskStore>,
        bus: EventBus,
        supervisor: Supervisor<C, I>,
        sweeper: Sweeper<C, I>,
        clock: C,
    ) -> Self {
        Self {
            jobs,
            tasks,
            supervisor,
            sweeper,
            timers: Mutex::new(JobTimers::new()),
            bus,
            clock,
        }
    }

    /// Register or replace a job definition.
    ///
    /// The schedule is validated before anything is persisted, the timer
    /// is re-armed from the new definition, and an auto-start job fires
    /// immediately. Returns the auto-start task id when one was created.
    pub fn put_job(&self, job: &Job) -> Result<Option<TaskId>, ServiceError> {
        if let Some(schedule) = &job.schedule {
            schedule.parse()?;
        }
        self.jobs.put_job(job)?;
        self.bus.publish(Event::JobChanged {
            id: job.id.clone(),
        });

        let now = self.clock.now_utc();
        self.lock_timers().arm(job, now)?;
        tracing::debug!(job = %job.id, "job registered");

        if job.auto_start && !job.inactive {
            let task_id = self.supervisor.fire(&job.id, FiringKind::AutoStart, None)?;
            return Ok(Some(task_id));
        }
        Ok(None)
    }

    pub fn get_job(&self, id: &JobId) -> Result<Job, ServiceError> {
        Ok(self.jobs.get_job(id)?)
    }

    /// List jobs matching the filter, each with a window of its tasks
    pub fn list_jobs(&self, filter: &JobListFilter) -> Result<Vec<JobView>, ServiceError> {
        let mut views = Vec::new();
        for job in self.jobs.list_jobs()? {
            if !filter.matches(&job) {
                continue;
            }
            let tasks = self.tasks.list_tasks(Some(&job.id))?;
            let task_count = tasks.len();
            let window: Vec<Task> = tasks
                .into_iter()
                .skip(filter.tasks_offset)
                .take(filter.tasks_limit.unwrap_or(usize::MAX))
                .collect();
            views.push(JobView {
                job,
                tasks: window,
                task_count,
            });
        }
        Ok(views)
    }

    /// Operator control entry point.
    ///
    /// Deleting a job also disarms its timer so the heap does not keep
    /// firing a definition that no longer exists.
    pub fn control(&self, cmd: CtrlCommand) -> Result<CtrlResponse, ServiceError> {
        let deleted_job = match (cmd.action, &cmd.job_id, &cmd.task_id) {
            (CtrlAction::Delete, Some(job_id), None) => Some(job_id.clone()),
            _ => None,
        };
        let response = self.supervisor.control(cmd)?;
        if let Some(job_id) = deleted_job {
            self.lock_timers().disarm(&job_id);
        }
        Ok(response)
    }

    /// Store a task record, notifying unless the job opted out
    pub fn put_task(&self, task: &Task) -> Result<(), ServiceError> {
        self.tasks.put_task(task)?;
        let silent = self
            .jobs
            .get_job(&task.job_id)
            .map(|j| j.tasks_silent_update)
            .unwrap_or(false);
        if !silent {
            self.bus.publish(Event::TaskChanged {
                id: task.id.clone(),
                job_id: task.job_id.clone(),
            });
        }
        Ok(())
    }

    /// Store a batch of task records
    pub fn put_tasks(&self, tasks: &[Task]) -> Result<(), ServiceError> {
        for task in tasks {
            self.put_task(task)?;
        }
        Ok(())
    }

    pub fn get_task(&self, id: &TaskId) -> Result<Task, ServiceError> {
        Ok(self.tasks.get_task(id)?)
    }

    /// Tasks ordered by creation time, optionally restricted to a job
    /// and a status set
    pub fn list_tasks(
        &self,
        job_id: Option<&JobId>,
        statuses: &[TaskStatus],
    ) -> Result<Vec<Task>, ServiceError> {
        let tasks = self.tasks.list_tasks(job_id)?;
        if statuses.is_empty() {
            return Ok(tasks);
        }
        Ok(tasks
            .into_iter()
            .filter(|t| statuses.contains(&t.status))
            .collect())
    }

    /// Delete task records, returning the ids actually removed.
    ///
    /// Explicit ids are deleted one by one; a status set deletes every
    /// terminal match except the `prune_keep` most recent. Live tasks are
    /// refused here, the control surface owns stopping them.
    pub fn delete_tasks(&self, req: &TaskDeleteRequest) -> Result<Vec<TaskId>, ServiceError> {
        if !req.ids.is_empty() {
            let mut deleted = Vec::new();
            for id in &req.ids {
                let task = self.tasks.get_task(id)?;
                self.remove_record(&task)?;
                deleted.push(id.clone());
            }
            return Ok(deleted);
        }

        if req.statuses.is_empty() {
            return Ok(Vec::new());
        }
        if let Some(status) = req.statuses.iter().find(|s| !s.is_terminal()) {
            return Err(ControlError::InvalidState {
                action: CtrlAction::Delete,
                status: *status,
            }
            .into());
        }

        // The keep window holds the most recently finished records, which
        // is not creation order when runs overlap. Sort by end time, so the
        // surplus drops off the front.
        let mut matches: Vec<Task> = self
            .tasks
            .list_tasks(req.job_id.as_ref())?
            .into_iter()
            .filter(|t| req.statuses.contains(&t.status))
            .collect();
        matches.sort_by(|a, b| (a.ended_at, a.created_at).cmp(&(b.ended_at, b.created_at)));
        let keep = req.prune_keep.unwrap_or(0);
        let surplus = matches.len().saturating_sub(keep);

        let mut deleted = Vec::new();
        for task in matches.into_iter().take(surplus) {
            self.remove_record(&task)?;
            deleted.push(task.id);
        }
        Ok(deleted)
    }

    fn remove_record(&self, task: &Task) -> Result<(), ServiceError> {
        if !task.is_terminal() {
            return Err(ControlError::InvalidState {
                action: CtrlAction::Delete,
                status: task.status,
            }
            .into());
        }
        self.tasks.delete_task(&task.id)?;
        self.bus.publish(Event::TaskRemoved {
            id: task.id.clone(),
            job_id: task.job_id.clone(),
        });
        Ok(())
    }

    /// Force-interrupt running tasks with no activity for `since`,
    /// returning the repaired ids
    pub fn detect_stuck_tasks(&self, since: Duration) -> Result<Vec<TaskId>, ServiceError> {
        Ok(self.sweeper.sweep(since)?)
    }

    /// Fire every active job listening for the named event
    pub fn emit_event(
        &self,
        name: &str,
        payload: serde_json::Value,
    ) -> Result<Vec<TaskId>, ServiceError> {
        Ok(self.supervisor.handle_event(name, payload)?)
    }

    /// Fire one job from an explicit trigger signal
    pub fn trigger(&self, signal: &JobTriggerSignal) -> Result<TaskId, ServiceError> {
        Ok(self.supervisor.handle_trigger(signal)?)
    }

    /// Arm timers for every scheduled job in the store, for startup
    /// recovery. Returns how many jobs ended up armed.
    pub fn rearm_timers(&self) -> Result<usize, ServiceError> {
        let now = self.clock.now_utc();
        let mut timers = self.lock_timers();
        for job in self.jobs.list_jobs()? {
            if job.schedule.is_some() {
                timers.arm(&job, now)?;
            }
        }
        Ok(timers.armed_count())
    }

    /// Next instant any timer is due, for the caller's sleep loop
    pub fn next_timer_due(&self) -> Option<DateTime<Utc>> {
        self.lock_timers().next_due()
    }

    /// Drain due timers and fire their jobs.
    ///
    /// A job gone inactive or deleted since arming is skipped; deletion
    /// also disarms it.
    pub fn poll_timers(&self, now: DateTime<Utc>) -> Result<Vec<TaskId>, ServiceError> {
        let signals = self.lock_timers().poll(now);
        let mut fired = Vec::new();
        for signal in signals {
            match self.supervisor.handle_trigger(&signal) {
                Ok(task_id) => fired.push(task_id),
                Err(EngineError::JobInactive(id)) => {
                    tracing::debug!(job = %id, "skipping timer firing for inactive job");
                }
                Err(EngineError::Store(StoreError::NotFound { .. })) => {
                    self.lock_timers().disarm(&signal.job_id);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(fired)
    }

    fn lock_timers(&self) -> MutexGuard<'_, JobTimers> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;

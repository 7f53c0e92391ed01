// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task supervision and admission control
//!
//! The supervisor owns the live-task registry: for every Running or Paused
//! task it holds the control channel into the executor, and per job it
//! tracks the slot count plus the queue of firings waiting for one. The
//! slot counter mutates under the same lock as the registry, so admission
//! decisions are atomic with the state transitions they cause. Firings for
//! a full job queue FIFO; finishing a task promotes the oldest queued one.

use crate::error::EngineError;
use crate::executor::{ChainExecutor, ChainStatus, ExecContext, ExecUpdate, Progress, RunSignal};
use drover_core::{
    ActionMessage, Clock, ControlError, CtrlAction, CtrlCommand, CtrlResponse, Effect, Event,
    EventBus, FiringKind, IdGen, Job, JobId, JobStore, JobTriggerSignal, Task, TaskEvent, TaskId,
    TaskStatus, TaskStore,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};

/// Engine-wide tunables
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineConfig {
    /// Per-job concurrency for jobs that set none; 0 = unbounded
    pub default_concurrency: usize,
}

/// Decides whether an owner may run a control command against a job
pub trait Authorizer: Send + Sync {
    fn allow(&self, owner: &str, action: CtrlAction, job_owner: &str) -> bool;
}

/// Permits everything; the default for embedded use
pub struct AllowAll;

impl Authorizer for AllowAll {
    fn allow(&self, _owner: &str, _action: CtrlAction, _job_owner: &str) -> bool {
        true
    }
}

/// Only the job's owner may issue commands
pub struct OwnerOnly;

impl Authorizer for OwnerOnly {
    fn allow(&self, owner: &str, _action: CtrlAction, job_owner: &str) -> bool {
        owner == job_owner
    }
}

/// Control channel into one live task's executor
struct RunningEntry {
    job_id: JobId,
    signal: watch::Sender<RunSignal>,
}

/// A firing waiting for a slot, with the event payload it will start with
struct QueuedFiring {
    id: TaskId,
    payload: Option<serde_json::Value>,
}

#[derive(Default)]
struct JobSlots {
    /// Running + Paused tasks currently holding a slot
    held: usize,
    queued: VecDeque<QueuedFiring>,
}

#[derive(Default)]
struct LiveState {
    running: HashMap<TaskId, RunningEntry>,
    slots: HashMap<JobId, JobSlots>,
}

/// Drives tasks through their lifecycle. Cloning shares all state.
pub struct Supervisor<C: Clock, I: IdGen> {
    jobs: Arc<dyn JobStore>,
    tasks: Arc<dyn TaskStore>,
    bus: EventBus,
    executor: ChainExecutor<C>,
    clock: C,
    ids: I,
    authorizer: Arc<dyn Authorizer>,
    config: EngineConfig,
    live: Arc<Mutex<LiveState>>,
}

impl<C: Clock, I: IdGen> Clone for Supervisor<C, I> {
    fn clone(&self) -> Self {
        Self {
            jobs: Arc::clone(&self.jobs),
            tasks: Arc::clone(&self.tasks),
            bus: self.bus.clone(),
            executor: self.executor.clone(),
            clock: self.clock.clone(),
            ids: self.ids.clone(),
            authorizer: Arc::clone(&self.authorizer),
            config: self.config,
            live: Arc::clone(&self.live),
        }
    }
}

impl<C: Clock + 'static, I: IdGen + 'static> Supervisor<C, I> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: Arc<dyn JobStore>,
        tasks: Arc<dyn TaskStore>,
        bus: EventBus,
        executor: ChainExecutor<C>,
        clock: C,
        ids: I,
        authorizer: Arc<dyn Authorizer>,
        config: EngineConfig,
    ) -> Self {
        Self {
            jobs,
            tasks,
            bus,
            executor,
            clock,
            ids,
            authorizer,
            config,
            live: Arc::new(Mutex::new(LiveState::default())),
        }
    }

    /// Fire a job: create a Queued task and admit it or queue the firing.
    ///
    /// Inactive jobs refuse every firing except an explicit run-once.
    pub fn fire(
        &self,
        job_id: &JobId,
        fired_by: FiringKind,
        payload: Option<serde_json::Value>,
    ) -> Result<TaskId, EngineError> {
        let job = self.jobs.get_job(job_id)?;
        let run_now = matches!(fired_by, FiringKind::RunOnce);
        if job.inactive && !run_now {
            return Err(EngineError::JobInactive(job.id));
        }

        let task_id = TaskId::from(self.ids.next());
        let task = Task::new(
            task_id.clone(),
            job.id.clone(),
            &job.owner,
            fired_by,
            &self.clock,
        );
        self.tasks.put_task(&task)?;
        self.bus.publish(Event::TaskQueued {
            id: task_id.clone(),
            job_id: job.id.clone(),
        });
        self.bus.publish(Event::JobTriggered {
            id: job.id.clone(),
            run_now,
        });

        self.admit_or_queue(&job, task, payload)?;
        Ok(task_id)
    }

    /// A timer firing for a scheduled job
    pub fn handle_trigger(&self, signal: &JobTriggerSignal) -> Result<TaskId, EngineError> {
        let fired_by = if signal.run_now {
            FiringKind::RunOnce
        } else {
            FiringKind::Schedule
        };
        self.fire(&signal.job_id, fired_by, None)
    }

    /// Fire every active job listening for the named event.
    ///
    /// Each listening job fires independently under its own admission
    /// control; simultaneous event and schedule firings are not coalesced.
    pub fn handle_event(
        &self,
        name: &str,
        payload: serde_json::Value,
    ) -> Result<Vec<TaskId>, EngineError> {
        let mut fired = Vec::new();
        for job in self.jobs.list_jobs()? {
            if job.inactive || !job.listens_for(name) {
                continue;
            }
            let task_id = self.fire(
                &job.id,
                FiringKind::Event {
                    name: name.to_string(),
                },
                Some(payload.clone()),
            )?;
            fired.push(task_id);
        }
        Ok(fired)
    }

    /// Operator control entry point
    pub fn control(&self, cmd: CtrlCommand) -> Result<CtrlResponse, ControlError> {
        match cmd.action {
            CtrlAction::Pause | CtrlAction::Resume | CtrlAction::Stop => {
                let task_id = cmd.task_id.clone().ok_or(ControlError::MissingTarget {
                    action: cmd.action,
                    required: "task",
                })?;
                self.task_command(&cmd, &task_id)
            }
            CtrlAction::Delete => {
                if let Some(task_id) = cmd.task_id.clone() {
                    self.delete_task_cmd(&cmd, &task_id)
                } else if let Some(job_id) = cmd.job_id.clone() {
                    self.delete_job_cmd(&cmd, &job_id)
                } else {
                    Err(ControlError::MissingTarget {
                        action: cmd.action,
                        required: "job or task",
                    })
                }
            }
            CtrlAction::RunOnce | CtrlAction::Inactive | CtrlAction::Active => {
                let job_id = cmd.job_id.clone().ok_or(ControlError::MissingTarget {
                    action: cmd.action,
                    required: "job",
                })?;
                self.job_command(&cmd, &job_id)
            }
        }
    }

    /// Force-interrupt a stale task, used by the stuck-task sweep
    pub fn force_interrupt(
        &self,
        task_id: &TaskId,
        reason: impl Into<String>,
    ) -> Result<(), EngineError> {
        let task = self.tasks.get_task(task_id)?;
        if !task.status.holds_slot() {
            return Err(EngineError::TaskNotRunning(task_id.clone()));
        }
        let reason = reason.into();
        tracing::warn!(task = %task_id, reason = %reason, "force interrupting task");
        self.signal(task_id, RunSignal::Stop);
        self.transition_task(task_id, TaskEvent::ForceInterrupt { reason })?;
        self.release_slot(task_id);
        Ok(())
    }

    /// Slots currently held (Running + Paused) for a job
    pub fn held_slots(&self, job_id: &JobId) -> usize {
        let live = self.lock_live();
        live.slots.get(job_id).map_or(0, |s| s.held)
    }

    /// Firings waiting for a slot on a job
    pub fn queued_firings(&self, job_id: &JobId) -> usize {
        let live = self.lock_live();
        live.slots.get(job_id).map_or(0, |s| s.queued.len())
    }

    fn task_command(&self, cmd: &CtrlCommand, task_id: &TaskId) -> Result<CtrlResponse, ControlError> {
        let task = self.tasks.get_task(task_id)?;
        let job = self.jobs.get_job(&task.job_id)?;
        self.authorize(cmd, &job)?;

        let invalid = || ControlError::InvalidState {
            action: cmd.action,
            status: task.status,
        };

        match cmd.action {
            CtrlAction::Pause => {
                if task.status != TaskStatus::Running || !task.can_pause {
                    return Err(invalid());
                }
                self.signal(task_id, RunSignal::Pause);
                self.transition_task(task_id, TaskEvent::Pause)?;
                Ok(CtrlResponse::new(format!("task {} paused", task_id)))
            }
            CtrlAction::Resume => {
                if task.status != TaskStatus::Paused {
                    return Err(invalid());
                }
                self.signal(task_id, RunSignal::Run);
                self.transition_task(task_id, TaskEvent::Resume)?;
                Ok(CtrlResponse::new(format!("task {} resumed", task_id)))
            }
            CtrlAction::Stop => {
                self.stop_task(&task)?;
                Ok(CtrlResponse::new(format!("task {} stopped", task_id)))
            }
            _ => Err(invalid()),
        }
    }

    /// Stop a Queued, Running or Paused task, releasing its slot if held
    fn stop_task(&self, task: &Task) -> Result<(), ControlError> {
        let invalid = ControlError::InvalidState {
            action: CtrlAction::Stop,
            status: task.status,
        };
        let stop = TaskEvent::Stop {
            reason: "stopped by operator".to_string(),
        };
        match task.status {
            TaskStatus::Queued => {
                self.remove_queued(&task.job_id, &task.id);
                self.transition_task(&task.id, stop)?;
                Ok(())
            }
            TaskStatus::Running if !task.can_stop => Err(invalid),
            TaskStatus::Running | TaskStatus::Paused => {
                self.signal(&task.id, RunSignal::Stop);
                self.transition_task(&task.id, stop)?;
                self.release_slot(&task.id);
                Ok(())
            }
            _ => Err(invalid),
        }
    }

    fn delete_task_cmd(&self, cmd: &CtrlCommand, task_id: &TaskId) -> Result<CtrlResponse, ControlError> {
        let task = self.tasks.get_task(task_id)?;
        let job = self.jobs.get_job(&task.job_id)?;
        self.authorize(cmd, &job)?;

        if !task.is_terminal() {
            if !cmd.force {
                return Err(ControlError::InvalidState {
                    action: CtrlAction::Delete,
                    status: task.status,
                });
            }
            self.stop_task(&task)?;
        }

        self.tasks.delete_task(task_id)?;
        self.bus.publish(Event::TaskRemoved {
            id: task_id.clone(),
            job_id: task.job_id.clone(),
        });
        Ok(CtrlResponse::new(format!("task {} deleted", task_id)))
    }

    /// Delete a job and every one of its tasks. Live tasks refuse the
    /// deletion unless the command is forced, which stops them first.
    fn delete_job_cmd(&self, cmd: &CtrlCommand, job_id: &JobId) -> Result<CtrlResponse, ControlError> {
        let job = self.jobs.get_job(job_id)?;
        self.authorize(cmd, &job)?;

        let tasks = self.tasks.list_tasks(Some(job_id))?;
        for task in &tasks {
            if !task.is_terminal() {
                if !cmd.force {
                    return Err(ControlError::InvalidState {
                        action: CtrlAction::Delete,
                        status: task.status,
                    });
                }
                self.stop_task(task)?;
            }
        }
        for task in &tasks {
            self.tasks.delete_task(&task.id)?;
        }
        self.jobs.delete_job(job_id)?;
        self.lock_live().slots.remove(job_id);
        self.bus.publish(Event::JobRemoved { id: job_id.clone() });
        Ok(CtrlResponse::new(format!("job {} deleted", job_id)))
    }

    fn job_command(&self, cmd: &CtrlCommand, job_id: &JobId) -> Result<CtrlResponse, ControlError> {
        let mut job = self.jobs.get_job(job_id)?;
        self.authorize(cmd, &job)?;

        match cmd.action {
            CtrlAction::RunOnce => {
                let task_id = self
                    .fire(job_id, FiringKind::RunOnce, None)
                    .map_err(|e| match e {
                        EngineError::Store(e) => ControlError::from(e),
                        other => ControlError::Storage(other.to_string()),
                    })?;
                Ok(CtrlResponse::new(format!("task {} queued", task_id)))
            }
            CtrlAction::Inactive | CtrlAction::Active => {
                job.inactive = cmd.action == CtrlAction::Inactive;
                self.jobs.put_job(&job)?;
                self.bus.publish(Event::JobChanged { id: job.id.clone() });
                let state = if job.inactive { "inactive" } else { "active" };
                Ok(CtrlResponse::new(format!("job {} is now {}", job_id, state)))
            }
            _ => Err(ControlError::MissingTarget {
                action: cmd.action,
                required: "task",
            }),
        }
    }

    fn authorize(&self, cmd: &CtrlCommand, job: &Job) -> Result<(), ControlError> {
        if self.authorizer.allow(&cmd.owner, cmd.action, &job.owner) {
            Ok(())
        } else {
            Err(ControlError::Permission {
                owner: cmd.owner.clone(),
                action: cmd.action,
            })
        }
    }

    /// Take a slot and start, or queue the firing when the job is full
    fn admit_or_queue(
        &self,
        job: &Job,
        task: Task,
        payload: Option<serde_json::Value>,
    ) -> Result<(), EngineError> {
        let limit = job.concurrency_limit(self.config.default_concurrency);
        let admitted = {
            let mut live = self.lock_live();
            let slots = live.slots.entry(job.id.clone()).or_default();
            if limit.is_none_or(|n| slots.held < n) {
                slots.held += 1;
                true
            } else {
                slots.queued.push_back(QueuedFiring {
                    id: task.id.clone(),
                    payload: payload.clone(),
                });
                false
            }
        };

        if admitted {
            self.start_task(job, task, payload)
        } else {
            tracing::debug!(task = %task.id, job = %job.id, "job at capacity, firing queued");
            Ok(())
        }
    }

    /// Transition Queued -> Running and launch the chain. The caller has
    /// already taken the slot.
    fn start_task(
        &self,
        job: &Job,
        task: Task,
        payload: Option<serde_json::Value>,
    ) -> Result<(), EngineError> {
        let task = self.transition_task(&task.id, TaskEvent::Start)?;

        let (signal_tx, signal_rx) = watch::channel(RunSignal::Run);
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        {
            let mut live = self.lock_live();
            live.running.insert(
                task.id.clone(),
                RunningEntry {
                    job_id: job.id.clone(),
                    signal: signal_tx,
                },
            );
        }

        let ctx = ExecContext {
            signal: signal_rx,
            progress: Arc::new(Progress::default()),
            updates: update_tx,
        };
        let mut message = ActionMessage::new();
        if let Some(payload) = payload {
            message = message.with_event(payload);
        }

        tracing::info!(task = %task.id, job = %job.id, "task started");

        let sup = self.clone();
        let exec = self.executor.clone();
        let arena = Arc::new(job.actions.clone());
        let task_id = task.id.clone();
        let silent = job.tasks_silent_update;
        tokio::spawn(async move {
            let pump = {
                let sup = sup.clone();
                let id = task_id.clone();
                tokio::spawn(async move { sup.pump_updates(id, silent, update_rx).await })
            };
            let status = exec.execute(arena, message, ctx).await;
            // Every update sender is gone once the chain returns; wait for
            // the pump to apply the tail before settling the task
            let _ = pump.await;
            sup.finalize(&task_id, status);
        });
        Ok(())
    }

    /// Apply executor updates (logs, progress) to the task record
    async fn pump_updates(
        &self,
        task_id: TaskId,
        silent: bool,
        mut updates: mpsc::UnboundedReceiver<ExecUpdate>,
    ) {
        while let Some(update) = updates.recv().await {
            let event = match update {
                ExecUpdate::Log(log) => TaskEvent::LogAppended { log },
                ExecUpdate::Progress(ratio) => TaskEvent::Progress { ratio },
            };
            let Ok(next) = self.transition_task(&task_id, event) else {
                return;
            };
            if !silent {
                self.bus.publish(Event::TaskChanged {
                    id: next.id.clone(),
                    job_id: next.job_id.clone(),
                });
            }
        }
    }

    /// Settle the task when its chain ends and hand the slot on
    fn finalize(&self, task_id: &TaskId, status: ChainStatus) {
        let event = match status {
            ChainStatus::Completed => TaskEvent::Complete {
                message: "completed".to_string(),
            },
            ChainStatus::Failed => TaskEvent::Fail {
                reason: "action chain failed".to_string(),
            },
            ChainStatus::Stopped => TaskEvent::Stop {
                reason: "stopped".to_string(),
            },
        };
        // On a record already settled by an operator or the sweeper the
        // transition is a no-op
        match self.transition_task(task_id, event) {
            Ok(task) => self.auto_clean(&task.job_id, task_id),
            Err(e) => {
                tracing::warn!(task = %task_id, error = %e, "failed to settle task record");
            }
        }
        self.release_slot(task_id);
    }

    /// Drop the settled record right away when the job asks for it
    fn auto_clean(&self, job_id: &JobId, task_id: &TaskId) {
        let cleans = self
            .jobs
            .get_job(job_id)
            .map(|j| j.auto_clean)
            .unwrap_or(false);
        if cleans && self.tasks.delete_task(task_id).is_ok() {
            self.bus.publish(Event::TaskRemoved {
                id: task_id.clone(),
                job_id: job_id.clone(),
            });
        }
    }

    /// Idempotent: only the first caller for a task actually frees the slot
    fn release_slot(&self, task_id: &TaskId) {
        let job_id = {
            let mut live = self.lock_live();
            let Some(entry) = live.running.remove(task_id) else {
                return;
            };
            if let Some(slots) = live.slots.get_mut(&entry.job_id) {
                slots.held = slots.held.saturating_sub(1);
            }
            entry.job_id
        };
        self.promote_next(&job_id);
    }

    /// Start the oldest queued firing that still has a Queued task
    fn promote_next(&self, job_id: &JobId) {
        let Ok(job) = self.jobs.get_job(job_id) else {
            return;
        };
        let limit = job.concurrency_limit(self.config.default_concurrency);
        loop {
            let queued = {
                let mut live = self.lock_live();
                let Some(slots) = live.slots.get_mut(job_id) else {
                    return;
                };
                if limit.is_some_and(|n| slots.held >= n) {
                    return;
                }
                let Some(queued) = slots.queued.pop_front() else {
                    return;
                };
                slots.held += 1;
                queued
            };

            match self.tasks.get_task(&queued.id) {
                Ok(task) if task.is_queued() => {
                    if self.start_task(&job, task, queued.payload).is_ok() {
                        return;
                    }
                    self.give_back_slot(job_id);
                }
                // Deleted or already settled; slot goes to the next in line
                _ => self.give_back_slot(job_id),
            }
        }
    }

    fn give_back_slot(&self, job_id: &JobId) {
        let mut live = self.lock_live();
        if let Some(slots) = live.slots.get_mut(job_id) {
            slots.held = slots.held.saturating_sub(1);
        }
    }

    fn remove_queued(&self, job_id: &JobId, task_id: &TaskId) {
        let mut live = self.lock_live();
        if let Some(slots) = live.slots.get_mut(job_id) {
            slots.queued.retain(|q| &q.id != task_id);
        }
    }

    fn signal(&self, task_id: &TaskId, signal: RunSignal) {
        let live = self.lock_live();
        if let Some(entry) = live.running.get(task_id) {
            let _ = entry.signal.send(signal);
        }
    }

    /// Read-modify-write of one task record, serialized under the live
    /// lock so concurrent transitions never apply a stale snapshot.
    fn transition_task(
        &self,
        task_id: &TaskId,
        event: TaskEvent,
    ) -> Result<Task, drover_core::StoreError> {
        let _live = self.lock_live();
        let task = self.tasks.get_task(task_id)?;
        let (next, effects) = task.transition(event, &self.clock);
        self.apply(&next, effects)?;
        Ok(next)
    }

    fn apply(&self, task: &Task, effects: Vec<Effect>) -> Result<(), drover_core::StoreError> {
        for effect in effects {
            match effect {
                Effect::SaveTask { .. } => self.tasks.put_task(task)?,
                Effect::Emit(event) => self.bus.publish(event),
            }
        }
        Ok(())
    }

    fn lock_live(&self) -> std::sync::MutexGuard<'_, LiveState> {
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task state machine
//!
//! A task is one execution instance of a job (or of a run-once command).
//! The transition table is pure: control validation and concurrency
//! accounting live in the engine supervisor, which drives this machine and
//! executes the returned effects.

use crate::action::ActionLog;
use crate::clock::Clock;
use crate::effect::{Effect, Event};
use crate::job::JobId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

/// Unique identifier for a task
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        TaskId(s)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        TaskId(s.to_string())
    }
}

/// The lifecycle status of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    /// Waiting for a concurrency slot
    Queued,
    Running,
    Paused,
    Finished,
    Error,
    Interrupted,
}

impl TaskStatus {
    /// Finished, Error and Interrupted are terminal
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Finished | TaskStatus::Error | TaskStatus::Interrupted
        )
    }

    /// Running and Paused hold a concurrency slot
    pub fn holds_slot(&self) -> bool {
        matches!(self, TaskStatus::Running | TaskStatus::Paused)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
            TaskStatus::Paused => "paused",
            TaskStatus::Finished => "finished",
            TaskStatus::Error => "error",
            TaskStatus::Interrupted => "interrupted",
        };
        write!(f, "{}", s)
    }
}

/// What fired the task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FiringKind {
    Event { name: String },
    Schedule,
    AutoStart,
    RunOnce,
}

/// Events that can change task state
#[derive(Clone, Debug)]
pub enum TaskEvent {
    /// Concurrency slot granted, begin execution
    Start,
    /// Operator paused execution
    Pause,
    /// Operator resumed execution
    Resume,
    /// Cooperative stop requested and observed
    Stop { reason: String },
    /// All branches completed without unhandled failure
    Complete { message: String },
    /// A branch ended in unhandled failure
    Fail { reason: String },
    /// Executor reported progress
    Progress { ratio: f32 },
    /// Executor appended an action log entry
    LogAppended { log: ActionLog },
    /// Stuck-task sweep forced an interruption
    ForceInterrupt { reason: String },
}

/// One execution instance of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub job_id: JobId,
    /// Owner of the job at firing time, for audit
    pub owner: String,
    pub fired_by: FiringKind,
    pub status: TaskStatus,
    pub status_message: String,
    pub can_stop: bool,
    pub can_pause: bool,
    pub has_progress: bool,
    /// Progress ratio in [0, 1], meaningful when `has_progress`
    pub progress: f32,
    pub action_logs: Vec<ActionLog>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Last observed progress/log update, for stuck detection
    #[serde(skip, default)]
    pub last_activity: Option<Instant>,
}

impl Task {
    /// Create a new task in the Queued state
    pub fn new(
        id: impl Into<TaskId>,
        job_id: JobId,
        owner: impl Into<String>,
        fired_by: FiringKind,
        clock: &impl Clock,
    ) -> Self {
        Task {
            id: id.into(),
            job_id,
            owner: owner.into(),
            fired_by,
            status: TaskStatus::Queued,
            status_message: String::new(),
            can_stop: true,
            can_pause: true,
            has_progress: true,
            progress: 0.0,
            action_logs: Vec::new(),
            created_at: clock.now_utc(),
            started_at: None,
            ended_at: None,
            last_activity: Some(clock.now()),
        }
    }

    /// Pure transition function - returns new state and effects
    pub fn transition(&self, event: TaskEvent, clock: &impl Clock) -> (Task, Vec<Effect>) {
        match (&self.status, event) {
            // Queued -> Running (slot granted)
            (TaskStatus::Queued, TaskEvent::Start) => {
                let task = Task {
                    status: TaskStatus::Running,
                    status_message: "running".to_string(),
                    started_at: Some(clock.now_utc()),
                    last_activity: Some(clock.now()),
                    ..self.clone()
                };
                let effects = vec![
                    Effect::SaveTask {
                        id: self.id.clone(),
                    },
                    Effect::Emit(Event::TaskStarted {
                        id: self.id.clone(),
                        job_id: self.job_id.clone(),
                    }),
                ];
                (task, effects)
            }

            // Running -> Paused
            (TaskStatus::Running, TaskEvent::Pause) => {
                let task = Task {
                    status: TaskStatus::Paused,
                    status_message: "paused".to_string(),
                    ..self.clone()
                };
                let effects = vec![
                    Effect::SaveTask {
                        id: self.id.clone(),
                    },
                    Effect::Emit(Event::TaskPaused {
                        id: self.id.clone(),
                    }),
                ];
                (task, effects)
            }

            // Paused -> Running
            (TaskStatus::Paused, TaskEvent::Resume) => {
                let task = Task {
                    status: TaskStatus::Running,
                    status_message: "running".to_string(),
                    last_activity: Some(clock.now()),
                    ..self.clone()
                };
                let effects = vec![
                    Effect::SaveTask {
                        id: self.id.clone(),
                    },
                    Effect::Emit(Event::TaskResumed {
                        id: self.id.clone(),
                    }),
                ];
                (task, effects)
            }

            // Queued/Running/Paused -> Interrupted
            (
                TaskStatus::Queued | TaskStatus::Running | TaskStatus::Paused,
                TaskEvent::Stop { reason },
            ) => self.interrupt(reason, clock),

            // Running -> Finished
            (TaskStatus::Running, TaskEvent::Complete { message }) => {
                let task = Task {
                    status: TaskStatus::Finished,
                    status_message: message,
                    progress: 1.0,
                    ended_at: Some(clock.now_utc()),
                    ..self.clone()
                };
                let effects = vec![
                    Effect::SaveTask {
                        id: self.id.clone(),
                    },
                    Effect::Emit(Event::TaskFinished {
                        id: self.id.clone(),
                        job_id: self.job_id.clone(),
                    }),
                ];
                (task, effects)
            }

            // Running -> Error
            (TaskStatus::Running, TaskEvent::Fail { reason }) => {
                let task = Task {
                    status: TaskStatus::Error,
                    status_message: reason.clone(),
                    ended_at: Some(clock.now_utc()),
                    ..self.clone()
                };
                let effects = vec![
                    Effect::SaveTask {
                        id: self.id.clone(),
                    },
                    Effect::Emit(Event::TaskFailed {
                        id: self.id.clone(),
                        job_id: self.job_id.clone(),
                        reason,
                    }),
                ];
                (task, effects)
            }

            // Progress updates refresh the activity timestamp
            (TaskStatus::Running, TaskEvent::Progress { ratio }) => {
                let task = Task {
                    progress: ratio.clamp(0.0, 1.0),
                    last_activity: Some(clock.now()),
                    ..self.clone()
                };
                let effects = vec![Effect::SaveTask {
                    id: self.id.clone(),
                }];
                (task, effects)
            }

            // Log entries land even while paused or after a stop was
            // requested - a late result is discarded except for logging
            (
                TaskStatus::Running | TaskStatus::Paused | TaskStatus::Interrupted,
                TaskEvent::LogAppended { log },
            ) => {
                let mut task = self.clone();
                task.action_logs.push(log);
                if !self.status.is_terminal() {
                    task.last_activity = Some(clock.now());
                }
                let effects = vec![Effect::SaveTask {
                    id: self.id.clone(),
                }];
                (task, effects)
            }

            // Sweeper repair
            (TaskStatus::Running | TaskStatus::Paused, TaskEvent::ForceInterrupt { reason }) => {
                self.interrupt(reason, clock)
            }

            // Invalid transitions - no change
            _ => (self.clone(), vec![]),
        }
    }

    fn interrupt(&self, reason: String, clock: &impl Clock) -> (Task, Vec<Effect>) {
        let task = Task {
            status: TaskStatus::Interrupted,
            status_message: reason.clone(),
            ended_at: Some(clock.now_utc()),
            ..self.clone()
        };
        let effects = vec![
            Effect::SaveTask {
                id: self.id.clone(),
            },
            Effect::Emit(Event::TaskInterrupted {
                id: self.id.clone(),
                job_id: self.job_id.clone(),
                reason,
            }),
        ];
        (task, effects)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_running(&self) -> bool {
        self.status == TaskStatus::Running
    }

    pub fn is_queued(&self) -> bool {
        self.status == TaskStatus::Queued
    }

    /// Age of the last observed update, for stuck detection
    pub fn idle_for(&self, clock: &impl Clock) -> Option<std::time::Duration> {
        self.last_activity.map(|at| clock.now().duration_since(at))
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Effects and events for state machine orchestration
//!
//! State machines stay pure: transitions return the effects they want
//! performed (persistence, timers, notifications) and the engine executes
//! them. Events fan out to subscribers through the event bus.

use crate::job::JobId;
use crate::task::TaskId;

/// Effects are side effects that state machines request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Emit an event for other components to observe
    Emit(Event),
    /// Persist the task record
    SaveTask { id: TaskId },
}

/// Events emitted by state machines and the service surface
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Event {
    // Job change notifications
    JobChanged {
        id: JobId,
    },
    JobRemoved {
        id: JobId,
    },
    /// A trigger fired for a job (timer, event, or run-now override)
    JobTriggered {
        id: JobId,
        run_now: bool,
    },

    // Task lifecycle
    TaskQueued {
        id: TaskId,
        job_id: JobId,
    },
    TaskStarted {
        id: TaskId,
        job_id: JobId,
    },
    TaskPaused {
        id: TaskId,
    },
    TaskResumed {
        id: TaskId,
    },
    TaskFinished {
        id: TaskId,
        job_id: JobId,
    },
    TaskFailed {
        id: TaskId,
        job_id: JobId,
        reason: String,
    },
    TaskInterrupted {
        id: TaskId,
        job_id: JobId,
        reason: String,
    },
    /// Task record changed (progress, logs, status message)
    TaskChanged {
        id: TaskId,
        job_id: JobId,
    },
    /// Task record deleted
    TaskRemoved {
        id: TaskId,
        job_id: JobId,
    },
}

impl Event {
    /// Get the event name for pattern matching
    /// Format: "category:action"
    pub fn name(&self) -> String {
        match self {
            Event::JobChanged { .. } => "job:changed".to_string(),
            Event::JobRemoved { .. } => "job:removed".to_string(),
            Event::JobTriggered { .. } => "job:triggered".to_string(),

            Event::TaskQueued { .. } => "task:queued".to_string(),
            Event::TaskStarted { .. } => "task:started".to_string(),
            Event::TaskPaused { .. } => "task:paused".to_string(),
            Event::TaskResumed { .. } => "task:resumed".to_string(),
            Event::TaskFinished { .. } => "task:finished".to_string(),
            Event::TaskFailed { .. } => "task:failed".to_string(),
            Event::TaskInterrupted { .. } => "task:interrupted".to_string(),
            Event::TaskChanged { .. } => "task:changed".to_string(),
            Event::TaskRemoved { .. } => "task:removed".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_follow_category_action() {
        let event = Event::TaskFinished {
            id: TaskId("t-1".to_string()),
            job_id: JobId("j-1".to_string()),
        };
        assert_eq!(event.name(), "task:finished");

        let event = Event::JobRemoved {
            id: JobId("j-1".to_string()),
        };
        assert_eq!(event.name(), "job:removed");
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job definitions
//!
//! A job is a persisted definition of what to run (an action chain over
//! resolved targets), when to run it (events, a recurring schedule, or
//! auto-start), and how much per-job concurrency to allow. The engine
//! holds only these fields; task records live in the task store.

use crate::action::ActionArena;
use crate::schedule::Schedule;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a job. Ordered so timer heap entries with equal
/// fire instants compare without panicking.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A persisted job definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub label: String,
    pub owner: String,
    /// An inactive job ignores event and schedule firings
    #[serde(default)]
    pub inactive: bool,
    /// Event names that trigger this job
    #[serde(default)]
    pub event_names: Vec<String>,
    /// Recurring schedule, if any
    #[serde(default)]
    pub schedule: Option<Schedule>,
    /// Fire once as soon as the job is registered
    #[serde(default)]
    pub auto_start: bool,
    /// Remove terminal tasks once observed
    #[serde(default)]
    pub auto_clean: bool,
    /// Concurrency ceiling; <= 0 means the engine default
    #[serde(default)]
    pub max_concurrency: i32,
    /// Suppress task-changed notifications for this job
    #[serde(default)]
    pub tasks_silent_update: bool,
    /// The action chain executed per task
    #[serde(default)]
    pub actions: ActionArena,
}

impl Job {
    pub fn new(id: impl Into<JobId>, label: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            owner: owner.into(),
            inactive: false,
            event_names: Vec::new(),
            schedule: None,
            auto_start: false,
            auto_clean: false,
            max_concurrency: 0,
            tasks_silent_update: false,
            actions: ActionArena::new(),
        }
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = Some(schedule);
        self
    }

    pub fn with_events(mut self, names: Vec<String>) -> Self {
        self.event_names = names;
        self
    }

    pub fn with_actions(mut self, actions: ActionArena) -> Self {
        self.actions = actions;
        self
    }

    pub fn with_max_concurrency(mut self, n: i32) -> Self {
        self.max_concurrency = n;
        self
    }

    pub fn auto_start(mut self) -> Self {
        self.auto_start = true;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.inactive = true;
        self
    }

    pub fn silent_task_updates(mut self) -> Self {
        self.tasks_silent_update = true;
        self
    }

    /// Effective concurrency ceiling. `None` means unbounded.
    pub fn concurrency_limit(&self, default: usize) -> Option<usize> {
        if self.max_concurrency > 0 {
            Some(self.max_concurrency as usize)
        } else if default > 0 {
            Some(default)
        } else {
            None
        }
    }

    /// Whether this job listens for the named event
    pub fn listens_for(&self, event_name: &str) -> bool {
        self.event_names.iter().any(|n| n == event_name)
    }
}

/// Inbound trigger signal for a job firing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTriggerSignal {
    pub job_id: JobId,
    /// Snapshot of the schedule that produced the firing, if any
    pub schedule: Option<Schedule>,
    /// Fire immediately, bypassing the schedule
    #[serde(default)]
    pub run_now: bool,
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;

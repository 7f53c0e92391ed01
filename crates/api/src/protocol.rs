// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport-independent request types
//!
//! The service surface is plain request/response structs; framing and
//! transport live with whoever embeds the service.

use drover_core::{Job, JobId, Task, TaskId, TaskStatus};
use serde::{Deserialize, Serialize};

/// Filter for job listings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobListFilter {
    /// Only jobs owned by this owner
    pub owner: Option<String>,
    /// Only jobs with event triggers
    pub events_only: bool,
    /// Only jobs with a schedule
    pub timers_only: bool,
    /// Explicit id set; empty means no restriction
    pub ids: Vec<JobId>,
    /// Pagination window for each job's task sublist
    pub tasks_offset: usize,
    pub tasks_limit: Option<usize>,
}

impl JobListFilter {
    pub fn owned_by(owner: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, job: &Job) -> bool {
        if let Some(owner) = &self.owner {
            if &job.owner != owner {
                return false;
            }
        }
        if self.events_only && job.event_names.is_empty() {
            return false;
        }
        if self.timers_only && job.schedule.is_none() {
            return false;
        }
        if !self.ids.is_empty() && !self.ids.contains(&job.id) {
            return false;
        }
        true
    }
}

/// One job plus the window of its tasks the filter asked for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub job: Job,
    pub tasks: Vec<Task>,
    /// Total task count before pagination
    pub task_count: usize,
}

/// Deletes tasks by explicit ids, or by status set with an optional
/// prune limit keeping the N most recent matches
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskDeleteRequest {
    /// Restrict to one job
    pub job_id: Option<JobId>,
    /// Explicit ids; when non-empty the status fields are ignored
    pub ids: Vec<TaskId>,
    /// Statuses to delete
    pub statuses: Vec<TaskStatus>,
    /// Keep this many of the most recent matches
    pub prune_keep: Option<usize>,
}

impl TaskDeleteRequest {
    pub fn by_ids(ids: Vec<TaskId>) -> Self {
        Self {
            ids,
            ..Default::default()
        }
    }

    pub fn by_status(job_id: JobId, statuses: Vec<TaskStatus>) -> Self {
        Self {
            job_id: Some(job_id),
            statuses,
            ..Default::default()
        }
    }

    pub fn keeping(mut self, n: usize) -> Self {
        self.prune_keep = Some(n);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_core::Schedule;

    #[test]
    fn filter_composes_all_criteria() {
        let job = Job::new("j", "j", "ops")
            .with_events(vec!["x".to_string()])
            .with_schedule(Schedule::new("R/2026-01-01T00:00:00Z/PT1H"));

        assert!(JobListFilter::default().matches(&job));
        assert!(JobListFilter::owned_by("ops").matches(&job));
        assert!(!JobListFilter::owned_by("other").matches(&job));

        let filter = JobListFilter {
            events_only: true,
            timers_only: true,
            ids: vec![JobId::from("j")],
            ..Default::default()
        };
        assert!(filter.matches(&job));
        assert!(!filter.matches(&Job::new("other", "other", "ops")));
    }
}

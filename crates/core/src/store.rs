// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Injected job/task stores
//!
//! Persistence is an external collaborator: the engine only needs
//! get/put/list/delete. The in-memory implementation backs tests and
//! embedded use; durable backends implement the same traits elsewhere.

use crate::job::{Job, JobId};
use crate::task::{Task, TaskId, TaskStatus};
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {kind}/{id}")]
    NotFound { kind: &'static str, id: String },
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn job_not_found(id: &JobId) -> Self {
        StoreError::NotFound {
            kind: "job",
            id: id.0.clone(),
        }
    }

    pub fn task_not_found(id: &TaskId) -> Self {
        StoreError::NotFound {
            kind: "task",
            id: id.0.clone(),
        }
    }
}

/// Store for job definitions
pub trait JobStore: Send + Sync {
    fn put_job(&self, job: &Job) -> Result<(), StoreError>;
    fn get_job(&self, id: &JobId) -> Result<Job, StoreError>;
    fn delete_job(&self, id: &JobId) -> Result<(), StoreError>;
    /// All jobs, ordered by ID for stable listings
    fn list_jobs(&self) -> Result<Vec<Job>, StoreError>;
}

/// Store for task records
pub trait TaskStore: Send + Sync {
    fn put_task(&self, task: &Task) -> Result<(), StoreError>;
    fn get_task(&self, id: &TaskId) -> Result<Task, StoreError>;
    fn delete_task(&self, id: &TaskId) -> Result<(), StoreError>;
    /// Tasks, optionally restricted to one job, ordered by creation time
    fn list_tasks(&self, job_id: Option<&JobId>) -> Result<Vec<Task>, StoreError>;
}

/// In-memory store for tests and embedding
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<JobId, Job>>,
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks for a job restricted to the given statuses
    pub fn tasks_with_status(
        &self,
        job_id: &JobId,
        statuses: &[TaskStatus],
    ) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .list_tasks(Some(job_id))?
            .into_iter()
            .filter(|t| statuses.contains(&t.status))
            .collect())
    }
}

impl JobStore for MemoryStore {
    fn put_job(&self, job: &Job) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    fn get_job(&self, id: &JobId) -> Result<Job, StoreError> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        jobs.get(id).cloned().ok_or_else(|| StoreError::job_not_found(id))
    }

    fn delete_job(&self, id: &JobId) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        jobs.remove(id).ok_or_else(|| StoreError::job_not_found(id))?;
        Ok(())
    }

    fn list_jobs(&self) -> Result<Vec<Job>, StoreError> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<Job> = jobs.values().cloned().collect();
        all.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(all)
    }
}

impl TaskStore for MemoryStore {
    fn put_task(&self, task: &Task) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        tasks.insert(task.id.clone(), task.clone());
        Ok(())
    }

    fn get_task(&self, id: &TaskId) -> Result<Task, StoreError> {
        let tasks = self.tasks.read().unwrap_or_else(|e| e.into_inner());
        tasks
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::task_not_found(id))
    }

    fn delete_task(&self, id: &TaskId) -> Result<(), StoreError> {
        let mut tasks = self.tasks.write().unwrap_or_else(|e| e.into_inner());
        tasks.remove(id).ok_or_else(|| StoreError::task_not_found(id))?;
        Ok(())
    }

    fn list_tasks(&self, job_id: Option<&JobId>) -> Result<Vec<Task>, StoreError> {
        let tasks = self.tasks.read().unwrap_or_else(|e| e.into_inner());
        let mut all: Vec<Task> = tasks
            .values()
            .filter(|t| job_id.map(|j| &t.job_id == j).unwrap_or(true))
            .cloned()
            .collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.0.cmp(&b.id.0)));
        Ok(all)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

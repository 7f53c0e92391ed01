// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator control commands
//!
//! One command type covers the whole lifecycle surface. Commands carry the
//! requesting owner for audit and authorization; the authorization policy
//! itself is an external collaborator.

use crate::job::JobId;
use crate::task::{TaskId, TaskStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What the operator wants done
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CtrlAction {
    Pause,
    Resume,
    Stop,
    Delete,
    RunOnce,
    Inactive,
    Active,
}

/// An operator instruction targeted at a job or a specific task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtrlCommand {
    pub action: CtrlAction,
    #[serde(default)]
    pub job_id: Option<JobId>,
    #[serde(default)]
    pub task_id: Option<TaskId>,
    /// Requesting owner, for audit and authorization
    pub owner: String,
    /// Delete only: stop a running task instead of refusing
    #[serde(default)]
    pub force: bool,
}

impl CtrlCommand {
    pub fn for_task(action: CtrlAction, task_id: impl Into<TaskId>, owner: impl Into<String>) -> Self {
        Self {
            action,
            job_id: None,
            task_id: Some(task_id.into()),
            owner: owner.into(),
            force: false,
        }
    }

    pub fn for_job(action: CtrlAction, job_id: impl Into<JobId>, owner: impl Into<String>) -> Self {
        Self {
            action,
            job_id: Some(job_id.into()),
            task_id: None,
            owner: owner.into(),
            force: false,
        }
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Response to a control command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CtrlResponse {
    pub msg: String,
}

impl CtrlResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

/// Why a control command was refused
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlError {
    #[error("not found: {kind}/{id}")]
    NotFound { kind: &'static str, id: String },
    #[error("owner {owner:?} is not allowed to {action:?}")]
    Permission { owner: String, action: CtrlAction },
    #[error("cannot {action:?} a task in state {status}")]
    InvalidState {
        action: CtrlAction,
        status: TaskStatus,
    },
    #[error("command {action:?} requires a {required} target")]
    MissingTarget {
        action: CtrlAction,
        required: &'static str,
    },
    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<crate::store::StoreError> for ControlError {
    fn from(e: crate::store::StoreError) -> Self {
        match e {
            crate::store::StoreError::NotFound { kind, id } => ControlError::NotFound { kind, id },
            crate::store::StoreError::Backend(msg) => ControlError::Storage(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_builders_target_one_side() {
        let cmd = CtrlCommand::for_task(CtrlAction::Pause, "t-1", "admin");
        assert_eq!(cmd.task_id, Some(TaskId::from("t-1")));
        assert!(cmd.job_id.is_none());

        let cmd = CtrlCommand::for_job(CtrlAction::RunOnce, "j-1", "admin");
        assert_eq!(cmd.job_id, Some(JobId::from("j-1")));
        assert!(cmd.task_id.is_none());
    }

    #[test]
    fn invalid_state_error_names_both_sides() {
        let err = ControlError::InvalidState {
            action: CtrlAction::Pause,
            status: TaskStatus::Finished,
        };
        assert_eq!(err.to_string(), "cannot Pause a task in state finished");
    }
}

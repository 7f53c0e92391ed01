// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the execution engine

use drover_core::{JobId, ScheduleError, StoreError, TaskId};
use thiserror::Error;

/// Errors that can occur while firing jobs and running tasks
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error("job {0} is inactive")]
    JobInactive(JobId),
    #[error("task {0} is not tracked by the supervisor")]
    TaskNotRunning(TaskId),
}

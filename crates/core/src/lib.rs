// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! drover-core: Core library for the drover job orchestrator
//!
//! This crate provides:
//! - Job and task state machines with effect-based orchestration
//! - Recurring schedules with minimum-delta throttling
//! - Action chains, target selectors, and the message threaded through them
//! - An event bus with pattern subscriptions
//! - TOML job definitions and injected job/task stores

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod clock;
pub mod id;

pub mod config;
pub mod events;
pub mod store;

// State machines and their vocabulary
pub mod action;
pub mod command;
pub mod effect;
pub mod job;
pub mod schedule;
pub mod selector;
pub mod task;

// Re-exports
pub use action::{Action, ActionArena, ActionIdx, ActionLog, ActionMessage, ActionOutput, OutputBody};
pub use clock::{Clock, FakeClock, SystemClock};
pub use command::{ControlError, CtrlAction, CtrlCommand, CtrlResponse};
pub use config::{jobs_from_toml, load_config, parse_config, ConfigError, RawConfig};
pub use effect::{Effect, Event};
pub use events::{EventBus, EventPattern, SubscriberId, Subscription};
pub use id::{IdGen, SequentialIdGen, UuidIdGen};
pub use job::{Job, JobId, JobTriggerSignal};
pub use schedule::{FireTimes, ParsedSchedule, Schedule, ScheduleError};
pub use selector::{Entity, Node, NodesSelector, SourceFilter, TargetSelector, User, UsersSelector};
pub use store::{JobStore, MemoryStore, StoreError, TaskStore};
pub use task::{FiringKind, Task, TaskEvent, TaskId, TaskStatus};

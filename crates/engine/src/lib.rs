// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover execution engine
//!
//! Selector resolution, action-chain execution, task supervision with
//! per-job admission control, scheduled job timers, and stuck-task sweeps.

mod error;
mod executor;
mod handler;
mod resolver;
mod supervisor;
mod sweeper;
mod timer;

pub use error::EngineError;
pub use executor::{ChainExecutor, ChainStatus, ExecContext, ExecUpdate, Progress, RunSignal};
pub use handler::{ActionHandler, FailingHandler, HandlerRegistry, RecordedCall, RecordingHandler};
pub use resolver::{Catalog, FakeCatalog, QueryError, QueryEvaluator, Resolved, Resolver, SubstringQueries};
pub use supervisor::{AllowAll, Authorizer, EngineConfig, OwnerOnly, Supervisor};
pub use sweeper::Sweeper;
pub use timer::JobTimers;

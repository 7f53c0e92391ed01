// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! drover service surface
//!
//! Transport-independent request types and the service that ties the
//! stores, supervisor, timers, and sweeper together behind one API.

mod protocol;
mod service;

pub use protocol::{JobListFilter, JobView, TaskDeleteRequest};
pub use service::{Service, ServiceError};

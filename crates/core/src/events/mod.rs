// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event routing
//!
//! Observers subscribe with name patterns (`job:*`, `task:**`); the bus
//! fans published events out to every matching subscriber.

mod bus;
mod subscription;

pub use bus::{EventBus, EventReceiver, EventSender};
pub use subscription::{EventPattern, SubscriberId, Subscription};

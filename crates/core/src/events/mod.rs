// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Publish/subscribe bus
//!
//! - `EventBus` routes each published event to every subscription whose
//!   patterns match the event name; publishing never blocks
//! - `EventPattern` matches `:`-separated topic names with `*` and `**`

mod bus;
mod subscription;

pub use bus::{EventBus, EventReceiver, EventSender};
pub use subscription::{EventPattern, SubscriberId, Subscription};

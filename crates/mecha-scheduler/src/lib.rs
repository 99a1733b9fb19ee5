//! # MechaHelper Scheduler
//!
//! One timer, one job: every day at the configured local time, tell every
//! subscriber (and the class group) what tomorrow's homework is.
//!
//! ## Architecture
//! ```text
//! DailyScheduler (tokio sleep until next HH:MM in zone)
//!   └── on fire → tokio::spawn(Broadcaster::fire)
//!                   ├── AssignmentService::get_for_tomorrow
//!                   ├── collective destination (first)
//!                   └── SubscriberRegistry snapshot → one send per recipient
//! ```
//! A failing recipient is logged and skipped; the batch always completes.

pub mod daily;
pub mod dispatch;

pub use daily::{DailyScheduler, next_fire_after};
pub use dispatch::{BroadcastReport, Broadcaster, format_announcement};

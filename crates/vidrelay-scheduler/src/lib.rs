//! `vidrelay-scheduler` — drives queued intents through fetch, delivery and
//! retirement.
//!
//! # Overview
//!
//! Producers call [`queue::IntentQueue::append_intent`], which records the
//! intent durably and wakes the [`engine::Scheduler`]. The scheduler picks the
//! highest-priority intent, resolves it through the single-flight executor,
//! uploads fresh assets to the primary chat once, then fans the resulting
//! handle out to every accumulated target.
//!
//! | Component    | Runs as                       | Stops on                |
//! |--------------|-------------------------------|-------------------------|
//! | `Scheduler`  | one task, owned by Supervisor | shutdown or store error |
//! | `Supervisor` | one task                      | shutdown only           |
//! | `Sweeper`    | one task, own interval        | shutdown                |

pub mod engine;
pub mod error;
pub mod fallback;
pub mod queue;
pub mod supervisor;
pub mod sweeper;

pub use engine::{Scheduler, SchedulerSettings, Step};
pub use error::{Result, SchedulerError};
pub use queue::IntentQueue;
pub use supervisor::Supervisor;
pub use sweeper::Sweeper;

//! `vidrelay-store` — durable repositories for the fetch engine.
//!
//! # Overview
//!
//! Every repository keeps its working set in memory and writes through to a
//! [`persistence::Persistence`] backend before a mutating call returns, so a
//! restart loses no completed fetch and no queued intent.
//!
//! | Repository      | Table       | Contents                                  |
//! |-----------------|-------------|-------------------------------------------|
//! | `ResourceCache` | `resources` | fetched records and alias pointers        |
//! | `IntentStore`   | `intents`   | pending intents with targets and priority |
//! | `InlineCache`   | (memory)    | short-lived inline-query results          |

pub mod cache;
pub mod db;
pub mod error;
pub mod inline;
pub mod intents;
pub mod persistence;

pub use cache::ResourceCache;
pub use error::{Result, StoreError};
pub use inline::{InlineCache, InlineEntry, SweepStats};
pub use intents::IntentStore;
pub use persistence::{Persistence, SqlitePersistence, Table};

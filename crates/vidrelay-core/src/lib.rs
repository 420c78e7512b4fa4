//! `vidrelay-core` — types, configuration and errors shared by every crate.

pub mod config;
pub mod error;
pub mod types;

pub use config::VidrelayConfig;
pub use error::{CoreError, Result};
pub use types::{Intent, MediaHandle, Payload, ResourceRecord, Target, VideoOrigin};

#![forbid(unsafe_code)]

//! Core domain model and business logic for the interval workout timer.
//!
//! This crate provides:
//! - Session types and the phase state machine
//! - The per-second tick engine and its scheduler
//! - Statistics, history and CSV export
//! - Achievements and experience levels
//! - Persistence (file-backed, in-memory, fail-open)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod statistics;
pub mod machine;
pub mod tick;
pub mod schedule;
pub mod history;
pub mod storage;
pub mod achievements;
pub mod experience;
pub mod timer;

// Re-export commonly used types
pub use error::{Error, RejectionReason, Result, TransitionRejection};
pub use types::*;
pub use config::Config;
pub use machine::{apply, Action, Effect};
pub use schedule::{Clock, ManualClock, SystemClock};
pub use storage::{FailOpen, FileStore, MemoryStore, Store};
pub use achievements::get_default_catalog;
pub use experience::ExperienceState;
pub use timer::{CompletionReport, TimerEvent, WorkoutTimer};

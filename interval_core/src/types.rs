//! Core domain types for the interval workout timer.
//!
//! This module defines the fundamental types used throughout the system:
//! - Phases of a workout and the per-user timer settings
//! - Session statistics
//! - The single live workout session
//! - Events emitted while a session runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Phase
// ============================================================================

/// One discrete stage of a workout session
///
/// `Countdown` is the stretch/warm-up stage. `Transition` is an untimed
/// placeholder that always auto-advances to the phase stored in
/// [`WorkoutSession::pending_phase`] after a short delay.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Setup,
    Transition,
    Prepare,
    Countdown,
    Work,
    Rest,
    Complete,
}

impl Phase {
    /// Phases the tick engine decrements
    pub fn is_timed(self) -> bool {
        matches!(self, Phase::Countdown | Phase::Work | Phase::Rest)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Transition => "transition",
            Phase::Prepare => "prepare",
            Phase::Countdown => "countdown",
            Phase::Work => "work",
            Phase::Rest => "rest",
            Phase::Complete => "complete",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Settings
// ============================================================================

pub const DEFAULT_TIME_PER_REP: u32 = 3;
pub const DEFAULT_REST_TIME: u32 = 30;
pub const DEFAULT_STRETCH_TIME: u32 = 60;
pub const DEFAULT_REPS_PER_SET: u32 = 10;
pub const DEFAULT_TOTAL_SETS: u32 = 3;

/// Timer settings, all in seconds except `reps_per_set`
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub time_per_rep: u32,
    pub rest_time: u32,
    pub stretch_time: u32,
    pub reps_per_set: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            time_per_rep: DEFAULT_TIME_PER_REP,
            rest_time: DEFAULT_REST_TIME,
            stretch_time: DEFAULT_STRETCH_TIME,
            reps_per_set: DEFAULT_REPS_PER_SET,
        }
    }
}

impl Settings {
    /// Length of one work phase
    pub fn work_seconds(&self) -> u32 {
        self.time_per_rep.saturating_mul(self.reps_per_set)
    }

    /// Wall time of a full session with `total_sets` sets, ignoring pauses
    ///
    /// The stretch, every work phase, and a rest between consecutive sets
    /// (no rest after the last one).
    pub fn session_seconds(&self, total_sets: u32) -> u64 {
        let sets = u64::from(total_sets);
        u64::from(self.stretch_time)
            + sets * u64::from(self.work_seconds())
            + sets.saturating_sub(1) * u64::from(self.rest_time)
    }

    pub fn get(&self, field: TimeField) -> u32 {
        match field {
            TimeField::TimePerRep => self.time_per_rep,
            TimeField::RestTime => self.rest_time,
            TimeField::StretchTime => self.stretch_time,
            TimeField::RepsPerSet => self.reps_per_set,
        }
    }

    pub fn set(&mut self, field: TimeField, value: u32) {
        match field {
            TimeField::TimePerRep => self.time_per_rep = value,
            TimeField::RestTime => self.rest_time = value,
            TimeField::StretchTime => self.stretch_time = value,
            TimeField::RepsPerSet => self.reps_per_set = value,
        }
    }
}

/// A single adjustable settings field
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeField {
    TimePerRep,
    RestTime,
    StretchTime,
    RepsPerSet,
}

impl TimeField {
    pub const ALL: [TimeField; 4] = [
        TimeField::TimePerRep,
        TimeField::RestTime,
        TimeField::StretchTime,
        TimeField::RepsPerSet,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TimeField::TimePerRep => "time_per_rep",
            TimeField::RestTime => "rest_time",
            TimeField::StretchTime => "stretch_time",
            TimeField::RepsPerSet => "reps_per_set",
        }
    }
}

impl std::str::FromStr for TimeField {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "time_per_rep" | "rep" => Ok(TimeField::TimePerRep),
            "rest_time" | "rest" => Ok(TimeField::RestTime),
            "stretch_time" | "stretch" => Ok(TimeField::StretchTime),
            "reps_per_set" | "reps" => Ok(TimeField::RepsPerSet),
            other => Err(crate::Error::Other(format!("Unknown settings field: {}", other))),
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// Counters for the active session
///
/// Time counters are whole seconds. `pause_start_time` is only set while
/// the session is paused.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Statistics {
    pub total_time_exercised: u64,
    pub total_time_rested: u64,
    pub total_time_stretched: u64,
    pub total_time_paused: u64,
    pub total_reps_completed: u64,
    pub workout_start_time: Option<DateTime<Utc>>,
    pub workout_end_time: Option<DateTime<Utc>>,
    pub last_active_time: Option<DateTime<Utc>>,
    pub pause_start_time: Option<DateTime<Utc>>,
}

impl Statistics {
    /// Stretched + exercised + rested
    pub fn active_seconds(&self) -> u64 {
        self.total_time_stretched + self.total_time_exercised + self.total_time_rested
    }
}

// ============================================================================
// Session
// ============================================================================

/// The single live workout session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkoutSession {
    pub phase: Phase,
    /// Where a `Transition` lands once its delay elapses
    #[serde(default)]
    pub pending_phase: Option<Phase>,
    pub current_set: u32,
    pub total_sets: u32,
    pub current_rep: u32,
    pub time_remaining: u32,
    pub is_paused: bool,
    pub settings: Settings,
    #[serde(default)]
    pub statistics: Statistics,
}

impl Default for WorkoutSession {
    fn default() -> Self {
        Self::new(Settings::default(), DEFAULT_TOTAL_SETS)
    }
}

impl WorkoutSession {
    /// A fresh session in `Setup`
    pub fn new(settings: Settings, total_sets: u32) -> Self {
        Self {
            phase: Phase::Setup,
            pending_phase: None,
            current_set: 0,
            total_sets,
            current_rep: 1,
            time_remaining: 0,
            is_paused: false,
            settings,
            statistics: Statistics::default(),
        }
    }

    /// Whether the tick engine should run for this session right now
    pub fn is_ticking(&self) -> bool {
        self.phase.is_timed() && !self.is_paused && self.time_remaining > 0
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    /// Planned length of the whole session in seconds
    pub fn total_duration(&self) -> u64 {
        self.settings.session_seconds(self.total_sets)
    }

    /// Seconds of timed phases still ahead, including the current one
    ///
    /// Without skips this always sums with [`Statistics::active_seconds`] to
    /// [`total_duration`](Self::total_duration).
    pub fn remaining_duration(&self) -> u64 {
        let phase = match (self.phase, self.pending_phase) {
            (Phase::Transition, Some(target)) => target,
            (phase, _) => phase,
        };
        let work = u64::from(self.settings.work_seconds());
        let rest = u64::from(self.settings.rest_time);
        let sets = u64::from(self.total_sets);
        let set = u64::from(self.current_set.max(1));
        let current = u64::from(self.time_remaining);

        match phase {
            Phase::Setup | Phase::Prepare | Phase::Transition => self.total_duration(),
            Phase::Countdown => current + sets * work + sets.saturating_sub(1) * rest,
            Phase::Work => {
                let later = sets.saturating_sub(set);
                current + later * work + later * rest
            }
            Phase::Rest => {
                let later = sets.saturating_sub(set);
                current + later * work + later.saturating_sub(1) * rest
            }
            Phase::Complete => 0,
        }
    }
}

// ============================================================================
// Events
// ============================================================================

/// Something observable that happened to the session
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    /// One second elapsed in a timed phase
    Ticked { phase: Phase, time_remaining: u32 },
    /// The work phase moved on to the next rep
    RepAdvanced { set: u32, rep: u32 },
    PhaseChanged { from: Phase, to: Phase },
}

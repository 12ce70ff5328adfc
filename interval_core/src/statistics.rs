//! Statistics accumulator for the active session.
//!
//! Every counter is whole seconds. Pause time is rounded when a pause ends,
//! so many short pauses never drift against the display.

use crate::types::{Phase, Statistics};
use chrono::{DateTime, Utc};

/// Stamp the workout start. Later calls are ignored.
pub fn mark_started(stats: &mut Statistics, now: DateTime<Utc>) {
    if stats.workout_start_time.is_none() {
        stats.workout_start_time = Some(now);
    }
    stats.last_active_time = Some(now);
}

/// Stamp the workout end. Later calls are ignored.
pub fn mark_finished(stats: &mut Statistics, now: DateTime<Utc>) {
    if stats.workout_end_time.is_none() {
        stats.workout_end_time = Some(now);
    }
    stats.last_active_time = Some(now);
}

/// Record that the session just became paused
pub fn begin_pause(stats: &mut Statistics, now: DateTime<Utc>) {
    stats.pause_start_time = Some(now);
    stats.last_active_time = Some(now);
}

/// Close the open pause and fold it into `total_time_paused`
///
/// Returns the whole seconds added. A pause that never started adds
/// nothing, and a clock that went backwards counts as zero.
pub fn end_pause(stats: &mut Statistics, now: DateTime<Utc>) -> u64 {
    stats.last_active_time = Some(now);
    let Some(started) = stats.pause_start_time.take() else {
        return 0;
    };

    let delta_ms = (now - started).num_milliseconds().max(0);
    let seconds = (delta_ms as f64 / 1000.0).round() as u64;
    stats.total_time_paused += seconds;

    tracing::debug!(
        "Pause lasted {}ms, added {}s (total paused {}s)",
        delta_ms,
        seconds,
        stats.total_time_paused
    );
    seconds
}

/// Credit one second to the counter matching `phase`
pub fn record_tick(stats: &mut Statistics, phase: Phase, now: DateTime<Utc>) {
    match phase {
        Phase::Countdown => stats.total_time_stretched += 1,
        Phase::Work => stats.total_time_exercised += 1,
        Phase::Rest => stats.total_time_rested += 1,
        _ => {}
    }
    stats.last_active_time = Some(now);
}

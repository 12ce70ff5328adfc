//! Per-second tick engine.
//!
//! [`tick`] is the only thing that decrements `time_remaining`. It keeps the
//! statistics in step, tracks rep boundaries during `work`, and hands off to
//! the state machine in the same update when a phase runs out.

use crate::machine::{self, Effect};
use crate::statistics;
use crate::types::{Phase, SessionEvent, WorkoutSession};
use chrono::{DateTime, Utc};

/// What one tick did
#[derive(Clone, Debug, Default)]
pub struct TickOutcome {
    pub events: Vec<SessionEvent>,
    pub effects: Vec<Effect>,
}

impl TickOutcome {
    pub fn completed(&self) -> bool {
        self.effects.contains(&Effect::Completed)
    }
}

/// Advance the session by one second
///
/// A session that is not ticking (paused, untimed phase, or nothing left)
/// is left untouched; a late callback after a pause or reset is harmless.
pub fn tick(session: &mut WorkoutSession, now: DateTime<Utc>) -> TickOutcome {
    let mut outcome = TickOutcome::default();
    if !session.is_ticking() {
        tracing::trace!("Ignoring tick in {} (paused: {})", session.phase, session.is_paused);
        return outcome;
    }

    let phase = session.phase;
    session.time_remaining -= 1;
    statistics::record_tick(&mut session.statistics, phase, now);
    outcome.events.push(SessionEvent::Ticked {
        phase,
        time_remaining: session.time_remaining,
    });
    tracing::trace!("Tick: {} {}s left", phase, session.time_remaining);

    if phase == Phase::Work {
        if let Some(rep) = rep_advanced(session) {
            session.current_rep = rep;
            session.statistics.total_reps_completed += 1;
            outcome.events.push(SessionEvent::RepAdvanced {
                set: session.current_set,
                rep,
            });
        }
    }

    if session.time_remaining == 0 {
        if phase == Phase::Work {
            // The last rep of the set finishes with the phase itself
            session.statistics.total_reps_completed += 1;
        }
        outcome.effects = machine::advance_boundary(session, now, &mut outcome.events);
    } else {
        outcome.effects.push(Effect::PersistSession);
    }

    outcome
}

/// The rep the work phase is on now, if it moved past `current_rep`
fn rep_advanced(session: &WorkoutSession) -> Option<u32> {
    let settings = &session.settings;
    if settings.time_per_rep == 0 {
        return None;
    }
    let total = settings.work_seconds();
    let elapsed = total.saturating_sub(session.time_remaining);
    let rep = (elapsed / settings.time_per_rep + 1).min(settings.reps_per_set);
    (rep > session.current_rep).then_some(rep)
}

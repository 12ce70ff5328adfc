//! Phase state machine.
//!
//! Every user action goes through [`apply`], a pure function from the
//! current session and an [`Action`] to the next session plus the side
//! effects the host has to carry out (scheduling, persistence). The tick
//! engine reuses [`advance_boundary`] when a timed phase runs out, so a
//! skip and a natural expiry follow the same reset rules.
//!
//! ```text
//! setup -(start)-> transition -> prepare -(continue)-> transition -> countdown
//! countdown -> work -> rest -> work -> ... -> work -> complete
//! any -(reset)-> transition -> setup
//! ```

use crate::config::{PhasePolicy, SettingsBounds};
use crate::error::RejectionReason;
use crate::statistics;
use crate::types::{Phase, SessionEvent, TimeField, WorkoutSession};
use crate::{Error, Result};
use chrono::{DateTime, Utc};

/// A request to move the session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    StartWorkout,
    ContinueToStretch,
    /// The delay of a `transition` toward this phase elapsed
    FinishTransition(Phase),
    TogglePause,
    SkipPhase,
    ResetWorkout,
    AdjustSets(i32),
    AdjustTime(TimeField, i32),
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::StartWorkout => "start the workout",
            Action::ContinueToStretch => "continue to stretch",
            Action::FinishTransition(_) => "finish the transition",
            Action::TogglePause => "pause or resume",
            Action::SkipPhase => "skip this phase",
            Action::ResetWorkout => "reset",
            Action::AdjustSets(_) => "change the number of sets",
            Action::AdjustTime(..) => "change the timer settings",
        }
    }
}

/// Work the host performs after a transition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Fire `Action::FinishTransition(target)` after the transition delay
    ScheduleTransition(Phase),
    /// Drop any scheduled tick or transition callback
    CancelPending,
    PersistSession,
    PersistSettings,
    ClearSession,
    /// The session reached `complete`; record history and evaluate rewards
    Completed,
}

/// Inputs the machine needs besides the session itself
#[derive(Clone, Copy, Debug)]
pub struct MachineContext<'a> {
    pub now: DateTime<Utc>,
    pub policy: &'a PhasePolicy,
    pub bounds: &'a SettingsBounds,
}

/// Result of a successful [`apply`]
#[derive(Clone, Debug)]
pub struct Transition {
    pub session: WorkoutSession,
    pub effects: Vec<Effect>,
    pub events: Vec<SessionEvent>,
}

/// Apply `action` to `session`
///
/// On rejection the caller's session is untouched and the error carries a
/// [`TransitionRejection`](crate::error::TransitionRejection).
pub fn apply(
    session: &WorkoutSession,
    action: Action,
    ctx: &MachineContext<'_>,
) -> Result<Transition> {
    let mut next = session.clone();
    let mut effects = Vec::new();
    let mut events = Vec::new();
    let reject = |reason: RejectionReason| -> Result<Transition> {
        Err(Error::rejected(action.name(), session.phase, reason))
    };

    match action {
        Action::StartWorkout => {
            if session.phase != Phase::Setup {
                return reject(RejectionReason::NotAllowedInPhase);
            }
            next.statistics = Default::default();
            statistics::mark_started(&mut next.statistics, ctx.now);
            enter_transition(&mut next, Phase::Prepare, &mut effects, &mut events);
        }

        Action::ContinueToStretch => {
            if session.phase != Phase::Prepare {
                return reject(RejectionReason::NotAllowedInPhase);
            }
            prime_stretch(&mut next);
            enter_transition(&mut next, Phase::Countdown, &mut effects, &mut events);
        }

        Action::FinishTransition(target) => {
            // A stale callback from a replaced transition must not land
            if session.phase != Phase::Transition || session.pending_phase != Some(target) {
                return reject(RejectionReason::NotAllowedInPhase);
            }
            next.pending_phase = None;
            if target == Phase::Prepare {
                next.time_remaining = next.settings.stretch_time;
            }
            change_phase(&mut next, target, &mut events);
            if target != Phase::Setup {
                effects.push(Effect::PersistSession);
            }
        }

        Action::TogglePause => {
            if !session.phase.is_timed() {
                return reject(RejectionReason::NotAllowedInPhase);
            }
            next.is_paused = !session.is_paused;
            if next.is_paused {
                statistics::begin_pause(&mut next.statistics, ctx.now);
            } else {
                statistics::end_pause(&mut next.statistics, ctx.now);
            }
            tracing::info!(
                "{} during {} with {}s left",
                if next.is_paused { "Paused" } else { "Resumed" },
                next.phase,
                next.time_remaining
            );
            effects.push(Effect::PersistSession);
        }

        Action::SkipPhase => match session.phase {
            Phase::Prepare => {
                prime_stretch(&mut next);
                change_phase(&mut next, Phase::Countdown, &mut events);
                effects.push(Effect::PersistSession);
            }
            Phase::Rest if !ctx.policy.allow_skip_rest => {
                return reject(RejectionReason::RestSkipDisabled);
            }
            Phase::Countdown | Phase::Work | Phase::Rest => {
                tracing::info!(
                    "Skipping {} with {}s left",
                    session.phase,
                    session.time_remaining
                );
                effects.extend(advance_boundary(&mut next, ctx.now, &mut events));
            }
            _ => return reject(RejectionReason::NotAllowedInPhase),
        },

        Action::ResetWorkout => {
            next = WorkoutSession::new(session.settings, session.total_sets);
            next.phase = session.phase;
            next.pending_phase = Some(Phase::Setup);
            change_phase(&mut next, Phase::Transition, &mut events);
            // The snapshot stays cleared; setup is never persisted on arrival
            effects.push(Effect::CancelPending);
            effects.push(Effect::ClearSession);
            effects.push(Effect::ScheduleTransition(Phase::Setup));
            tracing::info!("Workout reset from {}", session.phase);
        }

        Action::AdjustSets(delta) => {
            if session.phase != Phase::Setup {
                return reject(RejectionReason::NotAllowedInPhase);
            }
            next.total_sets = ctx
                .bounds
                .total_sets
                .clamp(i64::from(session.total_sets) + i64::from(delta));
            effects.push(Effect::PersistSession);
        }

        Action::AdjustTime(field, delta) => {
            if session.phase != Phase::Setup {
                return reject(RejectionReason::NotAllowedInPhase);
            }
            let value = ctx
                .bounds
                .for_field(field)
                .clamp(i64::from(session.settings.get(field)) + i64::from(delta));
            next.settings.set(field, value);
            effects.push(Effect::PersistSettings);
            effects.push(Effect::PersistSession);
        }
    }

    Ok(Transition {
        session: next,
        effects,
        events,
    })
}

/// Move a timed phase on to its successor
///
/// Used both when the tick engine reaches zero and when the user skips.
/// Returns the effects the host must run.
pub fn advance_boundary(
    session: &mut WorkoutSession,
    now: DateTime<Utc>,
    events: &mut Vec<SessionEvent>,
) -> Vec<Effect> {
    let work_seconds = session.settings.work_seconds();

    match session.phase {
        Phase::Countdown => {
            session.current_set = session.current_set.max(1);
            session.current_rep = 1;
            session.time_remaining = work_seconds;
            change_phase(session, Phase::Work, events);
            vec![Effect::PersistSession]
        }

        Phase::Work if session.current_set >= session.total_sets => {
            // Close any open pause before the session freezes
            statistics::end_pause(&mut session.statistics, now);
            statistics::mark_finished(&mut session.statistics, now);
            session.time_remaining = 0;
            session.is_paused = false;
            change_phase(session, Phase::Complete, events);
            tracing::info!(
                "Workout complete: {} sets, {}s active, {}s paused",
                session.total_sets,
                session.statistics.active_seconds(),
                session.statistics.total_time_paused
            );
            vec![Effect::CancelPending, Effect::PersistSession, Effect::Completed]
        }

        Phase::Work => {
            session.time_remaining = session.settings.rest_time;
            change_phase(session, Phase::Rest, events);
            vec![Effect::PersistSession]
        }

        Phase::Rest => {
            session.current_set = (session.current_set + 1).min(session.total_sets);
            session.current_rep = 1;
            session.time_remaining = work_seconds;
            change_phase(session, Phase::Work, events);
            vec![Effect::PersistSession]
        }

        other => {
            tracing::debug!("No boundary to advance from {}", other);
            Vec::new()
        }
    }
}

fn prime_stretch(session: &mut WorkoutSession) {
    session.time_remaining = session.settings.stretch_time;
    session.current_set = session.current_set.max(1);
    session.current_rep = 1;
}

fn enter_transition(
    session: &mut WorkoutSession,
    target: Phase,
    effects: &mut Vec<Effect>,
    events: &mut Vec<SessionEvent>,
) {
    session.pending_phase = Some(target);
    change_phase(session, Phase::Transition, events);
    effects.push(Effect::ScheduleTransition(target));
    effects.push(Effect::PersistSession);
}

fn change_phase(session: &mut WorkoutSession, to: Phase, events: &mut Vec<SessionEvent>) {
    let from = session.phase;
    session.phase = to;
    if from != to {
        tracing::info!("Phase {} -> {}", from, to);
        events.push(SessionEvent::PhaseChanged { from, to });
    }
}

//! The caller-facing workout timer.
//!
//! [`WorkoutTimer`] owns the live session and runs the effects that the
//! state machine and tick engine ask for: scheduling, cancellation,
//! persistence, and the completion pipeline (history, achievements, XP).
//! It never sleeps; the host calls [`WorkoutTimer::run_due`] whenever it
//! wakes up.

use crate::achievements::{
    get_default_catalog, AchievementCatalog, AchievementEvaluator, AchievementProgress,
    SessionFacts, UnlockedAchievement,
};
use crate::config::Config;
use crate::experience::{ExperienceCalculator, ExperienceOutcome};
use crate::history::WorkoutHistoryEntry;
use crate::machine::{self, Action, Effect, MachineContext};
use crate::schedule::{Clock, Scheduler, TaskKind};
use crate::storage::{FailOpen, Store};
use crate::statistics;
use crate::tick;
use crate::types::{Phase, SessionEvent, TimeField, WorkoutSession};
use crate::Result;
use chrono::{DateTime, Duration, FixedOffset, Local, Offset, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Everything a completed session produced, for the caller to render
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    pub unlocked_achievements: Vec<UnlockedAchievement>,
    pub progress_achievements: Vec<AchievementProgress>,
    pub session_facts: SessionFacts,
    pub experience: ExperienceOutcome,
    /// `None` when the entry was a duplicate or could not be stored
    pub history_entry_id: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TimerEvent {
    Session(SessionEvent),
    Completed(Box<CompletionReport>),
}

/// Drives one workout session at a time
pub struct WorkoutTimer<S: Store, C: Clock> {
    session: WorkoutSession,
    store: FailOpen<S>,
    clock: C,
    scheduler: Scheduler,
    config: Config,
    catalog: AchievementCatalog,
    offset: FixedOffset,
}

impl<S: Store, C: Clock> WorkoutTimer<S, C> {
    /// A timer in `setup`, using stored settings when there are any
    pub fn new(store: S, clock: C, config: Config) -> Self {
        let store = FailOpen::new(store);
        let bounds = &config.timer.bounds;
        let settings = bounds.clamp_settings(&store.settings().unwrap_or(config.timer.defaults));
        let total_sets = bounds.total_sets.clamp(i64::from(config.timer.total_sets));

        Self {
            session: WorkoutSession::new(settings, total_sets),
            store,
            clock,
            scheduler: Scheduler::new(),
            catalog: get_default_catalog().clone(),
            offset: Local::now().offset().fix(),
            config,
        }
    }

    /// Use `offset` to decide local dates and hours for achievements
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn session(&self) -> &WorkoutSession {
        &self.session
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &FailOpen<S> {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store.into_inner()
    }

    /// When the next scheduled task is due, if any
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.scheduler.next_due()
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn start_workout(&mut self) -> Result<Vec<TimerEvent>> {
        self.dispatch(Action::StartWorkout)
    }

    pub fn continue_to_stretch(&mut self) -> Result<Vec<TimerEvent>> {
        self.dispatch(Action::ContinueToStretch)
    }

    pub fn toggle_pause(&mut self) -> Result<Vec<TimerEvent>> {
        self.dispatch(Action::TogglePause)
    }

    pub fn skip_phase(&mut self) -> Result<Vec<TimerEvent>> {
        self.dispatch(Action::SkipPhase)
    }

    pub fn reset_workout(&mut self) -> Result<Vec<TimerEvent>> {
        self.dispatch(Action::ResetWorkout)
    }

    pub fn adjust_sets(&mut self, delta: i32) -> Result<Vec<TimerEvent>> {
        self.dispatch(Action::AdjustSets(delta))
    }

    pub fn adjust_time(&mut self, field: TimeField, delta: i32) -> Result<Vec<TimerEvent>> {
        self.dispatch(Action::AdjustTime(field, delta))
    }

    /// Pick up a persisted session after a restart
    ///
    /// A session that was mid-phase comes back paused, so the time the
    /// process was down is neither counted nor lost. A pending transition
    /// is rescheduled. Returns whether an unfinished session was resumed.
    pub fn restore(&mut self) -> bool {
        let Some(mut saved) = self.store.session() else {
            return false;
        };
        self.clamp_snapshot(&mut saved);
        let now = self.clock.now();

        match saved.phase {
            Phase::Setup => {
                self.session = WorkoutSession::new(saved.settings, saved.total_sets);
                false
            }
            Phase::Complete => {
                tracing::debug!("Stored session already complete, discarding");
                self.store.clear_session();
                false
            }
            phase => {
                if phase.is_timed() && !saved.is_paused {
                    saved.is_paused = true;
                    statistics::begin_pause(&mut saved.statistics, now);
                }
                self.scheduler.cancel_all();
                if let (Phase::Transition, Some(target)) = (phase, saved.pending_phase) {
                    let due = now + self.transition_delay();
                    self.scheduler.schedule(TaskKind::FinishTransition(target), due);
                }
                self.session = saved;
                self.store.save_session(&self.session);
                tracing::info!(
                    "Restored session in {} (set {}/{}, {}s left)",
                    self.session.phase,
                    self.session.current_set,
                    self.session.total_sets,
                    self.session.time_remaining
                );
                true
            }
        }
    }

    /// Pull a stored snapshot back inside the configured bounds
    fn clamp_snapshot(&self, saved: &mut WorkoutSession) {
        let bounds = &self.config.timer.bounds;
        let settings = bounds.clamp_settings(&saved.settings);
        if settings != saved.settings {
            tracing::warn!("Stored session settings out of bounds, clamping");
        }
        saved.settings = settings;
        saved.total_sets = bounds.total_sets.clamp(i64::from(saved.total_sets));
        saved.current_set = saved.current_set.min(saved.total_sets);
        saved.current_rep = saved.current_rep.min(settings.reps_per_set);

        let phase_length = match saved.phase {
            Phase::Prepare | Phase::Countdown => settings.stretch_time,
            Phase::Work => settings.work_seconds(),
            Phase::Rest => settings.rest_time,
            _ => saved.time_remaining,
        };
        saved.time_remaining = saved.time_remaining.min(phase_length);
    }

    /// Run every scheduled task that is due by the clock's current time
    ///
    /// Tasks run at their own due time, so a host that wakes late catches
    /// up without changing the outcome.
    pub fn run_due(&mut self) -> Vec<TimerEvent> {
        let now = self.clock.now();
        let mut events = Vec::new();

        while let Some(task) = self.scheduler.pop_due(now) {
            match task.kind {
                TaskKind::Tick => {
                    let outcome = tick::tick(&mut self.session, task.due);
                    events.extend(outcome.events.into_iter().map(TimerEvent::Session));
                    self.run_effects(&outcome.effects, task.due, &mut events);
                    if self.session.is_ticking() && !self.scheduler.has_pending_tick() {
                        self.scheduler
                            .schedule(TaskKind::Tick, task.due + Duration::seconds(1));
                    }
                }
                TaskKind::FinishTransition(target) => {
                    match self.dispatch_at(Action::FinishTransition(target), task.due) {
                        Ok(more) => events.extend(more),
                        Err(e) => tracing::debug!("Dropped stale transition: {}", e),
                    }
                }
            }
        }

        events
    }

    fn transition_delay(&self) -> Duration {
        Duration::milliseconds(self.config.timer.transition_delay_ms as i64)
    }

    fn dispatch(&mut self, action: Action) -> Result<Vec<TimerEvent>> {
        let now = self.clock.now();
        self.dispatch_at(action, now)
    }

    fn dispatch_at(&mut self, action: Action, now: DateTime<Utc>) -> Result<Vec<TimerEvent>> {
        let ctx = MachineContext {
            now,
            policy: &self.config.policy,
            bounds: &self.config.timer.bounds,
        };
        let transition = match machine::apply(&self.session, action, &ctx) {
            Ok(transition) => transition,
            Err(e) => {
                tracing::debug!("Rejected {:?}: {}", action, e);
                return Err(e);
            }
        };

        self.session = transition.session;
        let mut events: Vec<TimerEvent> = transition
            .events
            .into_iter()
            .map(TimerEvent::Session)
            .collect();
        self.run_effects(&transition.effects, now, &mut events);
        self.sync_ticking(now);
        Ok(events)
    }

    fn run_effects(&mut self, effects: &[Effect], now: DateTime<Utc>, events: &mut Vec<TimerEvent>) {
        for effect in effects {
            match *effect {
                Effect::ScheduleTransition(target) => {
                    let due = now + self.transition_delay();
                    self.scheduler.schedule(TaskKind::FinishTransition(target), due);
                }
                Effect::CancelPending => self.scheduler.cancel_all(),
                Effect::PersistSession => self.store.save_session(&self.session),
                Effect::PersistSettings => self.store.save_settings(&self.session.settings),
                Effect::ClearSession => self.store.clear_session(),
                Effect::Completed => {
                    let report = self.complete(now);
                    events.push(TimerEvent::Completed(Box::new(report)));
                }
            }
        }
    }

    /// Keep exactly one tick queued while the session is ticking
    fn sync_ticking(&mut self, now: DateTime<Utc>) {
        if self.session.is_ticking() {
            if !self.scheduler.has_pending_tick() {
                self.scheduler.schedule(TaskKind::Tick, now + Duration::seconds(1));
            }
        } else {
            self.scheduler.cancel_ticks();
        }
    }

    fn complete(&mut self, now: DateTime<Utc>) -> CompletionReport {
        let history_entry_id = WorkoutHistoryEntry::from_session(&self.session, now).and_then(|entry| {
            let id = entry.id;
            self.store
                .append_history(entry, self.config.history.max_entries)
                .then_some(id)
        });

        let evaluator =
            AchievementEvaluator::new(&self.catalog, self.config.achievements.streak_gap_days);
        let evaluation = evaluator.process(&mut self.store, &self.session, now, self.offset);

        let calculator = ExperienceCalculator::new(self.config.experience.clone());
        let experience =
            calculator.process(&mut self.store, &evaluation.facts, &evaluation.unlocked, now);

        CompletionReport {
            unlocked_achievements: evaluation.unlocked,
            progress_achievements: evaluation.progressed,
            session_facts: evaluation.facts,
            experience,
            history_entry_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RejectionReason;
    use crate::schedule::ManualClock;
    use crate::storage::{BlobKey, MemoryStore};
    use crate::types::{Settings, Statistics};
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.timer.defaults = Settings {
            time_per_rep: 3,
            rest_time: 5,
            stretch_time: 10,
            reps_per_set: 2,
        };
        config.timer.total_sets = 3;
        config
    }

    fn create_timer(store: MemoryStore) -> (WorkoutTimer<MemoryStore, ManualClock>, ManualClock) {
        let clock = ManualClock::new(t0());
        let timer = WorkoutTimer::new(store, clock.clone(), test_config())
            .with_offset(FixedOffset::east_opt(0).unwrap());
        (timer, clock)
    }

    fn to_countdown(timer: &mut WorkoutTimer<MemoryStore, ManualClock>, clock: &ManualClock) {
        timer.start_workout().unwrap();
        clock.advance(Duration::milliseconds(600));
        timer.run_due();
        assert_eq!(timer.session().phase, Phase::Prepare);

        timer.continue_to_stretch().unwrap();
        clock.advance(Duration::milliseconds(600));
        timer.run_due();
        assert_eq!(timer.session().phase, Phase::Countdown);
    }

    fn completion(events: &[TimerEvent]) -> Option<&CompletionReport> {
        events.iter().find_map(|event| match event {
            TimerEvent::Completed(report) => Some(report.as_ref()),
            _ => None,
        })
    }

    #[test]
    fn test_full_session_runs_to_completion() {
        crate::logging::init_test();
        let (mut timer, clock) = create_timer(MemoryStore::new());
        to_countdown(&mut timer, &clock);
        assert_eq!(timer.session().total_duration(), 38);

        let mut report = None;
        for second in 1..=38 {
            let s = timer.session();
            assert_eq!(s.remaining_duration() + s.statistics.active_seconds(), 38);
            clock.advance(Duration::seconds(1));
            let events = timer.run_due();
            if let Some(found) = completion(&events) {
                assert_eq!(second, 38);
                report = Some(found.clone());
            }
        }

        let report = report.expect("session should complete");
        let session = timer.session();
        assert!(session.is_complete());
        assert_eq!(session.statistics.total_reps_completed, 6);
        assert!(timer.is_idle());

        let ids: Vec<_> = report.unlocked_achievements.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["first_workout", "perfect_session"]);
        assert_eq!(report.session_facts.time_seconds, 38);
        assert_eq!(report.experience.total_awarded, 50 + 25 + 100 + 100);

        let history = timer.store().history();
        assert_eq!(history.len(), 1);
        assert_eq!(report.history_entry_id, Some(history[0].id));
        assert_eq!(timer.store().experience().total_xp, 275);
        assert_eq!(timer.store().accumulated_data().cumulative_sets, 3);
    }

    #[test]
    fn test_late_wakeup_catches_up() {
        let (mut timer, clock) = create_timer(MemoryStore::new());
        to_countdown(&mut timer, &clock);

        clock.advance(Duration::minutes(5));
        let events = timer.run_due();
        assert!(completion(&events).is_some());
        assert_eq!(timer.session().statistics.total_time_exercised, 18);
    }

    #[test]
    fn test_pause_freezes_time_and_counts_seconds() {
        let (mut timer, clock) = create_timer(MemoryStore::new());
        to_countdown(&mut timer, &clock);

        clock.advance(Duration::seconds(3));
        timer.run_due();
        assert_eq!(timer.session().time_remaining, 7);

        timer.toggle_pause().unwrap();
        clock.advance(Duration::seconds(7));
        assert!(timer.run_due().is_empty());
        assert_eq!(timer.session().time_remaining, 7);

        timer.toggle_pause().unwrap();
        assert_eq!(timer.session().statistics.total_time_paused, 7);

        clock.advance(Duration::seconds(1));
        timer.run_due();
        assert_eq!(timer.session().time_remaining, 6);
    }

    #[test]
    fn test_reset_returns_to_clean_setup() {
        let (mut timer, clock) = create_timer(MemoryStore::new());
        to_countdown(&mut timer, &clock);
        clock.advance(Duration::seconds(14));
        timer.run_due();
        assert_eq!(timer.session().phase, Phase::Work);

        timer.reset_workout().unwrap();
        assert_eq!(timer.session().phase, Phase::Transition);
        assert!(!timer.store().inner().contains(BlobKey::Session));

        clock.advance(Duration::seconds(2));
        timer.run_due();

        let s = timer.session();
        assert_eq!(s.phase, Phase::Setup);
        assert_eq!(s.current_set, 0);
        assert_eq!(s.time_remaining, 0);
        assert!(!s.is_paused);
        assert_eq!(s.statistics, Statistics::default());
        assert_eq!(s.total_sets, 3);
        assert!(timer.is_idle());
        assert!(!timer.store().inner().contains(BlobKey::Session));
    }

    #[test]
    fn test_reset_during_transition_drops_stale_callback() {
        let (mut timer, clock) = create_timer(MemoryStore::new());
        timer.start_workout().unwrap();
        clock.advance(Duration::milliseconds(300));
        timer.reset_workout().unwrap();

        clock.advance(Duration::seconds(1));
        timer.run_due();
        assert_eq!(timer.session().phase, Phase::Setup);
        assert!(timer.is_idle());
    }

    #[test]
    fn test_skip_rest_refused_by_default() {
        let (mut timer, clock) = create_timer(MemoryStore::new());
        to_countdown(&mut timer, &clock);
        clock.advance(Duration::seconds(16));
        timer.run_due();
        assert_eq!(timer.session().phase, Phase::Rest);

        let before = timer.session().clone();
        let err = timer.skip_phase().unwrap_err();
        assert_eq!(
            err.rejection().map(|r| r.reason),
            Some(RejectionReason::RestSkipDisabled)
        );
        assert_eq!(timer.session(), &before);
    }

    #[test]
    fn test_skip_work_on_last_set_completes() {
        let (mut timer, clock) = create_timer(MemoryStore::new());
        timer.adjust_sets(-2).unwrap();
        to_countdown(&mut timer, &clock);

        timer.skip_phase().unwrap();
        assert_eq!(timer.session().phase, Phase::Work);
        let events = timer.skip_phase().unwrap();
        assert!(completion(&events).is_some());
        assert!(timer.is_idle());
    }

    #[test]
    fn test_adjustments_only_in_setup() {
        let (mut timer, clock) = create_timer(MemoryStore::new());
        timer.adjust_sets(100).unwrap();
        assert_eq!(timer.session().total_sets, 50);
        timer.adjust_time(TimeField::RestTime, -100).unwrap();
        assert_eq!(timer.session().settings.rest_time, 5);
        assert_eq!(timer.store().settings().map(|s| s.rest_time), Some(5));

        to_countdown(&mut timer, &clock);
        let err = timer.adjust_sets(1).unwrap_err();
        assert_eq!(
            err.rejection().map(|r| r.reason),
            Some(RejectionReason::NotAllowedInPhase)
        );
    }

    #[test]
    fn test_restore_comes_back_paused() {
        let (mut timer, clock) = create_timer(MemoryStore::new());
        to_countdown(&mut timer, &clock);
        clock.advance(Duration::seconds(12));
        timer.run_due();
        let before = timer.session().clone();
        assert_eq!(before.phase, Phase::Work);

        let store = timer.into_store();
        let clock = ManualClock::new(t0() + Duration::minutes(10));
        let mut restored = WorkoutTimer::new(store, clock.clone(), test_config());
        assert!(restored.restore());

        let s = restored.session();
        assert_eq!(s.phase, Phase::Work);
        assert!(s.is_paused);
        assert_eq!(s.time_remaining, before.time_remaining);
        assert!(restored.is_idle());

        clock.advance(Duration::seconds(4));
        restored.toggle_pause().unwrap();
        assert_eq!(restored.session().statistics.total_time_paused, 4);
        assert!(!restored.is_idle());
    }

    #[test]
    fn test_restore_clamps_out_of_range_snapshot() {
        let mut store = MemoryStore::new();
        let mut saved = WorkoutSession::new(
            Settings {
                time_per_rep: 0,
                rest_time: 5,
                stretch_time: 10,
                reps_per_set: u32::MAX,
            },
            500,
        );
        saved.phase = Phase::Countdown;
        saved.current_set = 400;
        saved.time_remaining = 4;
        saved.statistics.workout_start_time = Some(t0());
        store.save_session(&saved).unwrap();

        let clock = ManualClock::new(t0());
        let mut timer = WorkoutTimer::new(store, clock.clone(), test_config())
            .with_offset(FixedOffset::east_opt(0).unwrap());
        assert!(timer.restore());

        let s = timer.session();
        assert_eq!(s.settings.time_per_rep, 1);
        assert_eq!(s.settings.reps_per_set, 100);
        assert_eq!(s.total_sets, 50);
        assert_eq!(s.current_set, 50);
        assert_eq!(s.time_remaining, 4);

        timer.toggle_pause().unwrap();
        clock.advance(Duration::seconds(4));
        timer.run_due();
        assert_eq!(timer.session().phase, Phase::Work);
        assert_eq!(timer.session().time_remaining, 100);

        clock.advance(Duration::seconds(100));
        let events = timer.run_due();
        assert!(completion(&events).is_some());
        assert_eq!(timer.session().phase, Phase::Complete);
    }

    #[test]
    fn test_storage_failures_do_not_stop_the_workout() {
        let mut store = MemoryStore::new();
        store.fail_reads = true;
        store.fail_writes = true;
        let (mut timer, clock) = create_timer(store);
        to_countdown(&mut timer, &clock);

        clock.advance(Duration::minutes(1));
        let events = timer.run_due();
        let report = completion(&events).expect("completes without storage");
        assert!(report.history_entry_id.is_none());
        assert_eq!(report.experience.state.total_xp, 275);
    }
}

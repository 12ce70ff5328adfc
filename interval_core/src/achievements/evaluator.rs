//! Achievement evaluation at session completion.

use super::streak::{next_weekly_streak, week_start};
use super::{
    AccumulatedData, AchievementCatalog, AchievementProgress, AchievementRule, AchievementState,
    SessionFacts, UnlockedAchievement,
};
use crate::storage::{FailOpen, Store};
use crate::types::WorkoutSession;
use chrono::{DateTime, FixedOffset, Timelike, Utc};
use std::collections::HashMap;

/// Result of evaluating one completed session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Evaluation {
    pub facts: SessionFacts,
    pub unlocked: Vec<UnlockedAchievement>,
    pub progressed: Vec<AchievementProgress>,
    /// One state per catalog entry, in catalog order
    pub states: Vec<AchievementState>,
    pub data: AccumulatedData,
}

/// Runs a catalog against completed sessions
#[derive(Clone, Copy, Debug)]
pub struct AchievementEvaluator<'a> {
    catalog: &'a AchievementCatalog,
    streak_gap_days: i64,
}

impl<'a> AchievementEvaluator<'a> {
    pub fn new(catalog: &'a AchievementCatalog, streak_gap_days: i64) -> Self {
        Self {
            catalog,
            streak_gap_days,
        }
    }

    /// Facts about `session` as seen from the local `offset`
    ///
    /// Dates and hours come from the workout start time, falling back to
    /// `now` for a session that never recorded one.
    pub fn session_facts(
        session: &WorkoutSession,
        data: &AccumulatedData,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> SessionFacts {
        let stats = &session.statistics;
        let started = stats.workout_start_time.unwrap_or(now).with_timezone(&offset);
        let date = started.date_naive();

        SessionFacts {
            sets: session.total_sets,
            reps: u64::from(session.total_sets) * u64::from(session.settings.reps_per_set),
            time_seconds: stats.active_seconds(),
            paused_seconds: stats.total_time_paused,
            date,
            week_start: week_start(date),
            start_hour: started.hour(),
            is_new_day: data.last_workout_date.map_or(true, |last| date > last),
            streak_advanced: false,
        }
    }

    /// Evaluate a finished session against the stored counters and states
    ///
    /// Pure: nothing is persisted. Achievements already unlocked are carried
    /// over untouched.
    pub fn evaluate(
        &self,
        session: &WorkoutSession,
        data: &AccumulatedData,
        states: &[AchievementState],
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Evaluation {
        let mut facts = Self::session_facts(session, data, now, offset);
        let mut data = data.clone();

        data.cumulative_sets += u64::from(facts.sets);
        data.cumulative_reps += facts.reps;
        data.cumulative_time_seconds += facts.time_seconds;
        if facts.is_new_day {
            data.total_workout_days += 1;
        }

        let previous_streak = data.weekly_streak;
        data.weekly_streak = next_weekly_streak(
            previous_streak,
            data.last_workout_date,
            facts.date,
            self.streak_gap_days,
        );
        facts.streak_advanced = data.weekly_streak > previous_streak;
        data.last_workout_date = data.last_workout_date.max(Some(facts.date));

        let no_pause_broken = !facts.is_perfect();
        if no_pause_broken {
            data.consecutive_no_pause_sessions = 0;
        } else {
            data.consecutive_no_pause_sessions += 1;
        }

        let mut existing: HashMap<&str, &AchievementState> =
            states.iter().map(|s| (s.id.as_str(), s)).collect();
        let mut unlocked = Vec::new();
        let mut progressed = Vec::new();
        let mut next_states = Vec::with_capacity(self.catalog.len());

        for def in self.catalog.definitions() {
            let mut state = existing
                .remove(def.id)
                .cloned()
                .unwrap_or_else(|| AchievementState::locked(def.id));
            if let (Some(progress), Some(max)) = (state.progress, def.max_progress) {
                state.progress = Some(progress.min(max));
            }

            if state.unlocked {
                next_states.push(state);
                continue;
            }

            if no_pause_broken && matches!(def.rule, AchievementRule::NoPauseStreak { .. }) {
                state.progress = Some(0);
            }

            let progress = def
                .rule
                .progress(&data)
                .zip(def.max_progress)
                .map(|(value, max)| value.min(max));
            if progress.is_some() {
                state.progress = progress;
            }
            let reached = matches!((progress, def.max_progress), (Some(p), Some(max)) if p >= max);

            if def.rule.check_unlock(&facts, &data) || reached {
                state.unlocked = true;
                state.unlocked_at = Some(now);
                tracing::info!("Achievement unlocked: {} ({})", def.name, def.id);
                unlocked.push(UnlockedAchievement {
                    id: def.id,
                    name: def.name,
                    description: def.description,
                    category: def.category,
                    rarity: def.rarity,
                    unlocked_at: now,
                });
            } else if def.rule.session_contributed(&facts) {
                if let (Some(progress), Some(max_progress)) = (state.progress, def.max_progress) {
                    progressed.push(AchievementProgress {
                        id: def.id,
                        name: def.name,
                        progress,
                        max_progress,
                    });
                }
            }

            next_states.push(state);
        }

        for stale in existing.keys() {
            tracing::debug!("Dropping state for unknown achievement '{}'", stale);
        }

        Evaluation {
            facts,
            unlocked,
            progressed,
            states: next_states,
            data,
        }
    }

    /// Load, evaluate and persist in one go
    ///
    /// Unreadable state is treated as empty, so a corrupt record restarts
    /// from zero instead of blocking the evaluation.
    pub fn process<S: Store>(
        &self,
        store: &mut FailOpen<S>,
        session: &WorkoutSession,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Evaluation {
        let data = store.accumulated_data();
        let states = store.achievement_states();

        let evaluation = self.evaluate(session, &data, &states, now, offset);

        store.save_accumulated_data(&evaluation.data);
        store.save_achievement_states(&evaluation.states);
        tracing::debug!(
            "Evaluated achievements: {} unlocked, {} progressed",
            evaluation.unlocked.len(),
            evaluation.progressed.len()
        );
        evaluation
    }
}

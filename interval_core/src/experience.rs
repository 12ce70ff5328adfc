//! Experience points and levels.
//!
//! Going from level `L` to `L + 1` costs `100 + 50 * (L - 1)` XP. A level's
//! cumulative threshold is the sum of every requirement below it, so level 1
//! starts at 0 XP, level 2 at 100, level 3 at 250 and so on.

use crate::achievements::{SessionFacts, UnlockedAchievement};
use crate::config::{ExperienceConfig, MAX_LEVEL_CAP};
use crate::storage::{FailOpen, Store};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted experience record
///
/// `current_level` is always the level `total_xp` reaches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceState {
    pub total_xp: u64,
    pub current_level: u32,
    pub last_level_up_time: Option<DateTime<Utc>>,
}

impl Default for ExperienceState {
    fn default() -> Self {
        Self {
            total_xp: 0,
            current_level: 1,
            last_level_up_time: None,
        }
    }
}

/// XP needed to go from `level` to the next one
pub fn xp_required(level: u32) -> u64 {
    100 + 50 * u64::from(level.max(1) - 1)
}

/// Total XP at which `level` is reached
pub fn cumulative_xp_for_level(level: u32) -> u64 {
    let below = u64::from(level.max(1) - 1);
    let steps = below.saturating_mul(below.saturating_sub(1)) / 2;
    (100 * below).saturating_add(steps.saturating_mul(50))
}

/// Highest level reached with `total_xp`, capped at `max_level`
pub fn level_for_xp(total_xp: u64, max_level: u32) -> u32 {
    let mut level = 1;
    while level < max_level && cumulative_xp_for_level(level + 1) <= total_xp {
        level += 1;
    }
    level
}

/// Where a player stands inside their current level
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LevelProgress {
    pub level: u32,
    pub into_level: u64,
    pub needed: u64,
}

pub fn level_progress(total_xp: u64, max_level: u32) -> LevelProgress {
    let level = level_for_xp(total_xp, max_level);
    let needed = xp_required(level);
    let into_level = total_xp
        .saturating_sub(cumulative_xp_for_level(level))
        .min(needed);
    LevelProgress {
        level,
        into_level,
        needed,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "source", content = "id", rename_all = "snake_case")]
pub enum XpSource {
    Completion,
    PerfectSession,
    LongSession,
    Achievement(&'static str),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct XpGain {
    pub source: XpSource,
    pub amount: u64,
}

/// What a completed session was worth
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExperienceOutcome {
    pub gains: Vec<XpGain>,
    pub total_awarded: u64,
    pub previous_level: u32,
    /// Set when the session crossed at least one level threshold
    pub level_up: Option<u32>,
    pub state: ExperienceState,
    pub progress: LevelProgress,
}

/// Awards XP from a fixed table of sources
#[derive(Clone, Debug, Default)]
pub struct ExperienceCalculator {
    config: ExperienceConfig,
}

impl ExperienceCalculator {
    pub fn new(config: ExperienceConfig) -> Self {
        Self { config }
    }

    pub fn max_level(&self) -> u32 {
        self.config.max_level.clamp(1, MAX_LEVEL_CAP)
    }

    /// Add `amount` and recompute the level
    ///
    /// Returns the new level when it went up.
    pub fn award(&self, state: &mut ExperienceState, amount: u64, now: DateTime<Utc>) -> Option<u32> {
        state.total_xp = state.total_xp.saturating_add(amount);
        let level = level_for_xp(state.total_xp, self.max_level());
        let previous = state.current_level;
        state.current_level = level;

        if level > previous {
            state.last_level_up_time = Some(now);
            tracing::info!("Level up: {} -> {} ({} XP)", previous, level, state.total_xp);
            Some(level)
        } else {
            None
        }
    }

    /// The XP a finished session earns, source by source
    pub fn session_gains(
        &self,
        facts: &SessionFacts,
        unlocked: &[UnlockedAchievement],
    ) -> Vec<XpGain> {
        let mut gains = vec![XpGain {
            source: XpSource::Completion,
            amount: self.config.completion_xp,
        }];
        if facts.is_perfect() {
            gains.push(XpGain {
                source: XpSource::PerfectSession,
                amount: self.config.perfect_session_xp,
            });
        }
        if facts.minutes() >= self.config.long_session_minutes {
            gains.push(XpGain {
                source: XpSource::LongSession,
                amount: self.config.long_session_xp,
            });
        }
        gains.extend(unlocked.iter().map(|achievement| XpGain {
            source: XpSource::Achievement(achievement.id),
            amount: self.config.achievement_xp,
        }));
        gains.retain(|gain| gain.amount > 0);
        gains
    }

    /// Apply every gain from a finished session to `state`
    pub fn award_session(
        &self,
        state: &ExperienceState,
        facts: &SessionFacts,
        unlocked: &[UnlockedAchievement],
        now: DateTime<Utc>,
    ) -> ExperienceOutcome {
        let mut next = state.clone();
        // Heal a record whose level disagrees with its XP
        next.current_level = level_for_xp(next.total_xp, self.max_level());
        let previous_level = next.current_level;

        let gains = self.session_gains(facts, unlocked);
        let mut level_up = None;
        for gain in &gains {
            if let Some(level) = self.award(&mut next, gain.amount, now) {
                level_up = Some(level);
            }
        }

        ExperienceOutcome {
            total_awarded: gains.iter().map(|gain| gain.amount).sum(),
            gains,
            previous_level,
            level_up,
            progress: level_progress(next.total_xp, self.max_level()),
            state: next,
        }
    }

    /// Load, award and persist in one go
    pub fn process<S: Store>(
        &self,
        store: &mut FailOpen<S>,
        facts: &SessionFacts,
        unlocked: &[UnlockedAchievement],
        now: DateTime<Utc>,
    ) -> ExperienceOutcome {
        let state = store.experience();
        let outcome = self.award_session(&state, facts, unlocked, now);
        store.save_experience(&outcome.state);
        tracing::debug!(
            "Awarded {} XP (total {}, level {})",
            outcome.total_awarded,
            outcome.state.total_xp,
            outcome.state.current_level
        );
        outcome
    }
}

//! Achievements: a static rule catalog plus the evaluator that runs once per
//! completed session.
//!
//! Rules are plain data ([`AchievementRule`]) evaluated generically, so the
//! whole catalog can be validated when it is first loaded.

mod catalog;
mod evaluator;
pub mod streak;

pub use catalog::{
    build_default_catalog, get_default_catalog, validate_definitions, AchievementCatalog,
};
pub use evaluator::{AchievementEvaluator, Evaluation};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Milestone,
    Consistency,
    Endurance,
    Discipline,
    Special,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Milestone => "milestone",
            Category::Consistency => "consistency",
            Category::Endurance => "endurance",
            Category::Discipline => "discipline",
            Category::Special => "special",
        };
        f.write_str(s)
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rarity::Common => "common",
            Rarity::Uncommon => "uncommon",
            Rarity::Rare => "rare",
            Rarity::Epic => "epic",
            Rarity::Legendary => "legendary",
        };
        f.write_str(s)
    }
}

/// Persisted state of one achievement
///
/// Once `unlocked` is set it stays set, and `unlocked_at` never moves.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementState {
    pub id: String,
    pub unlocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u64>,
}

impl AchievementState {
    pub fn locked(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Default::default()
        }
    }
}

/// Counters carried across sessions, updated only at completion
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccumulatedData {
    pub cumulative_sets: u64,
    pub cumulative_reps: u64,
    pub cumulative_time_seconds: u64,
    pub weekly_streak: u32,
    pub last_workout_date: Option<NaiveDate>,
    pub total_workout_days: u32,
    pub consecutive_no_pause_sessions: u32,
}

/// What one finished session looked like, as the rules see it
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionFacts {
    pub sets: u32,
    /// Planned reps: sets times reps per set
    pub reps: u64,
    /// Stretched + exercised + rested
    pub time_seconds: u64,
    pub paused_seconds: u64,
    /// Local calendar date the session started on
    pub date: NaiveDate,
    /// Monday of `date`'s week
    pub week_start: NaiveDate,
    /// Local hour the session started in
    pub start_hour: u32,
    pub is_new_day: bool,
    /// Set by the evaluator once the weekly streak has been updated
    pub streak_advanced: bool,
}

impl SessionFacts {
    pub fn is_perfect(&self) -> bool {
        self.paused_seconds == 0
    }

    pub fn minutes(&self) -> u64 {
        self.time_seconds / 60
    }
}

/// How an achievement is earned
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AchievementRule {
    FirstWorkout,
    CumulativeSets { target: u64 },
    CumulativeReps { target: u64 },
    CumulativeMinutes { target: u64 },
    WeeklyStreak { target: u32 },
    WorkoutDays { target: u32 },
    NoPauseStreak { target: u32 },
    /// A session with no pause at all
    PerfectSession,
    SessionSets { min: u32 },
    SessionMinutes { min: u64 },
    /// Started before this local hour
    StartedBefore { hour: u32 },
    /// Started at or after this local hour
    StartedFrom { hour: u32 },
}

impl AchievementRule {
    /// Predicate check against the finished session and the updated counters
    pub fn check_unlock(&self, facts: &SessionFacts, data: &AccumulatedData) -> bool {
        match *self {
            AchievementRule::FirstWorkout => data.cumulative_sets > 0,
            AchievementRule::PerfectSession => facts.is_perfect(),
            AchievementRule::SessionSets { min } => facts.sets >= min,
            AchievementRule::SessionMinutes { min } => facts.minutes() >= min,
            AchievementRule::StartedBefore { hour } => facts.start_hour < hour,
            AchievementRule::StartedFrom { hour } => facts.start_hour >= hour,
            _ => match (self.progress(data), self.target()) {
                (Some(progress), Some(target)) => progress >= target,
                _ => false,
            },
        }
    }

    /// Current value of the counter this rule tracks, if it tracks one
    pub fn progress(&self, data: &AccumulatedData) -> Option<u64> {
        match *self {
            AchievementRule::CumulativeSets { .. } => Some(data.cumulative_sets),
            AchievementRule::CumulativeReps { .. } => Some(data.cumulative_reps),
            AchievementRule::CumulativeMinutes { .. } => Some(data.cumulative_time_seconds / 60),
            AchievementRule::WeeklyStreak { .. } => Some(u64::from(data.weekly_streak)),
            AchievementRule::WorkoutDays { .. } => Some(u64::from(data.total_workout_days)),
            AchievementRule::NoPauseStreak { .. } => {
                Some(u64::from(data.consecutive_no_pause_sessions))
            }
            _ => None,
        }
    }

    pub fn target(&self) -> Option<u64> {
        match *self {
            AchievementRule::CumulativeSets { target }
            | AchievementRule::CumulativeReps { target }
            | AchievementRule::CumulativeMinutes { target } => Some(target),
            AchievementRule::WeeklyStreak { target }
            | AchievementRule::WorkoutDays { target }
            | AchievementRule::NoPauseStreak { target } => Some(u64::from(target)),
            _ => None,
        }
    }

    pub fn is_progressive(&self) -> bool {
        self.target().is_some()
    }

    /// Whether this session moved the rule's counter forward
    ///
    /// Only feeds the "progressed" list shown to the user. For the no-pause
    /// streak this is best-effort; unlocking reads the counter itself.
    pub fn session_contributed(&self, facts: &SessionFacts) -> bool {
        match *self {
            AchievementRule::CumulativeSets { .. } => facts.sets > 0,
            AchievementRule::CumulativeReps { .. } => facts.reps > 0,
            AchievementRule::CumulativeMinutes { .. } => facts.time_seconds > 0,
            AchievementRule::WeeklyStreak { .. } => facts.streak_advanced,
            AchievementRule::WorkoutDays { .. } => facts.is_new_day,
            AchievementRule::NoPauseStreak { .. } => facts.is_perfect(),
            _ => false,
        }
    }
}

/// Static description of an achievement
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AchievementDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: Category,
    pub rarity: Rarity,
    pub max_progress: Option<u64>,
    pub rule: AchievementRule,
}

/// An achievement unlocked by the session just evaluated
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UnlockedAchievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub category: Category,
    pub rarity: Rarity,
    pub unlocked_at: DateTime<Utc>,
}

/// An achievement the session moved toward without unlocking
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AchievementProgress {
    pub id: &'static str,
    pub name: &'static str,
    pub progress: u64,
    pub max_progress: u64,
}

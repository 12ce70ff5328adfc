//! Built-in achievement catalog.

use super::{AchievementDefinition, AchievementRule, Category, Rarity};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Cached default catalog, built and validated on first use
static DEFAULT_CATALOG: Lazy<AchievementCatalog> = Lazy::new(|| {
    let catalog = build_default_catalog();
    for problem in catalog.validate() {
        tracing::error!("Built-in achievement catalog: {}", problem);
    }
    catalog
});

/// Get a reference to the cached default catalog
pub fn get_default_catalog() -> &'static AchievementCatalog {
    &DEFAULT_CATALOG
}

/// An ordered set of achievement definitions
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AchievementCatalog {
    definitions: Vec<AchievementDefinition>,
}

impl AchievementCatalog {
    /// Build a catalog, refusing definitions that do not validate
    pub fn new(definitions: Vec<AchievementDefinition>) -> Result<Self> {
        let problems = validate_definitions(&definitions);
        if !problems.is_empty() {
            return Err(Error::AchievementValidation(problems.join("; ")));
        }
        Ok(Self { definitions })
    }

    pub fn definitions(&self) -> &[AchievementDefinition] {
        &self.definitions
    }

    pub fn get(&self, id: &str) -> Option<&AchievementDefinition> {
        self.definitions.iter().find(|def| def.id == id)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Returns a list of validation errors, or empty Vec if valid
    pub fn validate(&self) -> Vec<String> {
        validate_definitions(&self.definitions)
    }
}

/// Check a list of definitions for consistency
pub fn validate_definitions(definitions: &[AchievementDefinition]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for def in definitions {
        if def.id.is_empty() {
            errors.push("Achievement has empty ID".to_string());
            continue;
        }
        if !seen.insert(def.id) {
            errors.push(format!("Duplicate achievement ID '{}'", def.id));
        }
        if def.name.is_empty() {
            errors.push(format!("Achievement '{}' has empty name", def.id));
        }

        match (def.rule.is_progressive(), def.max_progress) {
            (true, None) | (true, Some(0)) => errors.push(format!(
                "Achievement '{}' tracks progress but has no positive max_progress",
                def.id
            )),
            (false, Some(_)) => errors.push(format!(
                "Achievement '{}' has max_progress but its rule tracks no progress",
                def.id
            )),
            _ => {}
        }

        match def.rule {
            AchievementRule::StartedBefore { hour } | AchievementRule::StartedFrom { hour }
                if hour > 23 =>
            {
                errors.push(format!("Achievement '{}' uses hour {} (0-23)", def.id, hour));
            }
            _ => {}
        }
    }

    errors
}

fn define(
    id: &'static str,
    name: &'static str,
    description: &'static str,
    category: Category,
    rarity: Rarity,
    rule: AchievementRule,
) -> AchievementDefinition {
    AchievementDefinition {
        id,
        name,
        description,
        category,
        rarity,
        max_progress: rule.target(),
        rule,
    }
}

/// Builds the default catalog
///
/// Prefer [`get_default_catalog`] outside of tests.
pub fn build_default_catalog() -> AchievementCatalog {
    use AchievementRule::*;
    use Category::*;
    use Rarity::*;

    let definitions = vec![
        define(
            "first_workout",
            "First Steps",
            "Complete your first workout",
            Milestone,
            Common,
            FirstWorkout,
        ),
        define(
            "sets_10",
            "Warming Up",
            "Complete 10 sets in total",
            Milestone,
            Common,
            CumulativeSets { target: 10 },
        ),
        define(
            "sets_100",
            "Set Collector",
            "Complete 100 sets in total",
            Milestone,
            Uncommon,
            CumulativeSets { target: 100 },
        ),
        define(
            "sets_500",
            "Set Machine",
            "Complete 500 sets in total",
            Milestone,
            Epic,
            CumulativeSets { target: 500 },
        ),
        define(
            "reps_100",
            "Century",
            "Complete 100 reps in total",
            Milestone,
            Common,
            CumulativeReps { target: 100 },
        ),
        define(
            "reps_1000",
            "Thousand Club",
            "Complete 1,000 reps in total",
            Milestone,
            Rare,
            CumulativeReps { target: 1000 },
        ),
        define(
            "reps_5000",
            "Rep Legend",
            "Complete 5,000 reps in total",
            Milestone,
            Epic,
            CumulativeReps { target: 5000 },
        ),
        define(
            "minutes_60",
            "First Hour",
            "Train for 60 minutes in total",
            Endurance,
            Uncommon,
            CumulativeMinutes { target: 60 },
        ),
        define(
            "minutes_600",
            "Ten Hours In",
            "Train for 600 minutes in total",
            Endurance,
            Rare,
            CumulativeMinutes { target: 600 },
        ),
        define(
            "streak_2_weeks",
            "Back Again",
            "Work out in 2 consecutive weeks",
            Consistency,
            Common,
            WeeklyStreak { target: 2 },
        ),
        define(
            "streak_4_weeks",
            "Monthly Habit",
            "Work out in 4 consecutive weeks",
            Consistency,
            Uncommon,
            WeeklyStreak { target: 4 },
        ),
        define(
            "streak_12_weeks",
            "Quarter Strong",
            "Work out in 12 consecutive weeks",
            Consistency,
            Legendary,
            WeeklyStreak { target: 12 },
        ),
        define(
            "days_7",
            "Week of Work",
            "Work out on 7 different days",
            Consistency,
            Uncommon,
            WorkoutDays { target: 7 },
        ),
        define(
            "days_30",
            "Regular",
            "Work out on 30 different days",
            Consistency,
            Rare,
            WorkoutDays { target: 30 },
        ),
        define(
            "no_pause_3",
            "Focused",
            "Finish 3 sessions in a row without pausing",
            Discipline,
            Uncommon,
            NoPauseStreak { target: 3 },
        ),
        define(
            "no_pause_10",
            "Unbreakable",
            "Finish 10 sessions in a row without pausing",
            Discipline,
            Epic,
            NoPauseStreak { target: 10 },
        ),
        define(
            "perfect_session",
            "Flawless",
            "Finish a session without pausing",
            Discipline,
            Common,
            PerfectSession,
        ),
        define(
            "big_session",
            "Volume Day",
            "Finish a session of 10 or more sets",
            Endurance,
            Rare,
            SessionSets { min: 10 },
        ),
        define(
            "long_session",
            "Long Haul",
            "Train for 30 minutes in one session",
            Endurance,
            Rare,
            SessionMinutes { min: 30 },
        ),
        define(
            "early_bird",
            "Early Bird",
            "Start a workout before 7am",
            Special,
            Uncommon,
            StartedBefore { hour: 7 },
        ),
        define(
            "night_owl",
            "Night Owl",
            "Start a workout at 10pm or later",
            Special,
            Uncommon,
            StartedFrom { hour: 22 },
        ),
    ];

    AchievementCatalog { definitions }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_valid() {
        let catalog = build_default_catalog();
        assert_eq!(catalog.len(), 21);
        let errors = catalog.validate();
        assert!(errors.is_empty(), "catalog errors: {:?}", errors);
    }

    #[test]
    fn test_cached_catalog_matches_built() {
        assert_eq!(get_default_catalog(), &build_default_catalog());
        assert!(get_default_catalog().get("no_pause_3").is_some());
        assert!(get_default_catalog().get("missing").is_none());
    }

    #[test]
    fn test_every_category_is_used() {
        let catalog = build_default_catalog();
        for category in [
            Category::Milestone,
            Category::Consistency,
            Category::Endurance,
            Category::Discipline,
            Category::Special,
        ] {
            assert!(
                catalog.definitions().iter().any(|d| d.category == category),
                "no achievements in {}",
                category
            );
        }
    }

    #[test]
    fn test_validation_catches_bad_definitions() {
        let mut dup = define(
            "sets_10",
            "Again",
            "",
            Category::Milestone,
            Rarity::Common,
            AchievementRule::CumulativeSets { target: 10 },
        );
        dup.max_progress = None;
        let mut defs = build_default_catalog().definitions().to_vec();
        defs.push(dup);
        defs.push(define(
            "",
            "Nameless",
            "",
            Category::Special,
            Rarity::Common,
            AchievementRule::PerfectSession,
        ));

        let errors = validate_definitions(&defs);
        assert_eq!(errors.len(), 3, "{:?}", errors);
        assert!(errors.iter().any(|e| e.contains("Duplicate")));
        assert!(errors.iter().any(|e| e.contains("max_progress")));
        assert!(errors.iter().any(|e| e.contains("empty ID")));

        assert!(matches!(
            AchievementCatalog::new(defs),
            Err(Error::AchievementValidation(_))
        ));
    }
}

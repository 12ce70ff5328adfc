//! Configuration file support for the interval timer.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/interval/config.toml`.

use crate::types::{
    Settings, TimeField, DEFAULT_REPS_PER_SET, DEFAULT_REST_TIME, DEFAULT_STRETCH_TIME,
    DEFAULT_TIME_PER_REP, DEFAULT_TOTAL_SETS,
};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub timer: TimerConfig,

    #[serde(default)]
    pub policy: PhasePolicy,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub achievements: AchievementConfig,

    #[serde(default)]
    pub experience: ExperienceConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Inclusive lower/upper limit for one adjustable value
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bound {
    pub min: u32,
    pub max: u32,
}

impl Bound {
    pub const fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    pub fn clamp(&self, value: i64) -> u32 {
        value.clamp(i64::from(self.min), i64::from(self.max)) as u32
    }

    pub fn range(&self) -> RangeInclusive<u32> {
        self.min..=self.max
    }
}

/// Bounds applied by `adjust_sets` / `adjust_time`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingsBounds {
    #[serde(default = "default_time_per_rep_bound")]
    pub time_per_rep: Bound,
    #[serde(default = "default_rest_time_bound")]
    pub rest_time: Bound,
    #[serde(default = "default_stretch_time_bound")]
    pub stretch_time: Bound,
    #[serde(default = "default_reps_per_set_bound")]
    pub reps_per_set: Bound,
    #[serde(default = "default_total_sets_bound")]
    pub total_sets: Bound,
}

impl Default for SettingsBounds {
    fn default() -> Self {
        Self {
            time_per_rep: default_time_per_rep_bound(),
            rest_time: default_rest_time_bound(),
            stretch_time: default_stretch_time_bound(),
            reps_per_set: default_reps_per_set_bound(),
            total_sets: default_total_sets_bound(),
        }
    }
}

impl SettingsBounds {
    pub fn for_field(&self, field: TimeField) -> Bound {
        match field {
            TimeField::TimePerRep => self.time_per_rep,
            TimeField::RestTime => self.rest_time,
            TimeField::StretchTime => self.stretch_time,
            TimeField::RepsPerSet => self.reps_per_set,
        }
    }

    /// Pull every field of `settings` into range
    pub fn clamp_settings(&self, settings: &Settings) -> Settings {
        let mut clamped = *settings;
        for field in TimeField::ALL {
            let value = self.for_field(field).clamp(i64::from(settings.get(field)));
            clamped.set(field, value);
        }
        clamped
    }
}

/// Timer defaults and limits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_total_sets")]
    pub total_sets: u32,

    /// How long the `transition` placeholder lasts before auto-advancing
    #[serde(default = "default_transition_delay_ms")]
    pub transition_delay_ms: u64,

    #[serde(default = "default_settings")]
    pub defaults: Settings,

    #[serde(default)]
    pub bounds: SettingsBounds,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            total_sets: default_total_sets(),
            transition_delay_ms: default_transition_delay_ms(),
            defaults: default_settings(),
            bounds: SettingsBounds::default(),
        }
    }
}

/// Rules for which user actions the state machine accepts
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct PhasePolicy {
    /// Allow `skip_phase` to cut a rest short
    #[serde(default)]
    pub allow_skip_rest: bool,
}

/// Workout history retention
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_max_history_entries")]
    pub max_entries: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_history_entries(),
        }
    }
}

/// Achievement evaluation parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AchievementConfig {
    /// A gap longer than this many days breaks the weekly streak outright
    #[serde(default = "default_streak_gap_days")]
    pub streak_gap_days: i64,
}

impl Default for AchievementConfig {
    fn default() -> Self {
        Self {
            streak_gap_days: default_streak_gap_days(),
        }
    }
}

/// Highest `experience.max_level` a config may ask for
pub const MAX_LEVEL_CAP: u32 = 1000;

/// XP awarded per source, and the level cap
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExperienceConfig {
    #[serde(default = "default_completion_xp")]
    pub completion_xp: u64,
    #[serde(default = "default_perfect_session_xp")]
    pub perfect_session_xp: u64,
    #[serde(default = "default_long_session_xp")]
    pub long_session_xp: u64,
    #[serde(default = "default_long_session_minutes")]
    pub long_session_minutes: u64,
    #[serde(default = "default_achievement_xp")]
    pub achievement_xp: u64,
    #[serde(default = "default_max_level")]
    pub max_level: u32,
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            completion_xp: default_completion_xp(),
            perfect_session_xp: default_perfect_session_xp(),
            long_session_xp: default_long_session_xp(),
            long_session_minutes: default_long_session_minutes(),
            achievement_xp: default_achievement_xp(),
            max_level: default_max_level(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(std::env::temp_dir);
    base.join("interval")
}

fn default_settings() -> Settings {
    Settings {
        time_per_rep: DEFAULT_TIME_PER_REP,
        rest_time: DEFAULT_REST_TIME,
        stretch_time: DEFAULT_STRETCH_TIME,
        reps_per_set: DEFAULT_REPS_PER_SET,
    }
}

fn default_total_sets() -> u32 {
    DEFAULT_TOTAL_SETS
}

fn default_time_per_rep_bound() -> Bound {
    Bound::new(1, 60)
}

fn default_rest_time_bound() -> Bound {
    Bound::new(5, 600)
}

fn default_stretch_time_bound() -> Bound {
    Bound::new(5, 600)
}

fn default_reps_per_set_bound() -> Bound {
    Bound::new(1, 100)
}

fn default_total_sets_bound() -> Bound {
    Bound::new(1, 50)
}

fn default_transition_delay_ms() -> u64 {
    600
}

fn default_max_history_entries() -> usize {
    100
}

fn default_streak_gap_days() -> i64 {
    14
}

fn default_completion_xp() -> u64 {
    50
}

fn default_perfect_session_xp() -> u64 {
    25
}

fn default_long_session_xp() -> u64 {
    30
}

fn default_long_session_minutes() -> u64 {
    20
}

fn default_achievement_xp() -> u64 {
    100
}

fn default_max_level() -> u32 {
    50
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(std::env::temp_dir);
        base.join("interval").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Check the config for contradictions
    ///
    /// Returns an empty list when the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        let bounds = &self.timer.bounds;

        for field in TimeField::ALL {
            let bound = bounds.for_field(field);
            if bound.min > bound.max {
                errors.push(format!(
                    "timer.bounds.{}: min {} > max {}",
                    field.as_str(),
                    bound.min,
                    bound.max
                ));
            }
            if bound.min == 0 {
                errors.push(format!("timer.bounds.{}: min must be positive", field.as_str()));
            }
            let value = self.timer.defaults.get(field);
            if !bound.range().contains(&value) {
                errors.push(format!(
                    "timer.defaults.{}: {} outside {}..={}",
                    field.as_str(),
                    value,
                    bound.min,
                    bound.max
                ));
            }
        }

        if bounds.total_sets.min == 0 || bounds.total_sets.min > bounds.total_sets.max {
            errors.push(format!(
                "timer.bounds.total_sets: invalid range {}..={}",
                bounds.total_sets.min, bounds.total_sets.max
            ));
        }
        if !bounds.total_sets.range().contains(&self.timer.total_sets) {
            errors.push(format!(
                "timer.total_sets: {} outside {}..={}",
                self.timer.total_sets, bounds.total_sets.min, bounds.total_sets.max
            ));
        }
        if self.history.max_entries == 0 {
            errors.push("history.max_entries must be at least 1".to_string());
        }
        if self.achievements.streak_gap_days < 1 {
            errors.push("achievements.streak_gap_days must be at least 1".to_string());
        }
        if !(1..=MAX_LEVEL_CAP).contains(&self.experience.max_level) {
            errors.push(format!(
                "experience.max_level: {} outside 1..={}",
                self.experience.max_level, MAX_LEVEL_CAP
            ));
        }

        errors
    }

    /// Like [`validate`](Self::validate) but as a single error
    pub fn ensure_valid(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(errors.join("; ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timer.defaults, Settings::default());
        assert_eq!(config.timer.total_sets, 3);
        assert!(!config.policy.allow_skip_rest);
        assert_eq!(config.history.max_entries, 100);
        assert_eq!(config.achievements.streak_gap_days, 14);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.timer.defaults, parsed.timer.defaults);
        assert_eq!(config.timer.bounds, parsed.timer.bounds);
        assert_eq!(
            config.experience.achievement_xp,
            parsed.experience.achievement_xp
        );
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[policy]
allow_skip_rest = true

[timer.bounds.rest_time]
min = 10
max = 120
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.policy.allow_skip_rest);
        assert_eq!(config.timer.bounds.rest_time, Bound::new(10, 120));
        assert_eq!(config.timer.bounds.time_per_rep, Bound::new(1, 60)); // default
        assert_eq!(config.experience.max_level, 50); // default
    }

    #[test]
    fn test_validate_reports_default_outside_bounds() {
        let mut config = Config::default();
        config.timer.defaults.rest_time = 2;
        config.timer.bounds.reps_per_set = Bound::new(20, 10);

        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("timer.defaults.rest_time")));
        assert!(errors.iter().any(|e| e.contains("timer.bounds.reps_per_set")));
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn test_validate_caps_max_level() {
        let mut config = Config::default();
        config.experience.max_level = MAX_LEVEL_CAP;
        assert!(config.validate().is_empty());

        config.experience.max_level = u32::MAX;
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("experience.max_level")));

        config.experience.max_level = 0;
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn test_clamp_settings() {
        let bounds = SettingsBounds::default();
        let wild = Settings {
            time_per_rep: 0,
            rest_time: 10_000,
            stretch_time: 30,
            reps_per_set: 500,
        };
        let clamped = bounds.clamp_settings(&wild);
        assert_eq!(clamped.time_per_rep, 1);
        assert_eq!(clamped.rest_time, 600);
        assert_eq!(clamped.stretch_time, 30);
        assert_eq!(clamped.reps_per_set, 100);
    }

    #[test]
    fn test_save_and_load_from_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.history.max_entries = 7;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.history.max_entries, 7);
    }
}

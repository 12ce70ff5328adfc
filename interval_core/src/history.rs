//! Workout history: frozen snapshots of completed sessions.
//!
//! Entries are append-only. A list is kept oldest-first and capped; when it
//! overflows, the oldest entries go. Duplicate completions (the same session
//! reported twice) are dropped by key.

use crate::types::{Settings, Statistics, WorkoutSession};
use crate::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::Path;
use uuid::Uuid;

// ============================================================================
// Sync metadata
// ============================================================================

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    Pending,
    Synced,
    Failed,
}

/// Where an entry stands with the remote analytics collector
///
/// The core only carries this; pushing entries is the host's job.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SyncStatus {
    pub state: SyncState,
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

/// Wait before retry number `attempts` (1-based): 5s, 30s, 1m, 5m, 15m,
/// then hourly.
pub fn retry_delay(attempts: u32) -> Duration {
    match attempts {
        0 | 1 => Duration::seconds(5),
        2 => Duration::seconds(30),
        3 => Duration::minutes(1),
        4 => Duration::minutes(5),
        5 => Duration::minutes(15),
        _ => Duration::hours(1),
    }
}

impl SyncStatus {
    /// When the next push should be tried, or `None` once synced
    pub fn next_attempt_at(&self) -> Option<DateTime<Utc>> {
        match (self.state, self.last_attempt_at) {
            (SyncState::Synced, _) => None,
            (_, None) => Some(DateTime::<Utc>::MIN_UTC),
            (_, Some(last)) => Some(last + retry_delay(self.attempts)),
        }
    }
}

// ============================================================================
// Entries
// ============================================================================

/// A completed session, frozen
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutHistoryEntry {
    pub id: Uuid,
    pub completed_at: DateTime<Utc>,
    pub total_sets: u32,
    pub settings: Settings,
    pub statistics: Statistics,
    #[serde(default)]
    pub sync: SyncStatus,
}

/// Identity of a completion independent of its random id
pub type HistoryKey = (Option<DateTime<Utc>>, u32, u32);

impl WorkoutHistoryEntry {
    /// Snapshot a completed session; `None` for anything not complete
    pub fn from_session(session: &WorkoutSession, now: DateTime<Utc>) -> Option<Self> {
        if !session.is_complete() {
            return None;
        }
        Some(Self {
            id: Uuid::new_v4(),
            completed_at: session.statistics.workout_end_time.unwrap_or(now),
            total_sets: session.total_sets,
            settings: session.settings,
            statistics: session.statistics.clone(),
            sync: SyncStatus::default(),
        })
    }

    pub fn key(&self) -> HistoryKey {
        (
            self.statistics.workout_start_time,
            self.total_sets,
            self.settings.reps_per_set,
        )
    }

    pub fn is_duplicate_of(&self, other: &WorkoutHistoryEntry) -> bool {
        self.id == other.id || (self.key().0.is_some() && self.key() == other.key())
    }
}

/// Append `entry` unless it is already present, keeping at most `max`
///
/// Returns whether the entry was added.
pub fn append_entry(
    entries: &mut Vec<WorkoutHistoryEntry>,
    entry: WorkoutHistoryEntry,
    max: usize,
) -> bool {
    if entries.iter().any(|existing| existing.is_duplicate_of(&entry)) {
        tracing::debug!("History entry {} already recorded, skipping", entry.id);
        return false;
    }

    entries.push(entry);
    if entries.len() > max {
        let excess = entries.len() - max;
        entries.drain(..excess);
        tracing::debug!("Evicted {} old history entries", excess);
    }
    true
}

// ============================================================================
// CSV export
// ============================================================================

/// A row in the CSV export
#[derive(Debug, Serialize)]
struct CsvRow {
    id: String,
    started_at: Option<String>,
    completed_at: String,
    total_sets: u32,
    reps_per_set: u32,
    time_per_rep: u32,
    rest_time: u32,
    stretch_time: u32,
    exercised_seconds: u64,
    rested_seconds: u64,
    stretched_seconds: u64,
    paused_seconds: u64,
    reps_completed: u64,
    sync_state: SyncState,
}

impl From<&WorkoutHistoryEntry> for CsvRow {
    fn from(entry: &WorkoutHistoryEntry) -> Self {
        let stats = &entry.statistics;
        CsvRow {
            id: entry.id.to_string(),
            started_at: stats.workout_start_time.map(|t| t.to_rfc3339()),
            completed_at: entry.completed_at.to_rfc3339(),
            total_sets: entry.total_sets,
            reps_per_set: entry.settings.reps_per_set,
            time_per_rep: entry.settings.time_per_rep,
            rest_time: entry.settings.rest_time,
            stretch_time: entry.settings.stretch_time,
            exercised_seconds: stats.total_time_exercised,
            rested_seconds: stats.total_time_rested,
            stretched_seconds: stats.total_time_stretched,
            paused_seconds: stats.total_time_paused,
            reps_completed: stats.total_reps_completed,
            sync_state: entry.sync.state,
        }
    }
}

/// Append `entries` to a CSV file, writing headers only if the file is new
///
/// The file is fsynced before returning. Returns the number of rows written.
pub fn export_csv(entries: &[WorkoutHistoryEntry], csv_path: &Path) -> Result<usize> {
    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;
    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for entry in entries {
        writer.serialize(CsvRow::from(entry))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Exported {} history entries to {:?}", entries.len(), csv_path);
    Ok(entries.len())
}

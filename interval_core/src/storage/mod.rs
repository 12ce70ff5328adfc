//! Persistence port.
//!
//! The core keeps a handful of named JSON blobs (session snapshot, settings,
//! history, achievement state, accumulated achievement data, experience).
//! A [`Store`] only has to read, write and remove raw blobs; the typed
//! operations are provided on top. [`FailOpen`] turns every failure into a
//! logged default so storage trouble never stops a workout.

mod fail_open;
mod file;
mod memory;

pub use fail_open::FailOpen;
pub use file::FileStore;
pub use memory::MemoryStore;

use crate::achievements::{AccumulatedData, AchievementState};
use crate::experience::ExperienceState;
use crate::history::{self, WorkoutHistoryEntry};
use crate::types::{Settings, WorkoutSession};
use crate::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Names of the blobs the core persists
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlobKey {
    Session,
    Settings,
    History,
    AchievementStates,
    AccumulatedData,
    Experience,
}

impl BlobKey {
    pub fn name(self) -> &'static str {
        match self {
            BlobKey::Session => "session",
            BlobKey::Settings => "settings",
            BlobKey::History => "history",
            BlobKey::AchievementStates => "achievements",
            BlobKey::AccumulatedData => "achievement_data",
            BlobKey::Experience => "experience",
        }
    }

    pub fn file_name(self) -> String {
        format!("{}.json", self.name())
    }
}

/// Synchronous key-value storage for the core's blobs
///
/// Concurrent writers are not coordinated beyond each write being atomic:
/// the last write wins.
pub trait Store {
    /// Raw contents of `key`, `None` if it was never written
    fn read_blob(&self, key: BlobKey) -> Result<Option<String>>;

    fn write_blob(&mut self, key: BlobKey, contents: &str) -> Result<()>;

    /// Remove `key`; removing a missing blob is not an error
    fn remove_blob(&mut self, key: BlobKey) -> Result<()>;

    fn load_json<T: DeserializeOwned>(&self, key: BlobKey) -> Result<Option<T>> {
        match self.read_blob(key)? {
            Some(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            None => Ok(None),
        }
    }

    fn save_json<T: Serialize>(&mut self, key: BlobKey, value: &T) -> Result<()> {
        let contents = serde_json::to_string(value)?;
        self.write_blob(key, &contents)
    }

    fn load_session(&self) -> Result<Option<WorkoutSession>> {
        self.load_json(BlobKey::Session)
    }

    fn save_session(&mut self, session: &WorkoutSession) -> Result<()> {
        self.save_json(BlobKey::Session, session)
    }

    fn clear_session(&mut self) -> Result<()> {
        self.remove_blob(BlobKey::Session)
    }

    fn load_settings(&self) -> Result<Option<Settings>> {
        self.load_json(BlobKey::Settings)
    }

    fn save_settings(&mut self, settings: &Settings) -> Result<()> {
        self.save_json(BlobKey::Settings, settings)
    }

    fn load_history(&self) -> Result<Vec<WorkoutHistoryEntry>> {
        Ok(self.load_json(BlobKey::History)?.unwrap_or_default())
    }

    fn save_history(&mut self, entries: &[WorkoutHistoryEntry]) -> Result<()> {
        self.save_json(BlobKey::History, &entries)
    }

    /// Add a completed session to history, dropping duplicates and
    /// evicting the oldest entries past `max`
    fn append_history(&mut self, entry: WorkoutHistoryEntry, max: usize) -> Result<bool> {
        let mut entries = self.load_history()?;
        let added = history::append_entry(&mut entries, entry, max);
        if added {
            self.save_history(&entries)?;
        }
        Ok(added)
    }

    fn load_achievement_states(&self) -> Result<Vec<AchievementState>> {
        Ok(self.load_json(BlobKey::AchievementStates)?.unwrap_or_default())
    }

    fn save_achievement_states(&mut self, states: &[AchievementState]) -> Result<()> {
        self.save_json(BlobKey::AchievementStates, &states)
    }

    fn load_accumulated_data(&self) -> Result<Option<AccumulatedData>> {
        self.load_json(BlobKey::AccumulatedData)
    }

    fn save_accumulated_data(&mut self, data: &AccumulatedData) -> Result<()> {
        self.save_json(BlobKey::AccumulatedData, data)
    }

    fn load_experience(&self) -> Result<Option<ExperienceState>> {
        self.load_json(BlobKey::Experience)
    }

    fn save_experience(&mut self, state: &ExperienceState) -> Result<()> {
        self.save_json(BlobKey::Experience, state)
    }
}

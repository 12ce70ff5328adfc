//! Fail-open wrapper around a [`Store`].

use super::{BlobKey, Store};
use crate::achievements::{AccumulatedData, AchievementState};
use crate::experience::ExperienceState;
use crate::history::WorkoutHistoryEntry;
use crate::types::{Settings, WorkoutSession};
use crate::Result;

/// Infallible view of a store
///
/// Failed or malformed reads come back as the documented default; failed
/// writes are logged and dropped. The in-memory state of the caller stays
/// authoritative either way.
#[derive(Debug)]
pub struct FailOpen<S> {
    inner: S,
}

impl<S: Store> FailOpen<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    pub fn session(&self) -> Option<WorkoutSession> {
        read_or(self.inner.load_session(), BlobKey::Session, None)
    }

    pub fn save_session(&mut self, session: &WorkoutSession) {
        write_or_log(self.inner.save_session(session), BlobKey::Session);
    }

    pub fn clear_session(&mut self) {
        write_or_log(self.inner.clear_session(), BlobKey::Session);
    }

    pub fn settings(&self) -> Option<Settings> {
        read_or(self.inner.load_settings(), BlobKey::Settings, None)
    }

    pub fn save_settings(&mut self, settings: &Settings) {
        write_or_log(self.inner.save_settings(settings), BlobKey::Settings);
    }

    pub fn history(&self) -> Vec<WorkoutHistoryEntry> {
        read_or(self.inner.load_history(), BlobKey::History, Vec::new())
    }

    /// Whether the entry was new; `false` as well when the write failed
    pub fn append_history(&mut self, entry: WorkoutHistoryEntry, max: usize) -> bool {
        match self.inner.append_history(entry, max) {
            Ok(added) => added,
            Err(e) => {
                tracing::warn!("Failed to append history: {}. Entry dropped.", e);
                false
            }
        }
    }

    pub fn achievement_states(&self) -> Vec<AchievementState> {
        read_or(
            self.inner.load_achievement_states(),
            BlobKey::AchievementStates,
            Vec::new(),
        )
    }

    pub fn save_achievement_states(&mut self, states: &[AchievementState]) {
        write_or_log(
            self.inner.save_achievement_states(states),
            BlobKey::AchievementStates,
        );
    }

    pub fn accumulated_data(&self) -> AccumulatedData {
        read_or(
            self.inner.load_accumulated_data(),
            BlobKey::AccumulatedData,
            None,
        )
        .unwrap_or_default()
    }

    pub fn save_accumulated_data(&mut self, data: &AccumulatedData) {
        write_or_log(
            self.inner.save_accumulated_data(data),
            BlobKey::AccumulatedData,
        );
    }

    pub fn experience(&self) -> ExperienceState {
        read_or(self.inner.load_experience(), BlobKey::Experience, None).unwrap_or_default()
    }

    pub fn save_experience(&mut self, state: &ExperienceState) {
        write_or_log(self.inner.save_experience(state), BlobKey::Experience);
    }
}

fn read_or<T>(result: Result<T>, key: BlobKey, default: T) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!("Unable to load {}: {}. Using defaults.", key.name(), e);
        default
    })
}

fn write_or_log(result: Result<()>, key: BlobKey) {
    if let Err(e) = result {
        tracing::warn!("Unable to save {}: {}. Keeping in-memory state.", key.name(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn test_malformed_blobs_read_as_defaults() {
        let mut store = MemoryStore::new();
        store.insert_raw(BlobKey::Session, "{ not json");
        store.insert_raw(BlobKey::AccumulatedData, r#"{"cumulative_sets": "many"}"#);
        store.insert_raw(BlobKey::Experience, "\"level nine\"");
        let store = FailOpen::new(store);

        assert!(store.session().is_none());
        assert_eq!(store.accumulated_data(), AccumulatedData::default());
        assert_eq!(store.experience(), ExperienceState::default());
    }

    #[test]
    fn test_read_failures_read_as_defaults() {
        let mut inner = MemoryStore::new();
        inner.save_settings(&Settings::default()).unwrap();
        inner.fail_reads = true;
        let store = FailOpen::new(inner);

        assert!(store.settings().is_none());
        assert!(store.history().is_empty());
        assert!(store.achievement_states().is_empty());
    }

    #[test]
    fn test_write_failures_are_swallowed() {
        let mut inner = MemoryStore::new();
        inner.fail_writes = true;
        let mut store = FailOpen::new(inner);

        store.save_session(&WorkoutSession::default());
        store.clear_session();
        store.save_experience(&ExperienceState::default());

        assert!(!store.inner().contains(BlobKey::Session));
        assert!(!store.inner().contains(BlobKey::Experience));
    }
}

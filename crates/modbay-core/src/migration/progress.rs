//! Progress delivery and thread-safe tracking of migration runs.

use super::types::{MigrationProgress, MigrationResult};
use crate::config::MigrationConfig;
use crate::error::{ModbayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Callback invoked for every progress tick.
pub type ProgressCallback = Arc<dyn Fn(&MigrationProgress) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Tracker record for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRecord {
    pub migration_id: String,
    pub status: MigrationStatus,
    pub progress: Option<MigrationProgress>,
    pub result: Option<MigrationResult>,
    pub error: Option<String>,
}

#[derive(Default)]
struct TrackerState {
    records: HashMap<String, MigrationRecord>,
    /// Finished run ids, oldest first.
    finished: VecDeque<String>,
}

/// Tracks progress of the active and recently finished migrations.
///
/// Only the most recent finished runs are kept; older ones are evicted
/// when a run finishes.
pub struct MigrationProgressTracker {
    state: Mutex<TrackerState>,
    history_limit: usize,
}

impl Default for MigrationProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MigrationProgressTracker {
    pub fn new() -> Self {
        Self::with_history_limit(MigrationConfig::FINISHED_RUNS_KEPT)
    }

    pub fn with_history_limit(history_limit: usize) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            history_limit,
        }
    }

    /// Register a new running migration unless another one is still running.
    pub fn begin(&self, migration_id: &str) -> Result<()> {
        let mut state = self.state.lock().expect("progress lock poisoned");
        if let Some(active) = state
            .records
            .values()
            .find(|r| r.status == MigrationStatus::Running)
        {
            return Err(ModbayError::MigrationInProgress {
                migration_id: active.migration_id.clone(),
            });
        }
        Self::insert_locked(&mut state, migration_id);
        Ok(())
    }

    /// Register a new running migration.
    pub fn insert(&self, migration_id: &str) {
        let mut state = self.state.lock().expect("progress lock poisoned");
        Self::insert_locked(&mut state, migration_id);
    }

    fn insert_locked(state: &mut TrackerState, migration_id: &str) {
        state.records.insert(
            migration_id.to_string(),
            MigrationRecord {
                migration_id: migration_id.to_string(),
                status: MigrationStatus::Running,
                progress: None,
                result: None,
                error: None,
            },
        );
    }

    /// Queue a run that just left the running state and evict the oldest.
    fn finish_locked(&self, state: &mut TrackerState, migration_id: &str) {
        state.finished.push_back(migration_id.to_string());
        while state.finished.len() > self.history_limit {
            if let Some(evicted) = state.finished.pop_front() {
                state.records.remove(&evicted);
            }
        }
    }

    pub fn get(&self, migration_id: &str) -> Option<MigrationRecord> {
        let state = self.state.lock().expect("progress lock poisoned");
        state.records.get(migration_id).cloned()
    }

    pub fn list_all(&self) -> Vec<MigrationRecord> {
        let state = self.state.lock().expect("progress lock poisoned");
        state.records.values().cloned().collect()
    }

    /// Id of the migration still running, if any.
    pub fn active(&self) -> Option<String> {
        let state = self.state.lock().expect("progress lock poisoned");
        state
            .records
            .values()
            .find(|r| r.status == MigrationStatus::Running)
            .map(|r| r.migration_id.clone())
    }

    pub fn update_progress(&self, migration_id: &str, progress: &MigrationProgress) {
        let mut state = self.state.lock().expect("progress lock poisoned");
        if let Some(record) = state.records.get_mut(migration_id) {
            record.progress = Some(progress.clone());
        }
    }

    /// Store the final result and derive the terminal status from it.
    pub fn complete(&self, migration_id: &str, result: MigrationResult) {
        let mut state = self.state.lock().expect("progress lock poisoned");
        let Some(record) = state.records.get_mut(migration_id) else {
            return;
        };
        let was_running = record.status == MigrationStatus::Running;
        record.status = if result.cancelled {
            MigrationStatus::Cancelled
        } else if result.success {
            MigrationStatus::Completed
        } else {
            MigrationStatus::Failed
        };
        record.result = Some(result);
        if was_running {
            self.finish_locked(&mut state, migration_id);
        }
    }

    pub fn set_error(&self, migration_id: &str, message: String) {
        let mut state = self.state.lock().expect("progress lock poisoned");
        let Some(record) = state.records.get_mut(migration_id) else {
            return;
        };
        let was_running = record.status == MigrationStatus::Running;
        record.status = MigrationStatus::Failed;
        record.error = Some(message);
        if was_running {
            self.finish_locked(&mut state, migration_id);
        }
    }
}

//! File-based id allocator.
//!
//! A single JSON file holds the next id to hand out. Every update takes an
//! exclusive `flock` so several processes sharing a data directory never
//! allocate the same id.

use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Persistent allocator state.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SequenceState {
    /// Next id to allocate.
    next_id: i64,
    /// Number of writes applied to this file.
    version: u64,
    /// Last update, Unix milliseconds.
    updated_at: i64,
}

impl Default for SequenceState {
    fn default() -> Self {
        Self {
            next_id: 1,
            version: 0,
            updated_at: 0,
        }
    }
}

/// Id allocator backed by a locked JSON file.
pub struct FileIdSequence {
    path: PathBuf,
}

impl FileIdSequence {
    /// Create an allocator persisting to `path`.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Allocate the next id.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence file cannot be locked, read or written,
    /// or if the id space is exhausted. An exhausted sequence is left untouched.
    pub fn allocate(&self) -> StorageResult<i64> {
        self.update_state(|state| {
            let id = state.next_id;
            state.next_id = id
                .checked_add(1)
                .ok_or_else(|| StorageError::Query("property id sequence exhausted".to_string()))?;
            Ok(id)
        })
    }

    /// Record that `id` is taken so it is never allocated.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence file cannot be locked, read or written.
    pub fn observe(&self, id: i64) -> StorageResult<()> {
        self.update_state(|state| {
            if id >= state.next_id {
                state.next_id = id.saturating_add(1);
            }
            Ok(())
        })
    }

    /// The id the next [`FileIdSequence::allocate`] call would return.
    ///
    /// # Errors
    ///
    /// Returns an error if the sequence file exists but cannot be read.
    pub fn peek(&self) -> StorageResult<i64> {
        if !self.path.exists() {
            return Ok(SequenceState::default().next_id);
        }

        let mut file = std::fs::File::open(&self.path)?;
        file.lock_shared()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;
        let state = read_state(&mut file);
        file.unlock()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        Ok(state?.next_id)
    }

    /// Read, modify and write back the state under an exclusive lock.
    ///
    /// Nothing is written when `update_fn` fails.
    fn update_state<F, R>(&self, update_fn: F) -> StorageResult<R>
    where
        F: FnOnce(&mut SequenceState) -> StorageResult<R>,
    {
        let mut file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;

        file.lock_exclusive()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        let result = Self::rewrite(&mut file, update_fn);

        file.unlock()
            .map_err(|e| StorageError::LockFailed(e.to_string()))?;

        result
    }

    fn rewrite<F, R>(file: &mut std::fs::File, update_fn: F) -> StorageResult<R>
    where
        F: FnOnce(&mut SequenceState) -> StorageResult<R>,
    {
        let mut state = read_state(file)?;

        let result = update_fn(&mut state)?;
        state.version += 1;
        state.updated_at = chrono::Utc::now().timestamp_millis();

        file.seek(SeekFrom::Start(0))?;
        file.set_len(0)?;
        let json = serde_json::to_string_pretty(&state)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;

        Ok(result)
    }
}

/// Parse the state, treating an empty file as a fresh sequence.
fn read_state(file: &mut std::fs::File) -> StorageResult<SequenceState> {
    let mut raw = String::new();
    file.read_to_string(&mut raw)?;

    if raw.trim().is_empty() {
        return Ok(SequenceState::default());
    }

    Ok(serde_json::from_str(&raw)?)
}

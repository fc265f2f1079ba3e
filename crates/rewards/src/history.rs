// Copyright 2025 RISC Zero, Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Append-only JSONL log of past window snapshots.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use thiserror::Error;

use crate::snapshot::NetworkRewardSnapshot;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("history encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Appends daily snapshots to a local JSONL file, one object per line.
/// Appends are serialized by a mutex; readers stream the whole file.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl HistoryStore {
    /// Creates a store for the provided path. An empty path disables
    /// persistence and yields `None`.
    pub fn new(path: &str) -> Option<Self> {
        let trimmed = path.trim();
        if trimmed.is_empty() {
            return None;
        }
        Some(Self { path: PathBuf::from(trimmed), lock: Mutex::new(()) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates parent directories on first use and appends the snapshot as
    /// a single JSON line.
    pub fn append(&self, entry: &NetworkRewardSnapshot) -> Result<(), HistoryError> {
        let _guard = self.lock.lock();

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Returns every stored snapshot. Missing files yield an empty list and
    /// blank lines are skipped.
    pub fn read_all(&self) -> Result<Vec<NetworkRewardSnapshot>, HistoryError> {
        let _guard = self.lock.lock();

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut entries = Vec::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(line)?);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(total: i64) -> NetworkRewardSnapshot {
        NetworkRewardSnapshot {
            window_start: Utc::now(),
            window_end: Utc::now(),
            window_duration_seconds: 3600.0,
            active_validator_count: 1,
            cl_rewards_gwei: total,
            el_rewards_gwei: 0,
            total_rewards_gwei: total,
            total_effective_balance_gwei: 32_000_000_000,
            project_apr_percent: 3.5,
        }
    }

    #[test]
    fn test_empty_path_disables_persistence() {
        assert!(HistoryStore::new("").is_none());
        assert!(HistoryStore::new("   ").is_none());
    }

    #[test]
    fn test_append_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.jsonl");
        let store = HistoryStore::new(path.to_str().unwrap()).unwrap();

        store.append(&snapshot(10)).unwrap();
        store.append(&snapshot(20)).unwrap();

        let entries = store.read_all().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].total_rewards_gwei, 10);
        assert_eq!(entries[1].total_rewards_gwei, 20);
    }

    #[test]
    fn test_missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.jsonl");
        let store = HistoryStore::new(path.to_str().unwrap()).unwrap();
        assert!(store.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let store = HistoryStore::new(path.to_str().unwrap()).unwrap();

        store.append(&snapshot(7)).unwrap();
        fs::write(
            &path,
            format!("{}\n\n   \n", fs::read_to_string(&path).unwrap().trim_end()),
        )
        .unwrap();

        let entries = store.read_all().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].total_rewards_gwei, 7);
    }
}

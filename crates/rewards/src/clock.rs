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

//! Wall-clock to epoch conversion anchored on the network genesis timestamp.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Seconds per consensus-layer slot.
pub const SECONDS_PER_SLOT: u64 = 12;
/// Slots per epoch.
pub const SLOTS_PER_EPOCH: u64 = 32;
/// Seconds per epoch (384).
pub const SECONDS_PER_EPOCH: u64 = SECONDS_PER_SLOT * SLOTS_PER_EPOCH;

/// Epochs behind the wall-clock head that are considered finalized enough
/// for reward accounting.
pub const SAFE_HEAD_DISTANCE: u64 = 2;

#[derive(Debug, Error)]
#[error("genesis timestamp must be positive, got {0}")]
pub struct InvalidGenesisTimestamp(pub i64);

/// Translates wall time to epoch indices and back. The genesis timestamp is
/// captured once at construction and never changes afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochClock {
    genesis_timestamp: i64,
}

impl EpochClock {
    pub fn new(genesis_timestamp: i64) -> Result<Self, InvalidGenesisTimestamp> {
        if genesis_timestamp <= 0 {
            return Err(InvalidGenesisTimestamp(genesis_timestamp));
        }
        Ok(Self { genesis_timestamp })
    }

    pub fn genesis_timestamp(&self) -> i64 {
        self.genesis_timestamp
    }

    /// Returns the epoch containing the given instant. Times before genesis
    /// map to epoch 0.
    pub fn time_to_epoch(&self, at: DateTime<Utc>) -> u64 {
        let unix = at.timestamp();
        if unix < self.genesis_timestamp {
            return 0;
        }
        (unix - self.genesis_timestamp) as u64 / SECONDS_PER_EPOCH
    }

    /// Returns the completion time of the given epoch, i.e. the first second
    /// of epoch `epoch + 1`.
    pub fn epoch_to_time(&self, epoch: u64) -> DateTime<Utc> {
        let secs = self.genesis_timestamp + (epoch as i64 + 1) * SECONDS_PER_EPOCH as i64;
        DateTime::from_timestamp(secs, 0).unwrap_or_default()
    }

    pub fn current_epoch(&self) -> u64 {
        self.time_to_epoch(Utc::now())
    }

    /// The most recent epoch stable enough for reward accounting.
    pub fn safe_head(&self, now: DateTime<Utc>) -> u64 {
        self.time_to_epoch(now).saturating_sub(SAFE_HEAD_DISTANCE)
    }
}

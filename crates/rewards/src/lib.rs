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

//! Reward accounting primitives for Ethereum proof-of-stake validators.
//!
//! This crate holds the pure parts of the service: epoch/time conversion,
//! per-epoch income records and their field-wise accumulation, the shared
//! reward cache, network snapshot and APR math, the recent-rewards
//! estimator, and the JSONL history store.

pub mod cache;
pub mod clock;
pub mod estimate;
pub mod history;
pub mod income;
pub mod snapshot;

pub use cache::{CacheState, CacheTotals, RewardsCache};
pub use clock::{
    EpochClock, InvalidGenesisTimestamp, SECONDS_PER_EPOCH, SECONDS_PER_SLOT, SLOTS_PER_EPOCH,
};
pub use estimate::{
    average_apr_31d, estimate_recent_rewards, estimate_window_epochs, ValidatorLifecycle,
    ESTIMATE_WINDOW_DAYS, SECONDS_PER_YEAR,
};
pub use history::{HistoryError, HistoryStore};
pub use income::ValidatorEpochIncome;
pub use snapshot::{
    build_snapshot, NetworkMetadata, NetworkRewardSnapshot, DEFAULT_EFFECTIVE_BALANCE_GWEI,
};

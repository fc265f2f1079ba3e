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

//! In-memory accumulator for the current aggregation window.

use std::collections::HashMap;

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::income::ValidatorEpochIncome;

/// Aggregate totals over every entry in the cache.
#[derive(Debug, Clone, Default)]
pub struct CacheTotals {
    pub cl_gwei: i64,
    pub el_wei: U256,
    pub validator_count: usize,
}

/// State guarded by the cache lock: the per-validator accumulations, the
/// sync high-water mark, and the start of the current window.
#[derive(Debug)]
pub struct CacheState {
    entries: HashMap<u64, ValidatorEpochIncome>,
    latest_sync_epoch: u64,
    window_start: DateTime<Utc>,
}

impl CacheState {
    pub fn entries(&self) -> &HashMap<u64, ValidatorEpochIncome> {
        &self.entries
    }

    pub fn latest_sync_epoch(&self) -> u64 {
        self.latest_sync_epoch
    }

    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merges a completed epoch into the cache and advances the high-water
    /// mark. Accumulation is commutative, so backfill workers may land
    /// epochs in any order.
    pub fn accumulate_epoch(&mut self, epoch: u64, rewards: HashMap<u64, ValidatorEpochIncome>) {
        for (validator_index, income) in rewards {
            self.entries.entry(validator_index).or_default().accumulate(&income);
        }
        if epoch > self.latest_sync_epoch {
            self.latest_sync_epoch = epoch;
        }
    }

    /// Raises the high-water mark without touching entries. Used once after
    /// backfill so live sync resumes at the correct next epoch.
    pub fn raise_latest_sync_epoch(&mut self, epoch: u64) {
        if epoch > self.latest_sync_epoch {
            self.latest_sync_epoch = epoch;
        }
    }

    /// Drops all entries and starts a new window. The high-water mark is
    /// deliberately preserved across resets.
    pub fn clear(&mut self, window_start: DateTime<Utc>) {
        self.entries = HashMap::new();
        self.window_start = window_start;
    }

    pub fn totals(&self) -> CacheTotals {
        let mut totals = CacheTotals { validator_count: self.entries.len(), ..Default::default() };
        for income in self.entries.values() {
            totals.cl_gwei += income.total_cl_rewards();
            totals.el_wei += income.tx_fee_reward_wei;
        }
        totals
    }
}

/// Concurrent reward cache. One reader/writer lock guards the entry map,
/// the high-water mark, and the window start together.
#[derive(Debug)]
pub struct RewardsCache {
    inner: RwLock<CacheState>,
}

impl RewardsCache {
    pub fn new(window_start: DateTime<Utc>) -> Self {
        Self {
            inner: RwLock::new(CacheState {
                entries: HashMap::new(),
                latest_sync_epoch: 0,
                window_start,
            }),
        }
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.inner.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.inner.write().await
    }

    pub async fn latest_sync_epoch(&self) -> u64 {
        self.inner.read().await.latest_sync_epoch
    }

    pub async fn window_start(&self) -> DateTime<Utc> {
        self.inner.read().await.window_start
    }

    pub async fn accumulate_epoch(&self, epoch: u64, rewards: HashMap<u64, ValidatorEpochIncome>) {
        self.inner.write().await.accumulate_epoch(epoch, rewards);
    }

    /// Clones the cache entries for the requested indices. Indices without
    /// an entry are omitted.
    pub async fn rewards_for(&self, indices: &[u64]) -> HashMap<u64, ValidatorEpochIncome> {
        let state = self.inner.read().await;
        indices
            .iter()
            .filter_map(|index| state.entries.get(index).map(|income| (*index, income.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::income::WEI_PER_GWEI;

    fn income(cl: u64, el_gwei: u64) -> ValidatorEpochIncome {
        ValidatorEpochIncome {
            attestation_source_reward: cl,
            tx_fee_reward_wei: U256::from(el_gwei) * WEI_PER_GWEI,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_accumulate_advances_high_water_mark() {
        let cache = RewardsCache::new(Utc::now());
        cache.accumulate_epoch(10, HashMap::from([(1, income(5, 0))])).await;
        cache.accumulate_epoch(12, HashMap::from([(1, income(5, 1))])).await;
        // A late out-of-order epoch must not lower the mark.
        cache.accumulate_epoch(11, HashMap::from([(2, income(7, 0))])).await;

        assert_eq!(cache.latest_sync_epoch().await, 12);
        let state = cache.read().await;
        assert_eq!(state.entries()[&1].attestation_source_reward, 10);
        assert_eq!(state.entries()[&2].attestation_source_reward, 7);
    }

    #[tokio::test]
    async fn test_clear_preserves_high_water_mark() {
        let cache = RewardsCache::new(Utc::now());
        cache.accumulate_epoch(42, HashMap::from([(1, income(5, 0))])).await;

        let new_start = Utc::now();
        {
            let mut state = cache.write().await;
            state.clear(new_start);
        }

        let state = cache.read().await;
        assert!(state.is_empty());
        assert_eq!(state.latest_sync_epoch(), 42);
        assert_eq!(state.window_start(), new_start);
    }

    #[tokio::test]
    async fn test_rewards_for_omits_absent_indices() {
        let cache = RewardsCache::new(Utc::now());
        cache.accumulate_epoch(1, HashMap::from([(3, income(9, 2))])).await;

        let rewards = cache.rewards_for(&[3, 4]).await;
        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards[&3].el_rewards_gwei(), 2);
    }

    #[tokio::test]
    async fn test_totals_sum_wei_as_big_integers() {
        let cache = RewardsCache::new(Utc::now());
        cache.accumulate_epoch(1, HashMap::from([(1, income(64, 5)), (2, income(1, 3))])).await;

        let totals = cache.read().await.totals();
        assert_eq!(totals.cl_gwei, 65);
        assert_eq!(totals.el_wei, U256::from(8u64) * WEI_PER_GWEI);
        assert_eq!(totals.validator_count, 2);
    }
}

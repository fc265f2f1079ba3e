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

//! Scripted upstream doubles shared by the synchronizer and aggregator
//! tests.

use std::{
    collections::{HashMap, HashSet},
    sync::atomic::{AtomicU32, Ordering},
};

use alloy::primitives::U256;
use async_trait::async_trait;
use parking_lot::Mutex;

use stakewatch_beacon::{
    BeaconClientError, BeaconRpc, BlockRewards, ProposerDuty, SyncCommitteeReward, TotalReward,
};
use stakewatch_rewards::ValidatorLifecycle;

use crate::db::{DbError, DepositorStat, ValidatorDetails, ValidatorMetaDb, WithdrawalStat};

/// EL reward every proposed block pays out in the mock (2 gwei).
pub(crate) const MOCK_EL_REWARD_WEI: u64 = 2_000_000_000;

/// Deterministic beacon double. Every epoch has 32 slots; attestation
/// rewards cover validators 1 and 2, sync rewards validators 7 and 8, and
/// each included block pays its proposer.
#[derive(Default)]
pub(crate) struct MockBeacon {
    /// Remaining proposer-assignment calls that fail before succeeding.
    pub assignment_failures: AtomicU32,
    /// Slots with no block at all.
    pub missed_slots: HashSet<u64>,
    /// Slots before the merge: block exists but carries no payload.
    pub pre_merge_slots: HashSet<u64>,
    /// Emit an upstream contract violation in attestation rewards.
    pub negative_head: bool,
    pub positive_inclusion_delay: bool,
    /// Epochs whose assignments were served, in call order.
    pub served_epochs: Mutex<Vec<u64>>,
}

impl MockBeacon {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_first(attempts: u32) -> Self {
        Self { assignment_failures: AtomicU32::new(attempts), ..Self::default() }
    }

    pub(crate) fn proposer_for(slot: u64) -> u64 {
        100 + slot % 97
    }
}

fn transient() -> BeaconClientError {
    BeaconClientError::ExecutionRpc("simulated transient failure".into())
}

#[async_trait]
impl BeaconRpc for MockBeacon {
    async fn proposer_assignments(
        &self,
        epoch: u64,
    ) -> Result<Vec<ProposerDuty>, BeaconClientError> {
        let remaining = self.assignment_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.assignment_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(transient());
        }
        self.served_epochs.lock().push(epoch);

        Ok((0..32)
            .map(|offset| {
                let slot = epoch * 32 + offset;
                ProposerDuty {
                    pubkey: format!("0x{slot:x}"),
                    validator_index: Self::proposer_for(slot),
                    slot,
                }
            })
            .collect())
    }

    async fn attestation_rewards(&self, _epoch: u64) -> Result<Vec<TotalReward>, BeaconClientError> {
        let head = if self.negative_head { -3 } else { 3 };
        let inclusion_delay = if self.positive_inclusion_delay { 1 } else { -1 };
        Ok(vec![
            TotalReward { validator_index: 1, head, target: 2, source: 1, inclusion_delay: 0 },
            TotalReward { validator_index: 2, head: 1, target: -2, source: 1, inclusion_delay },
        ])
    }

    async fn block_rewards(&self, slot: u64) -> Result<BlockRewards, BeaconClientError> {
        if self.missed_slots.contains(&slot) {
            return Err(BeaconClientError::BlockNotFound);
        }
        Ok(BlockRewards {
            proposer_index: Self::proposer_for(slot),
            total: 18,
            attestations: 10,
            sync_aggregate: 5,
            proposer_slashings: 2,
            attester_slashings: 1,
        })
    }

    async fn sync_committee_rewards(
        &self,
        slot: u64,
    ) -> Result<Vec<SyncCommitteeReward>, BeaconClientError> {
        if self.missed_slots.contains(&slot) {
            return Err(BeaconClientError::BlockNotFound);
        }
        Ok(vec![
            SyncCommitteeReward { validator_index: 7, reward: 5 },
            SyncCommitteeReward { validator_index: 8, reward: -4 },
        ])
    }

    async fn execution_block_number(&self, slot: u64) -> Result<u64, BeaconClientError> {
        if self.missed_slots.contains(&slot) {
            return Err(BeaconClientError::BlockNotFound);
        }
        if self.pre_merge_slots.contains(&slot) {
            return Err(BeaconClientError::PreMerge);
        }
        Ok(slot)
    }

    async fn el_reward_for_block(&self, _block_number: u64) -> Result<U256, BeaconClientError> {
        Ok(U256::from(MOCK_EL_REWARD_WEI))
    }
}

/// Canned metadata store.
pub(crate) struct MockDora {
    pub details: Vec<ValidatorDetails>,
    pub stake_time_seconds: i64,
    pub active_validator_count: i64,
    pub total_effective_balance_gwei: i64,
}

#[async_trait]
impl ValidatorMetaDb for MockDora {
    async fn validator_indices_by_address(
        &self,
        _address: &str,
        epoch: u64,
    ) -> Result<Vec<u64>, DbError> {
        Ok(self
            .details
            .iter()
            .filter(|detail| {
                ValidatorLifecycle {
                    activation_epoch: detail.activation_epoch,
                    exit_epoch: detail.exit_epoch,
                }
                .is_active_at(epoch)
            })
            .map(|detail| detail.validator_index)
            .collect())
    }

    async fn validator_details_by_address(
        &self,
        _address: &str,
    ) -> Result<Vec<ValidatorDetails>, DbError> {
        Ok(self.details.clone())
    }

    async fn effective_balances(&self, indices: &[u64]) -> Result<HashMap<u64, i64>, DbError> {
        Ok(self
            .details
            .iter()
            .filter(|detail| indices.contains(&detail.validator_index))
            .map(|detail| (detail.validator_index, detail.effective_balance))
            .collect())
    }

    async fn active_validator_count(&self, _epoch: u64) -> Result<i64, DbError> {
        Ok(self.active_validator_count)
    }

    async fn total_effective_balance(&self, _epoch: u64) -> Result<i64, DbError> {
        Ok(self.total_effective_balance_gwei)
    }

    async fn weighted_average_stake_time(&self, _indices: &[u64]) -> Result<i64, DbError> {
        Ok(self.stake_time_seconds)
    }

    async fn top_depositors(
        &self,
        _limit: i64,
        _sort_by: &str,
        _order: &str,
    ) -> Result<Vec<DepositorStat>, DbError> {
        Ok(Vec::new())
    }

    async fn top_withdrawals(
        &self,
        _limit: i64,
        _sort_by: &str,
        _order: &str,
    ) -> Result<Vec<WithdrawalStat>, DbError> {
        Ok(Vec::new())
    }
}

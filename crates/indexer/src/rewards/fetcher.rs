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

//! Per-epoch reward fetching: one fan-out per slot plus the epoch-wide
//! attestation rewards, merged into a single income map.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use futures_util::future::try_join_all;
use parking_lot::Mutex;

use stakewatch_beacon::{BeaconClientError, BeaconRpc};
use stakewatch_rewards::{ValidatorEpochIncome, SLOTS_PER_EPOCH};

type IncomeMap = HashMap<u64, ValidatorEpochIncome>;

/// Fetches the complete reward picture for one epoch. Any sub-task error
/// other than the enumerated semantic absences fails the whole fetch, so a
/// retried epoch is always accumulated exactly once or not at all.
pub async fn fetch_epoch_rewards(
    beacon: &(dyn BeaconRpc + Send + Sync),
    epoch: u64,
) -> Result<IncomeMap> {
    let assignments = beacon.proposer_assignments(epoch).await?;
    if assignments.is_empty() {
        bail!("no proposer assignments for epoch {epoch}");
    }

    // Slots per epoch is derived from the response rather than assumed.
    let slots_per_epoch = assignments.len() as u64;
    if slots_per_epoch != SLOTS_PER_EPOCH {
        tracing::warn!(epoch, slots_per_epoch, "unexpected proposer assignment count");
    }

    let proposers: HashMap<u64, u64> =
        assignments.iter().map(|duty| (duty.slot, duty.validator_index)).collect();
    let start_slot = epoch * slots_per_epoch;

    let rewards = Mutex::new(IncomeMap::new());

    let slot_tasks = (0..slots_per_epoch)
        .map(|offset| process_slot(beacon, start_slot + offset, &proposers, &rewards));

    tokio::try_join!(
        try_join_all(slot_tasks),
        process_attestation_rewards(beacon, epoch, &rewards),
    )?;

    Ok(rewards.into_inner())
}

/// Runs the three per-slot sub-tasks concurrently.
async fn process_slot(
    beacon: &(dyn BeaconRpc + Send + Sync),
    slot: u64,
    proposers: &HashMap<u64, u64>,
    rewards: &Mutex<IncomeMap>,
) -> Result<()> {
    let proposer = *proposers
        .get(&slot)
        .ok_or_else(|| anyhow!("no proposer for slot {slot}"))?;

    tokio::try_join!(
        process_execution_rewards(beacon, slot, proposer, rewards),
        process_sync_committee_rewards(beacon, slot, rewards),
        process_block_rewards(beacon, slot, rewards),
    )?;
    Ok(())
}

/// EL path. A missing block counts as a missed proposal for the assigned
/// proposer; pre-merge slots carry no EL reward. The per-slot EL reward is
/// one-shot, so a retried fetch overwrites rather than adds.
async fn process_execution_rewards(
    beacon: &(dyn BeaconRpc + Send + Sync),
    slot: u64,
    proposer: u64,
    rewards: &Mutex<IncomeMap>,
) -> Result<()> {
    match beacon.execution_block_number(slot).await {
        Ok(block_number) => {
            let reward = beacon
                .el_reward_for_block(block_number)
                .await
                .map_err(|err| anyhow!(err).context(format!("el reward for block {block_number}")))?;
            rewards.lock().entry(proposer).or_default().tx_fee_reward_wei = reward;
        }
        Err(BeaconClientError::BlockNotFound) => {
            rewards.lock().entry(proposer).or_default().proposals_missed += 1;
        }
        Err(BeaconClientError::PreMerge) => {}
        Err(err) => {
            return Err(anyhow!(err).context(format!("execution block number for slot {slot}")))
        }
    }
    Ok(())
}

/// Sync-committee path. Signed rewards split into the reward or penalty
/// field by sign. Slots without a block and pre-fork slots are skipped.
async fn process_sync_committee_rewards(
    beacon: &(dyn BeaconRpc + Send + Sync),
    slot: u64,
    rewards: &Mutex<IncomeMap>,
) -> Result<()> {
    match beacon.sync_committee_rewards(slot).await {
        Ok(entries) => {
            let mut map = rewards.lock();
            for entry in entries {
                let income = map.entry(entry.validator_index).or_default();
                if entry.reward > 0 {
                    income.sync_committee_reward += entry.reward as u64;
                } else {
                    income.sync_committee_penalty += entry.reward.unsigned_abs();
                }
            }
        }
        Err(err) if err.is_semantic() => {}
        Err(err) => {
            return Err(anyhow!(err).context(format!("sync committee rewards for slot {slot}")))
        }
    }
    Ok(())
}

/// Proposer inclusion rewards from the block at a slot. Attester and
/// proposer slashing inclusion rewards are tracked as one figure.
async fn process_block_rewards(
    beacon: &(dyn BeaconRpc + Send + Sync),
    slot: u64,
    rewards: &Mutex<IncomeMap>,
) -> Result<()> {
    match beacon.block_rewards(slot).await {
        Ok(block) => {
            let mut map = rewards.lock();
            let income = map.entry(block.proposer_index).or_default();
            income.proposer_attestation_inclusion_reward += block.attestations;
            income.proposer_slashing_inclusion_reward +=
                block.attester_slashings + block.proposer_slashings;
            income.proposer_sync_inclusion_reward += block.sync_aggregate;
        }
        Err(err) if err.is_semantic() => {}
        Err(err) => return Err(anyhow!(err).context(format!("block rewards for slot {slot}"))),
    }
    Ok(())
}

/// Epoch-wide attestation rewards. Head rewards must be nonnegative and the
/// inclusion-delay value nonpositive; violations fail the fetch so the
/// epoch is retried rather than recorded with corrupt signs.
async fn process_attestation_rewards(
    beacon: &(dyn BeaconRpc + Send + Sync),
    epoch: u64,
    rewards: &Mutex<IncomeMap>,
) -> Result<()> {
    let totals = beacon
        .attestation_rewards(epoch)
        .await
        .map_err(|err| anyhow!(err).context(format!("attestation rewards for epoch {epoch}")))?;

    let mut map = rewards.lock();
    for total in totals {
        if total.head < 0 {
            bail!(
                "negative head reward {} for validator {} in epoch {epoch}",
                total.head,
                total.validator_index
            );
        }
        if total.inclusion_delay > 0 {
            bail!(
                "positive inclusion delay {} for validator {} in epoch {epoch}",
                total.inclusion_delay,
                total.validator_index
            );
        }

        let income = map.entry(total.validator_index).or_default();
        income.attestation_head_reward = total.head as u64;
        if total.source >= 0 {
            income.attestation_source_reward = total.source as u64;
        } else {
            income.attestation_source_penalty = total.source.unsigned_abs();
        }
        if total.target >= 0 {
            income.attestation_target_reward = total.target as u64;
        } else {
            income.attestation_target_penalty = total.target.unsigned_abs();
        }
        income.finality_delay_penalty = total.inclusion_delay.unsigned_abs();
    }
    Ok(())
}

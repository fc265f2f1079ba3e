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

//! Per-validator, per-epoch income records and their accumulation.

use alloy::primitives::U256;

/// Wei per gwei.
pub const WEI_PER_GWEI: U256 = U256::from_limbs([1_000_000_000, 0, 0, 0]);

/// Consensus and execution layer income of one validator for one epoch.
///
/// All amounts are gwei except `tx_fee_reward_wei`. For every signed
/// upstream quantity exactly one of its reward/penalty fields is nonzero
/// after ingestion, so cache entries stay field-wise additive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidatorEpochIncome {
    pub attestation_source_reward: u64,
    pub attestation_source_penalty: u64,
    pub attestation_target_reward: u64,
    pub attestation_target_penalty: u64,
    pub attestation_head_reward: u64,
    /// Magnitude of the (nonpositive) inclusion-delay value.
    pub finality_delay_penalty: u64,
    pub proposer_attestation_inclusion_reward: u64,
    /// Attester and proposer slashing inclusion rewards combined.
    pub proposer_slashing_inclusion_reward: u64,
    pub proposer_sync_inclusion_reward: u64,
    pub sync_committee_reward: u64,
    pub sync_committee_penalty: u64,
    pub slashing_reward: u64,
    pub slashing_penalty: u64,
    pub proposals_missed: u64,
    /// Execution-layer transaction fee income in wei.
    pub tx_fee_reward_wei: U256,
}

impl ValidatorEpochIncome {
    /// Field-wise addition of `delta` into `self`. A zero wei delta is a
    /// no-op, preserving byte-sequence semantics of the upstream encoding.
    pub fn accumulate(&mut self, delta: &ValidatorEpochIncome) {
        self.attestation_source_reward += delta.attestation_source_reward;
        self.attestation_source_penalty += delta.attestation_source_penalty;
        self.attestation_target_reward += delta.attestation_target_reward;
        self.attestation_target_penalty += delta.attestation_target_penalty;
        self.attestation_head_reward += delta.attestation_head_reward;
        self.finality_delay_penalty += delta.finality_delay_penalty;
        self.proposer_attestation_inclusion_reward += delta.proposer_attestation_inclusion_reward;
        self.proposer_slashing_inclusion_reward += delta.proposer_slashing_inclusion_reward;
        self.proposer_sync_inclusion_reward += delta.proposer_sync_inclusion_reward;
        self.sync_committee_reward += delta.sync_committee_reward;
        self.sync_committee_penalty += delta.sync_committee_penalty;
        self.slashing_reward += delta.slashing_reward;
        self.slashing_penalty += delta.slashing_penalty;
        self.proposals_missed += delta.proposals_missed;
        if !delta.tx_fee_reward_wei.is_zero() {
            self.tx_fee_reward_wei += delta.tx_fee_reward_wei;
        }
    }

    /// Net consensus-layer income in gwei: rewards minus penalties.
    pub fn total_cl_rewards(&self) -> i64 {
        let rewards = self.attestation_source_reward
            + self.attestation_target_reward
            + self.attestation_head_reward
            + self.proposer_attestation_inclusion_reward
            + self.proposer_slashing_inclusion_reward
            + self.proposer_sync_inclusion_reward
            + self.sync_committee_reward
            + self.slashing_reward;
        let penalties = self.attestation_source_penalty
            + self.attestation_target_penalty
            + self.finality_delay_penalty
            + self.sync_committee_penalty
            + self.slashing_penalty;
        rewards as i64 - penalties as i64
    }

    /// Execution-layer income truncated to gwei.
    pub fn el_rewards_gwei(&self) -> i64 {
        i64::try_from(self.tx_fee_reward_wei / WEI_PER_GWEI).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(seed: u64) -> ValidatorEpochIncome {
        ValidatorEpochIncome {
            attestation_source_reward: seed,
            attestation_target_penalty: seed * 2,
            attestation_head_reward: seed * 3,
            sync_committee_reward: seed,
            proposals_missed: 1,
            tx_fee_reward_wei: U256::from(seed) * WEI_PER_GWEI,
            ..Default::default()
        }
    }

    #[test]
    fn test_accumulation_is_commutative() {
        let deltas = [sample(1), sample(7), sample(1000), sample(3)];

        let mut forward = ValidatorEpochIncome::default();
        for d in &deltas {
            forward.accumulate(d);
        }

        let mut reverse = ValidatorEpochIncome::default();
        for d in deltas.iter().rev() {
            reverse.accumulate(d);
        }

        assert_eq!(forward, reverse);
        assert_eq!(forward.tx_fee_reward_wei, U256::from(1011u64) * WEI_PER_GWEI);
    }

    #[test]
    fn test_zero_wei_delta_is_noop() {
        let mut entry = sample(5);
        let before = entry.tx_fee_reward_wei;
        entry.accumulate(&ValidatorEpochIncome::default());
        assert_eq!(entry.tx_fee_reward_wei, before);
    }

    #[test]
    fn test_total_cl_rewards_is_signed() {
        let entry = ValidatorEpochIncome {
            attestation_source_reward: 10,
            attestation_target_penalty: 25,
            ..Default::default()
        };
        assert_eq!(entry.total_cl_rewards(), -15);
    }

    #[test]
    fn test_el_rewards_truncate_to_gwei() {
        let entry = ValidatorEpochIncome {
            tx_fee_reward_wei: U256::from(5u64) * WEI_PER_GWEI + U256::from(999_999_999u64),
            ..Default::default()
        };
        assert_eq!(entry.el_rewards_gwei(), 5);
    }
}

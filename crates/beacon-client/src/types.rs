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

//! Beacon API response types. Integers on the wire are decimal strings per
//! the API conventions.

use serde::{Deserialize, Serialize};

/// Standard `{ "data": ... }` response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct DataResponse<T> {
    pub data: T,
}

/// One entry of the proposer duties response for an epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposerDuty {
    pub pubkey: String,
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_index: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub slot: u64,
}

/// Attestation rewards data for an epoch. Only the per-validator totals are
/// consumed; the ideal-rewards table is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct AttestationRewardsData {
    pub total_rewards: Vec<TotalReward>,
}

/// Actual attestation rewards of one validator. Signed values: penalties
/// are negative, and `inclusion_delay` is nonpositive by contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalReward {
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_index: u64,
    #[serde(with = "serde_utils::quoted_i64")]
    pub head: i64,
    #[serde(with = "serde_utils::quoted_i64")]
    pub target: i64,
    #[serde(with = "serde_utils::quoted_i64")]
    pub source: i64,
    #[serde(default, with = "serde_utils::quoted_i64")]
    pub inclusion_delay: i64,
}

/// Block reward components credited to the proposer of a slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockRewards {
    #[serde(with = "serde_utils::quoted_u64")]
    pub proposer_index: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub total: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub attestations: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub sync_aggregate: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub proposer_slashings: u64,
    #[serde(with = "serde_utils::quoted_u64")]
    pub attester_slashings: u64,
}

/// Signed sync-committee reward of one validator for a slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncCommitteeReward {
    #[serde(with = "serde_utils::quoted_u64")]
    pub validator_index: u64,
    #[serde(with = "serde_utils::quoted_i64")]
    pub reward: i64,
}

/// Minimal view of a signed beacon block, enough to extract the execution
/// block number.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SignedBeaconBlock {
    pub message: BeaconBlockMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BeaconBlockMessage {
    pub body: BeaconBlockBody,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BeaconBlockBody {
    #[serde(default)]
    pub execution_payload: Option<ExecutionPayloadRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExecutionPayloadRef {
    #[serde(with = "serde_utils::quoted_u64")]
    pub block_number: u64,
    pub block_hash: String,
}

/// Payload of `/eth/v1/beacon/genesis`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GenesisData {
    #[serde(with = "serde_utils::quoted_u64")]
    pub genesis_time: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proposer_duty_decodes_quoted_integers() {
        let raw = r#"{"pubkey":"0xabcd","validator_index":"123","slot":"98765"}"#;
        let duty: ProposerDuty = serde_json::from_str(raw).unwrap();
        assert_eq!(duty.validator_index, 123);
        assert_eq!(duty.slot, 98765);
    }

    #[test]
    fn test_total_reward_decodes_signed_values() {
        let raw = r#"{
            "validator_index": "7",
            "head": "2500",
            "target": "-1200",
            "source": "800",
            "inclusion_delay": "-40"
        }"#;
        let reward: TotalReward = serde_json::from_str(raw).unwrap();
        assert_eq!(reward.head, 2500);
        assert_eq!(reward.target, -1200);
        assert_eq!(reward.inclusion_delay, -40);
    }

    #[test]
    fn test_total_reward_tolerates_missing_inclusion_delay() {
        let raw = r#"{"validator_index":"7","head":"1","target":"1","source":"1"}"#;
        let reward: TotalReward = serde_json::from_str(raw).unwrap();
        assert_eq!(reward.inclusion_delay, 0);
    }

    #[test]
    fn test_block_without_payload_is_pre_merge_shape() {
        let raw = r#"{"message":{"body":{}}}"#;
        let block: SignedBeaconBlock = serde_json::from_str(raw).unwrap();
        assert!(block.message.body.execution_payload.is_none());
    }
}

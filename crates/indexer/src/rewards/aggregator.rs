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

//! Address-level reward aggregation: joins cache state with validator
//! metadata grouped by depositor or withdrawal address.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use stakewatch_rewards::{
    average_apr_31d, estimate_recent_rewards, estimate_window_epochs, ValidatorLifecycle,
};

use crate::{
    db::{address::normalize_search_address, DbError, DoraDbObj, InvalidAddress},
    rewards::service::RewardsService,
};

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error(transparent)]
    InvalidAddress(#[from] InvalidAddress),

    #[error(transparent)]
    Db(#[from] DbError),
}

/// Aggregated rewards for every validator funded by or withdrawing to one
/// execution-layer address.
#[derive(Debug, Clone, Serialize)]
pub struct AddressRewards {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depositor_label: Option<String>,
    pub active_validator_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validator_indices: Option<Vec<u64>>,
    pub cl_rewards_gwei: i64,
    pub el_rewards_gwei: i64,
    pub total_rewards_gwei: i64,
    pub total_effective_balance_gwei: i64,
    pub estimated_history_rewards_31d_gwei: f64,
    pub weighted_average_stake_time_seconds: i64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// Resolves an address to its validators and sums their current-window
/// rewards. The stake-time query, the cache join, and the 31-day estimate
/// run in parallel.
pub async fn address_rewards(
    service: &RewardsService,
    dora: &DoraDbObj,
    address: &str,
    include_indices: bool,
) -> Result<AddressRewards, AggregateError> {
    let normalized = normalize_search_address(address)?;
    let current_epoch = service.clock().current_epoch();

    let details = dora.validator_details_by_address(&normalized).await?;

    let mut all_indices = Vec::with_capacity(details.len());
    let mut active_indices = Vec::with_capacity(details.len());
    let mut effective_balances = HashMap::with_capacity(details.len());
    let mut deposit_balances = HashMap::with_capacity(details.len());
    let mut lifecycles: HashMap<u64, ValidatorLifecycle> = HashMap::with_capacity(details.len());

    for detail in &details {
        let index = detail.validator_index;
        all_indices.push(index);
        if detail.effective_balance > 0 {
            effective_balances.insert(index, detail.effective_balance);
        }
        if detail.total_deposit_gwei > 0 {
            deposit_balances.insert(index, detail.total_deposit_gwei);
        }
        let lifecycle = detail.lifecycle();
        lifecycles.insert(index, lifecycle);
        if lifecycle.is_active_at(current_epoch) {
            active_indices.push(index);
        }
    }

    let stake_time_task = async {
        if all_indices.is_empty() {
            return 0;
        }
        match dora.weighted_average_stake_time(&all_indices).await {
            Ok(seconds) => seconds,
            Err(err) => {
                tracing::error!(error = %err, "failed to calculate weighted average stake time");
                0
            }
        }
    };

    let rewards_task = async {
        let rewards = service.total_rewards(&active_indices, &effective_balances).await;
        let window = service.reward_window().await;
        (rewards, window)
    };

    let estimate_task = async {
        let snapshot = service.network_snapshot().await;
        estimate_recent_rewards(
            &all_indices,
            snapshot.project_apr_percent,
            current_epoch,
            estimate_window_epochs(),
            &effective_balances,
            &deposit_balances,
            &lifecycles,
        )
    };

    let (stake_time, (validator_rewards, (window_start, window_end)), estimated) =
        tokio::join!(stake_time_task, rewards_task, estimate_task);

    let mut result = AddressRewards {
        address: normalized,
        depositor_label: None,
        active_validator_count: active_indices.len(),
        validator_indices: include_indices.then(|| all_indices.clone()),
        cl_rewards_gwei: 0,
        el_rewards_gwei: 0,
        total_rewards_gwei: 0,
        total_effective_balance_gwei: 0,
        estimated_history_rewards_31d_gwei: estimated,
        weighted_average_stake_time_seconds: stake_time,
        window_start,
        window_end,
    };

    for index in &active_indices {
        let Some(reward) = validator_rewards.get(index) else {
            continue;
        };
        result.cl_rewards_gwei += reward.cl_rewards_gwei;
        result.el_rewards_gwei += reward.el_rewards_gwei;
        result.total_rewards_gwei += reward.total_rewards_gwei;
        result.total_effective_balance_gwei += reward.effective_balance_gwei;
    }

    Ok(result)
}

/// The 31-day IQR-filtered average APR over stored snapshots plus the live
/// one. History read failures degrade to the live snapshot alone.
pub async fn average_network_apr(service: &RewardsService) -> f64 {
    let current = service.network_snapshot().await;
    let history = service.network_reward_history().unwrap_or_else(|err| {
        tracing::error!(error = %err, "failed to load rewards history");
        Vec::new()
    });
    average_apr_31d(&history, Some(&current))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ValidatorDetails;
    use crate::rewards::service::{RewardsService, RewardsServiceConfig};
    use crate::rewards::testing::{MockBeacon, MockDora};
    use std::sync::Arc;
    use stakewatch_rewards::EpochClock;

    const GENESIS: i64 = 1_709_532_000;

    fn details(index: u64, exit_epoch: u64) -> ValidatorDetails {
        ValidatorDetails {
            validator_index: index,
            effective_balance: 32_000_000_000,
            activation_epoch: 0,
            exit_epoch,
            total_deposit_gwei: 32_000_000_000,
        }
    }

    fn test_fixture(dora_details: Vec<ValidatorDetails>) -> (Arc<RewardsService>, DoraDbObj) {
        let clock = EpochClock::new(GENESIS).unwrap();
        let beacon = Arc::new(MockBeacon::new());
        let service = Arc::new(RewardsService::new(
            RewardsServiceConfig::default(),
            clock,
            beacon,
            None,
            None,
        ));
        let dora: DoraDbObj = Arc::new(MockDora {
            details: dora_details,
            stake_time_seconds: 86_400,
            active_validator_count: 0,
            total_effective_balance_gwei: 0,
        });
        (service, dora)
    }

    #[tokio::test]
    async fn test_address_rewards_sums_active_validators_only() {
        // Validator 1 never exits; validator 2 exited long ago.
        let (service, dora) = test_fixture(vec![details(1, u64::MAX), details(2, 10)]);
        service.process_epoch(3).await.unwrap();

        let result = address_rewards(
            &service,
            &dora,
            "0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD",
            true,
        )
        .await
        .unwrap();

        assert_eq!(result.address, "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd");
        assert_eq!(result.active_validator_count, 1);
        assert_eq!(result.validator_indices, Some(vec![1, 2]));
        // Validator 1's attestation income for one epoch: head 3 + target 2
        // + source 1.
        assert_eq!(result.cl_rewards_gwei, 6);
        assert_eq!(result.total_rewards_gwei, result.cl_rewards_gwei + result.el_rewards_gwei);
        assert_eq!(result.total_effective_balance_gwei, 32_000_000_000);
        assert_eq!(result.weighted_average_stake_time_seconds, 86_400);
        assert!(result.estimated_history_rewards_31d_gwei > 0.0);
    }

    #[tokio::test]
    async fn test_address_rewards_accepts_withdrawal_credentials() {
        let (service, dora) = test_fixture(vec![details(1, u64::MAX)]);
        service.process_epoch(3).await.unwrap();

        let credential = "0x010000000000000000000000abcdefabcdefabcdefabcdefabcdefabcdefabcd";
        let result = address_rewards(&service, &dora, credential, false).await.unwrap();
        assert_eq!(result.address, "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd");
        assert!(result.validator_indices.is_none());
    }

    #[tokio::test]
    async fn test_address_rewards_rejects_invalid_input() {
        let (service, dora) = test_fixture(Vec::new());
        let err = address_rewards(&service, &dora, "0x1234", false).await.unwrap_err();
        assert!(matches!(err, AggregateError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn test_unknown_address_yields_empty_aggregate() {
        let (service, dora) = test_fixture(Vec::new());
        let result = address_rewards(
            &service,
            &dora,
            "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd",
            false,
        )
        .await
        .unwrap();

        assert_eq!(result.active_validator_count, 0);
        assert_eq!(result.total_rewards_gwei, 0);
        assert_eq!(result.estimated_history_rewards_31d_gwei, 0.0);
    }
}

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

//! Round-robin pool over beacon endpoints plus the execution client, behind
//! the `BeaconRpc` capability trait. The pool is the only component that
//! talks to upstream nodes; retry belongs to the caller.

use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use alloy::primitives::U256;
use async_trait::async_trait;
use reqwest::Url;

use crate::{
    client::BeaconClient,
    error::BeaconClientError,
    execution::ExecutionClient,
    types::{BlockRewards, ProposerDuty, SyncCommitteeReward, TotalReward},
};

/// The RPC capability set the reward pipeline consumes.
#[async_trait]
pub trait BeaconRpc {
    async fn proposer_assignments(&self, epoch: u64)
        -> Result<Vec<ProposerDuty>, BeaconClientError>;

    async fn attestation_rewards(&self, epoch: u64) -> Result<Vec<TotalReward>, BeaconClientError>;

    async fn block_rewards(&self, slot: u64) -> Result<BlockRewards, BeaconClientError>;

    async fn sync_committee_rewards(
        &self,
        slot: u64,
    ) -> Result<Vec<SyncCommitteeReward>, BeaconClientError>;

    async fn execution_block_number(&self, slot: u64) -> Result<u64, BeaconClientError>;

    async fn el_reward_for_block(&self, block_number: u64) -> Result<U256, BeaconClientError>;
}

pub type BeaconObj = Arc<dyn BeaconRpc + Send + Sync>;

/// Load-balances beacon calls across multiple upstream endpoints with an
/// atomic round-robin counter. Execution calls go to the single configured
/// execution node.
pub struct NodePool {
    clients: Vec<BeaconClient>,
    execution: ExecutionClient,
    counter: AtomicU64,
}

impl NodePool {
    /// Builds a pool from a comma-separated list of beacon URLs and one
    /// execution URL.
    pub fn new(
        beacon_urls: &str,
        execution_url: Url,
        request_timeout: Duration,
    ) -> Result<Self, BeaconClientError> {
        let mut clients = Vec::new();
        for part in beacon_urls.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            clients.push(BeaconClient::new(Url::parse(part)?, request_timeout)?);
        }
        if clients.is_empty() {
            return Err(BeaconClientError::NoEndpoints);
        }

        Ok(Self {
            clients,
            execution: ExecutionClient::new(execution_url, request_timeout)?,
            counter: AtomicU64::new(0),
        })
    }

    pub fn endpoint_count(&self) -> usize {
        self.clients.len()
    }

    fn client(&self) -> &BeaconClient {
        let index = self.counter.fetch_add(1, Ordering::Relaxed) as usize % self.clients.len();
        &self.clients[index]
    }
}

#[async_trait]
impl BeaconRpc for NodePool {
    async fn proposer_assignments(
        &self,
        epoch: u64,
    ) -> Result<Vec<ProposerDuty>, BeaconClientError> {
        self.client().proposer_assignments(epoch).await
    }

    async fn attestation_rewards(&self, epoch: u64) -> Result<Vec<TotalReward>, BeaconClientError> {
        self.client().attestation_rewards(epoch).await
    }

    async fn block_rewards(&self, slot: u64) -> Result<BlockRewards, BeaconClientError> {
        self.client().block_rewards(slot).await
    }

    async fn sync_committee_rewards(
        &self,
        slot: u64,
    ) -> Result<Vec<SyncCommitteeReward>, BeaconClientError> {
        self.client().sync_committee_rewards(slot).await
    }

    async fn execution_block_number(&self, slot: u64) -> Result<u64, BeaconClientError> {
        self.client().execution_block_number(slot).await
    }

    async fn el_reward_for_block(&self, block_number: u64) -> Result<U256, BeaconClientError> {
        self.execution.el_reward_for_block(block_number).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(urls: &str) -> Result<NodePool, BeaconClientError> {
        NodePool::new(
            urls,
            Url::parse("http://localhost:8545").unwrap(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_pool_parses_comma_separated_urls() {
        let pool = pool("http://a:5052, http://b:5052 ,,").unwrap();
        assert_eq!(pool.endpoint_count(), 2);
    }

    #[test]
    fn test_pool_rejects_empty_endpoint_list() {
        assert!(matches!(pool("  ,  "), Err(BeaconClientError::NoEndpoints)));
    }

    #[test]
    fn test_round_robin_cycles_endpoints() {
        let pool = pool("http://a:5052,http://b:5052").unwrap();
        let first = pool.client().base_url().clone();
        let second = pool.client().base_url().clone();
        let third = pool.client().base_url().clone();
        assert_ne!(first, second);
        assert_eq!(first, third);
    }
}

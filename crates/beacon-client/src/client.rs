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

//! Client for the beacon node REST API capabilities this service needs.

use std::time::Duration;

use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;

use crate::{
    error::BeaconClientError,
    http_client::ClientWithBaseUrl,
    types::{
        AttestationRewardsData, BlockRewards, DataResponse, ProposerDuty, SignedBeaconBlock,
        SyncCommitteeReward, TotalReward,
    },
};

#[derive(Debug, Clone)]
pub struct BeaconClient {
    http: ClientWithBaseUrl,
}

impl BeaconClient {
    pub fn new(base_url: Url, request_timeout: Duration) -> Result<Self, BeaconClientError> {
        Ok(Self { http: ClientWithBaseUrl::new(base_url, request_timeout)? })
    }

    pub fn base_url(&self) -> &Url {
        self.http.base_url()
    }

    /// Proposer assignments for an epoch, one entry per slot.
    pub async fn proposer_assignments(
        &self,
        epoch: u64,
    ) -> Result<Vec<ProposerDuty>, BeaconClientError> {
        let response = self
            .http
            .get(&format!("eth/v1/validator/duties/proposer/{epoch}"))?
            .send()
            .await?;
        let response = ensure_ok(response).await?;
        Ok(decode::<DataResponse<Vec<ProposerDuty>>>(response).await?.data)
    }

    /// Attestation rewards for every validator in an epoch.
    pub async fn attestation_rewards(
        &self,
        epoch: u64,
    ) -> Result<Vec<TotalReward>, BeaconClientError> {
        // An empty filter requests rewards for the full validator set.
        let response = self
            .http
            .post(&format!("eth/v1/beacon/rewards/attestations/{epoch}"))?
            .json::<[&str; 0]>(&[])
            .send()
            .await?;
        let response = ensure_ok(response).await?;
        Ok(decode::<DataResponse<AttestationRewardsData>>(response).await?.data.total_rewards)
    }

    /// Block rewards credited to the proposer of a slot.
    pub async fn block_rewards(&self, slot: u64) -> Result<BlockRewards, BeaconClientError> {
        let response =
            self.http.get(&format!("eth/v1/beacon/rewards/blocks/{slot}"))?.send().await?;
        let response = ensure_ok(response).await?;
        Ok(decode::<DataResponse<BlockRewards>>(response).await?.data)
    }

    /// Sync-committee rewards for a slot. Slots before the sync-committee
    /// fork report `PreSyncCommittees`.
    pub async fn sync_committee_rewards(
        &self,
        slot: u64,
    ) -> Result<Vec<SyncCommitteeReward>, BeaconClientError> {
        let response = self
            .http
            .post(&format!("eth/v1/beacon/rewards/sync_committee/{slot}"))?
            .json::<[&str; 0]>(&[])
            .send()
            .await?;
        if response.status() == StatusCode::BAD_REQUEST {
            return Err(BeaconClientError::PreSyncCommittees);
        }
        let response = ensure_ok(response).await?;
        Ok(decode::<DataResponse<Vec<SyncCommitteeReward>>>(response).await?.data)
    }

    /// Execution block number carried by the block at a slot. Missing blocks
    /// report `BlockNotFound`; blocks without an execution payload report
    /// `PreMerge`.
    pub async fn execution_block_number(&self, slot: u64) -> Result<u64, BeaconClientError> {
        let response = self.http.get(&format!("eth/v2/beacon/blocks/{slot}"))?.send().await?;
        let response = ensure_ok(response).await?;
        let block = decode::<DataResponse<SignedBeaconBlock>>(response).await?.data;

        match block.message.body.execution_payload {
            // An all-zero block hash marks the default pre-merge payload.
            Some(payload) if !is_zero_hash(&payload.block_hash) => Ok(payload.block_number),
            _ => Err(BeaconClientError::PreMerge),
        }
    }
}

fn is_zero_hash(hash: &str) -> bool {
    hash.trim_start_matches("0x").chars().all(|c| c == '0')
}

async fn ensure_ok(response: Response) -> Result<Response, BeaconClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(BeaconClientError::BlockNotFound);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BeaconClientError::UnexpectedStatus { status, body })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BeaconClientError> {
    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

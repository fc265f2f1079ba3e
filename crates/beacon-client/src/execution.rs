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

//! Execution-layer JSON-RPC client for transaction-fee reward computation.

use std::time::Duration;

use alloy::primitives::U256;
use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::{json, Value};

use crate::error::BeaconClientError;

#[derive(Debug, Clone)]
pub struct ExecutionClient {
    client: Client,
    url: Url,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcBlock {
    #[serde(rename = "baseFeePerGas", default)]
    base_fee_per_gas: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RpcReceipt {
    #[serde(rename = "gasUsed")]
    gas_used: String,
    #[serde(rename = "effectiveGasPrice")]
    effective_gas_price: String,
}

impl ExecutionClient {
    pub fn new(url: Url, request_timeout: Duration) -> Result<Self, BeaconClientError> {
        let client = Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Transaction-fee income of the block's proposer in wei: the sum of
    /// `gas_used * (effective_gas_price - base_fee)` over all receipts. The
    /// base fee portion is burned and never credited.
    pub async fn el_reward_for_block(&self, block_number: u64) -> Result<U256, BeaconClientError> {
        let tag = format!("0x{block_number:x}");

        let block: RpcBlock = self
            .call("eth_getBlockByNumber", json!([tag, false]))
            .await?
            .ok_or(BeaconClientError::BlockNotFound)?;
        let receipts: Vec<RpcReceipt> = self
            .call("eth_getBlockReceipts", json!([tag]))
            .await?
            .ok_or(BeaconClientError::BlockNotFound)?;

        let base_fee = parse_quantity(block.base_fee_per_gas.as_deref().unwrap_or("0x0"))?;

        let mut reward = U256::ZERO;
        for receipt in receipts {
            let gas_used = parse_quantity(&receipt.gas_used)?;
            let price = parse_quantity(&receipt.effective_gas_price)?;
            reward += gas_used * price.saturating_sub(base_fee);
        }
        Ok(reward)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<Option<T>, BeaconClientError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self.client.post(self.url.clone()).json(&body).send().await?;
        let bytes = response.bytes().await?;
        let rpc: JsonRpcResponse<T> = serde_json::from_slice(&bytes)?;

        if let Some(error) = rpc.error {
            return Err(BeaconClientError::ExecutionRpc(format!(
                "{method} failed with code {}: {}",
                error.code, error.message
            )));
        }
        Ok(rpc.result)
    }
}

/// Parses an `0x`-prefixed hex quantity. An empty quantity is zero.
fn parse_quantity(raw: &str) -> Result<U256, BeaconClientError> {
    let digits = raw.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 16)
        .map_err(|err| BeaconClientError::ExecutionRpc(format!("invalid quantity {raw:?}: {err}")))
}

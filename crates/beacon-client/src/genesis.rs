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

//! Genesis timestamp discovery from configured beacon endpoints.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Url;

use crate::{
    http_client::ClientWithBaseUrl,
    types::{DataResponse, GenesisData},
};

/// Retrieves the genesis timestamp (Unix seconds) from the first reachable
/// beacon endpoint in the comma-separated list.
pub async fn fetch_genesis_timestamp(beacon_urls: &str, request_timeout: Duration) -> Result<i64> {
    let endpoints: Vec<&str> =
        beacon_urls.split(',').map(str::trim).filter(|part| !part.is_empty()).collect();
    if endpoints.is_empty() {
        bail!("beacon node URL is empty");
    }

    let mut last_error = None;
    for endpoint in endpoints {
        match fetch_from_endpoint(endpoint, request_timeout).await {
            Ok(timestamp) => return Ok(timestamp),
            Err(err) => {
                tracing::warn!(endpoint, error = %err, "genesis lookup failed");
                last_error = Some(err.context(format!("endpoint {endpoint}")));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("beacon node URL is empty")))
}

async fn fetch_from_endpoint(endpoint: &str, request_timeout: Duration) -> Result<i64> {
    let base = Url::parse(endpoint).context("parse beacon url")?;
    let client = ClientWithBaseUrl::new(base, request_timeout).context("build http client")?;

    let response = client
        .get("eth/v1/beacon/genesis")
        .context("build genesis request")?
        .send()
        .await
        .context("request beacon genesis")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("beacon genesis request failed: {status}: {}", body.trim());
    }

    let payload: DataResponse<GenesisData> =
        response.json().await.context("decode genesis response")?;

    let timestamp = payload.data.genesis_time as i64;
    if timestamp <= 0 {
        bail!("genesis_time must be positive, got {timestamp}");
    }
    Ok(timestamp)
}

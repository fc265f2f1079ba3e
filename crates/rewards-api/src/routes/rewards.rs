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

//! Reward query routes.

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::time::timeout;

use stakewatch_indexer::rewards::{address_rewards, average_network_apr, AggregateError};

use crate::{
    handler::ApiError,
    models::{AddressRewardsRequest, IncludeIndicesQuery, RewardsRequest, RewardsResponse},
    state::AppState,
};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(validator_rewards))
        .route("/by-address", post(address_rewards_handler))
        .route("/network", get(network_rewards))
}

/// Total rewards (EL + CL) accumulated in the current window for the
/// requested validators.
#[utoipa::path(
    post,
    path = "/rewards",
    tag = "Rewards",
    responses(
        (status = 200, description = "Per-validator rewards over the current window"),
        (status = 400, description = "Missing or empty validators array")
    )
)]
pub(crate) async fn validator_rewards(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RewardsRequest>,
) -> Result<Json<RewardsResponse>, ApiError> {
    if request.validators.is_empty() {
        return Err(ApiError::bad_request("validators array cannot be empty"));
    }

    let mut effective_balances = HashMap::new();
    if let Some(dora) = &state.dora {
        match timeout(state.request_timeout, dora.effective_balances(&request.validators)).await {
            Ok(Ok(balances)) => effective_balances = balances,
            Ok(Err(err)) => tracing::error!(error = %err, "failed to load effective balances"),
            Err(_) => tracing::error!("effective balance lookup timed out"),
        }
    }

    let rewards = state.service.total_rewards(&request.validators, &effective_balances).await;
    let (window_start, window_end) = state.service.reward_window().await;

    Ok(Json(RewardsResponse {
        validator_count: request.validators.len(),
        rewards,
        window_start,
        window_end,
    }))
}

/// Aggregated validator rewards per withdrawal or deposit address.
#[utoipa::path(
    post,
    path = "/rewards/by-address",
    tag = "Rewards",
    params(
        ("include_validator_indices" = Option<bool>, Query, description = "Include validator indices in the response")
    ),
    responses(
        (status = 200, description = "Aggregated rewards for the address"),
        (status = 400, description = "Invalid address"),
        (status = 503, description = "Metadata store not configured")
    )
)]
pub(crate) async fn address_rewards_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<IncludeIndicesQuery>,
    Json(request): Json<AddressRewardsRequest>,
) -> Result<Json<Value>, ApiError> {
    let Some(dora) = &state.dora else {
        return Err(ApiError::service_unavailable("metadata store is not configured"));
    };
    if request.address.trim().is_empty() {
        return Err(ApiError::bad_request("address cannot be empty"));
    }

    match address_rewards(
        &state.service,
        dora,
        &request.address,
        query.include_validator_indices,
    )
    .await
    {
        Ok(mut result) => {
            result.depositor_label = state.lookup_label(&result.address);
            Ok(Json(json!(result)))
        }
        Err(AggregateError::InvalidAddress(err)) => Err(ApiError::bad_request(err.to_string())),
        Err(AggregateError::Db(err)) => {
            tracing::error!(error = %err, "failed to load validators by address");
            Err(ApiError::internal("failed to load validator details for address"))
        }
    }
}

/// Network-wide reward totals: the live window snapshot, stored history,
/// and the 31-day average APR.
#[utoipa::path(
    get,
    path = "/rewards/network",
    tag = "Rewards",
    responses(
        (status = 200, description = "Live snapshot, history, and 31-day average APR")
    )
)]
pub(crate) async fn network_rewards(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.service.network_snapshot().await;
    let average_apr = average_network_apr(&state.service).await;

    let mut response = json!({
        "current": snapshot,
        "average_apr_31d_percent": average_apr,
    });

    match state.service.network_reward_history() {
        Ok(history) if !history.is_empty() => {
            response["history"] = json!(history);
        }
        Ok(_) => {}
        Err(err) => {
            tracing::error!(error = %err, "failed to load rewards history");
            response["history_error"] = json!("failed to load stored history");
        }
    }

    Json(response)
}

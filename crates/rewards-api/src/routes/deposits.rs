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

//! Deposit statistics routes.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};

use stakewatch_indexer::db::DoraDbObj;

use crate::{handler::ApiError, models::TopQuery, state::AppState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/top-deposits", get(top_deposits))
        .route("/top-withdrawals", get(top_withdrawals))
}

fn require_dora(state: &AppState) -> Result<&DoraDbObj, ApiError> {
    state
        .dora
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("metadata store is not configured"))
}

fn resolve_limit(state: &AppState, requested: Option<i64>) -> i64 {
    match requested {
        Some(limit) if limit > 0 => limit,
        _ if state.default_api_limit > 0 => state.default_api_limit,
        _ => 100,
    }
}

/// Deposit totals and validator status counts grouped by depositor (tx
/// sender) address.
#[utoipa::path(
    get,
    path = "/deposits/top-deposits",
    tag = "Deposits",
    params(
        ("limit" = Option<i64>, Query, description = "Number of results to return"),
        ("sort_by" = Option<String>, Query, description = "Sort field"),
        ("order" = Option<String>, Query, description = "Sort order (asc|desc)")
    ),
    responses(
        (status = 200, description = "Top depositor addresses"),
        (status = 503, description = "Metadata store not configured")
    )
)]
pub(crate) async fn top_deposits(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopQuery>,
) -> Result<Json<Value>, ApiError> {
    let dora = require_dora(&state)?;
    let limit = resolve_limit(&state, query.limit);

    let mut stats = dora
        .top_depositors(limit, query.sort_by.trim(), query.order.trim())
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "top depositors query failed");
            ApiError::internal(err.to_string())
        })?;

    for stat in &mut stats {
        stat.depositor_label = state.lookup_label(&stat.depositor_address);
    }

    Ok(Json(json!({
        "limit": limit,
        "sort_by": query.sort_by,
        "order": query.order,
        "results": stats,
    })))
}

/// Deposit totals and validator status counts grouped by withdrawal
/// address.
#[utoipa::path(
    get,
    path = "/deposits/top-withdrawals",
    tag = "Deposits",
    params(
        ("limit" = Option<i64>, Query, description = "Number of results to return"),
        ("sort_by" = Option<String>, Query, description = "Sort field"),
        ("order" = Option<String>, Query, description = "Sort order (asc|desc)")
    ),
    responses(
        (status = 200, description = "Top withdrawal addresses"),
        (status = 503, description = "Metadata store not configured")
    )
)]
pub(crate) async fn top_withdrawals(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TopQuery>,
) -> Result<Json<Value>, ApiError> {
    let dora = require_dora(&state)?;
    let limit = resolve_limit(&state, query.limit);

    let stats = dora
        .top_withdrawals(limit, query.sort_by.trim(), query.order.trim())
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "top withdrawals query failed");
            ApiError::internal(err.to_string())
        })?;

    Ok(Json(json!({
        "limit": limit,
        "sort_by": query.sort_by,
        "order": query.order,
        "results": stats,
    })))
}

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

//! Request and response bodies of the JSON API.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use stakewatch_indexer::rewards::ValidatorReward;

#[derive(Debug, Deserialize, ToSchema)]
pub struct RewardsRequest {
    pub validators: Vec<u64>,
}

#[derive(Debug, Serialize)]
pub struct RewardsResponse {
    pub validator_count: usize,
    pub rewards: HashMap<u64, ValidatorReward>,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddressRewardsRequest {
    pub address: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct IncludeIndicesQuery {
    #[serde(default)]
    pub include_validator_indices: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopQuery {
    pub limit: Option<i64>,
    #[serde(default)]
    pub sort_by: String,
    #[serde(default)]
    pub order: String,
}

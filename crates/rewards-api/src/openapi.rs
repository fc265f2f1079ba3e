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

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Validator Rewards API",
        description = "REST API for Ethereum validator rewards and deposits analytics.",
        version = "1.0"
    ),
    paths(
        crate::handler::health_check,
        crate::routes::rewards::validator_rewards,
        crate::routes::rewards::address_rewards_handler,
        crate::routes::rewards::network_rewards,
        crate::routes::deposits::top_deposits,
        crate::routes::deposits::top_withdrawals,
    ),
    tags(
        (name = "Health", description = "Service health"),
        (name = "Rewards", description = "Validator reward queries"),
        (name = "Deposits", description = "Deposit statistics")
    )
)]
pub struct ApiDoc;

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

//! Upstream node access: the beacon REST API, the execution JSON-RPC API,
//! and the load-balancing node pool behind the `BeaconRpc` capability trait.

pub mod client;
pub mod error;
pub mod execution;
pub mod genesis;
pub mod http_client;
pub mod pool;
pub mod types;

pub use client::BeaconClient;
pub use error::BeaconClientError;
pub use execution::ExecutionClient;
pub use genesis::fetch_genesis_timestamp;
pub use pool::{BeaconObj, BeaconRpc, NodePool};
pub use types::{BlockRewards, ProposerDuty, SyncCommitteeReward, TotalReward};

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

use reqwest::StatusCode;
use thiserror::Error;

/// Errors from upstream node access. The first three variants are semantic
/// absences rather than failures; callers handle them without retrying.
#[derive(Debug, Error)]
pub enum BeaconClientError {
    #[error("block not found")]
    BlockNotFound,

    #[error("slot is pre-merge")]
    PreMerge,

    #[error("sync committee rewards unavailable for slot")]
    PreSyncCommittees,

    #[error("no beacon endpoints configured")]
    NoEndpoints,

    #[error("upstream returned {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },

    #[error("http transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("execution rpc error: {0}")]
    ExecutionRpc(String),
}

impl BeaconClientError {
    /// True for the enumerated absence-of-data cases that must not fail an
    /// epoch fetch.
    pub fn is_semantic(&self) -> bool {
        matches!(self, Self::BlockNotFound | Self::PreMerge | Self::PreSyncCommittees)
    }
}

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

pub mod address;
pub mod dora;

use thiserror::Error;

pub use address::{normalize_address, normalize_search_address, InvalidAddress};
pub use dora::{
    DepositorStat, DoraDb, DoraDbObj, ValidatorDetails, ValidatorMetaDb, ValidatorStatus,
    WithdrawalStat,
};

#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQL error {0:?}")]
    SqlErr(#[from] sqlx::Error),

    #[error("Invalid row value: {0}")]
    BadRow(String),
}

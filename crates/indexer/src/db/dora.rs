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

//! Read-only query layer over the Dora Postgres schema: validator lifecycle
//! and balance lookups, address joins, and deposit statistics.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use stakewatch_rewards::{
    clock::SECONDS_PER_EPOCH, EpochClock, ValidatorLifecycle, DEFAULT_EFFECTIVE_BALANCE_GWEI,
};

use super::DbError;

const DEFAULT_STATS_LIMIT: i64 = 100;

/// Dora stores uint64 epochs in signed BIGINT columns shifted by -2^63.
const EPOCH_SHIFT: u64 = 1 << 63;

/// Translates a natural epoch into the shifted representation kept in
/// Postgres. The conversion is exact for the full u64 range.
pub fn epoch_to_storage(epoch: u64) -> i64 {
    if epoch >= EPOCH_SHIFT {
        (epoch - EPOCH_SHIFT) as i64
    } else {
        epoch as i64 + i64::MIN
    }
}

/// Reverses the -2^63 shift applied to stored epoch columns.
pub fn epoch_from_storage(stored: i64) -> u64 {
    (stored as u64).wrapping_add(EPOCH_SHIFT)
}

/// Per-validator metadata for an address lookup.
#[derive(Debug, Clone)]
pub struct ValidatorDetails {
    pub validator_index: u64,
    pub effective_balance: i64,
    pub activation_epoch: u64,
    pub exit_epoch: u64,
    pub total_deposit_gwei: i64,
}

impl ValidatorDetails {
    pub fn lifecycle(&self) -> ValidatorLifecycle {
        ValidatorLifecycle {
            activation_epoch: self.activation_epoch,
            exit_epoch: self.exit_epoch,
        }
    }
}

/// Validator status counts shared by depositor/withdrawal statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidatorStatus {
    pub total_deposit: i64,
    pub validators_total: i64,
    pub slashed: i64,
    pub voluntary_exited: i64,
    pub active: i64,
}

/// Aggregated deposits for a depositor (tx sender) address.
#[derive(Debug, Clone, Serialize)]
pub struct DepositorStat {
    pub depositor_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depositor_label: Option<String>,
    #[serde(flatten)]
    pub status: ValidatorStatus,
}

/// Aggregated deposits for a withdrawal address.
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalStat {
    pub withdrawal_address: String,
    #[serde(flatten)]
    pub status: ValidatorStatus,
}

/// The metadata-store query surface consumed by the aggregators.
#[async_trait]
pub trait ValidatorMetaDb {
    /// Indices of validators funded by the deposit address or whose
    /// withdrawal credentials trail in the address, active at `epoch`.
    async fn validator_indices_by_address(
        &self,
        address: &str,
        epoch: u64,
    ) -> Result<Vec<u64>, DbError>;

    /// Full per-validator details for an address, unioning the deposit
    /// sender and withdrawal-credential paths.
    async fn validator_details_by_address(
        &self,
        address: &str,
    ) -> Result<Vec<ValidatorDetails>, DbError>;

    async fn effective_balances(&self, indices: &[u64]) -> Result<HashMap<u64, i64>, DbError>;

    async fn active_validator_count(&self, epoch: u64) -> Result<i64, DbError>;

    async fn total_effective_balance(&self, epoch: u64) -> Result<i64, DbError>;

    /// Stake-weighted average active time in seconds across the indices.
    async fn weighted_average_stake_time(&self, indices: &[u64]) -> Result<i64, DbError>;

    async fn top_depositors(
        &self,
        limit: i64,
        sort_by: &str,
        order: &str,
    ) -> Result<Vec<DepositorStat>, DbError>;

    async fn top_withdrawals(
        &self,
        limit: i64,
        sort_by: &str,
        order: &str,
    ) -> Result<Vec<WithdrawalStat>, DbError>;
}

pub type DoraDbObj = Arc<dyn ValidatorMetaDb + Send + Sync>;

/// Maps a requested sort field onto the allow-list. Unknown fields fall
/// back to the default so the value can be spliced into ORDER BY safely.
pub fn order_by(sort_by: &str) -> &'static str {
    match sort_by {
        "depositor_address" => "depositor_address",
        "withdrawal_address" => "withdrawal_address",
        "validators_total" => "validators_total",
        "slashed" => "slashed",
        "voluntary_exited" => "voluntary_exited",
        "active" => "active",
        "total_deposit" => "total_deposit",
        _ => "total_deposit",
    }
}

pub fn order_direction(order: &str) -> &'static str {
    if order.eq_ignore_ascii_case("asc") {
        "ASC"
    } else {
        "DESC"
    }
}

/// Postgres-backed implementation over the Dora schema.
pub struct DoraDb {
    pool: PgPool,
    clock: EpochClock,
}

impl DoraDb {
    pub async fn new(database_url: &str, clock: EpochClock) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new().max_connections(20).connect(database_url).await?;
        Ok(Self { pool, clock })
    }
}

#[async_trait]
impl ValidatorMetaDb for DoraDb {
    async fn validator_indices_by_address(
        &self,
        address: &str,
        epoch: u64,
    ) -> Result<Vec<u64>, DbError> {
        let shifted = epoch_to_storage(epoch);
        let rows = sqlx::query(
            r#"
(SELECT v.validator_index AS validator_index
 FROM deposit_txs dt
 LEFT JOIN validators v ON dt.publickey = v.pubkey
 WHERE '0x' || encode(dt.tx_sender, 'hex') = lower($1)
   AND v.activation_epoch <= $2 AND v.exit_epoch > $2)
UNION ALL
(SELECT v.validator_index AS validator_index
 FROM validators v
 WHERE '0x' || encode(substr(v.withdrawal_credentials, 13, 20), 'hex') = lower($1)
   AND v.activation_epoch <= $2 AND v.exit_epoch > $2)
"#,
        )
        .bind(address)
        .bind(shifted)
        .fetch_all(&self.pool)
        .await?;

        let mut indices = Vec::with_capacity(rows.len());
        for row in rows {
            let index: i64 = row.try_get("validator_index")?;
            indices.push(index as u64);
        }
        Ok(indices)
    }

    async fn validator_details_by_address(
        &self,
        address: &str,
    ) -> Result<Vec<ValidatorDetails>, DbError> {
        let rows = sqlx::query(
            r#"
SELECT v.validator_index AS validator_index,
       v.effective_balance::bigint AS effective_balance,
       v.activation_epoch AS activation_epoch,
       v.exit_epoch AS exit_epoch,
       COALESCE(SUM(dt.amount), 0)::bigint AS total_deposit
FROM deposit_txs dt
JOIN validators v ON dt.publickey = v.pubkey
WHERE '0x' || encode(dt.tx_sender, 'hex') = lower($1)
GROUP BY v.validator_index, v.effective_balance, v.activation_epoch, v.exit_epoch
UNION
SELECT v.validator_index,
       v.effective_balance::bigint,
       v.activation_epoch,
       v.exit_epoch,
       COALESCE(SUM(d.amount), 0)::bigint
FROM validators v
LEFT JOIN deposits d ON v.pubkey = d.publickey
WHERE '0x' || encode(substr(v.withdrawal_credentials, 13, 20), 'hex') = lower($1)
GROUP BY v.validator_index, v.effective_balance, v.activation_epoch, v.exit_epoch
"#,
        )
        .bind(address)
        .fetch_all(&self.pool)
        .await?;

        let mut details = Vec::with_capacity(rows.len());
        for row in rows {
            let index: i64 = row.try_get("validator_index")?;
            let activation: i64 = row.try_get("activation_epoch")?;
            let exit: i64 = row.try_get("exit_epoch")?;
            details.push(ValidatorDetails {
                validator_index: index as u64,
                effective_balance: row.try_get("effective_balance")?,
                activation_epoch: epoch_from_storage(activation),
                exit_epoch: epoch_from_storage(exit),
                total_deposit_gwei: row.try_get("total_deposit")?,
            });
        }
        Ok(details)
    }

    async fn effective_balances(&self, indices: &[u64]) -> Result<HashMap<u64, i64>, DbError> {
        if indices.is_empty() {
            return Ok(HashMap::new());
        }

        let mut ids: Vec<i64> = indices.iter().map(|index| *index as i64).collect();
        ids.sort_unstable();
        ids.dedup();

        let rows = sqlx::query(
            r#"
SELECT validator_index, effective_balance::bigint AS effective_balance
FROM validators
WHERE validator_index = ANY($1)
"#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut balances = HashMap::with_capacity(rows.len());
        for row in rows {
            let index: i64 = row.try_get("validator_index")?;
            balances.insert(index as u64, row.try_get::<i64, _>("effective_balance")?);
        }
        Ok(balances)
    }

    async fn active_validator_count(&self, epoch: u64) -> Result<i64, DbError> {
        let shifted = epoch_to_storage(epoch);
        let row = sqlx::query(
            r#"
SELECT COUNT(*)::bigint AS count
FROM validators
WHERE activation_epoch <= $1 AND exit_epoch > $1
"#,
        )
        .bind(shifted)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("count")?)
    }

    async fn total_effective_balance(&self, epoch: u64) -> Result<i64, DbError> {
        let shifted = epoch_to_storage(epoch);
        let row = sqlx::query(
            r#"
SELECT COALESCE(SUM(effective_balance), 0)::bigint AS total
FROM validators
WHERE activation_epoch <= $1 AND exit_epoch > $1
"#,
        )
        .bind(shifted)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.try_get("total")?)
    }

    async fn weighted_average_stake_time(&self, indices: &[u64]) -> Result<i64, DbError> {
        if indices.is_empty() {
            return Ok(0);
        }

        let mut ids: Vec<i64> = indices.iter().map(|index| *index as i64).collect();
        ids.sort_unstable();
        ids.dedup();

        let rows = sqlx::query(
            r#"
SELECT activation_epoch, effective_balance::bigint AS effective_balance
FROM validators
WHERE validator_index = ANY($1)
"#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let current_epoch = self.clock.current_epoch();
        let mut weighted_seconds = 0f64;
        let mut total_weight = 0f64;
        for row in rows {
            let activation = epoch_from_storage(row.try_get("activation_epoch")?);
            if activation > current_epoch {
                continue;
            }
            let mut weight: i64 = row.try_get("effective_balance")?;
            if weight <= 0 {
                weight = DEFAULT_EFFECTIVE_BALANCE_GWEI;
            }
            let active_seconds = ((current_epoch - activation) * SECONDS_PER_EPOCH) as f64;
            weighted_seconds += weight as f64 * active_seconds;
            total_weight += weight as f64;
        }

        if total_weight == 0.0 {
            return Ok(0);
        }
        Ok((weighted_seconds / total_weight) as i64)
    }

    async fn top_depositors(
        &self,
        limit: i64,
        sort_by: &str,
        order: &str,
    ) -> Result<Vec<DepositorStat>, DbError> {
        let limit = if limit <= 0 { DEFAULT_STATS_LIMIT } else { limit };
        let query = format!(
            r#"
SELECT '0x' || encode(dt.tx_sender, 'hex') AS depositor_address,
       SUM(dt.amount)::bigint AS total_deposit,
       COUNT(DISTINCT v.validator_index) AS validators_total,
       COUNT(DISTINCT v.validator_index) FILTER (WHERE v.slashed) AS slashed,
       COUNT(DISTINCT v.validator_index) FILTER (WHERE NOT v.slashed AND v.effective_balance = 0) AS voluntary_exited,
       COUNT(DISTINCT v.validator_index) FILTER (WHERE NOT v.slashed AND v.effective_balance > 0) AS active
FROM deposit_txs dt
LEFT JOIN validators v ON dt.publickey = v.pubkey
GROUP BY depositor_address
ORDER BY {} {}
LIMIT $1
"#,
            order_by(sort_by),
            order_direction(order),
        );

        let rows = sqlx::query(&query).bind(limit).fetch_all(&self.pool).await?;
        let mut stats = Vec::with_capacity(rows.len());
        for row in rows {
            stats.push(DepositorStat {
                depositor_address: row.try_get("depositor_address")?,
                depositor_label: None,
                status: status_from_row(&row)?,
            });
        }
        Ok(stats)
    }

    async fn top_withdrawals(
        &self,
        limit: i64,
        sort_by: &str,
        order: &str,
    ) -> Result<Vec<WithdrawalStat>, DbError> {
        let limit = if limit <= 0 { DEFAULT_STATS_LIMIT } else { limit };
        let query = format!(
            r#"
SELECT '0x' || encode(substr(v.withdrawal_credentials, 13, 20), 'hex') AS withdrawal_address,
       COALESCE(SUM(d.amount), 0)::bigint AS total_deposit,
       COUNT(DISTINCT v.validator_index) AS validators_total,
       COUNT(DISTINCT v.validator_index) FILTER (WHERE v.slashed) AS slashed,
       COUNT(DISTINCT v.validator_index) FILTER (WHERE NOT v.slashed AND v.effective_balance = 0) AS voluntary_exited,
       COUNT(DISTINCT v.validator_index) FILTER (WHERE NOT v.slashed AND v.effective_balance > 0) AS active
FROM validators v
LEFT JOIN deposits d ON v.pubkey = d.publickey
GROUP BY withdrawal_address
ORDER BY {} {}
LIMIT $1
"#,
            order_by(sort_by),
            order_direction(order),
        );

        let rows = sqlx::query(&query).bind(limit).fetch_all(&self.pool).await?;
        let mut stats = Vec::with_capacity(rows.len());
        for row in rows {
            stats.push(WithdrawalStat {
                withdrawal_address: row.try_get("withdrawal_address")?,
                status: status_from_row(&row)?,
            });
        }
        Ok(stats)
    }
}

fn status_from_row(row: &sqlx::postgres::PgRow) -> Result<ValidatorStatus, DbError> {
    Ok(ValidatorStatus {
        total_deposit: row.try_get("total_deposit")?,
        validators_total: row.try_get("validators_total")?,
        slashed: row.try_get("slashed")?,
        voluntary_exited: row.try_get("voluntary_exited")?,
        active: row.try_get("active")?,
    })
}

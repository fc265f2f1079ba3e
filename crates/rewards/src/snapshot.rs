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

//! Network-wide reward snapshots and the projected APR derivation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{cache::CacheTotals, clock::EpochClock, income::WEI_PER_GWEI};

/// Fallback effective balance for validators missing metadata (32 ETH).
pub const DEFAULT_EFFECTIVE_BALANCE_GWEI: i64 = 32_000_000_000;

/// Aggregated reward totals for all validators within one cache window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkRewardSnapshot {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub window_duration_seconds: f64,
    pub active_validator_count: i64,
    pub cl_rewards_gwei: i64,
    pub el_rewards_gwei: i64,
    pub total_rewards_gwei: i64,
    pub total_effective_balance_gwei: i64,
    pub project_apr_percent: f64,
}

/// Fresh validator-set figures from the metadata store. Absent or zero
/// values fall back to cache-derived estimates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkMetadata {
    pub active_validator_count: i64,
    pub total_effective_balance_gwei: i64,
}

/// Assembles a snapshot from cache totals captured under the cache lock.
///
/// The window end is the completion time of the last synced epoch, clamped
/// to not precede the window start. An empty or inverted window substitutes
/// the configured reset interval so the APR extrapolation stays defined.
pub fn build_snapshot(
    totals: &CacheTotals,
    window_start: DateTime<Utc>,
    latest_sync_epoch: u64,
    clock: &EpochClock,
    cache_reset_interval: Duration,
    metadata: Option<NetworkMetadata>,
) -> NetworkRewardSnapshot {
    let mut start = window_start;
    let mut end = clock.epoch_to_time(latest_sync_epoch);
    if end < start {
        end = start;
    }

    let mut duration_seconds = (end - start).num_seconds() as f64;
    if duration_seconds <= 0.0 {
        duration_seconds = cache_reset_interval.as_secs_f64();
        start = end - chrono::Duration::seconds(cache_reset_interval.as_secs() as i64);
    }

    let el_rewards_gwei =
        i64::try_from(totals.el_wei / WEI_PER_GWEI).unwrap_or(i64::MAX);
    let total_rewards_gwei = totals.cl_gwei + el_rewards_gwei;

    let mut active_validator_count = totals.validator_count as i64;
    let mut total_effective_balance_gwei = 0;
    if let Some(meta) = metadata {
        if meta.active_validator_count > 0 {
            active_validator_count = meta.active_validator_count;
        }
        total_effective_balance_gwei = meta.total_effective_balance_gwei;
    }
    if total_effective_balance_gwei == 0 {
        total_effective_balance_gwei =
            totals.validator_count as i64 * DEFAULT_EFFECTIVE_BALANCE_GWEI;
    }

    let mut project_apr_percent = 0.0;
    if total_effective_balance_gwei > 0 && duration_seconds > 0.0 {
        project_apr_percent = total_rewards_gwei as f64 / total_effective_balance_gwei as f64
            * (cache_reset_interval.as_secs_f64() / duration_seconds)
            * 100.0
            * 365.0;
    }

    NetworkRewardSnapshot {
        window_start: start,
        window_end: end,
        window_duration_seconds: duration_seconds,
        active_validator_count,
        cl_rewards_gwei: totals.cl_gwei,
        el_rewards_gwei,
        total_rewards_gwei,
        total_effective_balance_gwei,
        project_apr_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;
    use chrono::TimeZone;

    const GENESIS: i64 = 1_709_532_000;
    const RESET_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

    fn clock() -> EpochClock {
        EpochClock::new(GENESIS).unwrap()
    }

    #[test]
    fn test_snapshot_totals_and_apr_formula() {
        // One validator with 64 gwei CL and 5 gwei EL (stored as wei).
        let totals = CacheTotals {
            cl_gwei: 64,
            el_wei: U256::from(5u64) * WEI_PER_GWEI,
            validator_count: 1,
        };

        let latest_epoch = 2_000u64;
        let end = clock().epoch_to_time(latest_epoch);
        let start = end - chrono::Duration::hours(2);

        let snap = build_snapshot(&totals, start, latest_epoch, &clock(), RESET_INTERVAL, None);

        assert_eq!(snap.cl_rewards_gwei, 64);
        assert_eq!(snap.el_rewards_gwei, 5);
        assert_eq!(snap.total_rewards_gwei, 69);
        assert_eq!(snap.active_validator_count, 1);
        assert_eq!(snap.total_effective_balance_gwei, DEFAULT_EFFECTIVE_BALANCE_GWEI);
        assert_eq!(snap.window_duration_seconds, 2.0 * 3600.0);

        let expected_apr = 69.0 / DEFAULT_EFFECTIVE_BALANCE_GWEI as f64
            * (RESET_INTERVAL.as_secs_f64() / snap.window_duration_seconds)
            * 100.0
            * 365.0;
        assert!((snap.project_apr_percent - expected_apr).abs() < 1e-12);
    }

    #[test]
    fn test_empty_window_substitutes_reset_interval() {
        let totals = CacheTotals::default();
        let latest_epoch = 100u64;
        let end = clock().epoch_to_time(latest_epoch);
        // Window start after the last synced epoch inverts the window.
        let start = end + chrono::Duration::hours(1);

        let snap = build_snapshot(&totals, start, latest_epoch, &clock(), RESET_INTERVAL, None);

        assert_eq!(snap.window_end, end);
        assert_eq!(snap.window_duration_seconds, RESET_INTERVAL.as_secs_f64());
        assert_eq!(snap.window_start, end - chrono::Duration::days(1));
        assert_eq!(snap.project_apr_percent, 0.0);
    }

    #[test]
    fn test_metadata_overrides_cache_estimates() {
        let totals = CacheTotals {
            cl_gwei: 100,
            el_wei: U256::ZERO,
            validator_count: 2,
        };
        let latest_epoch = 2_000u64;
        let start = Utc.timestamp_opt(GENESIS, 0).unwrap();

        let meta = NetworkMetadata {
            active_validator_count: 500_000,
            total_effective_balance_gwei: 16_000_000_000_000_000,
        };
        let snap =
            build_snapshot(&totals, start, latest_epoch, &clock(), RESET_INTERVAL, Some(meta));

        assert_eq!(snap.active_validator_count, 500_000);
        assert_eq!(snap.total_effective_balance_gwei, 16_000_000_000_000_000);
    }

    #[test]
    fn test_zero_metadata_balance_falls_back_to_cache() {
        let totals = CacheTotals {
            cl_gwei: 1,
            el_wei: U256::ZERO,
            validator_count: 3,
        };
        let latest_epoch = 2_000u64;
        let start = Utc.timestamp_opt(GENESIS, 0).unwrap();

        let meta = NetworkMetadata { active_validator_count: 0, total_effective_balance_gwei: 0 };
        let snap =
            build_snapshot(&totals, start, latest_epoch, &clock(), RESET_INTERVAL, Some(meta));

        assert_eq!(snap.active_validator_count, 3);
        assert_eq!(snap.total_effective_balance_gwei, 3 * DEFAULT_EFFECTIVE_BALANCE_GWEI);
    }
}

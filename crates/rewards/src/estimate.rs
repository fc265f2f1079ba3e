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

//! Historical reward estimation: the 31-day per-validator estimate and the
//! IQR-filtered average APR over stored snapshots.

use std::collections::HashMap;

use crate::{
    clock::SECONDS_PER_EPOCH,
    snapshot::{NetworkRewardSnapshot, DEFAULT_EFFECTIVE_BALANCE_GWEI},
};

/// Length of the estimation window.
pub const ESTIMATE_WINDOW_DAYS: u64 = 31;
pub const SECONDS_PER_DAY: u64 = 24 * 60 * 60;
pub const SECONDS_PER_YEAR: u64 = 365 * SECONDS_PER_DAY;

/// Maximum number of history entries considered for the average APR.
pub const MAX_HISTORY_DAYS: usize = 31;

/// Activation/exit bounds of a validator. A validator is active at epoch E
/// iff `activation_epoch <= E < exit_epoch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorLifecycle {
    pub activation_epoch: u64,
    pub exit_epoch: u64,
}

impl ValidatorLifecycle {
    pub fn is_active_at(&self, epoch: u64) -> bool {
        self.activation_epoch <= epoch && epoch < self.exit_epoch
    }
}

/// 6975 epochs for the 31-day window.
pub fn estimate_window_epochs() -> u64 {
    ESTIMATE_WINDOW_DAYS * SECONDS_PER_DAY / SECONDS_PER_EPOCH
}

/// Seconds the validator was active within the trailing window ending at
/// `current_epoch`.
pub fn active_seconds_in_window(
    lifecycle: ValidatorLifecycle,
    current_epoch: u64,
    epochs_in_window: u64,
) -> f64 {
    let window_start = current_epoch.saturating_sub(epochs_in_window);
    let start = lifecycle.activation_epoch.max(window_start);
    let end = lifecycle.exit_epoch.min(current_epoch);
    if end <= start {
        return 0.0;
    }
    ((end - start) * SECONDS_PER_EPOCH) as f64
}

/// Estimates rewards earned over the trailing window by extrapolating the
/// network APR across each validator's active time and stake.
///
/// Balance selection: effective balance when positive, else the deposit
/// total when positive, else the 32 ETH default.
#[allow(clippy::too_many_arguments)]
pub fn estimate_recent_rewards(
    validator_indices: &[u64],
    apr_percent: f64,
    current_epoch: u64,
    epochs_in_window: u64,
    effective_balances: &HashMap<u64, i64>,
    deposit_balances: &HashMap<u64, i64>,
    lifecycles: &HashMap<u64, ValidatorLifecycle>,
) -> f64 {
    if apr_percent <= 0.0 || validator_indices.is_empty() || epochs_in_window == 0 {
        return 0.0;
    }

    let apr = apr_percent / 100.0;
    let mut estimated = 0.0;
    for index in validator_indices {
        let Some(lifecycle) = lifecycles.get(index) else {
            continue;
        };

        let mut balance = effective_balances.get(index).copied().unwrap_or(0);
        if balance <= 0 {
            balance = match deposit_balances.get(index) {
                Some(deposit) if *deposit > 0 => *deposit,
                _ => DEFAULT_EFFECTIVE_BALANCE_GWEI,
            };
        }

        let active_seconds = active_seconds_in_window(*lifecycle, current_epoch, epochs_in_window);
        if active_seconds == 0.0 {
            tracing::debug!(validator_index = index, "validator not active in window");
            continue;
        }

        estimated += balance as f64 * apr * (active_seconds / SECONDS_PER_YEAR as f64);
    }

    estimated
}

/// Average APR over up to the last 31 stored snapshots plus the live one,
/// with IQR outlier removal. Nonpositive APRs are discarded up front; if
/// filtering removes everything the unfiltered mean is returned.
pub fn average_apr_31d(
    history: &[NetworkRewardSnapshot],
    current: Option<&NetworkRewardSnapshot>,
) -> f64 {
    let mut apr_values: Vec<f64> = Vec::with_capacity(MAX_HISTORY_DAYS + 1);

    let start = history.len().saturating_sub(MAX_HISTORY_DAYS);
    for snapshot in &history[start..] {
        if snapshot.project_apr_percent > 0.0 {
            apr_values.push(snapshot.project_apr_percent);
        }
    }
    if let Some(snapshot) = current {
        if snapshot.project_apr_percent > 0.0 {
            apr_values.push(snapshot.project_apr_percent);
        }
    }

    if apr_values.is_empty() {
        tracing::warn!("no valid APR values found for averaging");
        return 0.0;
    }
    if apr_values.len() == 1 {
        return apr_values[0];
    }

    let mut filtered = remove_outliers_iqr(&apr_values);
    if filtered.is_empty() {
        filtered = apr_values;
    }

    let sum: f64 = filtered.iter().sum();
    sum / filtered.len() as f64
}

/// Drops values outside `[q1 - 1.5*iqr, q3 + 1.5*iqr]`. Fewer than four
/// points pass through unchanged.
fn remove_outliers_iqr(values: &[f64]) -> Vec<f64> {
    if values.len() < 4 {
        return values.to_vec();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let q1 = sorted[n / 4];
    let q3 = sorted[3 * n / 4];
    let iqr = q3 - q1;

    let lower = q1 - 1.5 * iqr;
    let upper = q3 + 1.5 * iqr;

    values
        .iter()
        .copied()
        .filter(|value| {
            let keep = *value >= lower && *value <= upper;
            if !keep {
                tracing::info!(value, lower, upper, "removed APR outlier");
            }
            keep
        })
        .collect()
}

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

//! The reward synchronizer: backfill, live sync, retry, and the read-side
//! views over the shared cache.

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{
    select,
    sync::mpsc,
    task::JoinSet,
    time::{interval, sleep, timeout, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use stakewatch_beacon::BeaconObj;
use stakewatch_rewards::{
    build_snapshot, EpochClock, HistoryStore, NetworkMetadata, NetworkRewardSnapshot, RewardsCache,
};

use crate::{
    db::DoraDbObj,
    rewards::{fetcher, resetter},
};

/// Tuning knobs for the synchronizer and the window reset cycle.
#[derive(Debug, Clone)]
pub struct RewardsServiceConfig {
    /// Window length assumed when the live window is empty or inverted.
    pub cache_reset_interval: Duration,
    /// Live-sync tick.
    pub epoch_check_interval: Duration,
    /// Nonzero value overrides the computed sync start.
    pub start_epoch: u64,
    /// When set, backfill starts at `now - lookback`.
    pub backfill_lookback: Option<Duration>,
    pub backfill_concurrency: usize,
    pub epoch_process_max_retries: u32,
    pub epoch_process_base_backoff: Duration,
    pub epoch_process_max_backoff: Duration,
    /// Fixed-offset zone whose midnight closes the window (hours east of
    /// UTC; the reference deployment used 8).
    pub reset_zone_offset_hours: i32,
    /// Deadline for metadata-store lookups inside snapshot computation.
    pub request_timeout: Duration,
}

impl Default for RewardsServiceConfig {
    fn default() -> Self {
        Self {
            cache_reset_interval: Duration::from_secs(24 * 60 * 60),
            epoch_check_interval: Duration::from_secs(12),
            start_epoch: 0,
            backfill_lookback: None,
            backfill_concurrency: 16,
            epoch_process_max_retries: 5,
            epoch_process_base_backoff: Duration::from_secs(2),
            epoch_process_max_backoff: Duration::from_secs(30),
            reset_zone_offset_hours: 0,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// Total reward view (EL + CL) for a single validator.
#[derive(Debug, Clone, Serialize)]
pub struct ValidatorReward {
    pub validator_index: u64,
    pub cl_rewards_gwei: i64,
    pub el_rewards_gwei: i64,
    pub total_rewards_gwei: i64,
    pub effective_balance_gwei: i64,
    pub project_apr_percent: f64,
}

/// Manages validator reward accumulation and serves aggregated views.
pub struct RewardsService {
    config: RewardsServiceConfig,
    clock: EpochClock,
    beacon: BeaconObj,
    cache: RewardsCache,
    history: Option<HistoryStore>,
    dora: Option<DoraDbObj>,
    cancel: CancellationToken,
}

impl RewardsService {
    pub fn new(
        config: RewardsServiceConfig,
        clock: EpochClock,
        beacon: BeaconObj,
        dora: Option<DoraDbObj>,
        history: Option<HistoryStore>,
    ) -> Self {
        // The first window opens at today's midnight in the reset zone.
        let window_start =
            resetter::current_day_start(Utc::now(), config.reset_zone_offset_hours);

        Self {
            config,
            clock,
            beacon,
            cache: RewardsCache::new(window_start),
            history,
            dora,
            cancel: CancellationToken::new(),
        }
    }

    pub fn clock(&self) -> &EpochClock {
        &self.clock
    }

    pub fn config(&self) -> &RewardsServiceConfig {
        &self.config
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Spawns the synchronizer and the window-reset loop.
    pub async fn start(self: &Arc<Self>) {
        tracing::info!("starting rewards service");

        let start_epoch = self.start_epoch(Utc::now()).await;

        let sync = self.clone();
        tokio::spawn(async move { sync.sync_routine(start_epoch).await });

        let reset = self.clone();
        tokio::spawn(async move { resetter::run_reset_loop(reset).await });
    }

    /// Signals every loop to stop. In-flight epoch fetches abort at the
    /// next suspension point.
    pub fn stop(&self) {
        tracing::info!("stopping rewards service");
        self.cancel.cancel();
    }

    /// Sync start policy: explicit override, then lookback, then the
    /// current window start.
    async fn start_epoch(&self, now: DateTime<Utc>) -> u64 {
        if self.config.start_epoch > 0 {
            return self.config.start_epoch;
        }
        if let Some(lookback) = self.config.backfill_lookback {
            let lookback = chrono::Duration::seconds(lookback.as_secs() as i64);
            return self.clock.time_to_epoch(now - lookback);
        }
        self.clock.time_to_epoch(self.cache.window_start().await)
    }

    async fn sync_routine(self: Arc<Self>, start_epoch: u64) {
        let safe_head = self.clock.safe_head(Utc::now());

        if start_epoch <= safe_head {
            tracing::info!(from = start_epoch, to = safe_head, "starting backfill");
            self.run_backfill(start_epoch, safe_head).await;
            tracing::info!("backfill completed");
            // Backfill lands epochs out of order, so the high-water mark is
            // forced up to the backfilled head before live sync resumes.
            self.cache.write().await.raise_latest_sync_epoch(safe_head);
        } else {
            tracing::warn!(start_epoch, safe_head, "backfill skipped");
            self.cache.write().await.raise_latest_sync_epoch(start_epoch.saturating_sub(1));
        }

        if self.cancel.is_cancelled() {
            return;
        }
        self.run_live_sync().await;
    }

    /// Processes `[from..=to]` with bounded parallelism. Workers pull from a
    /// bounded queue; epochs that exhaust their retries are logged and
    /// skipped, as backfill must always terminate.
    async fn run_backfill(self: &Arc<Self>, from: u64, to: u64) {
        let concurrency = self.config.backfill_concurrency.max(1);
        let (tx, rx) = mpsc::channel::<u64>(concurrency * 16);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));

        let producer_cancel = self.cancel.clone();
        tokio::spawn(async move {
            for epoch in from..=to {
                select! {
                    _ = producer_cancel.cancelled() => return,
                    result = tx.send(epoch) => {
                        if result.is_err() {
                            return;
                        }
                    }
                }
            }
        });

        let mut workers = JoinSet::new();
        for _ in 0..concurrency {
            let service = self.clone();
            let rx = rx.clone();
            workers.spawn(async move {
                loop {
                    let epoch = rx.lock().await.recv().await;
                    let Some(epoch) = epoch else { break };
                    if let Err(err) = service.process_epoch_with_retry(epoch).await {
                        tracing::error!(epoch, error = %err, "backfill epoch failed after retries");
                    }
                    if service.cancel.is_cancelled() {
                        break;
                    }
                }
            });
        }

        while workers.join_next().await.is_some() {}
    }

    /// Advances the high-water mark strictly in order. An epoch that keeps
    /// failing blocks progress until the next tick retries it, so no epoch
    /// is ever skipped in live sync.
    async fn run_live_sync(self: &Arc<Self>) {
        let mut ticker = interval(self.config.epoch_check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!("live sync starting");

        loop {
            select! {
                _ = self.cancel.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let safe_head = self.clock.safe_head(Utc::now());
            let next_epoch = self.cache.latest_sync_epoch().await + 1;

            for epoch in next_epoch..=safe_head {
                if self.cancel.is_cancelled() {
                    return;
                }
                if let Err(err) = self.process_epoch_with_retry(epoch).await {
                    tracing::error!(epoch, error = %err, "live sync epoch failed after retries");
                    break;
                }
            }
        }
    }

    /// Bounded attempts with exponential backoff, doubling from the base up
    /// to the cap. Cancellation aborts immediately between attempts.
    async fn process_epoch_with_retry(&self, epoch: u64) -> Result<()> {
        let max_retries = self.config.epoch_process_max_retries.max(1);
        let mut backoff = self.config.epoch_process_base_backoff;
        let mut last_error = None;

        for attempt in 1..=max_retries {
            if self.cancel.is_cancelled() {
                bail!("cancelled");
            }
            match self.process_epoch(epoch).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::warn!(epoch, attempt, error = %err, "epoch processing failed");
                    last_error = Some(err);
                }
            }
            if attempt < max_retries {
                select! {
                    _ = self.cancel.cancelled() => bail!("cancelled"),
                    _ = sleep(backoff) => {}
                }
                backoff = (backoff * 2).min(self.config.epoch_process_max_backoff);
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow!("epoch {epoch} processing failed")))
    }

    pub(crate) async fn process_epoch(&self, epoch: u64) -> Result<()> {
        let started = std::time::Instant::now();
        let rewards = fetcher::fetch_epoch_rewards(self.beacon.as_ref(), epoch).await?;
        let validators = rewards.len();
        self.cache.accumulate_epoch(epoch, rewards).await;
        tracing::info!(
            epoch,
            validators,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "processed epoch"
        );
        Ok(())
    }

    /// Live network snapshot over the current window.
    pub async fn network_snapshot(&self) -> NetworkRewardSnapshot {
        let state = self.cache.read().await;
        let totals = state.totals();
        let metadata = self.query_network_metadata().await;
        build_snapshot(
            &totals,
            state.window_start(),
            state.latest_sync_epoch(),
            &self.clock,
            self.config.cache_reset_interval,
            metadata,
        )
    }

    /// Stored window snapshots, oldest first. Without a history store this
    /// is empty.
    pub fn network_reward_history(&self) -> Result<Vec<NetworkRewardSnapshot>> {
        match &self.history {
            Some(history) => Ok(history.read_all()?),
            None => Ok(Vec::new()),
        }
    }

    /// Per-validator reward views for the requested indices. Indices with
    /// no cache entry are omitted.
    pub async fn total_rewards(
        &self,
        validator_indices: &[u64],
        effective_balances: &HashMap<u64, i64>,
    ) -> HashMap<u64, ValidatorReward> {
        let snapshot = self.network_snapshot().await;
        let incomes = self.cache.rewards_for(validator_indices).await;

        incomes
            .into_iter()
            .map(|(validator_index, income)| {
                let cl_rewards_gwei = income.total_cl_rewards();
                let el_rewards_gwei = income.el_rewards_gwei();
                (
                    validator_index,
                    ValidatorReward {
                        validator_index,
                        cl_rewards_gwei,
                        el_rewards_gwei,
                        total_rewards_gwei: cl_rewards_gwei + el_rewards_gwei,
                        effective_balance_gwei: effective_balances
                            .get(&validator_index)
                            .copied()
                            .unwrap_or(0),
                        project_apr_percent: snapshot.project_apr_percent,
                    },
                )
            })
            .collect()
    }

    /// Current aggregation window: `[window_start, end-of-latest-epoch]`,
    /// clamped so the end never precedes the start.
    pub async fn reward_window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        let state = self.cache.read().await;
        let start = state.window_start();
        let end = self.clock.epoch_to_time(state.latest_sync_epoch());
        if end < start {
            (start, start)
        } else {
            (start, end)
        }
    }

    /// Closes the current window: snapshots a nonempty cache into history,
    /// clears the entries, and starts a new window at `now`. The high-water
    /// mark survives so live sync resumes where it left off.
    pub async fn reset_cache_at(&self, now: DateTime<Utc>) {
        let mut state = self.cache.write().await;

        if !state.is_empty() {
            let totals = state.totals();
            let metadata = self.query_network_metadata().await;
            let snapshot = build_snapshot(
                &totals,
                state.window_start(),
                state.latest_sync_epoch(),
                &self.clock,
                self.config.cache_reset_interval,
                metadata,
            );
            if let Some(history) = &self.history {
                if let Err(err) = history.append(&snapshot) {
                    tracing::error!(error = %err, "failed to append rewards history");
                }
            }
        }

        state.clear(now);
        tracing::info!("cache reset");
    }

    /// Fresh validator-set figures, bounded by the request timeout. Any
    /// failure degrades to the cache-derived fallbacks.
    async fn query_network_metadata(&self) -> Option<NetworkMetadata> {
        let dora = self.dora.as_ref()?;
        let epoch = self.clock.current_epoch();
        let deadline = self.config.request_timeout;

        let active_validator_count = match timeout(deadline, dora.active_validator_count(epoch)).await {
            Ok(Ok(count)) => count,
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "active validator count lookup failed");
                0
            }
            Err(_) => {
                tracing::warn!("active validator count lookup timed out");
                0
            }
        };
        let total_effective_balance_gwei =
            match timeout(deadline, dora.total_effective_balance(epoch)).await {
                Ok(Ok(total)) => total,
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "total effective balance lookup failed");
                    0
                }
                Err(_) => {
                    tracing::warn!("total effective balance lookup timed out");
                    0
                }
            };

        Some(NetworkMetadata { active_validator_count, total_effective_balance_gwei })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DoraDbObj;
    use crate::rewards::testing::{MockBeacon, MockDora, MOCK_EL_REWARD_WEI};
    use chrono::TimeZone;
    use stakewatch_rewards::SECONDS_PER_EPOCH;

    const GENESIS: i64 = 1_709_532_000;

    fn test_config() -> RewardsServiceConfig {
        RewardsServiceConfig {
            backfill_concurrency: 4,
            epoch_process_base_backoff: Duration::from_millis(10),
            epoch_process_max_backoff: Duration::from_millis(50),
            ..Default::default()
        }
    }

    fn test_service(
        config: RewardsServiceConfig,
        beacon: Arc<MockBeacon>,
        dora: Option<DoraDbObj>,
        history: Option<stakewatch_rewards::HistoryStore>,
    ) -> Arc<RewardsService> {
        let clock = EpochClock::new(GENESIS).unwrap();
        Arc::new(RewardsService::new(config, clock, beacon, dora, history))
    }

    #[tokio::test]
    async fn test_backfill_accumulates_full_range() {
        let beacon = Arc::new(MockBeacon::new());
        let service = test_service(test_config(), beacon.clone(), None, None);

        service.run_backfill(100, 110).await;

        let mut served = beacon.served_epochs.lock().clone();
        served.sort_unstable();
        assert_eq!(served, (100..=110).collect::<Vec<_>>());

        let state = service.cache.read().await;
        assert_eq!(state.latest_sync_epoch(), 110);

        // 11 epochs worth of attestation and sync-committee income.
        let attester = &state.entries()[&1];
        assert_eq!(attester.attestation_head_reward, 3 * 11);
        assert_eq!(attester.attestation_target_reward, 2 * 11);
        let sync_member = &state.entries()[&7];
        assert_eq!(sync_member.sync_committee_reward, 5 * 32 * 11);
        let penalized = &state.entries()[&8];
        assert_eq!(penalized.sync_committee_penalty, 4 * 32 * 11);

        // Every proposer entry carries block inclusion rewards and EL fees.
        let proposer = &state.entries()[&MockBeacon::proposer_for(100 * 32)];
        assert_eq!(proposer.proposer_attestation_inclusion_reward % 10, 0);
        assert!(proposer.proposer_attestation_inclusion_reward >= 10);
        assert!(!proposer.tx_fee_reward_wei.is_zero());
    }

    #[tokio::test]
    async fn test_epoch_retry_succeeds_and_accumulates_once() {
        let beacon = Arc::new(MockBeacon::failing_first(2));
        let service = test_service(test_config(), beacon.clone(), None, None);

        service.process_epoch_with_retry(5).await.unwrap();

        assert_eq!(beacon.served_epochs.lock().as_slice(), &[5]);
        let state = service.cache.read().await;
        assert_eq!(state.latest_sync_epoch(), 5);
        // Accumulated exactly once despite the two failed attempts.
        assert_eq!(state.entries()[&1].attestation_head_reward, 3);
    }

    #[tokio::test]
    async fn test_retry_exhaustion_leaves_high_water_untouched() {
        let beacon = Arc::new(MockBeacon::failing_first(100));
        let mut config = test_config();
        config.epoch_process_max_retries = 2;
        let service = test_service(config, beacon, None, None);

        assert!(service.process_epoch_with_retry(5).await.is_err());
        assert_eq!(service.cache.latest_sync_epoch().await, 0);
        assert!(service.cache.read().await.is_empty());
    }

    #[tokio::test]
    async fn test_live_sync_advances_in_strict_order() {
        // Genesis five epochs ago puts the safe head at epoch 3.
        let genesis = Utc::now().timestamp() - 5 * SECONDS_PER_EPOCH as i64;
        let clock = EpochClock::new(genesis).unwrap();
        let beacon = Arc::new(MockBeacon::new());
        let mut config = test_config();
        config.epoch_check_interval = Duration::from_millis(20);
        let service = Arc::new(RewardsService::new(config, clock, beacon.clone(), None, None));

        let runner = service.clone();
        let handle = tokio::spawn(async move { runner.run_live_sync().await });
        tokio::time::sleep(Duration::from_millis(200)).await;
        service.stop();
        handle.await.unwrap();

        assert_eq!(beacon.served_epochs.lock().as_slice(), &[1, 2, 3]);
        assert_eq!(service.cache.latest_sync_epoch().await, 3);
    }

    #[tokio::test]
    async fn test_reset_appends_history_and_preserves_high_water() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let history = stakewatch_rewards::HistoryStore::new(path.to_str().unwrap()).unwrap();
        let beacon = Arc::new(MockBeacon::new());
        let service = test_service(test_config(), beacon, None, Some(history));

        service.process_epoch(7).await.unwrap();
        let before = service.network_snapshot().await;

        let reset_time = Utc::now();
        service.reset_cache_at(reset_time).await;

        let entries = service.network_reward_history().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].total_rewards_gwei, before.total_rewards_gwei);
        assert_eq!(entries[0].cl_rewards_gwei, before.cl_rewards_gwei);

        let state = service.cache.read().await;
        assert!(state.is_empty());
        assert_eq!(state.latest_sync_epoch(), 7);
        assert_eq!(state.window_start(), reset_time);
    }

    #[tokio::test]
    async fn test_reset_on_empty_cache_writes_no_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        let history = stakewatch_rewards::HistoryStore::new(path.to_str().unwrap()).unwrap();
        let beacon = Arc::new(MockBeacon::new());
        let service = test_service(test_config(), beacon, None, Some(history));

        service.reset_cache_at(Utc::now()).await;
        assert!(service.network_reward_history().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_epoch_override_wins() {
        let beacon = Arc::new(MockBeacon::new());
        let mut config = test_config();
        config.start_epoch = 42;
        config.backfill_lookback = Some(Duration::from_secs(3600));
        let service = test_service(config, beacon, None, None);

        assert_eq!(service.start_epoch(Utc::now()).await, 42);
    }

    #[tokio::test]
    async fn test_start_epoch_uses_lookback() {
        let beacon = Arc::new(MockBeacon::new());
        let mut config = test_config();
        config.backfill_lookback = Some(Duration::from_secs(6 * 3600));
        let service = test_service(config, beacon, None, None);

        let now = chrono::Utc
            .timestamp_opt(GENESIS + 100 * SECONDS_PER_EPOCH as i64, 0)
            .unwrap();
        let expected = service.clock.time_to_epoch(now - chrono::Duration::hours(6));
        assert_eq!(service.start_epoch(now).await, expected);
    }

    #[tokio::test]
    async fn test_start_epoch_defaults_to_window_start() {
        let beacon = Arc::new(MockBeacon::new());
        let service = test_service(test_config(), beacon, None, None);

        let window_start = service.cache.window_start().await;
        let expected = service.clock.time_to_epoch(window_start);
        assert_eq!(service.start_epoch(Utc::now()).await, expected);
    }

    #[tokio::test]
    async fn test_snapshot_prefers_metadata_store() {
        let dora: DoraDbObj = Arc::new(MockDora {
            details: Vec::new(),
            stake_time_seconds: 0,
            active_validator_count: 900_000,
            total_effective_balance_gwei: 28_800_000_000_000_000,
        });
        let beacon = Arc::new(MockBeacon::new());
        let service = test_service(test_config(), beacon, Some(dora), None);

        service.process_epoch(3).await.unwrap();
        let snapshot = service.network_snapshot().await;
        assert_eq!(snapshot.active_validator_count, 900_000);
        assert_eq!(snapshot.total_effective_balance_gwei, 28_800_000_000_000_000);
    }

    #[tokio::test]
    async fn test_total_rewards_omits_unknown_indices() {
        let beacon = Arc::new(MockBeacon::new());
        let service = test_service(test_config(), beacon, None, None);
        service.process_epoch(3).await.unwrap();

        let balances = HashMap::from([(1u64, 32_000_000_000i64)]);
        let rewards = service.total_rewards(&[1, 999_999], &balances).await;
        assert_eq!(rewards.len(), 1);
        let reward = &rewards[&1];
        assert_eq!(reward.cl_rewards_gwei, 3 + 2 + 1);
        assert_eq!(reward.effective_balance_gwei, 32_000_000_000);
        assert_eq!(reward.total_rewards_gwei, reward.cl_rewards_gwei + reward.el_rewards_gwei);
    }

    #[tokio::test]
    async fn test_el_rewards_convert_wei_to_gwei() {
        let beacon = Arc::new(MockBeacon::new());
        let service = test_service(test_config(), beacon, None, None);
        service.process_epoch(3).await.unwrap();

        let proposer = MockBeacon::proposer_for(3 * 32);
        let rewards = service.total_rewards(&[proposer], &HashMap::new()).await;
        let reward = &rewards[&proposer];
        assert_eq!(reward.el_rewards_gwei, (MOCK_EL_REWARD_WEI / 1_000_000_000) as i64);
    }

    #[tokio::test]
    async fn test_reward_window_clamps_inverted_end() {
        let beacon = Arc::new(MockBeacon::new());
        let service = test_service(test_config(), beacon, None, None);

        // Nothing synced: the latest epoch completes long before the window
        // start, so the window collapses to a point.
        let (start, end) = service.reward_window().await;
        assert_eq!(start, end);
    }
}

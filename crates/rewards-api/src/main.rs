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

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use url::Url;

use rewards_api::{create_app, labels::load_depositor_labels, ratelimit::IpRateLimiter, AppState};
use stakewatch_beacon::{fetch_genesis_timestamp, BeaconObj, NodePool};
use stakewatch_indexer::{
    db::{DoraDb, DoraDbObj},
    rewards::{RewardsService, RewardsServiceConfig},
};
use stakewatch_rewards::{EpochClock, HistoryStore};

/// Arguments for the validator rewards service.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// HTTP listen address.
    #[clap(long, env = "SERVER_ADDRESS", default_value = "0.0.0.0")]
    server_address: String,

    /// HTTP listen port.
    #[clap(long, env = "SERVER_PORT", default_value = "8080")]
    server_port: u16,

    /// Deadline in seconds for upstream and database requests.
    #[clap(long, env = "REQUEST_TIMEOUT", default_value = "10")]
    request_timeout: u64,

    /// Comma-separated list of beacon node URLs.
    #[clap(long, env = "BEACON_NODE_URL", default_value = "http://localhost:5052")]
    beacon_node_url: String,

    /// Execution node JSON-RPC URL.
    #[clap(long, env = "EXECUTION_NODE_URL", default_value = "http://localhost:8545")]
    execution_node_url: Url,

    /// Genesis timestamp override in Unix seconds. Fetched from the beacon
    /// node when not set.
    #[clap(long, env = "GENESIS_TIMESTAMP")]
    genesis_timestamp: Option<i64>,

    /// Window length in seconds assumed for incomplete windows.
    #[clap(long, env = "CACHE_RESET_INTERVAL", default_value = "86400")]
    cache_reset_interval: u64,

    /// Seconds between live-sync ticks.
    #[clap(long, env = "EPOCH_CHECK_INTERVAL", default_value = "12")]
    epoch_check_interval: u64,

    /// Nonzero value overrides the computed sync start epoch.
    #[clap(long, env = "START_EPOCH", default_value = "0")]
    start_epoch: u64,

    /// Backfill from `now - lookback` seconds instead of the window start.
    #[clap(long, env = "BACKFILL_LOOKBACK")]
    backfill_lookback: Option<u64>,

    /// Parallel backfill workers.
    #[clap(long, env = "BACKFILL_CONCURRENCY", default_value = "16")]
    backfill_concurrency: usize,

    #[clap(long, env = "EPOCH_PROCESS_MAX_RETRIES", default_value = "5")]
    epoch_process_max_retries: u32,

    /// Initial retry backoff in seconds, doubled per attempt.
    #[clap(long, env = "EPOCH_PROCESS_BASE_BACKOFF", default_value = "2")]
    epoch_process_base_backoff: u64,

    /// Retry backoff cap in seconds.
    #[clap(long, env = "EPOCH_PROCESS_MAX_BACKOFF", default_value = "30")]
    epoch_process_max_backoff: u64,

    /// Hours east of UTC for the midnight window reset.
    #[clap(long, env = "RESET_ZONE_OFFSET_HOURS", default_value = "0")]
    reset_zone_offset_hours: i32,

    /// Snapshot history file path. Empty disables persistence.
    #[clap(long, env = "REWARDS_HISTORY_FILE", default_value = "data/reward_history.jsonl")]
    rewards_history_file: String,

    /// YAML file mapping depositor addresses to display labels.
    #[clap(long, env = "DEPOSITOR_LABELS_FILE", default_value = "")]
    depositor_labels_file: String,

    /// Dora Postgres DSN. Empty runs without the metadata store.
    #[clap(long, env = "DORA_PG_URL", default_value = "")]
    dora_pg_url: String,

    #[clap(long, env = "DEFAULT_API_LIMIT", default_value = "100")]
    default_api_limit: i64,

    /// Sustained requests per second allowed per client IP.
    #[clap(long, env = "RATE_LIMIT_RPS", default_value = "5")]
    rate_limit_rps: f64,

    /// Burst size per client IP. Zero derives it from the rate.
    #[clap(long, env = "RATE_LIMIT_BURST", default_value = "10")]
    rate_limit_burst: u32,

    /// Whether to log in JSON format.
    #[clap(long, env, default_value_t = false)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        .from_env_lossy();

    if args.log_json {
        tracing_subscriber::fmt().with_ansi(false).json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_ansi(false).with_env_filter(filter).init();
    }

    tracing::info!("starting validator rewards service");

    if args.backfill_concurrency == 0 {
        anyhow::bail!("backfill concurrency must be greater than zero");
    }

    let request_timeout = Duration::from_secs(args.request_timeout.max(1));

    let genesis_timestamp = match args.genesis_timestamp {
        Some(timestamp) => timestamp,
        None => fetch_genesis_timestamp(&args.beacon_node_url, request_timeout)
            .await
            .context("fetch genesis timestamp from beacon node")?,
    };
    let clock = EpochClock::new(genesis_timestamp).context("invalid genesis timestamp")?;
    tracing::info!(genesis_timestamp, "epoch clock initialized");

    let beacon: BeaconObj = Arc::new(
        NodePool::new(&args.beacon_node_url, args.execution_node_url.clone(), request_timeout)
            .context("build beacon node pool")?,
    );

    let dora: Option<DoraDbObj> = if args.dora_pg_url.trim().is_empty() {
        tracing::warn!("no metadata store configured; address queries are disabled");
        None
    } else {
        match DoraDb::new(&args.dora_pg_url, clock).await {
            Ok(db) => Some(Arc::new(db)),
            Err(err) => {
                tracing::error!(error = %err, "failed to connect to the metadata store");
                None
            }
        }
    };

    let history = HistoryStore::new(&args.rewards_history_file);
    if history.is_none() {
        tracing::warn!("rewards history persistence disabled");
    }

    let service_config = RewardsServiceConfig {
        cache_reset_interval: Duration::from_secs(args.cache_reset_interval),
        epoch_check_interval: Duration::from_secs(args.epoch_check_interval),
        start_epoch: args.start_epoch,
        backfill_lookback: args.backfill_lookback.map(Duration::from_secs),
        backfill_concurrency: args.backfill_concurrency,
        epoch_process_max_retries: args.epoch_process_max_retries,
        epoch_process_base_backoff: Duration::from_secs(args.epoch_process_base_backoff),
        epoch_process_max_backoff: Duration::from_secs(args.epoch_process_max_backoff),
        reset_zone_offset_hours: args.reset_zone_offset_hours,
        request_timeout,
    };

    let service =
        Arc::new(RewardsService::new(service_config, clock, beacon, dora.clone(), history));
    service.start().await;

    let depositor_labels = match load_depositor_labels(&args.depositor_labels_file) {
        Ok(labels) => labels,
        Err(err) => {
            tracing::warn!(
                path = args.depositor_labels_file,
                error = %err,
                "failed to load depositor labels"
            );
            Default::default()
        }
    };

    let state = Arc::new(AppState {
        service: service.clone(),
        dora,
        depositor_labels,
        default_api_limit: args.default_api_limit,
        request_timeout,
    });
    let limiter = Arc::new(IpRateLimiter::new(args.rate_limit_rps, args.rate_limit_burst));
    let app = create_app(state, limiter);

    let addr = format!("{}:{}", args.server_address, args.server_port);
    let listener =
        tokio::net::TcpListener::bind(&addr).await.context("bind HTTP listener")?;
    tracing::info!(address = addr, "HTTP server listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("shutting down");
    service.stop();
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!(error = %err, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

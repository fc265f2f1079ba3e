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

//! Window reset scheduling: sleep to the next midnight in a fixed-offset
//! zone, close the window, repeat.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Days, FixedOffset, Utc};
use tokio::{select, time::sleep};

use crate::rewards::service::RewardsService;

fn reset_zone(offset_hours: i32) -> FixedOffset {
    FixedOffset::east_opt(offset_hours * 3600)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"))
}

/// Midnight of the current day in the reset zone.
pub(crate) fn current_day_start(now: DateTime<Utc>, offset_hours: i32) -> DateTime<Utc> {
    let zone = reset_zone(offset_hours);
    let local = now.with_timezone(&zone);
    local
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(zone).single())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or(now)
}

/// The next midnight in the reset zone strictly after `now`.
pub(crate) fn next_reset_boundary(now: DateTime<Utc>, offset_hours: i32) -> DateTime<Utc> {
    let zone = reset_zone(offset_hours);
    let local = now.with_timezone(&zone);
    local
        .date_naive()
        .checked_add_days(Days::new(1))
        .and_then(|next_day| next_day.and_hms_opt(0, 0, 0))
        .and_then(|midnight| midnight.and_local_timezone(zone).single())
        .map(|midnight| midnight.with_timezone(&Utc))
        .unwrap_or(now + chrono::Duration::days(1))
}

/// Sleeps until each reset boundary and closes the window there.
/// Cancellation aborts the sleep without touching cache state.
pub(crate) async fn run_reset_loop(service: Arc<RewardsService>) {
    let offset_hours = service.config().reset_zone_offset_hours;

    loop {
        let now = Utc::now();
        let next_run = next_reset_boundary(now, offset_hours);
        let wait = (next_run - now).to_std().unwrap_or(Duration::ZERO);

        tracing::info!(next_run = %next_run, wait_secs = wait.as_secs(), "scheduled next cache reset");

        select! {
            _ = service.cancel_token().cancelled() => return,
            _ = sleep(wait) => service.reset_cache_at(Utc::now()).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_next_boundary_is_local_midnight() {
        // 2024-01-01 23:59:59 UTC+8 is 15:59:59 UTC.
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 15, 59, 59).unwrap();
        let next = next_reset_boundary(now, 8);
        // Next midnight UTC+8 is 2024-01-01 16:00:00 UTC.
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 1, 16, 0, 0).unwrap());
    }

    #[test]
    fn test_next_boundary_in_utc() {
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 1).unwrap();
        let next = next_reset_boundary(now, 0);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 6, 16, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_current_day_start_respects_zone() {
        // 01:30 UTC+8 on Jan 2 is 17:30 UTC on Jan 1.
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 17, 30, 0).unwrap();
        let start = current_day_start(now, 8);
        // Midnight UTC+8 on Jan 2 is 16:00 UTC on Jan 1.
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 1, 1, 16, 0, 0).unwrap());
    }
}

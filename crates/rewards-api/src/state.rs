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

use std::{collections::HashMap, sync::Arc, time::Duration};

use stakewatch_indexer::{db::DoraDbObj, rewards::RewardsService};

/// Shared application state for the route handlers.
pub struct AppState {
    pub service: Arc<RewardsService>,
    /// Metadata store handle; endpoints that need it answer 503 without it.
    pub dora: Option<DoraDbObj>,
    /// Lowercase address to display label, from the labels file.
    pub depositor_labels: HashMap<String, String>,
    pub default_api_limit: i64,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn lookup_label(&self, address: &str) -> Option<String> {
        if self.depositor_labels.is_empty() {
            return None;
        }
        self.depositor_labels.get(&address.trim().to_lowercase()).cloned()
    }
}

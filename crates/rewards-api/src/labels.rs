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

//! Depositor label overlay loaded from a YAML mapping of address to label.

use std::collections::HashMap;

use anyhow::{Context, Result};

/// Loads the labels file. An empty path yields an empty overlay; keys are
/// normalized to lowercase and blank entries are dropped.
pub fn load_depositor_labels(path: &str) -> Result<HashMap<String, String>> {
    if path.trim().is_empty() {
        return Ok(HashMap::new());
    }

    let contents = std::fs::read_to_string(path).context("read depositor labels file")?;
    let raw: HashMap<String, String> =
        serde_yaml::from_str(&contents).context("parse depositor labels file")?;

    let mut labels = HashMap::with_capacity(raw.len());
    for (address, label) in raw {
        let address = address.trim().to_lowercase();
        if address.is_empty() || label.is_empty() {
            continue;
        }
        labels.insert(address, label);
    }
    Ok(labels)
}

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

//! Execution-layer address normalization for the address query surface.

use thiserror::Error;

#[derive(Debug, Error)]
#[error("invalid address: {0}")]
pub struct InvalidAddress(pub String);

/// Normalizes an address to a `0x`-prefixed, lower-case, 20-byte hex string.
pub fn normalize_address(address: &str) -> Result<String, InvalidAddress> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(InvalidAddress("address is empty".into()));
    }

    let hex = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if hex.len() != 40 {
        return Err(InvalidAddress(format!("{trimmed} must have 40 hex characters")));
    }
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(InvalidAddress(format!("{trimmed} contains non-hex characters")));
    }

    Ok(format!("0x{}", hex.to_lowercase()))
}

/// Normalizes user search input, accepting either a plain execution address
/// or a 32-byte `0x01`/`0x02` withdrawal credential whose trailing 20 bytes
/// are the address.
pub fn normalize_search_address(address: &str) -> Result<String, InvalidAddress> {
    let trimmed = address.trim();
    if (trimmed.starts_with("0x01") || trimmed.starts_with("0x02")) && trimmed.len() == 66 {
        // "0x01" + 11 zero bytes + 20 address bytes: skip the first 26 chars.
        return normalize_address(&trimmed[26..]);
    }
    normalize_address(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trims_and_lowercases() {
        let normalized = normalize_address(" 0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD ").unwrap();
        assert_eq!(normalized, "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd");
    }

    #[test]
    fn test_normalize_adds_missing_prefix() {
        let normalized = normalize_address("ABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD").unwrap();
        assert_eq!(normalized, "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd");
    }

    #[test]
    fn test_normalize_rejects_bad_inputs() {
        assert!(normalize_address("0x1234").is_err());
        assert!(normalize_address("0xzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzzz").is_err());
        assert!(normalize_address("   ").is_err());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_address("0XABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD").unwrap();
        let twice = normalize_address(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_search_address_extracts_withdrawal_credentials() {
        let credential = " 0x0100000000000000000000000988dc1554cf6877508208fff8aab4e5afa11ee3";
        let normalized = normalize_search_address(credential).unwrap();
        assert_eq!(normalized, "0x0988dc1554cf6877508208fff8aab4e5afa11ee3");

        let credential = "0x020000000000000000000000ABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD";
        let normalized = normalize_search_address(credential).unwrap();
        assert_eq!(normalized, "0xabcdefabcdefabcdefabcdefabcdefabcdefabcd");
    }

    #[test]
    fn test_search_address_passes_plain_addresses_through() {
        let normalized =
            normalize_search_address("0x0988dc1554cf6877508208fff8aab4e5afa11ee3").unwrap();
        assert_eq!(normalized, "0x0988dc1554cf6877508208fff8aab4e5afa11ee3");
    }
}

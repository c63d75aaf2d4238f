// This file is part of cardano-wallet-sync.
// Copyright (C) 2025 Sundial Labs
// SPDX-License-Identifier: Apache-2.0
// Licensed under the Apache License, Version 2.0 (the "License");
// You may not use this file except in compliance with the License.
// You may obtain a copy of the License at
// http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use derive_more::{AsRef, Display, From, Into};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The unit of native ADA, in base units of one millionth of an ADA.
pub const LOVELACE: &str = "lovelace";

/// Number of hex characters of a minting policy ID (28 bytes).
const POLICY_ID_HEX_LEN: usize = 56;

/// Asset identifier: the hex concatenation `policy_id || asset_name`, or the
/// special value `"lovelace"` for native ADA.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    AsRef,
    Display,
    From,
    Into,
    Serialize,
    Deserialize,
)]
#[from(String, &str)]
pub struct AssetUnit(String);

impl AssetUnit {
    pub fn lovelace() -> Self {
        Self(LOVELACE.to_string())
    }

    pub fn is_lovelace(&self) -> bool {
        self.0 == LOVELACE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The minting policy ID part; empty for lovelace and malformed units.
    pub fn policy_id(&self) -> &str {
        if self.is_lovelace() || self.0.len() < POLICY_ID_HEX_LEN {
            ""
        } else {
            &self.0[..POLICY_ID_HEX_LEN]
        }
    }

    /// The hex-encoded asset name part; empty for lovelace.
    pub fn asset_name_hex(&self) -> &str {
        if self.is_lovelace() || self.0.len() < POLICY_ID_HEX_LEN {
            ""
        } else {
            &self.0[POLICY_ID_HEX_LEN..]
        }
    }

    /// The asset name decoded as UTF-8, if it is valid hex and printable.
    pub fn asset_name_utf8(&self) -> Option<String> {
        let bytes = const_hex::decode(self.asset_name_hex()).ok()?;
        let name = String::from_utf8(bytes).ok()?;
        let printable = !name.is_empty() && name.chars().all(|c| !c.is_control());
        printable.then_some(name)
    }
}

/// Payment address of a wallet (bech32, `addr...` / `addr_test...`).
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, AsRef, Display, From, Into, Serialize,
    Deserialize,
)]
#[from(String, &str)]
pub struct WalletAddress(String);

impl WalletAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Stake (reward) address, bech32 `stake...` / `stake_test...`.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, AsRef, Display, From, Into, Serialize, Deserialize,
)]
#[from(String, &str)]
pub struct StakeAddress(String);

impl StakeAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Transaction hash, hex-encoded.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, AsRef, Display, From, Into, Serialize,
    Deserialize,
)]
#[from(String, &str)]
pub struct TxHash(String);

impl TxHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("address is not valid bech32")]
    Malformed,

    #[error("unexpected address prefix {0}")]
    UnexpectedHrp(String),
}

/// Validate a payment address: well-formed bech32 with an `addr` or
/// `addr_test` human-readable part.
pub fn validate_payment_address(address: &str) -> Result<(), AddressError> {
    let (hrp, _) = bech32::decode(address).map_err(|_| AddressError::Malformed)?;

    match hrp.as_str() {
        "addr" | "addr_test" => Ok(()),
        other => Err(AddressError::UnexpectedHrp(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    const MIN_UNIT: &str = "29d222ce763455e3d7a09a665ce554f00ac89d2e99a1a83d267170c64d494e";

    #[test]
    fn test_unit_split() {
        let unit = AssetUnit::from(MIN_UNIT);
        assert_eq!(
            unit.policy_id(),
            "29d222ce763455e3d7a09a665ce554f00ac89d2e99a1a83d267170c6"
        );
        assert_eq!(unit.asset_name_hex(), "4d494e");
        assert_eq!(unit.asset_name_utf8().as_deref(), Some("MIN"));
    }

    #[test]
    fn test_lovelace() {
        let unit = AssetUnit::lovelace();
        assert!(unit.is_lovelace());
        assert_eq!(unit.policy_id(), "");
        assert_eq!(unit.asset_name_hex(), "");
        assert_eq!(unit.asset_name_utf8(), None);
    }

    #[test]
    fn test_validate_payment_address() {
        let address = encode_address("addr_test");
        assert_matches!(validate_payment_address(&address), Ok(()));

        assert_matches!(
            validate_payment_address("not-an-address"),
            Err(AddressError::Malformed)
        );

        let stake_address = encode_address("stake");
        assert_matches!(
            validate_payment_address(&stake_address),
            Err(AddressError::UnexpectedHrp(hrp)) if hrp == "stake"
        );
    }

    fn encode_address(hrp: &str) -> String {
        let hrp = bech32::Hrp::parse(hrp).expect("hrp is valid");
        bech32::encode::<bech32::Bech32>(hrp, &[7; 29]).expect("address can be encoded")
    }
}

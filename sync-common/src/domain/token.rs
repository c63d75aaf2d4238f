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

use crate::domain::AssetUnit;
use serde::{Deserialize, Serialize};
use sqlx::Type;

/// Resolved metadata for one asset unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub unit: AssetUnit,
    pub policy_id: String,
    pub asset_name: String,
    pub name: Option<String>,
    pub ticker: Option<String>,
    pub decimals: u32,
    pub category: TokenCategory,
    pub logo: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl TokenInfo {
    /// The fixed record for native ADA; resolved without any I/O.
    pub fn native() -> Self {
        Self {
            unit: AssetUnit::lovelace(),
            policy_id: String::new(),
            asset_name: String::new(),
            name: Some("Cardano".to_string()),
            ticker: Some("ADA".to_string()),
            decimals: 6,
            category: TokenCategory::Native,
            logo: None,
            metadata: None,
        }
    }

    /// Placeholder record for an asset without any known metadata. Never
    /// persisted; exists so that downstream parsing always has a token.
    pub fn synthetic(unit: &AssetUnit) -> Self {
        let short = match unit.asset_name_hex() {
            "" => unit.policy_id().chars().take(8).collect::<String>(),
            name => name.chars().take(8).collect::<String>(),
        };

        Self {
            unit: unit.clone(),
            policy_id: unit.policy_id().to_string(),
            asset_name: unit.asset_name_hex().to_string(),
            name: Some(format!("Token {short}")),
            ticker: Some(short.to_uppercase()),
            decimals: 0,
            category: TokenCategory::Fungible,
            logo: None,
            metadata: None,
        }
    }

    /// Symbol used in human-readable descriptions.
    pub fn symbol(&self) -> &str {
        self.ticker
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or_else(|| {
                let name = self.unit.asset_name_hex();
                if name.is_empty() { self.unit.as_str() } else { name }
            })
    }
}

/// Closed set of token categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TOKEN_CATEGORY", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TokenCategory {
    Native,
    Fungible,
    LpToken,
    QToken,
    Governance,
    Stablecoin,
    Nft,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native() {
        let token = TokenInfo::native();
        assert_eq!(token.symbol(), "ADA");
        assert_eq!(token.decimals, 6);
        assert_eq!(token.category, TokenCategory::Native);
    }

    #[test]
    fn test_synthetic() {
        let unit = AssetUnit::from(
            "29d222ce763455e3d7a09a665ce554f00ac89d2e99a1a83d267170c64d494e0102",
        );
        let token = TokenInfo::synthetic(&unit);
        assert_eq!(token.name.as_deref(), Some("Token 4d494e01"));
        assert_eq!(token.ticker.as_deref(), Some("4D494E01"));
        assert_eq!(token.decimals, 0);
        assert_eq!(token.category, TokenCategory::Fungible);
    }

    #[test]
    fn test_synthetic_empty_asset_name() {
        let unit =
            AssetUnit::from("29d222ce763455e3d7a09a665ce554f00ac89d2e99a1a83d267170c6");
        let token = TokenInfo::synthetic(&unit);
        assert_eq!(token.ticker.as_deref(), Some("29D222CE"));
    }
}

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

use sqlx::types::time::OffsetDateTime;
use sync_common::domain::{Action, AssetUnit, Protocol, TokenInfo, TxHash, WalletAddress};
use uuid::Uuid;

/// Per-asset movement of one transaction from the wallet's point of view.
/// `net = amount_in - amount_out`; both sides are non-negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFlow {
    pub unit: AssetUnit,
    pub amount_in: u128,
    pub amount_out: u128,
    pub net: i128,

    /// Resolved token metadata; filled in by enrichment, not persisted with
    /// the flow row.
    pub token: Option<TokenInfo>,
}

impl AssetFlow {
    pub fn new(unit: AssetUnit, amount_in: u128, amount_out: u128) -> Self {
        Self {
            unit,
            amount_in,
            amount_out,
            net: amount_in as i128 - amount_out as i128,
            token: None,
        }
    }

    /// Minting policy of the flow's asset; empty for lovelace.
    pub fn policy_id(&self) -> &str {
        self.unit.policy_id()
    }
}

/// A chain transaction reduced to what it did to one wallet; the unit of
/// persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletTransaction {
    pub owner_user_id: Uuid,
    pub wallet_address: WalletAddress,
    pub tx_hash: TxHash,
    pub block_height: u64,
    pub timestamp: i64,
    pub action: Action,
    pub protocol: Protocol,
    pub description: String,
    pub net_ada_change: i128,
    pub fees: u128,
    pub asset_flows: Vec<AssetFlow>,
}

/// Wallet row: sync cursor and last known balance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    pub address: WalletAddress,
    pub owner_user_id: Uuid,
    pub synced_block_height: u64,
    pub last_synced_at: Option<OffsetDateTime>,
    pub balance: Option<u128>,
}

/// Result of one `save_batch` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveOutcome {
    pub inserted: usize,
    pub skipped: usize,
}

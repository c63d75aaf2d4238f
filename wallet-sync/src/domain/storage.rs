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

use crate::domain::{SaveOutcome, Wallet, WalletTransaction};
use sync_common::domain::{AssetUnit, TokenInfo, WalletAddress};
use uuid::Uuid;

/// Wallet row access: sync cursor and balance.
#[trait_variant::make(Send)]
pub trait WalletStore
where
    Self: Clone + Send + Sync + 'static,
{
    async fn get_wallet(
        &self,
        address: &WalletAddress,
        owner_user_id: Uuid,
    ) -> Result<Option<Wallet>, sqlx::Error>;

    /// Upsert the wallet at sync end. The stored cursor never regresses; a
    /// missing balance keeps the previous one.
    async fn update_sync_cursor(
        &self,
        address: &WalletAddress,
        owner_user_id: Uuid,
        synced_block_height: u64,
        balance: Option<u128>,
    ) -> Result<(), sqlx::Error>;
}

/// Idempotent bulk persistence of wallet transactions and their flows.
#[trait_variant::make(Send)]
pub trait TransactionStore
where
    Self: Clone + Send + Sync + 'static,
{
    /// Insert the given transactions, silently skipping hashes already
    /// persisted for their owner. Flows are inserted only for freshly
    /// inserted transactions; chain history is immutable, so flows of a
    /// skipped transaction are already present.
    async fn save_batch(
        &self,
        transactions: &[WalletTransaction],
    ) -> Result<SaveOutcome, sqlx::Error>;
}

/// Token metadata table access.
#[trait_variant::make(Send)]
pub trait TokenStore
where
    Self: Clone + Send + Sync + 'static,
{
    async fn get_token(&self, unit: &AssetUnit) -> Result<Option<TokenInfo>, sqlx::Error>;

    async fn get_tokens(&self, units: &[AssetUnit]) -> Result<Vec<TokenInfo>, sqlx::Error>;

    async fn upsert_token(&self, token: &TokenInfo) -> Result<(), sqlx::Error>;
}

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

use crate::{
    domain::{Wallet, storage::WalletStore},
    infra::storage::Storage,
};
use fastrace::trace;
use indoc::indoc;
use sqlx::{Row, postgres::PgRow, types::time::OffsetDateTime};
use sync_common::{domain::WalletAddress, infra::sqlx::U128BeBytes};
use uuid::Uuid;

impl WalletStore for Storage {
    #[trace]
    async fn get_wallet(
        &self,
        address: &WalletAddress,
        owner_user_id: Uuid,
    ) -> Result<Option<Wallet>, sqlx::Error> {
        let query = indoc! {"
            SELECT address, owner_user_id, synced_block_height, last_synced_at, balance
            FROM wallets
            WHERE address = $1
            AND owner_user_id = $2
        "};

        sqlx::query(query)
            .bind(address.as_str())
            .bind(owner_user_id)
            .fetch_optional(&*self.pool)
            .await?
            .map(wallet_from_row)
            .transpose()
    }

    #[trace]
    async fn update_sync_cursor(
        &self,
        address: &WalletAddress,
        owner_user_id: Uuid,
        synced_block_height: u64,
        balance: Option<u128>,
    ) -> Result<(), sqlx::Error> {
        let query = indoc! {"
            INSERT INTO wallets (address, owner_user_id, synced_block_height, last_synced_at, balance)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (address, owner_user_id)
            DO UPDATE SET
                synced_block_height =
                    GREATEST(wallets.synced_block_height, EXCLUDED.synced_block_height),
                last_synced_at = EXCLUDED.last_synced_at,
                balance = COALESCE(EXCLUDED.balance, wallets.balance)
        "};

        sqlx::query(query)
            .bind(address.as_str())
            .bind(owner_user_id)
            .bind(synced_block_height as i64)
            .bind(OffsetDateTime::now_utc())
            .bind(balance.map(U128BeBytes::from))
            .execute(&*self.pool)
            .await?;

        Ok(())
    }
}

fn wallet_from_row(row: PgRow) -> Result<Wallet, sqlx::Error> {
    Ok(Wallet {
        address: WalletAddress::from(row.try_get::<String, _>("address")?),
        owner_user_id: row.try_get("owner_user_id")?,
        synced_block_height: row.try_get::<i64, _>("synced_block_height")? as u64,
        last_synced_at: row.try_get("last_synced_at")?,
        balance: row
            .try_get::<Option<U128BeBytes>, _>("balance")?
            .map(Into::into),
    })
}

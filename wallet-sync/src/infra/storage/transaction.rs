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
    domain::{SaveOutcome, WalletTransaction, storage::TransactionStore},
    infra::storage::Storage,
};
use fastrace::trace;
use futures::{StreamExt, TryStreamExt};
use indoc::indoc;
use sqlx::{QueryBuilder, Row, types::time::OffsetDateTime};
use std::collections::HashMap;
use sync_common::{
    domain::Protocol,
    infra::sqlx::{I128BeBytes, U128BeBytes},
};

impl TransactionStore for Storage {
    #[trace]
    async fn save_batch(
        &self,
        transactions: &[WalletTransaction],
    ) -> Result<SaveOutcome, sqlx::Error> {
        if transactions.is_empty() {
            return Ok(SaveOutcome::default());
        }

        let mut tx = self.pool.begin().await?;

        let query = indoc! {"
            INSERT INTO transactions (
                owner_user_id,
                wallet_address,
                tx_hash,
                block_height,
                timestamp,
                action,
                protocol,
                description,
                net_ada_change,
                fees
            )
        "};

        let inserted = QueryBuilder::new(query)
            .push_values(transactions.iter(), |mut q, transaction| {
                let WalletTransaction {
                    owner_user_id,
                    wallet_address,
                    tx_hash,
                    block_height,
                    timestamp,
                    action,
                    protocol,
                    description,
                    net_ada_change,
                    fees,
                    ..
                } = transaction;

                // Unknown is represented as NULL, the closed enum stays the
                // single conversion point for real protocols.
                let protocol = (*protocol != Protocol::Unknown).then_some(*protocol);
                let timestamp = OffsetDateTime::from_unix_timestamp(*timestamp)
                    .unwrap_or(OffsetDateTime::UNIX_EPOCH);

                q.push_bind(*owner_user_id)
                    .push_bind(wallet_address.as_str())
                    .push_bind(tx_hash.as_str())
                    .push_bind(*block_height as i64)
                    .push_bind(timestamp)
                    .push_bind(*action)
                    .push_bind(protocol)
                    .push_bind(description)
                    .push_bind(I128BeBytes::from(*net_ada_change))
                    .push_bind(U128BeBytes::from(*fees));
            })
            .push(" ON CONFLICT (owner_user_id, tx_hash) DO NOTHING RETURNING id, tx_hash")
            .build()
            .fetch(&mut *tx)
            .map(|row| {
                row.and_then(|row| {
                    Ok((row.try_get::<String, _>("tx_hash")?, row.try_get::<i64, _>("id")?))
                })
            })
            .try_collect::<HashMap<_, _>>()
            .await?;

        let flows = transactions
            .iter()
            .filter_map(|transaction| {
                inserted
                    .get(transaction.tx_hash.as_str())
                    .map(|id| (*id, &transaction.asset_flows))
            })
            .flat_map(|(id, flows)| flows.iter().map(move |flow| (id, flow)))
            .collect::<Vec<_>>();

        if !flows.is_empty() {
            let query = indoc! {"
                INSERT INTO asset_flows (
                    transaction_id,
                    token_unit,
                    amount_in,
                    amount_out,
                    net
                )
            "};

            QueryBuilder::new(query)
                .push_values(flows.iter(), |mut q, (id, flow)| {
                    q.push_bind(*id)
                        .push_bind(flow.unit.as_str())
                        .push_bind(U128BeBytes::from(flow.amount_in))
                        .push_bind(U128BeBytes::from(flow.amount_out))
                        .push_bind(I128BeBytes::from(flow.net));
                })
                .push(" ON CONFLICT (transaction_id, token_unit) DO NOTHING")
                .build()
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(SaveOutcome {
            inserted: inserted.len(),
            skipped: transactions.len() - inserted.len(),
        })
    }
}

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

use crate::{domain::storage::TokenStore, infra::storage::Storage};
use fastrace::trace;
use futures::TryStreamExt;
use indoc::indoc;
use sqlx::{
    Row,
    postgres::PgRow,
    types::{Json, time::OffsetDateTime},
};
use sync_common::domain::{AssetUnit, TokenInfo};

impl TokenStore for Storage {
    #[trace]
    async fn get_token(&self, unit: &AssetUnit) -> Result<Option<TokenInfo>, sqlx::Error> {
        let query = indoc! {"
            SELECT unit, policy_id, asset_name, name, ticker, decimals, category, logo, metadata
            FROM tokens
            WHERE unit = $1
        "};

        sqlx::query(query)
            .bind(unit.as_str())
            .fetch_optional(&*self.pool)
            .await?
            .map(token_from_row)
            .transpose()
    }

    #[trace]
    async fn get_tokens(&self, units: &[AssetUnit]) -> Result<Vec<TokenInfo>, sqlx::Error> {
        let query = indoc! {"
            SELECT unit, policy_id, asset_name, name, ticker, decimals, category, logo, metadata
            FROM tokens
            WHERE unit = ANY($1)
        "};

        let units = units
            .iter()
            .map(|unit| unit.as_str().to_string())
            .collect::<Vec<_>>();

        sqlx::query(query)
            .bind(&units)
            .fetch(&*self.pool)
            .map_ok(token_from_row)
            .try_collect::<Vec<_>>()
            .await?
            .into_iter()
            .collect()
    }

    #[trace]
    async fn upsert_token(&self, token: &TokenInfo) -> Result<(), sqlx::Error> {
        let query = indoc! {"
            INSERT INTO tokens (
                unit,
                policy_id,
                asset_name,
                name,
                ticker,
                decimals,
                category,
                logo,
                metadata,
                updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (unit)
            DO UPDATE SET
                name = EXCLUDED.name,
                ticker = EXCLUDED.ticker,
                decimals = EXCLUDED.decimals,
                category = EXCLUDED.category,
                logo = EXCLUDED.logo,
                metadata = EXCLUDED.metadata,
                updated_at = EXCLUDED.updated_at
        "};

        sqlx::query(query)
            .bind(token.unit.as_str())
            .bind(&token.policy_id)
            .bind(&token.asset_name)
            .bind(&token.name)
            .bind(&token.ticker)
            .bind(token.decimals as i32)
            .bind(token.category)
            .bind(&token.logo)
            .bind(token.metadata.clone().map(Json))
            .bind(OffsetDateTime::now_utc())
            .execute(&*self.pool)
            .await?;

        Ok(())
    }
}

fn token_from_row(row: PgRow) -> Result<TokenInfo, sqlx::Error> {
    Ok(TokenInfo {
        unit: AssetUnit::from(row.try_get::<String, _>("unit")?),
        policy_id: row.try_get("policy_id")?,
        asset_name: row.try_get("asset_name")?,
        name: row.try_get("name")?,
        ticker: row.try_get("ticker")?,
        decimals: row.try_get::<i32, _>("decimals")? as u32,
        category: row.try_get("category")?,
        logo: row.try_get("logo")?,
        metadata: row
            .try_get::<Option<Json<serde_json::Value>>, _>("metadata")?
            .map(|json| json.0),
    })
}

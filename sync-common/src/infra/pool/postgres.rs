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

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::{ops::Deref, time::Duration};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub url: SecretString,

    #[serde(default = "max_connections_default")]
    pub max_connections: u32,

    #[serde(with = "humantime_serde", default = "acquire_timeout_default")]
    pub acquire_timeout: Duration,
}

/// Postgres connection pool, dereferencing to [sqlx::PgPool].
#[derive(Debug, Clone)]
pub struct PostgresPool(PgPool);

impl PostgresPool {
    /// Create a new [PostgresPool] with the given [Config].
    pub async fn new(config: Config) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(config.url.expose_secret())
            .await?;

        Ok(Self(pool))
    }
}

impl Deref for PostgresPool {
    type Target = PgPool;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn max_connections_default() -> u32 {
    10
}

fn acquire_timeout_default() -> Duration {
    Duration::from_secs(30)
}

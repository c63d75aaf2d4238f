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

use anyhow::Context;
use log::{error, info};
use std::panic;
use sync_common::{
    config::ConfigExt,
    infra::{
        cache::{Cache, nats::NatsKvCache, noop::NoopKvCache},
        migrations,
        pool::postgres::PostgresPool,
    },
    telemetry,
};
use tokio::signal::unix::{SignalKind, signal};
use wallet_sync::{application, config::Config, infra::storage::Storage};

#[tokio::main]
async fn main() {
    telemetry::init_logging();
    panic::set_hook(Box::new(|panic| error!(panic:%; "process panicked")));

    if let Err(error) = run().await {
        let backtrace = error.backtrace();
        let error = format!("{error:#}");
        error!(error, backtrace:%; "process exited with ERROR");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler can be registered");

    let config = Config::load().context("load configuration")?;
    info!(config:?; "starting");
    let Config {
        run_migrations,
        application_config,
        infra_config,
        telemetry_config,
    } = config;

    telemetry::init_tracing(&telemetry_config);
    telemetry::init_metrics(&telemetry_config);

    let pool = PostgresPool::new(infra_config.storage_config)
        .await
        .context("create DB pool for Postgres")?;
    if run_migrations {
        migrations::postgres::run(&pool)
            .await
            .context("run database migrations")?;
    }

    let indexer = wallet_sync::infra::indexer::blockfrost::BlockfrostClient::new(
        infra_config.indexer_config,
    )
    .context("create chain indexer client")?;

    let cache = match infra_config.cache_config {
        Some(cache_config) => Cache::Nats(
            NatsKvCache::new(cache_config)
                .await
                .context("connect to shared cache")?,
        ),
        None => Cache::Noop(NoopKvCache),
    };

    let storage = Storage::new(pool);

    application::run(application_config, indexer, storage, cache, sigterm)
        .await
        .context("run wallet-sync application")
}

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

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::Deserialize;
use std::env;

/// Well-known flat environment keys mapped into the nested configuration,
/// so that deployments can configure the service without a config file.
/// String-valued keys; durations use the humantime format ("5s", "30m").
const ENV_ALIASES: &[(&str, &str)] = &[
    ("INDEXER_URL", "infra.indexer.url"),
    ("INDEXER_KEY", "infra.indexer.key"),
    ("DATABASE_URL", "infra.storage.url"),
    ("CACHE_URL", "infra.cache.url"),
    ("WORKER_POLL_INTERVAL", "application.poll_interval"),
    ("JOB_STUCK_THRESHOLD", "application.stuck_threshold"),
];

/// Integer-valued flat environment keys.
const ENV_ALIASES_NUMERIC: &[(&str, &str)] = &[
    ("WORKER_BATCH_SIZE", "application.batch_size"),
    ("JOB_MAX_RETRIES", "application.max_retries"),
];

/// Extension methods for configurations which can be deserialized.
pub trait ConfigExt
where
    Self: Sized + for<'de> Deserialize<'de>,
{
    /// Load the configuration, layered from an optional YAML file (path taken
    /// from `CONFIG_FILE`, defaulting to `config.yaml`), `APP__` prefixed
    /// environment variables and the flat environment aliases.
    fn load() -> Result<Self, figment::Error> {
        let config_file = env::var("CONFIG_FILE").unwrap_or_else(|_| "config.yaml".to_string());

        let mut figment = Figment::new()
            .merge(Yaml::file(config_file))
            .merge(Env::prefixed("APP__").split("__"));

        for (var, key) in ENV_ALIASES {
            if let Ok(value) = env::var(var) {
                figment = figment.merge((*key, value));
            }
        }

        for (var, key) in ENV_ALIASES_NUMERIC {
            if let Ok(value) = env::var(var) {
                let value = value
                    .parse::<u64>()
                    .map_err(|_| figment::Error::from(format!("{var} must be an integer")))?;
                figment = figment.merge((*key, value));
            }
        }

        figment.extract()
    }
}

impl<T> ConfigExt for T where T: Sized + for<'de> Deserialize<'de> {}

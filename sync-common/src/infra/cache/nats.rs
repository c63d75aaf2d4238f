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

use crate::domain::{CacheError, KvCache};
use async_nats::{
    ConnectError,
    jetstream::{
        self,
        context::CreateKeyValueError,
        kv::{self, Store},
    },
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::{
    error::Error as StdError,
    fmt::{self, Debug},
    time::{Duration, SystemTime, UNIX_EPOCH},
};
use thiserror::Error;

const BUCKET: &str = "wallet_sync_cache";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub url: String,
}

/// NATS JetStream key-value based cache implementation. Per-entry TTLs are
/// realized with an expiry envelope: expired entries read as misses and are
/// lazily deleted.
#[derive(Clone)]
pub struct NatsKvCache {
    store: Store,
}

impl NatsKvCache {
    /// Create a new [NatsKvCache] with the given [Config], creating the
    /// bucket if needed.
    pub async fn new(config: Config) -> Result<Self, Error> {
        let client = async_nats::connect(&config.url).await?;
        let jetstream = jetstream::new(client);
        let store = jetstream
            .create_key_value(kv::Config {
                bucket: BUCKET.to_string(),
                ..Default::default()
            })
            .await?;

        Ok(Self { store })
    }
}

impl KvCache for NatsKvCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let key = kv_key(key);
        let entry = self.store.get(&key).await.map_err(transport)?;

        let Some(bytes) = entry else {
            return Ok(None);
        };

        let envelope = serde_json::from_slice::<Envelope>(&bytes).map_err(codec)?;
        if envelope.expires_at <= now_millis() {
            // Lazy expiry; a failure to delete only delays the cleanup.
            let _ = self.store.purge(&key).await;
            return Ok(None);
        }

        Ok(Some(envelope.payload))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        let envelope = Envelope {
            expires_at: now_millis() + ttl.as_millis() as u64,
            payload: value.to_vec(),
        };
        let bytes = serde_json::to_vec(&envelope).map_err(codec)?;

        self.store
            .put(&kv_key(key), bytes.into())
            .await
            .map_err(transport)?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.store.purge(&kv_key(key)).await.map_err(transport)?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let prefix = kv_key(prefix);
        let mut keys = self.store.keys().await.map_err(transport)?;

        while let Some(key) = keys.next().await {
            let key = key.map_err(transport)?;
            if key.starts_with(&prefix) {
                self.store.purge(&key).await.map_err(transport)?;
            }
        }

        Ok(())
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, CacheError> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }

        Ok(values)
    }

    async fn set_many(
        &self,
        entries: &[(String, Vec<u8>)],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        for (key, value) in entries {
            self.set(key, value, ttl).await?;
        }

        Ok(())
    }
}

impl Debug for NatsKvCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NatsKvCache").field("bucket", &BUCKET).finish()
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot connect to NATS server")]
    Connect(#[from] ConnectError),

    #[error("cannot create key-value store")]
    CreateStore(#[from] CreateKeyValueError),
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    expires_at: u64,
    payload: Vec<u8>,
}

/// NATS keys cannot contain colons; logical keys like `wallet:{address}` are
/// mapped to dotted form inside this implementation only.
fn kv_key(key: &str) -> String {
    key.replace(':', ".")
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn transport(error: impl StdError + Send + Sync + 'static) -> CacheError {
    CacheError::Transport(Box::new(error))
}

fn codec(error: impl StdError + Send + Sync + 'static) -> CacheError {
    CacheError::Codec(Box::new(error))
}

#[cfg(test)]
mod tests {
    use super::kv_key;

    #[test]
    fn test_kv_key() {
        assert_eq!(kv_key("wallet:addr1xyz"), "wallet.addr1xyz");
        assert_eq!(kv_key("token:29d222ce"), "token.29d222ce");
        assert_eq!(kv_key("plain"), "plain");
    }
}

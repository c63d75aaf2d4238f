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

pub mod nats;
pub mod noop;

use crate::domain::{CacheError, KvCache};
use std::time::Duration;

/// Cache backend selected at startup: NATS when a cache URL is configured,
/// no-op otherwise. Code paths must be correct either way.
#[derive(Debug, Clone)]
pub enum Cache {
    Nats(nats::NatsKvCache),
    Noop(noop::NoopKvCache),
}

impl KvCache for Cache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        match self {
            Cache::Nats(cache) => cache.get(key).await,
            Cache::Noop(cache) => cache.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        match self {
            Cache::Nats(cache) => cache.set(key, value, ttl).await,
            Cache::Noop(cache) => cache.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        match self {
            Cache::Nats(cache) => cache.delete(key).await,
            Cache::Noop(cache) => cache.delete(key).await,
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        match self {
            Cache::Nats(cache) => cache.delete_prefix(prefix).await,
            Cache::Noop(cache) => cache.delete_prefix(prefix).await,
        }
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, CacheError> {
        match self {
            Cache::Nats(cache) => cache.get_many(keys).await,
            Cache::Noop(cache) => cache.get_many(keys).await,
        }
    }

    async fn set_many(
        &self,
        entries: &[(String, Vec<u8>)],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        match self {
            Cache::Nats(cache) => cache.set_many(entries, ttl).await,
            Cache::Noop(cache) => cache.set_many(entries, ttl).await,
        }
    }
}

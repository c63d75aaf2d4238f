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

use crate::error::BoxError;
use std::time::Duration;
use thiserror::Error;

/// Shared key-value cache abstraction. All operations are advisory: callers
/// must treat errors as cache misses and carry on.
#[trait_variant::make(Send)]
pub trait KvCache
where
    Self: Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Delete all entries whose key starts with the given prefix.
    async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError>;

    /// Get many entries at once; the result has the same length and order as
    /// the given keys.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, CacheError>;

    async fn set_many(&self, entries: &[(String, Vec<u8>)], ttl: Duration)
    -> Result<(), CacheError>;
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cannot reach cache")]
    Transport(#[source] BoxError),

    #[error("cannot encode or decode cache entry")]
    Codec(#[source] BoxError),
}

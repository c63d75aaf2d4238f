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

use crate::domain::{indexer::ChainIndexer, storage::TokenStore};
use log::{debug, warn};
use lru::LruCache;
use metrics::counter;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    num::NonZeroUsize,
    sync::Arc,
    time::Duration,
};
use sync_common::domain::{AssetUnit, KvCache, TokenInfo};

/// TTL for token entries in the shared cache.
pub const TOKEN_CACHE_TTL: Duration = Duration::from_secs(15 * 60);

const LRU_CAPACITY: usize = 2048;

/// Tiered token metadata resolver: process-local LRU, shared KV cache, token
/// table, indexer. Lookups never fail; anything unresolvable degrades to a
/// synthetic record which is kept out of the table.
pub struct TokenRegistry<S, C, I> {
    store: S,
    cache: C,
    indexer: I,
    local: Arc<Mutex<LruCache<AssetUnit, TokenInfo>>>,
}

impl<S, C, I> Clone for TokenRegistry<S, C, I>
where
    S: Clone,
    C: Clone,
    I: Clone,
{
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            cache: self.cache.clone(),
            indexer: self.indexer.clone(),
            local: self.local.clone(),
        }
    }
}

impl<S, C, I> TokenRegistry<S, C, I>
where
    S: TokenStore,
    C: KvCache,
    I: ChainIndexer,
{
    pub fn new(store: S, cache: C, indexer: I) -> Self {
        let capacity = NonZeroUsize::new(LRU_CAPACITY).expect("LRU capacity is non-zero");

        Self {
            store,
            cache,
            indexer,
            local: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Resolve metadata for one unit through the tiers, short-circuiting on
    /// the first hit.
    pub async fn get(&self, unit: &AssetUnit) -> TokenInfo {
        if unit.is_lovelace() {
            return TokenInfo::native();
        }

        if let Some(token) = self.local.lock().get(unit).cloned() {
            return token;
        }

        if let Some(token) = self.cached(unit).await {
            self.local.lock().put(unit.clone(), token.clone());
            return token;
        }

        match self.store.get_token(unit).await {
            Ok(Some(token)) => {
                self.backfill_caches(&token).await;
                return token;
            }
            Ok(None) => {}
            Err(error) => warn!(unit:%, error:%; "cannot read token from store"),
        }

        match self.indexer.fetch_token_metadata(unit).await {
            Ok(Some(token)) => {
                if let Err(error) = self.store.upsert_token(&token).await {
                    warn!(unit:%, error:%; "cannot persist token metadata");
                }
                self.backfill_caches(&token).await;
                token
            }

            // Valid "no metadata known" answer: synthesize, but keep the
            // table clean. Kept in the local LRU to avoid refetch storms.
            Ok(None) => {
                let token = TokenInfo::synthetic(unit);
                self.local.lock().put(unit.clone(), token.clone());
                token
            }

            // Transient upstream failure: synthesize without caching.
            Err(error) => {
                warn!(unit:%, error:%; "cannot fetch token metadata");
                TokenInfo::synthetic(unit)
            }
        }
    }

    /// Resolve metadata for many units; deduplicates, probes all tiers and
    /// batch-fetches the residual misses in one go.
    pub async fn get_many(&self, units: &[AssetUnit]) -> HashMap<AssetUnit, TokenInfo> {
        let mut resolved = HashMap::new();
        let mut misses = Vec::new();

        for unit in units.iter().collect::<HashSet<_>>() {
            if unit.is_lovelace() {
                resolved.insert(unit.clone(), TokenInfo::native());
            } else if let Some(token) = self.local.lock().get(unit).cloned() {
                resolved.insert(unit.clone(), token);
            } else {
                misses.push(unit.clone());
            }
        }

        if misses.is_empty() {
            return resolved;
        }

        let keys = misses.iter().map(token_key).collect::<Vec<_>>();
        match self.cache.get_many(&keys).await {
            Ok(values) => {
                let mut still_missing = Vec::new();
                for (unit, value) in misses.into_iter().zip(values) {
                    let token =
                        value.and_then(|bytes| serde_json::from_slice::<TokenInfo>(&bytes).ok());
                    match token {
                        Some(token) => {
                            self.local.lock().put(unit.clone(), token.clone());
                            resolved.insert(unit, token);
                        }
                        None => still_missing.push(unit),
                    }
                }
                misses = still_missing;
            }
            Err(error) => {
                debug!(error:%; "cannot read tokens from shared cache");
            }
        }

        if !misses.is_empty() {
            match self.store.get_tokens(&misses).await {
                Ok(tokens) => {
                    for token in tokens {
                        misses.retain(|unit| *unit != token.unit);
                        self.backfill_caches(&token).await;
                        resolved.insert(token.unit.clone(), token);
                    }
                }
                Err(error) => warn!(error:%; "cannot read tokens from store"),
            }
        }

        if !misses.is_empty() {
            match self.indexer.fetch_token_metadata_batch(&misses).await {
                Ok(tokens) => {
                    for (unit, token) in tokens {
                        if let Err(error) = self.store.upsert_token(&token).await {
                            warn!(unit:%, error:%; "cannot persist token metadata");
                        }
                        self.backfill_caches(&token).await;
                        misses.retain(|missing| *missing != unit);
                        resolved.insert(unit, token);
                    }
                }
                Err(error) => warn!(error:%; "cannot batch-fetch token metadata"),
            }
        }

        for unit in misses {
            let token = TokenInfo::synthetic(&unit);
            self.local.lock().put(unit.clone(), token.clone());
            resolved.insert(unit, token);
        }

        resolved
    }

    /// Informational hook for tokens that look like an unregistered protocol
    /// marker. Never changes the categorization of the transaction in
    /// flight.
    pub fn register_discovered_token(&self, unit: &AssetUnit, context: &str) {
        counter!("wallet_sync_discovered_tokens_total").increment(1);
        debug!(unit:%, context; "potential protocol token discovered");
    }

    async fn cached(&self, unit: &AssetUnit) -> Option<TokenInfo> {
        match self.cache.get(&token_key(unit)).await {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).ok(),
            Ok(None) => None,
            Err(error) => {
                debug!(unit:%, error:%; "cannot read token from shared cache");
                None
            }
        }
    }

    async fn backfill_caches(&self, token: &TokenInfo) {
        self.local.lock().put(token.unit.clone(), token.clone());

        match serde_json::to_vec(token) {
            Ok(bytes) => {
                if let Err(error) = self
                    .cache
                    .set(&token_key(&token.unit), &bytes, TOKEN_CACHE_TTL)
                    .await
                {
                    debug!(unit:% = token.unit, error:%; "cannot write token to shared cache");
                }
            }
            Err(error) => debug!(error:%; "cannot encode token for shared cache"),
        }
    }
}

fn token_key(unit: &AssetUnit) -> String {
    format!("token:{unit}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryStorage, MockIndexer};
    use sync_common::{
        domain::TokenCategory,
        infra::cache::noop::NoopKvCache,
    };

    const MIN_UNIT: &str = "29d222ce763455e3d7a09a665ce554f00ac89d2e99a1a83d267170c64d494e";

    fn registry(
        storage: InMemoryStorage,
        indexer: MockIndexer,
    ) -> TokenRegistry<InMemoryStorage, NoopKvCache, MockIndexer> {
        TokenRegistry::new(storage, NoopKvCache, indexer)
    }

    fn min_token() -> TokenInfo {
        TokenInfo {
            unit: AssetUnit::from(MIN_UNIT),
            policy_id: AssetUnit::from(MIN_UNIT).policy_id().to_string(),
            asset_name: "4d494e".to_string(),
            name: Some("Minswap".to_string()),
            ticker: Some("MIN".to_string()),
            decimals: 6,
            category: TokenCategory::Governance,
            logo: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_lovelace_needs_no_io() {
        let indexer = MockIndexer::default();
        let registry = registry(InMemoryStorage::default(), indexer.clone());

        let token = registry.get(&AssetUnit::lovelace()).await;
        assert_eq!(token, TokenInfo::native());
        assert_eq!(indexer.metadata_calls(), 0);
    }

    #[tokio::test]
    async fn test_indexer_hit_is_persisted_and_cached() {
        let storage = InMemoryStorage::default();
        let indexer = MockIndexer::default();
        indexer.insert_token(min_token());
        let registry = registry(storage.clone(), indexer.clone());
        let unit = AssetUnit::from(MIN_UNIT);

        let token = registry.get(&unit).await;
        assert_eq!(token.ticker.as_deref(), Some("MIN"));
        assert_eq!(indexer.metadata_calls(), 1);

        // Written back to the table...
        let stored = crate::domain::storage::TokenStore::get_token(&storage, &unit)
            .await
            .unwrap();
        assert_eq!(stored, Some(token.clone()));

        // ...and the second lookup is served from the local cache.
        let again = registry.get(&unit).await;
        assert_eq!(again, token);
        assert_eq!(indexer.metadata_calls(), 1);
    }

    #[tokio::test]
    async fn test_upstream_miss_yields_synthetic_without_persisting() {
        let storage = InMemoryStorage::default();
        let registry = registry(storage.clone(), MockIndexer::default());
        let unit = AssetUnit::from(MIN_UNIT);

        let token = registry.get(&unit).await;
        assert_eq!(token, TokenInfo::synthetic(&unit));

        // The synthetic record never reaches the table.
        let stored = crate::domain::storage::TokenStore::get_token(&storage, &unit)
            .await
            .unwrap();
        assert_eq!(stored, None);
    }

    #[tokio::test]
    async fn test_get_many_deduplicates_and_batches() {
        let indexer = MockIndexer::default();
        indexer.insert_token(min_token());
        let registry = registry(InMemoryStorage::default(), indexer.clone());

        let min = AssetUnit::from(MIN_UNIT);
        let units = vec![
            AssetUnit::lovelace(),
            min.clone(),
            min.clone(),
            AssetUnit::from("deadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeefdeadbeef746f6b"),
        ];

        let tokens = registry.get_many(&units).await;
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[&AssetUnit::lovelace()], TokenInfo::native());
        assert_eq!(tokens[&min].ticker.as_deref(), Some("MIN"));
        // The residual misses went through one batch call.
        assert_eq!(indexer.metadata_calls(), 1);
    }
}

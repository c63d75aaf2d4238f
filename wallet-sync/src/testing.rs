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

//! In-memory capability implementations and fixture helpers for tests. The
//! stores mirror the conflict-handling semantics of the Postgres
//! implementation.

use crate::domain::{
    AddressUtxo, AssetAmount, EnqueueOutcome, JobStatistics, JobStatus, NewJob, RawTransaction,
    SaveOutcome, SyncJob, TxInput, TxOutput, TxRef, Wallet, WalletTransaction, WalletView,
    backoff_delay,
    indexer::ChainIndexer,
    storage::{TokenStore, TransactionStore, WalletStore},
    truncate_at_cursor,
};
use fake::{Fake, Faker};
use futures::{Stream, stream};
use parking_lot::Mutex;
use sqlx::types::time::OffsetDateTime;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use sync_common::domain::{AssetUnit, TokenInfo, TxHash, WalletAddress};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct MockError(pub String);

// ---------------------------------------------------------------------------
// Fixture helpers
// ---------------------------------------------------------------------------

static NEXT_TX: AtomicU64 = AtomicU64::new(0);

pub fn wallet_view() -> WalletView {
    WalletView::new(WalletAddress::from("addr_test1qwallet0000000000000000"))
}

pub fn other_address() -> WalletAddress {
    WalletAddress::from("addr_test1qother00000000000000000")
}

/// A bech32-valid address with the given human-readable part.
pub fn encoded_address(hrp: &str) -> String {
    let hrp = bech32::Hrp::parse(hrp).expect("hrp is valid");
    bech32::encode::<bech32::Bech32>(hrp, &[7; 29]).expect("address can be encoded")
}

pub fn lovelace(quantity: u128) -> AssetAmount {
    AssetAmount {
        unit: AssetUnit::lovelace(),
        quantity,
    }
}

pub fn input(address: &WalletAddress, amounts: Vec<AssetAmount>) -> TxInput {
    TxInput {
        address: Some(address.clone()),
        amounts,
        ref_tx_hash: TxHash::from("ref"),
        output_index: 0,
        datum_hash: None,
        script_hash: None,
    }
}

pub fn output(address: &WalletAddress, amounts: Vec<AssetAmount>) -> TxOutput {
    TxOutput {
        address: address.clone(),
        amounts,
        datum_hash: None,
    }
}

pub fn raw_tx(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> RawTransaction {
    raw_tx_at(100, inputs, outputs)
}

pub fn raw_tx_at(
    block_height: u64,
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
) -> RawTransaction {
    let n = NEXT_TX.fetch_add(1, Ordering::Relaxed);

    RawTransaction {
        hash: TxHash::from(format!("tx-{block_height}-{n}")),
        block_hash: Faker.fake::<String>(),
        block_height,
        block_time: 1_722_470_400 + block_height as i64,
        slot: block_height * 20,
        fees: 170_000,
        inputs,
        outputs,
        withdrawals: vec![],
        delegation_count: 0,
        stake_cert_count: 0,
    }
}

pub fn pending_job(wallet_address: &str) -> SyncJob {
    SyncJob {
        id: Uuid::now_v7(),
        wallet_address: WalletAddress::from(wallet_address),
        user_id: Some(Uuid::now_v7()),
        job_type: crate::domain::WALLET_SYNC_JOB.to_string(),
        status: JobStatus::Pending,
        priority: crate::domain::DEFAULT_PRIORITY,
        retry_count: 0,
        max_retries: 3,
        scheduled_at: OffsetDateTime::now_utc(),
        started_at: None,
        completed_at: None,
        error_message: None,
        metadata: serde_json::json!({}),
        created_at: OffsetDateTime::now_utc(),
    }
}

// ---------------------------------------------------------------------------
// Mock chain indexer
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct MockIndexerState {
    pub tip: u64,
    pub page_size: usize,
    pub transactions: Vec<RawTransaction>,
    pub utxos: Vec<AddressUtxo>,
    pub balances: HashMap<String, u128>,
    pub tokens: HashMap<AssetUnit, TokenInfo>,
    pub failing_hashes: Vec<TxHash>,
    pub metadata_calls: u64,
    pub metadata_batch_calls: u64,
}

/// Mock [ChainIndexer] over a fixed, ascending transaction history.
#[derive(Debug, Clone, Default)]
pub struct MockIndexer {
    state: Arc<Mutex<MockIndexerState>>,
}

impl MockIndexer {
    pub fn with_history(tip: u64, page_size: usize, transactions: Vec<RawTransaction>) -> Self {
        let indexer = Self::default();
        {
            let mut state = indexer.state.lock();
            state.tip = tip;
            state.page_size = page_size;
            state.transactions = transactions;
        }
        indexer
    }

    pub fn insert_token(&self, token: TokenInfo) {
        self.state.lock().tokens.insert(token.unit.clone(), token);
    }

    pub fn set_balance(&self, address: &WalletAddress, balance: u128) {
        self.state
            .lock()
            .balances
            .insert(address.as_str().to_string(), balance);
    }

    pub fn fail_hash(&self, hash: &TxHash) {
        self.state.lock().failing_hashes.push(hash.clone());
    }

    pub fn metadata_calls(&self) -> u64 {
        let state = self.state.lock();
        state.metadata_calls + state.metadata_batch_calls
    }
}

impl ChainIndexer for MockIndexer {
    type Error = MockError;

    fn transaction_hashes(
        &self,
        _address: WalletAddress,
        from_block: Option<u64>,
    ) -> impl Stream<Item = Result<Vec<TxRef>, Self::Error>> + Send {
        let state = self.state.lock();
        let page_size = state.page_size.max(1);
        let mut refs = state
            .transactions
            .iter()
            .map(|tx| TxRef {
                hash: tx.hash.clone(),
                block_height: tx.block_height,
            })
            .collect::<Vec<_>>();

        let pages = match from_block.filter(|from_block| *from_block > 0) {
            None => refs
                .chunks(page_size)
                .map(<[TxRef]>::to_vec)
                .collect::<Vec<_>>(),

            Some(from_block) => {
                refs.reverse();
                let mut pages = Vec::new();
                for chunk in refs.chunks(page_size) {
                    let (kept, reached) = truncate_at_cursor(chunk.to_vec(), from_block);
                    if !kept.is_empty() {
                        pages.push(kept);
                    }
                    if reached {
                        break;
                    }
                }
                pages
            }
        };

        stream::iter(pages.into_iter().map(Ok))
    }

    async fn fetch_transaction(&self, hash: &TxHash) -> Result<RawTransaction, Self::Error> {
        let state = self.state.lock();
        if state.failing_hashes.contains(hash) {
            return Err(MockError(format!("cannot fetch {hash}")));
        }

        state
            .transactions
            .iter()
            .find(|tx| tx.hash == *hash)
            .cloned()
            .ok_or_else(|| MockError(format!("unknown transaction {hash}")))
    }

    async fn fetch_address_balance(&self, address: &WalletAddress) -> Result<u128, Self::Error> {
        Ok(self
            .state
            .lock()
            .balances
            .get(address.as_str())
            .copied()
            .unwrap_or_default())
    }

    async fn fetch_address_utxos(
        &self,
        _address: &WalletAddress,
    ) -> Result<Vec<AddressUtxo>, Self::Error> {
        Ok(self.state.lock().utxos.clone())
    }

    async fn current_block_height(&self) -> Result<u64, Self::Error> {
        Ok(self.state.lock().tip)
    }

    async fn fetch_token_metadata(
        &self,
        unit: &AssetUnit,
    ) -> Result<Option<TokenInfo>, Self::Error> {
        if unit.is_lovelace() {
            return Ok(None);
        }

        let mut state = self.state.lock();
        state.metadata_calls += 1;
        Ok(state.tokens.get(unit).cloned())
    }

    async fn fetch_token_metadata_batch(
        &self,
        units: &[AssetUnit],
    ) -> Result<HashMap<AssetUnit, TokenInfo>, Self::Error> {
        let mut state = self.state.lock();
        state.metadata_batch_calls += 1;

        Ok(units
            .iter()
            .filter_map(|unit| state.tokens.get(unit).map(|token| (unit.clone(), token.clone())))
            .collect())
    }
}

// ---------------------------------------------------------------------------
// In-memory storage
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemoryState {
    pub wallets: HashMap<(String, Uuid), Wallet>,
    pub transactions: HashMap<(Uuid, String), WalletTransaction>,
    pub tokens: HashMap<AssetUnit, TokenInfo>,
    pub jobs: HashMap<Uuid, SyncJob>,
}

/// In-memory implementation of all storage capabilities, mirroring the
/// duplicate-handling of the Postgres queries.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStorage {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryStorage {
    pub fn transaction_count(&self) -> usize {
        self.state.lock().transactions.len()
    }

    pub fn flow_count(&self) -> usize {
        self.state
            .lock()
            .transactions
            .values()
            .map(|tx| tx.asset_flows.len())
            .sum()
    }

    pub fn persisted_heights(&self) -> Vec<u64> {
        let mut heights = self
            .state
            .lock()
            .transactions
            .values()
            .map(|tx| tx.block_height)
            .collect::<Vec<_>>();
        heights.sort_unstable();
        heights
    }

    pub fn wallet(&self, address: &WalletAddress, owner_user_id: Uuid) -> Option<Wallet> {
        self.state
            .lock()
            .wallets
            .get(&(address.as_str().to_string(), owner_user_id))
            .cloned()
    }

    pub fn job(&self, id: Uuid) -> Option<SyncJob> {
        self.state.lock().jobs.get(&id).cloned()
    }

    pub fn insert_job(&self, job: SyncJob) {
        self.state.lock().jobs.insert(job.id, job);
    }
}

impl WalletStore for InMemoryStorage {
    async fn get_wallet(
        &self,
        address: &WalletAddress,
        owner_user_id: Uuid,
    ) -> Result<Option<Wallet>, sqlx::Error> {
        Ok(self.wallet(address, owner_user_id))
    }

    async fn update_sync_cursor(
        &self,
        address: &WalletAddress,
        owner_user_id: Uuid,
        synced_block_height: u64,
        balance: Option<u128>,
    ) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock();
        let wallet = state
            .wallets
            .entry((address.as_str().to_string(), owner_user_id))
            .or_insert_with(|| Wallet {
                address: address.clone(),
                owner_user_id,
                synced_block_height: 0,
                last_synced_at: None,
                balance: None,
            });

        wallet.synced_block_height = wallet.synced_block_height.max(synced_block_height);
        wallet.last_synced_at = Some(OffsetDateTime::now_utc());
        wallet.balance = balance.or(wallet.balance);

        Ok(())
    }
}

impl TransactionStore for InMemoryStorage {
    async fn save_batch(
        &self,
        transactions: &[WalletTransaction],
    ) -> Result<SaveOutcome, sqlx::Error> {
        let mut state = self.state.lock();
        let mut outcome = SaveOutcome::default();

        for transaction in transactions {
            let key = (
                transaction.owner_user_id,
                transaction.tx_hash.as_str().to_string(),
            );
            if state.transactions.contains_key(&key) {
                outcome.skipped += 1;
            } else {
                state.transactions.insert(key, transaction.clone());
                outcome.inserted += 1;
            }
        }

        Ok(outcome)
    }
}

impl TokenStore for InMemoryStorage {
    async fn get_token(&self, unit: &AssetUnit) -> Result<Option<TokenInfo>, sqlx::Error> {
        Ok(self.state.lock().tokens.get(unit).cloned())
    }

    async fn get_tokens(&self, units: &[AssetUnit]) -> Result<Vec<TokenInfo>, sqlx::Error> {
        let state = self.state.lock();
        Ok(units
            .iter()
            .filter_map(|unit| state.tokens.get(unit).cloned())
            .collect())
    }

    async fn upsert_token(&self, token: &TokenInfo) -> Result<(), sqlx::Error> {
        self.state
            .lock()
            .tokens
            .insert(token.unit.clone(), token.clone());
        Ok(())
    }
}

impl crate::domain::JobStore for InMemoryStorage {
    async fn enqueue(&self, job: NewJob) -> Result<EnqueueOutcome, sqlx::Error> {
        let mut state = self.state.lock();

        let existing = state
            .jobs
            .values()
            .find(|existing| {
                existing.wallet_address == job.wallet_address && existing.status.is_active()
            })
            .cloned();
        if let Some(job) = existing {
            return Ok(EnqueueOutcome {
                job,
                created: false,
            });
        }

        let job = SyncJob {
            id: Uuid::now_v7(),
            wallet_address: job.wallet_address,
            user_id: job.user_id,
            job_type: job.job_type,
            status: JobStatus::Pending,
            priority: job.priority,
            retry_count: 0,
            max_retries: job.max_retries,
            scheduled_at: OffsetDateTime::now_utc(),
            started_at: None,
            completed_at: None,
            error_message: None,
            metadata: job.metadata,
            created_at: OffsetDateTime::now_utc(),
        };
        state.jobs.insert(job.id, job.clone());

        Ok(EnqueueOutcome { job, created: true })
    }

    async fn claim_next(&self, job_type: &str) -> Result<Option<SyncJob>, sqlx::Error> {
        let mut state = self.state.lock();
        let now = OffsetDateTime::now_utc();

        let candidate = state
            .jobs
            .values()
            .filter(|job| {
                job.status == JobStatus::Pending
                    && job.job_type == job_type
                    && job.scheduled_at <= now
            })
            .max_by_key(|job| (job.priority, std::cmp::Reverse(job.scheduled_at)))
            .map(|job| job.id);

        let Some(id) = candidate else {
            return Ok(None);
        };

        let job = state.jobs.get_mut(&id).expect("candidate job exists");
        job.status = JobStatus::Processing;
        job.started_at = Some(now);

        Ok(Some(job.clone()))
    }

    async fn complete(&self, id: Uuid, result: serde_json::Value) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock();
        if let Some(job) = state.jobs.get_mut(&id) {
            if job.status == JobStatus::Processing {
                job.status = JobStatus::Completed;
                job.completed_at = Some(OffsetDateTime::now_utc());
                job.error_message = None;
                job.metadata["result"] = result;
            }
        }

        Ok(())
    }

    async fn fail(
        &self,
        id: Uuid,
        error_message: &str,
        retryable: bool,
    ) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock();
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(());
        };
        if job.status != JobStatus::Processing {
            return Ok(());
        }

        if retryable && job.retry_count < job.max_retries {
            job.retry_count += 1;
            job.status = JobStatus::Pending;
            job.scheduled_at = OffsetDateTime::now_utc() + backoff_delay(job.retry_count);
            job.error_message = Some(error_message.to_string());
            job.started_at = None;
            job.completed_at = None;
        } else {
            job.status = JobStatus::Failed;
            job.completed_at = Some(OffsetDateTime::now_utc());
            job.error_message = Some(error_message.to_string());
        }

        Ok(())
    }

    async fn cancel(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut state = self.state.lock();
        let Some(job) = state.jobs.get_mut(&id) else {
            return Ok(false);
        };
        if !job.status.is_active() {
            return Ok(false);
        }

        job.status = JobStatus::Cancelled;
        job.completed_at = Some(OffsetDateTime::now_utc());

        Ok(true)
    }

    async fn reset_stuck(&self, stuck_after: Duration) -> Result<u64, sqlx::Error> {
        let mut state = self.state.lock();
        let threshold = OffsetDateTime::now_utc() - stuck_after;
        let mut reset = 0;

        for job in state.jobs.values_mut() {
            if job.status == JobStatus::Processing
                && job.started_at.is_some_and(|started_at| started_at < threshold)
            {
                job.status = JobStatus::Pending;
                job.started_at = None;
                job.error_message = Some("reset due to timeout".to_string());
                reset += 1;
            }
        }

        Ok(reset)
    }

    async fn cleanup(&self, older_than: Duration) -> Result<u64, sqlx::Error> {
        let mut state = self.state.lock();
        let threshold = OffsetDateTime::now_utc() - older_than;
        let before = state.jobs.len();

        state
            .jobs
            .retain(|_, job| !(job.status.is_terminal() && job.created_at < threshold));

        Ok((before - state.jobs.len()) as u64)
    }

    async fn statistics(&self) -> Result<JobStatistics, sqlx::Error> {
        let state = self.state.lock();
        let mut statistics = JobStatistics::default();

        for job in state.jobs.values() {
            match job.status {
                JobStatus::Pending => statistics.pending += 1,
                JobStatus::Processing => statistics.processing += 1,
                JobStatus::Completed => statistics.completed += 1,
                JobStatus::Failed => statistics.failed += 1,
                JobStatus::Cancelled => {}
            }
        }

        Ok(statistics)
    }

    async fn get(&self, id: Uuid) -> Result<Option<SyncJob>, sqlx::Error> {
        Ok(self.job(id))
    }

    async fn get_by_wallet(
        &self,
        wallet_address: &WalletAddress,
        limit: i64,
    ) -> Result<Vec<SyncJob>, sqlx::Error> {
        let state = self.state.lock();
        let mut jobs = state
            .jobs
            .values()
            .filter(|job| job.wallet_address == *wallet_address)
            .cloned()
            .collect::<Vec<_>>();
        jobs.sort_by_key(|job| std::cmp::Reverse(job.created_at));
        jobs.truncate(limit as usize);

        Ok(jobs)
    }

    async fn update_progress(
        &self,
        id: Uuid,
        processed: u64,
        errors: u64,
    ) -> Result<(), sqlx::Error> {
        let mut state = self.state.lock();
        if let Some(job) = state.jobs.get_mut(&id) {
            job.metadata["processed"] = processed.into();
            job.metadata["errors"] = errors.into();
        }

        Ok(())
    }
}

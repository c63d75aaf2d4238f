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

mod metrics;

use crate::{
    application::metrics::{
        job_completed, job_failed, queue_depth, transactions_saved, transactions_skipped,
    },
    domain::{
        JobStatus, SyncJob, TokenRegistry, TransactionParser, WALLET_SYNC_JOB, WalletView,
        indexer::ChainIndexer,
        storage::{TokenStore, TransactionStore, WalletStore},
    },
};
use anyhow::Context as AnyhowContext;
use fastrace::{Span, future::FutureExt, prelude::SpanContext};
use futures::StreamExt;
use log::{debug, info, warn};
use serde::Deserialize;
use serde_json::json;
use std::{pin::pin, time::Duration};
use sync_common::domain::{KvCache, WalletAddress};
use tokio::{
    select,
    signal::unix::Signal,
    sync::watch,
    task::{self, JoinHandle},
    time::{interval, sleep},
};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Rows per persistence batch.
    #[serde(default = "batch_size_default")]
    pub batch_size: usize,

    /// Idle sleep between claim attempts.
    #[serde(with = "humantime_serde", default = "poll_interval_default")]
    pub poll_interval: Duration,

    /// Pause between per-transaction detail fetches.
    #[serde(with = "humantime_serde", default = "detail_throttle_default")]
    pub detail_throttle: Duration,

    /// How often a running job checks for cooperative cancellation.
    #[serde(with = "humantime_serde", default = "cancel_poll_interval_default")]
    pub cancel_poll_interval: Duration,

    /// Cadence of the janitor task.
    #[serde(with = "humantime_serde", default = "janitor_interval_default")]
    pub janitor_interval: Duration,

    /// Processing time after which a claim counts as stalled.
    #[serde(with = "humantime_serde", default = "stuck_threshold_default")]
    pub stuck_threshold: Duration,

    /// Retention of terminal jobs before cleanup.
    #[serde(with = "humantime_serde", default = "job_retention_default")]
    pub job_retention: Duration,

    /// Default max retries for newly enqueued jobs.
    #[serde(default = "max_retries_default")]
    pub max_retries: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            batch_size: batch_size_default(),
            poll_interval: poll_interval_default(),
            detail_throttle: detail_throttle_default(),
            cancel_poll_interval: cancel_poll_interval_default(),
            janitor_interval: janitor_interval_default(),
            stuck_threshold: stuck_threshold_default(),
            job_retention: job_retention_default(),
            max_retries: max_retries_default(),
        }
    }
}

/// Run the sync worker: a janitor task plus the claim loop, until SIGTERM.
pub async fn run<I, S, C>(
    config: Config,
    indexer: I,
    storage: S,
    cache: C,
    mut sigterm: Signal,
) -> anyhow::Result<()>
where
    I: ChainIndexer,
    S: WalletStore + TransactionStore + TokenStore + crate::domain::JobStore,
    C: KvCache,
{
    let janitor_task = task::spawn(janitor(config.clone(), storage.clone()));
    let claim_task = task::spawn(claim_loop(config, indexer, storage, cache));

    select! {
        result = janitor_task => result
            .context("janitor task panicked")
            .and_then(|r| r.context("janitor task failed")),

        result = claim_task => result
            .context("claim loop panicked")
            .and_then(|r| r.context("claim loop failed")),

        _ = sigterm.recv() => {
            warn!("SIGTERM received");
            Ok(())
        }
    }
}

async fn claim_loop<I, S, C>(
    config: Config,
    indexer: I,
    storage: S,
    cache: C,
) -> anyhow::Result<()>
where
    I: ChainIndexer,
    S: WalletStore + TransactionStore + TokenStore + crate::domain::JobStore,
    C: KvCache,
{
    let registry = TokenRegistry::new(storage.clone(), cache.clone(), indexer.clone());
    let parser = TransactionParser::new(registry);

    loop {
        let job = match storage.claim_next(WALLET_SYNC_JOB).await {
            Ok(job) => job,
            Err(error) => {
                warn!(error:%; "cannot claim next job");
                sleep(config.poll_interval).await;
                continue;
            }
        };

        let Some(job) = job else {
            sleep(config.poll_interval).await;
            continue;
        };

        info!(
            job_id:% = job.id,
            wallet_address:% = job.wallet_address,
            retry_count = job.retry_count;
            "job claimed"
        );

        let cancellation =
            CancellationWatcher::spawn(storage.clone(), job.id, config.cancel_poll_interval);

        let outcome = sync_wallet(&config, &indexer, &storage, &parser, &job, &cancellation)
            .in_span(Span::root("sync-wallet", SpanContext::random()))
            .await;

        match outcome {
            Ok(outcome) => {
                evict_wallet_cache(&cache, &job.wallet_address).await;

                let result = json!({
                    "processed": outcome.processed,
                    "errors": outcome.errors,
                    "tip": outcome.tip,
                });
                if let Err(error) = storage.complete(job.id, result).await {
                    warn!(job_id:% = job.id, error:%; "cannot complete job");
                }

                job_completed();
                info!(
                    job_id:% = job.id,
                    wallet_address:% = job.wallet_address,
                    processed = outcome.processed,
                    errors = outcome.errors,
                    tip = outcome.tip;
                    "wallet synced"
                );
            }

            Err(SyncError::Cancelled) => {
                if let Err(error) = storage.fail(job.id, "cancelled", false).await {
                    warn!(job_id:% = job.id, error:%; "cannot mark cancelled job");
                }
                info!(job_id:% = job.id; "job cancelled");
            }

            Err(SyncError::Fatal(error)) => {
                job_failed();
                warn!(job_id:% = job.id, error:% = format!("{error:#}"); "job failed");
                if let Err(error) = storage.fail(job.id, &format!("{error:#}"), true).await {
                    warn!(job_id:% = job.id, error:%; "cannot mark failed job");
                }
            }
        }
    }
}

#[derive(Debug)]
enum SyncError {
    Cancelled,
    Fatal(anyhow::Error),
}

impl From<anyhow::Error> for SyncError {
    fn from(error: anyhow::Error) -> Self {
        SyncError::Fatal(error)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SyncOutcome {
    processed: u64,
    errors: u64,
    tip: u64,
}

/// Drive one claimed job: stream hash pages from the indexer, hydrate and
/// parse each hash, persist in batches, then update balance and cursor.
async fn sync_wallet<I, S, C>(
    config: &Config,
    indexer: &I,
    storage: &S,
    parser: &TransactionParser<S, C, I>,
    job: &SyncJob,
    cancellation: &CancellationWatcher,
) -> Result<SyncOutcome, SyncError>
where
    I: ChainIndexer,
    S: WalletStore + TransactionStore + TokenStore + crate::domain::JobStore,
    C: KvCache,
{
    let owner_user_id = job
        .user_id
        .context("wallet sync job is missing a user id")?;
    let wallet = WalletView {
        address: job.wallet_address.clone(),
        stake_address: job.stake_address(),
    };

    let tip = indexer
        .current_block_height()
        .await
        .context("get current block height")?;

    let from_block = match job.from_block() {
        Some(from_block) => Some(from_block),
        None => storage
            .get_wallet(&job.wallet_address, owner_user_id)
            .await
            .context("get wallet")?
            .map(|wallet| wallet.synced_block_height)
            .filter(|height| *height > 0),
    };
    debug!(
        job_id:% = job.id,
        from_block:?,
        tip;
        "starting wallet sync"
    );

    let mut processed = 0u64;
    let mut errors = 0u64;
    let mut batch = Vec::new();
    let mut highest_seen: Option<u64> = None;
    let mut net_ada_sum = 0i128;

    let pages = indexer.transaction_hashes(job.wallet_address.clone(), from_block);
    let mut pages = pin!(pages);

    while let Some(page) = pages.next().await {
        let page = page
            .map_err(anyhow::Error::new)
            .context("get next page of transaction hashes")?;

        if cancellation.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        for tx_ref in page {
            if cancellation.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            match indexer.fetch_transaction(&tx_ref.hash).await {
                Ok(raw) => {
                    if let Some(transaction) = parser.parse(&raw, &wallet, owner_user_id).await {
                        highest_seen = Some(highest_seen.unwrap_or_default().max(raw.block_height));
                        net_ada_sum += transaction.net_ada_change;
                        batch.push(transaction);
                    }
                }

                // One bad transaction must not fail the whole job.
                Err(error) => {
                    errors += 1;
                    debug!(hash:% = tx_ref.hash, error:%; "cannot fetch transaction, skipping");
                }
            }

            if batch.len() >= config.batch_size {
                flush(storage, &mut batch, &mut processed, errors, job.id).await?;
            }

            sleep(config.detail_throttle).await;
        }
    }

    if !batch.is_empty() {
        flush(storage, &mut batch, &mut processed, errors, job.id).await?;
    }

    // Authoritative balance from the indexer; a failure here must not fail
    // the sync.
    let balance = match indexer.fetch_address_balance(&job.wallet_address).await {
        Ok(balance) => Some(balance),
        Err(error) => {
            warn!(wallet_address:% = job.wallet_address, error:%; "cannot fetch balance, skipping");
            None
        }
    };
    debug!(
        wallet_address:% = job.wallet_address,
        net_ada_sum:% = net_ada_sum,
        balance:?;
        "balance consistency probe"
    );

    let synced_block_height = highest_seen
        .map(|height| height.min(tip))
        .unwrap_or(tip);
    storage
        .update_sync_cursor(&job.wallet_address, owner_user_id, synced_block_height, balance)
        .await
        .context("update wallet sync cursor")?;

    Ok(SyncOutcome {
        processed,
        errors,
        tip,
    })
}

async fn flush<S>(
    storage: &S,
    batch: &mut Vec<crate::domain::WalletTransaction>,
    processed: &mut u64,
    errors: u64,
    job_id: Uuid,
) -> Result<(), SyncError>
where
    S: TransactionStore + crate::domain::JobStore,
{
    let outcome = storage
        .save_batch(batch)
        .await
        .context("save transaction batch")?;
    *processed += batch.len() as u64;
    batch.clear();

    transactions_saved(outcome.inserted as u64);
    transactions_skipped(outcome.skipped as u64);

    // Progress is advisory; never fail the job over it.
    if let Err(error) = storage.update_progress(job_id, *processed, errors).await {
        debug!(job_id:%, error:%; "cannot update job progress");
    }

    Ok(())
}

/// Evict the wallet and transaction snapshots of a freshly synced wallet.
/// Best-effort: the cache is advisory.
async fn evict_wallet_cache<C>(cache: &C, address: &WalletAddress)
where
    C: KvCache,
{
    if let Err(error) = cache.delete(&format!("wallet:{address}")).await {
        debug!(wallet_address:% = address, error:%; "cannot evict wallet cache entry");
    }
    if let Err(error) = cache.delete_prefix(&format!("tx:{address}:")).await {
        debug!(wallet_address:% = address, error:%; "cannot evict transaction cache entries");
    }
}

/// Periodically reset stalled claims, prune terminal jobs and export queue
/// statistics.
async fn janitor<S>(config: Config, storage: S) -> anyhow::Result<()>
where
    S: crate::domain::JobStore,
{
    let mut ticker = interval(config.janitor_interval);

    loop {
        ticker.tick().await;

        match storage.reset_stuck(config.stuck_threshold).await {
            Ok(0) => {}
            Ok(reset) => warn!(reset; "stalled jobs reset to pending"),
            Err(error) => warn!(error:%; "cannot reset stalled jobs"),
        }

        match storage.cleanup(config.job_retention).await {
            Ok(0) => {}
            Ok(deleted) => debug!(deleted; "terminal jobs cleaned up"),
            Err(error) => warn!(error:%; "cannot clean up terminal jobs"),
        }

        match storage.statistics().await {
            Ok(statistics) => queue_depth(&statistics),
            Err(error) => warn!(error:%; "cannot read queue statistics"),
        }
    }
}

/// Cooperative cancellation: a background poller flips the flag once the job
/// row turns cancelled; the sync loop checks it at page and hash boundaries.
struct CancellationWatcher {
    cancelled: watch::Receiver<bool>,
    poller: JoinHandle<()>,
}

impl CancellationWatcher {
    fn spawn<S>(storage: S, job_id: Uuid, poll_interval: Duration) -> Self
    where
        S: crate::domain::JobStore,
    {
        let (sender, receiver) = watch::channel(false);

        let poller = task::spawn(async move {
            let mut ticker = interval(poll_interval);
            loop {
                ticker.tick().await;
                match storage.get(job_id).await {
                    Ok(Some(job)) if job.status == JobStatus::Cancelled => {
                        let _ = sender.send(true);
                        break;
                    }
                    Ok(_) => {}
                    Err(error) => debug!(job_id:%, error:%; "cannot poll job status"),
                }
            }
        });

        Self {
            cancelled: receiver,
            poller,
        }
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }
}

impl Drop for CancellationWatcher {
    fn drop(&mut self) {
        self.poller.abort();
    }
}

fn batch_size_default() -> usize {
    50
}

fn poll_interval_default() -> Duration {
    Duration::from_secs(5)
}

fn detail_throttle_default() -> Duration {
    Duration::from_millis(50)
}

fn cancel_poll_interval_default() -> Duration {
    Duration::from_secs(2)
}

fn janitor_interval_default() -> Duration {
    Duration::from_secs(60)
}

fn stuck_threshold_default() -> Duration {
    Duration::from_secs(30 * 60)
}

fn job_retention_default() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

fn max_retries_default() -> i32 {
    3
}

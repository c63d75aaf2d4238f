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

use serde::Serialize;
use serde_json::json;
use sqlx::{Type, types::time::OffsetDateTime};
use std::time::Duration;
use sync_common::domain::{AddressError, StakeAddress, WalletAddress, validate_payment_address};
use thiserror::Error;
use uuid::Uuid;

/// Job type of wallet history syncs, the only one the worker claims.
pub const WALLET_SYNC_JOB: &str = "wallet_sync";

pub const DEFAULT_PRIORITY: i32 = 5;

/// Ceiling for the exponential retry backoff.
const BACKOFF_CAP: Duration = Duration::from_secs(60 * 60);

/// Lifecycle states of a sync job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Type)]
#[sqlx(type_name = "SYNC_JOB_STATUS", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Pending or processing; at most one such job may exist per wallet.
    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Processing)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// One row of the durable job queue.
#[derive(Debug, Clone)]
pub struct SyncJob {
    pub id: Uuid,
    pub wallet_address: WalletAddress,
    pub user_id: Option<Uuid>,
    pub job_type: String,
    pub status: JobStatus,
    pub priority: i32,
    pub retry_count: i32,
    pub max_retries: i32,
    pub scheduled_at: OffsetDateTime,
    pub started_at: Option<OffsetDateTime>,
    pub completed_at: Option<OffsetDateTime>,
    pub error_message: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: OffsetDateTime,
}

impl SyncJob {
    /// Explicit sync cursor override carried in the job metadata.
    pub fn from_block(&self) -> Option<u64> {
        self.metadata.get("from_block").and_then(|value| value.as_u64())
    }

    /// Stake address of the wallet, if the enqueuing caller knew it.
    pub fn stake_address(&self) -> Option<StakeAddress> {
        self.metadata
            .get("stake_address")
            .and_then(|value| value.as_str())
            .map(StakeAddress::from)
    }

    /// Progress counters written by the worker at batch boundaries.
    pub fn progress(&self) -> Option<JobProgress> {
        let processed = self.metadata.get("processed")?.as_u64()?;
        let errors = self
            .metadata
            .get("errors")
            .and_then(|value| value.as_u64())
            .unwrap_or_default();

        Some(JobProgress { processed, errors })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobProgress {
    pub processed: u64,
    pub errors: u64,
}

/// Parameters of a job to be enqueued.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub wallet_address: WalletAddress,
    pub user_id: Option<Uuid>,
    pub job_type: String,
    pub priority: i32,
    pub max_retries: i32,
    pub metadata: serde_json::Value,
}

/// Result of an enqueue: the active job for the wallet plus whether this
/// call created it.
#[derive(Debug, Clone)]
pub struct EnqueueOutcome {
    pub job: SyncJob,
    pub created: bool,
}

/// The four scalar queue counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobStatistics {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Delay before the next attempt of a failed job: two to the power of the
/// (already incremented) retry count in minutes, capped.
pub fn backoff_delay(retry_count: i32) -> Duration {
    let exponent = retry_count.clamp(0, 16) as u32;
    let minutes = 1u64 << exponent;

    Duration::from_secs(minutes * 60).min(BACKOFF_CAP)
}

/// Durable job queue store.
#[trait_variant::make(Send)]
pub trait JobStore
where
    Self: Clone + Send + Sync + 'static,
{
    /// Insert a new pending job unless the wallet already has an active one,
    /// in which case the existing job is returned untouched.
    async fn enqueue(&self, job: NewJob) -> Result<EnqueueOutcome, sqlx::Error>;

    /// Atomically claim the highest-priority, oldest-scheduled due pending
    /// job. `None` means nothing is due or another worker won the claim;
    /// callers just poll again.
    async fn claim_next(&self, job_type: &str) -> Result<Option<SyncJob>, sqlx::Error>;

    /// Mark a processing job completed and store its result. A no-op if the
    /// job was cancelled meanwhile.
    async fn complete(&self, id: Uuid, result: serde_json::Value) -> Result<(), sqlx::Error>;

    /// Fail a processing job: reschedule with backoff while retries remain
    /// and the failure is retryable, otherwise transition to failed.
    async fn fail(&self, id: Uuid, error_message: &str, retryable: bool)
    -> Result<(), sqlx::Error>;

    /// Cancel a pending or processing job; returns whether a transition
    /// happened.
    async fn cancel(&self, id: Uuid) -> Result<bool, sqlx::Error>;

    /// Move jobs stuck in processing back to pending; returns how many.
    async fn reset_stuck(&self, stuck_after: Duration) -> Result<u64, sqlx::Error>;

    /// Delete terminal jobs older than the given retention; returns how many.
    async fn cleanup(&self, older_than: Duration) -> Result<u64, sqlx::Error>;

    async fn statistics(&self) -> Result<JobStatistics, sqlx::Error>;

    async fn get(&self, id: Uuid) -> Result<Option<SyncJob>, sqlx::Error>;

    async fn get_by_wallet(
        &self,
        wallet_address: &WalletAddress,
        limit: i64,
    ) -> Result<Vec<SyncJob>, sqlx::Error>;

    /// Merge progress counters into the job metadata.
    async fn update_progress(&self, id: Uuid, processed: u64, errors: u64)
    -> Result<(), sqlx::Error>;
}

/// Facade for the HTTP adapter: enqueue with validation plus job reads.
#[derive(Debug, Clone)]
pub struct JobService<S> {
    store: S,
    max_retries: i32,
}

impl<S> JobService<S>
where
    S: JobStore,
{
    pub fn new(store: S, max_retries: i32) -> Self {
        Self { store, max_retries }
    }

    /// Enqueue a wallet sync. A malformed address is rejected without
    /// creating a job; an already active job for the wallet is returned
    /// as-is.
    pub async fn enqueue_wallet_sync(
        &self,
        wallet_address: &str,
        user_id: Uuid,
        from_block: Option<u64>,
    ) -> Result<EnqueueOutcome, EnqueueError> {
        validate_payment_address(wallet_address)?;

        let metadata = match from_block {
            Some(from_block) => json!({ "from_block": from_block }),
            None => json!({}),
        };

        let outcome = self
            .store
            .enqueue(NewJob {
                wallet_address: WalletAddress::from(wallet_address),
                user_id: Some(user_id),
                job_type: WALLET_SYNC_JOB.to_string(),
                priority: DEFAULT_PRIORITY,
                max_retries: self.max_retries,
                metadata,
            })
            .await?;

        Ok(outcome)
    }

    pub async fn job(&self, id: Uuid) -> Result<Option<JobSummary>, sqlx::Error> {
        let job = self.store.get(id).await?;
        Ok(job.map(JobSummary::from))
    }

    pub async fn jobs_by_wallet(
        &self,
        wallet_address: &WalletAddress,
    ) -> Result<Vec<JobSummary>, sqlx::Error> {
        let jobs = self.store.get_by_wallet(wallet_address, 20).await?;
        Ok(jobs.into_iter().map(JobSummary::from).collect())
    }

    pub async fn cancel_job(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        self.store.cancel(id).await
    }
}

/// Job view served to the API layer.
#[derive(Debug, Clone)]
pub struct JobSummary {
    pub id: Uuid,
    pub status: JobStatus,
    pub progress: Option<JobProgress>,
    pub created_at: OffsetDateTime,
    pub started_at: Option<OffsetDateTime>,
    pub completed_at: Option<OffsetDateTime>,
    pub error_message: Option<String>,
    pub retry_count: i32,
}

impl From<SyncJob> for JobSummary {
    fn from(job: SyncJob) -> Self {
        let progress = job.progress();

        Self {
            id: job.id,
            status: job.status,
            progress,
            created_at: job.created_at,
            started_at: job.started_at,
            completed_at: job.completed_at,
            error_message: job.error_message,
            retry_count: job.retry_count,
        }
    }
}

#[derive(Debug, Error)]
pub enum EnqueueError {
    #[error("invalid wallet address")]
    InvalidAddress(#[from] AddressError),

    #[error("cannot enqueue job")]
    Store(#[from] sqlx::Error),
}

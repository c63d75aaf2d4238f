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

use crate::{
    domain::{
        EnqueueOutcome, JobStatistics, JobStatus, JobStore, NewJob, SyncJob, backoff_delay,
    },
    infra::storage::Storage,
};
use fastrace::trace;
use futures::TryStreamExt;
use indoc::indoc;
use sqlx::{
    Row,
    postgres::PgRow,
    types::{Json, time::OffsetDateTime},
};
use std::time::Duration;
use sync_common::domain::WalletAddress;
use uuid::Uuid;

impl JobStore for Storage {
    #[trace]
    async fn enqueue(&self, job: NewJob) -> Result<EnqueueOutcome, sqlx::Error> {
        let insert = indoc! {"
            INSERT INTO sync_jobs (
                id,
                wallet_address,
                user_id,
                job_type,
                priority,
                max_retries,
                metadata
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (wallet_address) WHERE status IN ('pending', 'processing')
            DO NOTHING
            RETURNING *
        "};

        let select_active = indoc! {"
            SELECT *
            FROM sync_jobs
            WHERE wallet_address = $1
            AND status IN ('pending', 'processing')
            LIMIT 1
        "};

        // The partial unique index makes at-most-one-active a hard
        // constraint. Losing the race against a terminal transition between
        // the two statements just loops once more.
        loop {
            let created = sqlx::query(insert)
                .bind(Uuid::now_v7())
                .bind(job.wallet_address.as_str())
                .bind(job.user_id)
                .bind(&job.job_type)
                .bind(job.priority)
                .bind(job.max_retries)
                .bind(Json(&job.metadata))
                .fetch_optional(&*self.pool)
                .await?;

            if let Some(row) = created {
                return Ok(EnqueueOutcome {
                    job: job_from_row(row)?,
                    created: true,
                });
            }

            let existing = sqlx::query(select_active)
                .bind(job.wallet_address.as_str())
                .fetch_optional(&*self.pool)
                .await?;

            if let Some(row) = existing {
                return Ok(EnqueueOutcome {
                    job: job_from_row(row)?,
                    created: false,
                });
            }
        }
    }

    #[trace]
    async fn claim_next(&self, job_type: &str) -> Result<Option<SyncJob>, sqlx::Error> {
        let select = indoc! {"
            SELECT id
            FROM sync_jobs
            WHERE status = 'pending'
            AND job_type = $1
            AND scheduled_at <= now()
            ORDER BY priority DESC, scheduled_at ASC
            LIMIT 1
        "};

        let candidate = sqlx::query_scalar::<_, Uuid>(select)
            .bind(job_type)
            .fetch_optional(&*self.pool)
            .await?;

        let Some(id) = candidate else {
            return Ok(None);
        };

        // Conditional claim: zero rows means another worker won; the caller
        // simply polls again.
        let claim = indoc! {"
            UPDATE sync_jobs
            SET status = 'processing', started_at = now()
            WHERE id = $1
            AND status = 'pending'
            RETURNING *
        "};

        sqlx::query(claim)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await?
            .map(job_from_row)
            .transpose()
    }

    #[trace]
    async fn complete(&self, id: Uuid, result: serde_json::Value) -> Result<(), sqlx::Error> {
        // Guarded on processing: completing a job cancelled mid-flight is a
        // no-op.
        let query = indoc! {"
            UPDATE sync_jobs
            SET status = 'completed',
                completed_at = now(),
                error_message = NULL,
                metadata = metadata || jsonb_build_object('result', $2::jsonb)
            WHERE id = $1
            AND status = 'processing'
        "};

        sqlx::query(query)
            .bind(id)
            .bind(Json(result))
            .execute(&*self.pool)
            .await?;

        Ok(())
    }

    #[trace]
    async fn fail(
        &self,
        id: Uuid,
        error_message: &str,
        retryable: bool,
    ) -> Result<(), sqlx::Error> {
        let select = indoc! {"
            SELECT retry_count, max_retries
            FROM sync_jobs
            WHERE id = $1
            AND status = 'processing'
        "};

        let Some((retry_count, max_retries)) = sqlx::query_as::<_, (i32, i32)>(select)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await?
        else {
            return Ok(());
        };

        if retryable && retry_count < max_retries {
            let retry_count = retry_count + 1;
            let scheduled_at = OffsetDateTime::now_utc() + backoff_delay(retry_count);

            let query = indoc! {"
                UPDATE sync_jobs
                SET status = 'pending',
                    retry_count = $2,
                    scheduled_at = $3,
                    error_message = $4,
                    started_at = NULL,
                    completed_at = NULL
                WHERE id = $1
                AND status = 'processing'
            "};

            sqlx::query(query)
                .bind(id)
                .bind(retry_count)
                .bind(scheduled_at)
                .bind(error_message)
                .execute(&*self.pool)
                .await?;
        } else {
            let query = indoc! {"
                UPDATE sync_jobs
                SET status = 'failed',
                    completed_at = now(),
                    error_message = $2
                WHERE id = $1
                AND status = 'processing'
            "};

            sqlx::query(query)
                .bind(id)
                .bind(error_message)
                .execute(&*self.pool)
                .await?;
        }

        Ok(())
    }

    #[trace]
    async fn cancel(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let query = indoc! {"
            UPDATE sync_jobs
            SET status = 'cancelled', completed_at = now()
            WHERE id = $1
            AND status IN ('pending', 'processing')
        "};

        let result = sqlx::query(query).bind(id).execute(&*self.pool).await?;

        Ok(result.rows_affected() > 0)
    }

    #[trace]
    async fn reset_stuck(&self, stuck_after: Duration) -> Result<u64, sqlx::Error> {
        let query = indoc! {"
            UPDATE sync_jobs
            SET status = 'pending',
                started_at = NULL,
                error_message = 'reset due to timeout'
            WHERE status = 'processing'
            AND started_at < $1
        "};

        let threshold = OffsetDateTime::now_utc() - stuck_after;
        let result = sqlx::query(query)
            .bind(threshold)
            .execute(&*self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[trace]
    async fn cleanup(&self, older_than: Duration) -> Result<u64, sqlx::Error> {
        let query = indoc! {"
            DELETE FROM sync_jobs
            WHERE status IN ('completed', 'failed', 'cancelled')
            AND created_at < $1
        "};

        let threshold = OffsetDateTime::now_utc() - older_than;
        let result = sqlx::query(query)
            .bind(threshold)
            .execute(&*self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    #[trace]
    async fn statistics(&self) -> Result<JobStatistics, sqlx::Error> {
        let query = indoc! {"
            SELECT status, count(*)
            FROM sync_jobs
            GROUP BY status
        "};

        let counts = sqlx::query_as::<_, (JobStatus, i64)>(query)
            .fetch_all(&*self.pool)
            .await?;

        let mut statistics = JobStatistics::default();
        for (status, count) in counts {
            match status {
                JobStatus::Pending => statistics.pending = count as u64,
                JobStatus::Processing => statistics.processing = count as u64,
                JobStatus::Completed => statistics.completed = count as u64,
                JobStatus::Failed => statistics.failed = count as u64,
                JobStatus::Cancelled => {}
            }
        }

        Ok(statistics)
    }

    #[trace]
    async fn get(&self, id: Uuid) -> Result<Option<SyncJob>, sqlx::Error> {
        let query = indoc! {"
            SELECT *
            FROM sync_jobs
            WHERE id = $1
        "};

        sqlx::query(query)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await?
            .map(job_from_row)
            .transpose()
    }

    #[trace]
    async fn get_by_wallet(
        &self,
        wallet_address: &WalletAddress,
        limit: i64,
    ) -> Result<Vec<SyncJob>, sqlx::Error> {
        let query = indoc! {"
            SELECT *
            FROM sync_jobs
            WHERE wallet_address = $1
            ORDER BY created_at DESC
            LIMIT $2
        "};

        sqlx::query(query)
            .bind(wallet_address.as_str())
            .bind(limit)
            .fetch(&*self.pool)
            .map_ok(job_from_row)
            .try_collect::<Vec<_>>()
            .await?
            .into_iter()
            .collect()
    }

    #[trace]
    async fn update_progress(
        &self,
        id: Uuid,
        processed: u64,
        errors: u64,
    ) -> Result<(), sqlx::Error> {
        let query = indoc! {"
            UPDATE sync_jobs
            SET metadata = metadata
                || jsonb_build_object('processed', $2::bigint, 'errors', $3::bigint)
            WHERE id = $1
        "};

        sqlx::query(query)
            .bind(id)
            .bind(processed as i64)
            .bind(errors as i64)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }
}

fn job_from_row(row: PgRow) -> Result<SyncJob, sqlx::Error> {
    Ok(SyncJob {
        id: row.try_get("id")?,
        wallet_address: WalletAddress::from(row.try_get::<String, _>("wallet_address")?),
        user_id: row.try_get("user_id")?,
        job_type: row.try_get("job_type")?,
        status: row.try_get("status")?,
        priority: row.try_get("priority")?,
        retry_count: row.try_get("retry_count")?,
        max_retries: row.try_get("max_retries")?,
        scheduled_at: row.try_get("scheduled_at")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        error_message: row.try_get("error_message")?,
        metadata: row
            .try_get::<Json<serde_json::Value>, _>("metadata")?
            .0,
        created_at: row.try_get("created_at")?,
    })
}

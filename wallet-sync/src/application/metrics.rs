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

use crate::domain::JobStatistics;
use metrics::{counter, gauge};

pub fn job_completed() {
    counter!("wallet_sync_jobs_completed_total").increment(1);
}

pub fn job_failed() {
    counter!("wallet_sync_jobs_failed_total").increment(1);
}

pub fn transactions_saved(count: u64) {
    counter!("wallet_sync_transactions_saved_total").increment(count);
}

pub fn transactions_skipped(count: u64) {
    counter!("wallet_sync_transactions_skipped_total").increment(count);
}

pub fn queue_depth(statistics: &JobStatistics) {
    gauge!("wallet_sync_jobs", "status" => "pending").set(statistics.pending as f64);
    gauge!("wallet_sync_jobs", "status" => "processing").set(statistics.processing as f64);
    gauge!("wallet_sync_jobs", "status" => "completed").set(statistics.completed as f64);
    gauge!("wallet_sync_jobs", "status" => "failed").set(statistics.failed as f64);
}

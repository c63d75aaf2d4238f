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

pub mod indexer;
pub mod storage;

use crate::infra::indexer::blockfrost;
use serde::Deserialize;
use sync_common::infra::{cache::nats, pool::postgres};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(rename = "indexer")]
    pub indexer_config: blockfrost::Config,

    #[serde(rename = "storage")]
    pub storage_config: postgres::Config,

    #[serde(rename = "cache", default)]
    pub cache_config: Option<nats::Config>,
}

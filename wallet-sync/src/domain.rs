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

mod categorizer;
mod chain;
mod flow;
mod job;
mod parser;
mod registry;
mod transaction;

pub use categorizer::*;
pub use chain::*;
pub use flow::*;
pub use job::*;
pub use parser::*;
pub use registry::*;
pub use transaction::*;

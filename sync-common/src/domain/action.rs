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

use serde::{Deserialize, Serialize};
use sqlx::Type;
use std::fmt::{self, Display};

/// Semantic label for what a wallet did in one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "WALLET_ACTION", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Send,
    Receive,
    Swap,
    Supply,
    Withdraw,
    Stake,
    ClaimRewards,
    Unknown,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Send => "send",
            Action::Receive => "receive",
            Action::Swap => "swap",
            Action::Supply => "supply",
            Action::Withdraw => "withdraw",
            Action::Stake => "stake",
            Action::ClaimRewards => "claim_rewards",
            Action::Unknown => "unknown",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DeFi protocol touched by a transaction, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "DEFI_PROTOCOL", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    Minswap,
    Liqwid,
    Sundaeswap,
    Unknown,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Minswap => "minswap",
            Protocol::Liqwid => "liqwid",
            Protocol::Sundaeswap => "sundaeswap",
            Protocol::Unknown => "unknown",
        }
    }

    /// Name used in human-readable descriptions.
    pub fn display_name(&self) -> &'static str {
        match self {
            Protocol::Minswap => "Minswap",
            Protocol::Liqwid => "Liqwid",
            Protocol::Sundaeswap => "SundaeSwap",
            Protocol::Unknown => "Unknown",
        }
    }
}

impl Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

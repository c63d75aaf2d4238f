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

use crate::domain::{
    AssetFlow, Categorization, Categorizer, Context, RawTransaction, TokenRegistry,
    WalletTransaction, WalletView, flow, indexer::ChainIndexer, storage::TokenStore,
};
use itertools::Itertools;
use sync_common::domain::{Action, KvCache, Protocol, TokenInfo};
use uuid::Uuid;

/// Composes wallet filtering, flow calculation, token enrichment and
/// categorization into a persistable wallet transaction.
pub struct TransactionParser<S, C, I> {
    registry: TokenRegistry<S, C, I>,
    categorizer: Categorizer,
}

impl<S, C, I> TransactionParser<S, C, I>
where
    S: TokenStore,
    C: KvCache,
    I: ChainIndexer,
{
    pub fn new(registry: TokenRegistry<S, C, I>) -> Self {
        Self {
            registry,
            categorizer: Categorizer::new(),
        }
    }

    /// Parse a raw transaction for the given wallet. Returns `None` exactly
    /// when the transaction does not touch the wallet; enrichment failures
    /// degrade to synthetic tokens and never fail the parse.
    pub async fn parse(
        &self,
        raw: &RawTransaction,
        wallet: &WalletView,
        owner_user_id: Uuid,
    ) -> Option<WalletTransaction> {
        let filter = flow::filter_for_wallet(raw, wallet);
        if !filter.is_relevant {
            return None;
        }

        let mut flows = flow::calculate_flows(&filter.inputs, &filter.outputs);

        let units = flows.iter().map(|flow| flow.unit.clone()).collect::<Vec<_>>();
        let tokens = self.registry.get_many(&units).await;
        for flow in &mut flows {
            flow.token = tokens.get(&flow.unit).cloned();
        }

        self.report_discoveries(raw, &flows);

        let categorization = self.categorizer.categorize(&Context {
            tx: raw,
            flows: &flows,
            wallet,
        });
        let net_ada_change = flow::net_ada_change(&flows);
        let description = describe(&categorization, &flows, net_ada_change);

        Some(WalletTransaction {
            owner_user_id,
            wallet_address: wallet.address.clone(),
            tx_hash: raw.hash.clone(),
            block_height: raw.block_height,
            timestamp: raw.block_time,
            action: categorization.action,
            protocol: categorization.protocol,
            description,
            net_ada_change,
            fees: raw.fees,
            asset_flows: flows,
        })
    }

    /// Surface tokens that look like an unregistered protocol marker: empty
    /// asset name, script outputs involved, ADA moving alongside.
    fn report_discoveries(&self, raw: &RawTransaction, flows: &[AssetFlow]) {
        let script_outputs = raw
            .outputs
            .iter()
            .filter(|output| output.datum_hash.is_some())
            .count();
        if script_outputs < 2 || flow::net_ada_change(flows) == 0 {
            return;
        }

        for flow in flows {
            if !flow.unit.is_lovelace() && flow.unit.asset_name_hex().is_empty() {
                self.registry
                    .register_discovered_token(&flow.unit, "nameless asset in script transaction");
            }
        }
    }
}

/// Deterministic human-readable description of a categorized transaction.
fn describe(categorization: &Categorization, flows: &[AssetFlow], net_ada_change: i128) -> String {
    let via = match categorization.protocol {
        Protocol::Unknown => String::new(),
        protocol => format!(" via {}", protocol.display_name()),
    };

    match categorization.action {
        Action::Receive => format!("Receive {}", flows_summary(flows, true, false)),
        Action::Send => format!("Send {}", flows_summary(flows, false, false)),
        Action::Swap => format!(
            "Swap {} for {}{via}",
            flows_summary(flows, false, true),
            flows_summary(flows, true, true),
        ),
        Action::Supply => format!(
            "Supply {} to {}",
            flows_summary(flows, false, true),
            categorization.protocol.display_name(),
        ),
        Action::Withdraw => format!(
            "Withdraw {} from {}",
            flows_summary(flows, true, true),
            categorization.protocol.display_name(),
        ),
        Action::Stake => "Stake delegation".to_string(),
        Action::ClaimRewards => {
            format!("Claim {} ADA rewards", format_units(net_ada_change.unsigned_abs(), 6))
        }
        Action::Unknown => {
            if via.is_empty() {
                "Transaction".to_string()
            } else {
                format!("Transaction{via}")
            }
        }
    }
}

/// Summarize flows moving in one direction, e.g. "10 ADA" or "4.2 MIN".
/// `gross` switches from the net movement to the full in/out amount, which
/// reads better for swaps and market operations.
fn flows_summary(flows: &[AssetFlow], incoming: bool, gross: bool) -> String {
    let parts = flows
        .iter()
        .filter(|flow| if incoming { flow.net > 0 } else { flow.net < 0 })
        .map(|flow| {
            let token = flow
                .token
                .clone()
                .unwrap_or_else(|| fallback_token(&flow.unit));
            let amount = match (gross, incoming) {
                (true, true) => flow.amount_in,
                (true, false) => flow.amount_out,
                (false, _) => flow.net.unsigned_abs(),
            };
            format!("{} {}", format_units(amount, token.decimals), token.symbol())
        })
        .collect::<Vec<_>>();

    if parts.is_empty() {
        "nothing".to_string()
    } else {
        parts.iter().join(" and ")
    }
}

fn fallback_token(unit: &sync_common::domain::AssetUnit) -> TokenInfo {
    if unit.is_lovelace() {
        TokenInfo::native()
    } else {
        TokenInfo::synthetic(unit)
    }
}

/// Format a base-unit amount with the given decimals, trimming trailing
/// zeros: 4_200_000 at 6 decimals renders as "4.2".
fn format_units(amount: u128, decimals: u32) -> String {
    if decimals == 0 {
        return amount.to_string();
    }

    let divisor = 10u128.pow(decimals);
    let whole = amount / divisor;
    let fraction = amount % divisor;

    if fraction == 0 {
        whole.to_string()
    } else {
        let fraction = format!("{fraction:0width$}", width = decimals as usize);
        format!("{whole}.{}", fraction.trim_end_matches('0'))
    }
}

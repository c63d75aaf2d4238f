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

use sync_common::domain::{AssetUnit, StakeAddress, TxHash, WalletAddress};

/// Reference to a transaction as listed by the indexer's address history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRef {
    pub hash: TxHash,
    pub block_height: u64,
}

/// One asset and its quantity in base units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetAmount {
    pub unit: AssetUnit,
    pub quantity: u128,
}

/// Consumed UTxO of a transaction. Collateral and reference inputs are
/// excluded at the client boundary; an input may still lack a payment
/// address (e.g. Byron-era scripts), in which case it never matches a
/// wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    pub address: Option<WalletAddress>,
    pub amounts: Vec<AssetAmount>,
    pub ref_tx_hash: TxHash,
    pub output_index: u32,
    pub datum_hash: Option<String>,
    pub script_hash: Option<String>,
}

/// Produced UTxO of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub address: WalletAddress,
    pub amounts: Vec<AssetAmount>,
    pub datum_hash: Option<String>,
}

/// Stake reward withdrawal of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub stake_address: StakeAddress,
    pub amount: u128,
}

/// Fully hydrated transaction as fetched from the indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTransaction {
    pub hash: TxHash,
    pub block_hash: String,
    pub block_height: u64,
    pub block_time: i64,
    pub slot: u64,
    pub fees: u128,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub withdrawals: Vec<Withdrawal>,
    pub delegation_count: u32,
    pub stake_cert_count: u32,
}

/// Unspent output of an address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressUtxo {
    pub tx_hash: TxHash,
    pub output_index: u32,
    pub amounts: Vec<AssetAmount>,
}

/// The wallet a sync works on: its payment address plus the optionally known
/// stake address (stake derivation is address-codec work owned by the caller).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletView {
    pub address: WalletAddress,
    pub stake_address: Option<StakeAddress>,
}

impl WalletView {
    pub fn new(address: WalletAddress) -> Self {
        Self {
            address,
            stake_address: None,
        }
    }

    pub fn owns_stake(&self, stake_address: &StakeAddress) -> bool {
        self.stake_address.as_ref() == Some(stake_address)
    }
}

/// Truncate one descending-order page of an incremental listing at the sync
/// cursor: keep only entries strictly above `from_block` and report whether
/// the cursor was reached, i.e. whether pagination must stop.
pub fn truncate_at_cursor(page: Vec<TxRef>, from_block: u64) -> (Vec<TxRef>, bool) {
    let reached = page.iter().any(|tx| tx.block_height <= from_block);
    let page = page
        .into_iter()
        .filter(|tx| tx.block_height > from_block)
        .collect();

    (page, reached)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx_ref(height: u64) -> TxRef {
        TxRef {
            hash: TxHash::from(format!("tx-{height}")),
            block_height: height,
        }
    }

    #[test]
    fn test_truncate_at_cursor_above() {
        let page = vec![tx_ref(140), tx_ref(130), tx_ref(120)];
        let (kept, reached) = truncate_at_cursor(page.clone(), 100);
        assert_eq!(kept, page);
        assert!(!reached);
    }

    #[test]
    fn test_truncate_at_cursor_reached() {
        let page = vec![tx_ref(102), tx_ref(98), tx_ref(95)];
        let (kept, reached) = truncate_at_cursor(page, 100);
        assert_eq!(kept, vec![tx_ref(102)]);
        assert!(reached);
    }

    #[test]
    fn test_truncate_at_cursor_boundary() {
        // An entry exactly at the cursor stops pagination and is not yielded.
        let page = vec![tx_ref(100)];
        let (kept, reached) = truncate_at_cursor(page, 100);
        assert!(kept.is_empty());
        assert!(reached);
    }
}

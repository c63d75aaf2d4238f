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

use crate::domain::{AddressUtxo, RawTransaction, TxRef};
use futures::Stream;
use std::{collections::HashMap, error::Error as StdError};
use sync_common::domain::{AssetUnit, TokenInfo, TxHash, WalletAddress};

/// Chain indexer abstraction.
#[trait_variant::make(Send)]
pub trait ChainIndexer
where
    Self: Clone + Send + Sync + 'static,
{
    type Error: StdError + Send + Sync + 'static;

    /// A finite stream of pages of transaction references for the given
    /// address. Without `from_block` the full history is listed in ascending
    /// block order. With `from_block` greater than zero, pages come in
    /// descending order and the stream ends at the first page containing any
    /// block at or below the cursor, yielding only the strictly greater
    /// entries of that page. The stream is not restartable; callers
    /// re-invoke.
    fn transaction_hashes(
        &self,
        address: WalletAddress,
        from_block: Option<u64>,
    ) -> impl Stream<Item = Result<Vec<TxRef>, Self::Error>> + Send;

    /// Fetch the full transaction: block data, fees, inputs/outputs without
    /// collateral, and stake withdrawals.
    async fn fetch_transaction(&self, hash: &TxHash) -> Result<RawTransaction, Self::Error>;

    /// The authoritative ADA balance of an address in base units. An unknown
    /// address yields zero, not an error.
    async fn fetch_address_balance(&self, address: &WalletAddress) -> Result<u128, Self::Error>;

    /// All unspent outputs of an address.
    async fn fetch_address_utxos(
        &self,
        address: &WalletAddress,
    ) -> Result<Vec<AddressUtxo>, Self::Error>;

    /// Height of the current chain tip.
    async fn current_block_height(&self) -> Result<u64, Self::Error>;

    /// Metadata for one asset unit; `None` when nothing is known upstream.
    /// `"lovelace"` always resolves to `None` without any I/O.
    async fn fetch_token_metadata(
        &self,
        unit: &AssetUnit,
    ) -> Result<Option<TokenInfo>, Self::Error>;

    /// Metadata for many asset units, processed in small sub-batches with a
    /// short delay in between to respect upstream rate limits. Units without
    /// metadata are absent from the result.
    async fn fetch_token_metadata_batch(
        &self,
        units: &[AssetUnit],
    ) -> Result<HashMap<AssetUnit, TokenInfo>, Self::Error>;
}

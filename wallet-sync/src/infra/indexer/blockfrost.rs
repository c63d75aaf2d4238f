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
    AddressUtxo, AssetAmount, RawTransaction, TxInput, TxOutput, TxRef, Withdrawal,
    indexer::ChainIndexer, marker_for_policy, truncate_at_cursor,
};
use async_stream::try_stream;
use futures::Stream;
use log::debug;
use reqwest::{
    Client as HttpClient, StatusCode,
    header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, de::DeserializeOwned};
use std::{collections::HashMap, sync::Arc, time::Duration};
use sync_common::domain::{
    AssetUnit, StakeAddress, TokenCategory, TokenInfo, TxHash, WalletAddress,
};
use thiserror::Error;
use tokio::time::sleep;

/// Blockfrost authenticates with this header.
const PROJECT_ID_HEADER: &str = "project_id";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub url: String,

    pub key: SecretString,

    #[serde(with = "humantime_serde", default = "timeout_default")]
    pub timeout: Duration,

    /// Server maximum is 100.
    #[serde(default = "page_size_default")]
    pub page_size: u32,

    #[serde(default = "metadata_batch_size_default")]
    pub metadata_batch_size: usize,

    #[serde(with = "humantime_serde", default = "metadata_batch_delay_default")]
    pub metadata_batch_delay: Duration,

    #[serde(default = "retry_attempts_default")]
    pub retry_attempts: u32,
}

/// [ChainIndexer] implementation over the Blockfrost HTTP API.
#[derive(Debug, Clone)]
pub struct BlockfrostClient {
    http: HttpClient,
    config: Arc<Config>,
}

impl BlockfrostClient {
    /// Create a new [BlockfrostClient] with the given [Config].
    pub fn new(config: Config) -> Result<Self, Error> {
        let mut key = HeaderValue::from_str(config.key.expose_secret())
            .map_err(|_| Error::InvalidApiKey)?;
        key.set_sensitive(true);
        let headers = HeaderMap::from_iter([(HeaderName::from_static(PROJECT_ID_HEADER), key)]);

        let http = HttpClient::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// GET a JSON endpoint with bounded retries on rate limits and server
    /// errors, honoring a `Retry-After` hint when present.
    async fn get_json<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, Error>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.config.url.trim_end_matches('/'), path);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let response = match self.http.get(&url).query(query).send().await {
                Ok(response) => response,
                Err(error) => {
                    if attempt < self.config.retry_attempts {
                        sleep(retry_pause(attempt, None)).await;
                        continue;
                    }
                    return Err(error.into());
                }
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response.json().await?);
            }
            if status == StatusCode::NOT_FOUND {
                return Err(Error::NotFound);
            }

            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok())
                .map(Duration::from_secs);

            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < self.config.retry_attempts {
                debug!(status:% = status, path, attempt; "retrying indexer call");
                sleep(retry_pause(attempt, retry_after)).await;
                continue;
            }

            return Err(Error::Status {
                status,
                endpoint: path.to_string(),
            });
        }
    }

    async fn fetch_single_token(&self, unit: &AssetUnit) -> Result<Option<TokenInfo>, Error> {
        if unit.is_lovelace() {
            return Ok(None);
        }

        let asset = match self
            .get_json::<AssetDetails>(&format!("assets/{}", unit.as_str()), &[])
            .await
        {
            Ok(asset) => asset,
            Err(Error::NotFound) => return Ok(None),
            Err(error) => return Err(error),
        };

        let metadata = asset.metadata.unwrap_or_default();
        let category = marker_for_policy(&asset.policy_id)
            .map(|marker| marker.category)
            .unwrap_or(TokenCategory::Fungible);

        Ok(Some(TokenInfo {
            unit: unit.clone(),
            policy_id: asset.policy_id,
            asset_name: asset.asset_name.unwrap_or_default(),
            name: metadata.name.or_else(|| unit.asset_name_utf8()),
            ticker: metadata.ticker,
            decimals: metadata.decimals.unwrap_or_default(),
            category,
            logo: metadata.logo,
            metadata: asset.onchain_metadata,
        }))
    }
}

impl ChainIndexer for BlockfrostClient {
    type Error = Error;

    fn transaction_hashes(
        &self,
        address: WalletAddress,
        from_block: Option<u64>,
    ) -> impl Stream<Item = Result<Vec<TxRef>, Self::Error>> + Send {
        let client = self.clone();
        let cursor = from_block.filter(|from_block| *from_block > 0);

        try_stream! {
            let path = format!("addresses/{}/transactions", address.as_str());
            let order = if cursor.is_some() { "desc" } else { "asc" };
            let page_size = client.config.page_size;
            let mut page = 1u32;

            loop {
                let query = [
                    ("page", page.to_string()),
                    ("count", page_size.to_string()),
                    ("order", order.to_string()),
                ];
                let entries = match client
                    .get_json::<Vec<AddressTransaction>>(&path, &query)
                    .await
                {
                    Ok(entries) => entries,
                    // Unknown address: an empty history, not an error.
                    Err(Error::NotFound) => break,
                    Err(error) => Err(error)?,
                };

                let full_page = entries.len() as u32 == page_size;
                let refs = entries
                    .into_iter()
                    .map(|entry| TxRef {
                        hash: TxHash::from(entry.tx_hash),
                        block_height: entry.block_height,
                    })
                    .collect::<Vec<_>>();

                match cursor {
                    Some(from_block) => {
                        let (kept, reached) = truncate_at_cursor(refs, from_block);
                        if !kept.is_empty() {
                            yield kept;
                        }
                        if reached || !full_page {
                            break;
                        }
                    }

                    None => {
                        if refs.is_empty() {
                            break;
                        }
                        yield refs;
                        if !full_page {
                            break;
                        }
                    }
                }

                page += 1;
            }
        }
    }

    async fn fetch_transaction(&self, hash: &TxHash) -> Result<RawTransaction, Self::Error> {
        let details = self
            .get_json::<TxDetails>(&format!("txs/{}", hash.as_str()), &[])
            .await?;
        let utxos = self
            .get_json::<TxUtxos>(&format!("txs/{}/utxos", hash.as_str()), &[])
            .await?;

        let withdrawals = if details.withdrawal_count > 0 {
            self.get_json::<Vec<TxWithdrawal>>(&format!("txs/{}/withdrawals", hash.as_str()), &[])
                .await?
                .into_iter()
                .map(|withdrawal| {
                    Ok(Withdrawal {
                        stake_address: StakeAddress::from(withdrawal.address),
                        amount: parse_quantity(&withdrawal.amount)?,
                    })
                })
                .collect::<Result<Vec<_>, Error>>()?
        } else {
            vec![]
        };

        let inputs = utxos
            .inputs
            .into_iter()
            .filter(|input| !input.collateral && !input.reference)
            .map(|input| {
                Ok(TxInput {
                    address: input.address.map(WalletAddress::from),
                    amounts: parse_amounts(input.amount)?,
                    ref_tx_hash: TxHash::from(input.tx_hash),
                    output_index: input.output_index,
                    datum_hash: input.data_hash,
                    script_hash: input.reference_script_hash,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let outputs = utxos
            .outputs
            .into_iter()
            .filter(|output| !output.collateral)
            .map(|output| {
                Ok(TxOutput {
                    address: WalletAddress::from(output.address),
                    amounts: parse_amounts(output.amount)?,
                    datum_hash: output.data_hash,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;

        Ok(RawTransaction {
            hash: TxHash::from(details.hash),
            block_hash: details.block,
            block_height: details.block_height,
            block_time: details.block_time,
            slot: details.slot,
            fees: parse_quantity(&details.fees)?,
            inputs,
            outputs,
            withdrawals,
            delegation_count: details.delegation_count,
            stake_cert_count: details.stake_cert_count,
        })
    }

    async fn fetch_address_balance(&self, address: &WalletAddress) -> Result<u128, Self::Error> {
        let info = match self
            .get_json::<AddressInfo>(&format!("addresses/{}", address.as_str()), &[])
            .await
        {
            Ok(info) => info,
            // Never-used address: zero balance, not an error.
            Err(Error::NotFound) => return Ok(0),
            Err(error) => return Err(error),
        };

        info.amount
            .iter()
            .find(|amount| amount.unit == sync_common::domain::LOVELACE)
            .map(|amount| parse_quantity(&amount.quantity))
            .unwrap_or(Ok(0))
    }

    async fn fetch_address_utxos(
        &self,
        address: &WalletAddress,
    ) -> Result<Vec<AddressUtxo>, Self::Error> {
        let utxos = match self
            .get_json::<Vec<AddressUtxoEntry>>(
                &format!("addresses/{}/utxos", address.as_str()),
                &[],
            )
            .await
        {
            Ok(utxos) => utxos,
            Err(Error::NotFound) => return Ok(vec![]),
            Err(error) => return Err(error),
        };

        utxos
            .into_iter()
            .map(|utxo| {
                Ok(AddressUtxo {
                    tx_hash: TxHash::from(utxo.tx_hash),
                    output_index: utxo.output_index,
                    amounts: parse_amounts(utxo.amount)?,
                })
            })
            .collect()
    }

    async fn current_block_height(&self) -> Result<u64, Self::Error> {
        let block = self.get_json::<LatestBlock>("blocks/latest", &[]).await?;
        Ok(block.height)
    }

    async fn fetch_token_metadata(
        &self,
        unit: &AssetUnit,
    ) -> Result<Option<TokenInfo>, Self::Error> {
        self.fetch_single_token(unit).await
    }

    async fn fetch_token_metadata_batch(
        &self,
        units: &[AssetUnit],
    ) -> Result<HashMap<AssetUnit, TokenInfo>, Self::Error> {
        let mut tokens = HashMap::new();

        for (i, chunk) in units.chunks(self.config.metadata_batch_size.max(1)).enumerate() {
            if i > 0 {
                sleep(self.config.metadata_batch_delay).await;
            }

            for unit in chunk {
                if let Some(token) = self.fetch_single_token(unit).await? {
                    tokens.insert(unit.clone(), token);
                }
            }
        }

        Ok(tokens)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("HTTP transport error")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {endpoint}")]
    Status { status: StatusCode, endpoint: String },

    #[error("resource not found")]
    NotFound,

    #[error("API key is not a valid header value")]
    InvalidApiKey,

    #[error("unexpected response shape: {0}")]
    UnexpectedResponse(String),
}

fn retry_pause(attempt: u32, retry_after: Option<Duration>) -> Duration {
    retry_after.unwrap_or_else(|| Duration::from_millis(250 * 2u64.pow(attempt.min(4))))
}

fn parse_quantity(quantity: &str) -> Result<u128, Error> {
    quantity
        .parse()
        .map_err(|_| Error::UnexpectedResponse(format!("malformed quantity {quantity}")))
}

fn parse_amounts(amounts: Vec<Amount>) -> Result<Vec<AssetAmount>, Error> {
    amounts
        .into_iter()
        .map(|amount| {
            Ok(AssetAmount {
                unit: AssetUnit::from(amount.unit),
                quantity: parse_quantity(&amount.quantity)?,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct AddressTransaction {
    tx_hash: String,
    block_height: u64,
}

#[derive(Debug, Deserialize)]
struct Amount {
    unit: String,
    quantity: String,
}

#[derive(Debug, Deserialize)]
struct TxDetails {
    hash: String,
    block: String,
    block_height: u64,
    block_time: i64,
    slot: u64,
    fees: String,

    #[serde(default)]
    withdrawal_count: u32,

    #[serde(default)]
    delegation_count: u32,

    #[serde(default)]
    stake_cert_count: u32,
}

#[derive(Debug, Deserialize)]
struct TxUtxos {
    inputs: Vec<TxUtxoInput>,
    outputs: Vec<TxUtxoOutput>,
}

#[derive(Debug, Deserialize)]
struct TxUtxoInput {
    address: Option<String>,
    amount: Vec<Amount>,
    tx_hash: String,
    output_index: u32,

    #[serde(default)]
    data_hash: Option<String>,

    #[serde(default)]
    reference_script_hash: Option<String>,

    #[serde(default)]
    collateral: bool,

    #[serde(default)]
    reference: bool,
}

#[derive(Debug, Deserialize)]
struct TxUtxoOutput {
    address: String,
    amount: Vec<Amount>,

    #[serde(default)]
    data_hash: Option<String>,

    #[serde(default)]
    collateral: bool,
}

#[derive(Debug, Deserialize)]
struct TxWithdrawal {
    address: String,
    amount: String,
}

#[derive(Debug, Deserialize)]
struct AddressInfo {
    #[serde(default)]
    amount: Vec<Amount>,
}

#[derive(Debug, Deserialize)]
struct AddressUtxoEntry {
    tx_hash: String,
    output_index: u32,
    amount: Vec<Amount>,
}

#[derive(Debug, Deserialize)]
struct LatestBlock {
    height: u64,
}

#[derive(Debug, Deserialize)]
struct AssetDetails {
    policy_id: String,

    #[serde(default)]
    asset_name: Option<String>,

    #[serde(default)]
    metadata: Option<AssetMetadata>,

    #[serde(default)]
    onchain_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
struct AssetMetadata {
    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    ticker: Option<String>,

    #[serde(default)]
    decimals: Option<u32>,

    #[serde(default)]
    logo: Option<String>,
}

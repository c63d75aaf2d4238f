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

use crate::domain::{AssetFlow, RawTransaction, TxInput, TxOutput, WalletView, Withdrawal};
use std::collections::BTreeMap;
use sync_common::domain::AssetUnit;

/// The parts of a raw transaction that belong to one wallet.
#[derive(Debug)]
pub struct WalletFilter<'a> {
    pub is_relevant: bool,
    pub inputs: Vec<&'a TxInput>,
    pub outputs: Vec<&'a TxOutput>,
    pub withdrawals: Vec<&'a Withdrawal>,
}

/// Keep only inputs and outputs whose payment address equals the wallet
/// address, and withdrawals belonging to the wallet's stake address. The
/// transaction is relevant if any of the three is non-empty.
pub fn filter_for_wallet<'a>(tx: &'a RawTransaction, wallet: &WalletView) -> WalletFilter<'a> {
    let inputs = tx
        .inputs
        .iter()
        .filter(|input| input.address.as_ref() == Some(&wallet.address))
        .collect::<Vec<_>>();

    let outputs = tx
        .outputs
        .iter()
        .filter(|output| output.address == wallet.address)
        .collect::<Vec<_>>();

    let withdrawals = tx
        .withdrawals
        .iter()
        .filter(|withdrawal| wallet.owns_stake(&withdrawal.stake_address))
        .collect::<Vec<_>>();

    WalletFilter {
        is_relevant: !inputs.is_empty() || !outputs.is_empty() || !withdrawals.is_empty(),
        inputs,
        outputs,
        withdrawals,
    }
}

/// Aggregate per-unit inflows (wallet outputs) and outflows (wallet inputs)
/// into flows. Units untouched on both sides are dropped. The order of the
/// returned flows is an implementation detail.
pub fn calculate_flows(inputs: &[&TxInput], outputs: &[&TxOutput]) -> Vec<AssetFlow> {
    let mut by_unit = BTreeMap::<AssetUnit, (u128, u128)>::new();

    for input in inputs {
        for amount in &input.amounts {
            by_unit.entry(amount.unit.clone()).or_default().1 += amount.quantity;
        }
    }

    for output in outputs {
        for amount in &output.amounts {
            by_unit.entry(amount.unit.clone()).or_default().0 += amount.quantity;
        }
    }

    by_unit
        .into_iter()
        .filter(|(_, (amount_in, amount_out))| *amount_in != 0 || *amount_out != 0)
        .map(|(unit, (amount_in, amount_out))| AssetFlow::new(unit, amount_in, amount_out))
        .collect()
}

/// Net lovelace movement of the given flows; zero if ADA is untouched.
pub fn net_ada_change(flows: &[AssetFlow]) -> i128 {
    flows
        .iter()
        .find(|flow| flow.unit.is_lovelace())
        .map(|flow| flow.net)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::AssetAmount,
        testing::{input, lovelace, other_address, output, raw_tx, wallet_view},
    };
    use sync_common::domain::{AssetUnit, StakeAddress};

    const MIN_UNIT: &str = "29d222ce763455e3d7a09a665ce554f00ac89d2e99a1a83d267170c64d494e";

    #[test]
    fn test_pure_receive() {
        let wallet = wallet_view();
        let tx = raw_tx(
            vec![input(&other_address(), vec![lovelace(25_170_000)])],
            vec![output(&wallet.address, vec![lovelace(25_000_000)])],
        );

        let filter = filter_for_wallet(&tx, &wallet);
        assert!(filter.is_relevant);
        assert!(filter.inputs.is_empty());
        assert_eq!(filter.outputs.len(), 1);

        let flows = calculate_flows(&filter.inputs, &filter.outputs);
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].amount_in, 25_000_000);
        assert_eq!(flows[0].amount_out, 0);
        assert_eq!(flows[0].net, 25_000_000);
        assert_eq!(net_ada_change(&flows), 25_000_000);
    }

    #[test]
    fn test_pure_send_with_change() {
        let wallet = wallet_view();
        let tx = raw_tx(
            vec![input(&wallet.address, vec![lovelace(30_000_000)])],
            vec![
                output(&other_address(), vec![lovelace(28_000_000)]),
                output(&wallet.address, vec![lovelace(1_830_000)]),
            ],
        );

        let filter = filter_for_wallet(&tx, &wallet);
        let flows = calculate_flows(&filter.inputs, &filter.outputs);
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].amount_in, 1_830_000);
        assert_eq!(flows[0].amount_out, 30_000_000);
        assert_eq!(flows[0].net, -28_170_000);
        assert_eq!(net_ada_change(&flows), -28_170_000);
    }

    #[test]
    fn test_two_asset_swap() {
        let wallet = wallet_view();
        let min = AssetUnit::from(MIN_UNIT);
        let tx = raw_tx(
            vec![input(&wallet.address, vec![lovelace(10_000_000)])],
            vec![output(
                &wallet.address,
                vec![
                    AssetAmount {
                        unit: min.clone(),
                        quantity: 4_200_000,
                    },
                    lovelace(1_700_000),
                ],
            )],
        );

        let filter = filter_for_wallet(&tx, &wallet);
        let flows = calculate_flows(&filter.inputs, &filter.outputs);
        assert_eq!(flows.len(), 2);

        let ada = flows.iter().find(|f| f.unit.is_lovelace()).unwrap();
        assert_eq!(ada.net, -8_300_000);

        let min_flow = flows.iter().find(|f| f.unit == min).unwrap();
        assert_eq!(min_flow.net, 4_200_000);

        // Conservation holds for every flow.
        for flow in &flows {
            assert_eq!(flow.net, flow.amount_in as i128 - flow.amount_out as i128);
        }
    }

    #[test]
    fn test_not_relevant() {
        let wallet = wallet_view();
        let tx = raw_tx(
            vec![input(&other_address(), vec![lovelace(1_000_000)])],
            vec![output(&other_address(), vec![lovelace(830_000)])],
        );

        let filter = filter_for_wallet(&tx, &wallet);
        assert!(!filter.is_relevant);
    }

    #[test]
    fn test_withdrawal_relevance() {
        let mut wallet = wallet_view();
        wallet.stake_address = Some(StakeAddress::from("stake1owned"));

        let mut tx = raw_tx(vec![], vec![]);
        tx.withdrawals.push(Withdrawal {
            stake_address: StakeAddress::from("stake1owned"),
            amount: 12_300_000,
        });

        let filter = filter_for_wallet(&tx, &wallet);
        assert!(filter.is_relevant);
        assert_eq!(filter.withdrawals.len(), 1);

        // A foreign withdrawal alone does not make the transaction relevant.
        tx.withdrawals[0].stake_address = StakeAddress::from("stake1other");
        let filter = filter_for_wallet(&tx, &wallet);
        assert!(!filter.is_relevant);
    }
}

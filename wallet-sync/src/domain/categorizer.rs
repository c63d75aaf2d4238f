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

use crate::domain::{AssetFlow, RawTransaction, WalletView, flow};
use sync_common::domain::{Action, Protocol, TokenCategory};

/// Minting policies with a known protocol affiliation. Closed at compile
/// time; unknown policies fall through to the shape-based rules.
#[derive(Debug, Clone, Copy)]
pub struct PolicyMarker {
    pub policy_id: &'static str,
    pub protocol: Protocol,
    pub category: TokenCategory,
}

pub const POLICY_MARKERS: &[PolicyMarker] = &[
    // Minswap MIN governance token.
    PolicyMarker {
        policy_id: "29d222ce763455e3d7a09a665ce554f00ac89d2e99a1a83d267170c6",
        protocol: Protocol::Minswap,
        category: TokenCategory::Governance,
    },
    // Minswap liquidity pool shares.
    PolicyMarker {
        policy_id: "e4214b7cce62ac6fbba385d164df48e157eae5863521b4b67ca71d86",
        protocol: Protocol::Minswap,
        category: TokenCategory::LpToken,
    },
    // Liqwid LQ governance token.
    PolicyMarker {
        policy_id: "da8c30857834c6ae7203935b89278c532b3995245295456f993e1d24",
        protocol: Protocol::Liqwid,
        category: TokenCategory::Governance,
    },
    // Liqwid qTokens (market receipt tokens).
    PolicyMarker {
        policy_id: "a04ce7a52545e5e33c2867e148898d9e667a69602285f6a1298f9d68",
        protocol: Protocol::Liqwid,
        category: TokenCategory::QToken,
    },
    // SundaeSwap SUNDAE governance token.
    PolicyMarker {
        policy_id: "9a9693a9a37912a5097918f97918d15240c92ab729a0b7c4aa144d77",
        protocol: Protocol::Sundaeswap,
        category: TokenCategory::Governance,
    },
];

pub fn marker_for_policy(policy_id: &str) -> Option<&'static PolicyMarker> {
    POLICY_MARKERS
        .iter()
        .find(|marker| marker.policy_id == policy_id)
}

/// Everything a rule may look at.
#[derive(Debug)]
pub struct Context<'a> {
    pub tx: &'a RawTransaction,
    pub flows: &'a [AssetFlow],
    pub wallet: &'a WalletView,
}

/// One categorization rule: a pure predicate plus action and protocol
/// derivation. The first matching rule in priority order wins.
pub struct Rule {
    pub name: &'static str,
    pub priority: u8,
    pub matches: fn(&Context) -> bool,
    pub action: fn(&Context) -> Action,
    pub protocol: fn(&Context) -> Protocol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Categorization {
    pub action: Action,
    pub protocol: Protocol,
    pub rule: &'static str,
}

/// Priority-sorted rule engine, closed at process start.
pub struct Categorizer {
    rules: Vec<Rule>,
}

impl Categorizer {
    pub fn new() -> Self {
        let mut rules = builtin_rules();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { rules }
    }

    pub fn categorize(&self, context: &Context) -> Categorization {
        for rule in &self.rules {
            if (rule.matches)(context) {
                return Categorization {
                    action: (rule.action)(context),
                    protocol: (rule.protocol)(context),
                    rule: rule.name,
                };
            }
        }

        Categorization {
            action: Action::Unknown,
            protocol: Protocol::Unknown,
            rule: "fallback",
        }
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::new()
    }
}

fn builtin_rules() -> Vec<Rule> {
    vec![
        Rule {
            name: "qtoken-market",
            priority: 100,
            matches: |context| qtoken_flow(context.flows).is_some(),
            action: |context| match qtoken_flow(context.flows) {
                Some(flow) if flow.net > 0 => Action::Supply,
                Some(flow) if flow.net < 0 => Action::Withdraw,
                _ => Action::Unknown,
            },
            protocol: |context| {
                qtoken_flow(context.flows)
                    .and_then(|flow| marker_for_policy(flow.policy_id()))
                    .map(|marker| marker.protocol)
                    .unwrap_or(Protocol::Unknown)
            },
        },
        Rule {
            name: "protocol-marker",
            priority: 90,
            matches: |context| marked_flow(context.flows).is_some(),
            action: |context| {
                if swap_shape(context.flows) {
                    Action::Swap
                } else {
                    match flow::net_ada_change(context.flows) {
                        net if net > 0 => Action::Receive,
                        net if net < 0 => Action::Send,
                        _ => Action::Unknown,
                    }
                }
            },
            protocol: |context| {
                marked_flow(context.flows)
                    .and_then(|flow| marker_for_policy(flow.policy_id()))
                    .map(|marker| marker.protocol)
                    .unwrap_or(Protocol::Unknown)
            },
        },
        Rule {
            name: "claim-rewards",
            priority: 80,
            matches: |context| {
                context
                    .tx
                    .withdrawals
                    .iter()
                    .any(|withdrawal| context.wallet.owns_stake(&withdrawal.stake_address))
            },
            action: |_| Action::ClaimRewards,
            protocol: |_| Protocol::Unknown,
        },
        Rule {
            name: "stake-delegation",
            priority: 70,
            matches: |context| {
                context.tx.delegation_count > 0 || context.tx.stake_cert_count > 0
            },
            action: |_| Action::Stake,
            protocol: |_| Protocol::Unknown,
        },
        Rule {
            name: "swap-shape",
            priority: 60,
            matches: |context| swap_shape(context.flows),
            action: |_| Action::Swap,
            protocol: |_| Protocol::Unknown,
        },
        Rule {
            name: "ada-transfer",
            priority: 50,
            matches: |context| {
                context.flows.iter().all(|flow| flow.unit.is_lovelace())
                    && flow::net_ada_change(context.flows) != 0
            },
            action: |context| {
                if flow::net_ada_change(context.flows) > 0 {
                    Action::Receive
                } else {
                    Action::Send
                }
            },
            protocol: |_| Protocol::Unknown,
        },
    ]
}

fn qtoken_flow<'a>(flows: &'a [AssetFlow]) -> Option<&'a AssetFlow> {
    flows.iter().find(|flow| {
        marker_for_policy(flow.policy_id())
            .is_some_and(|marker| marker.category == TokenCategory::QToken)
    })
}

fn marked_flow<'a>(flows: &'a [AssetFlow]) -> Option<&'a AssetFlow> {
    flows
        .iter()
        .find(|flow| marker_for_policy(flow.policy_id()).is_some())
}

/// Two distinct non-ADA units moving in opposite directions, or one non-ADA
/// unit against an opposite ADA movement.
fn swap_shape(flows: &[AssetFlow]) -> bool {
    let non_ada = flows
        .iter()
        .filter(|flow| !flow.unit.is_lovelace() && flow.net != 0)
        .collect::<Vec<_>>();

    match non_ada.as_slice() {
        [] => false,
        [flow] => {
            let ada = flow::net_ada_change(flows);
            ada != 0 && ada.signum() != flow.net.signum()
        }
        flows => {
            flows.iter().any(|flow| flow.net > 0) && flows.iter().any(|flow| flow.net < 0)
        }
    }
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
    const QADA_UNIT: &str = "a04ce7a52545e5e33c2867e148898d9e667a69602285f6a1298f9d6871414441";

    fn categorize(tx: &RawTransaction, flows: &[AssetFlow], wallet: &WalletView) -> Categorization {
        Categorizer::new().categorize(&Context { tx, flows, wallet })
    }

    fn flows_of(tx: &RawTransaction, wallet: &WalletView) -> Vec<AssetFlow> {
        let filter = flow::filter_for_wallet(tx, wallet);
        flow::calculate_flows(&filter.inputs, &filter.outputs)
    }

    #[test]
    fn test_receive() {
        let wallet = wallet_view();
        let tx = raw_tx(
            vec![input(&other_address(), vec![lovelace(25_170_000)])],
            vec![output(&wallet.address, vec![lovelace(25_000_000)])],
        );
        let flows = flows_of(&tx, &wallet);

        let categorization = categorize(&tx, &flows, &wallet);
        assert_eq!(categorization.action, Action::Receive);
        assert_eq!(categorization.protocol, Protocol::Unknown);
    }

    #[test]
    fn test_send() {
        let wallet = wallet_view();
        let tx = raw_tx(
            vec![input(&wallet.address, vec![lovelace(30_000_000)])],
            vec![
                output(&other_address(), vec![lovelace(28_000_000)]),
                output(&wallet.address, vec![lovelace(1_830_000)]),
            ],
        );
        let flows = flows_of(&tx, &wallet);

        let categorization = categorize(&tx, &flows, &wallet);
        assert_eq!(categorization.action, Action::Send);
    }

    #[test]
    fn test_swap_resolves_protocol_from_marker() {
        let wallet = wallet_view();
        let tx = raw_tx(
            vec![input(&wallet.address, vec![lovelace(10_000_000)])],
            vec![output(
                &wallet.address,
                vec![
                    AssetAmount {
                        unit: AssetUnit::from(MIN_UNIT),
                        quantity: 4_200_000,
                    },
                    lovelace(1_700_000),
                ],
            )],
        );
        let flows = flows_of(&tx, &wallet);

        let categorization = categorize(&tx, &flows, &wallet);
        assert_eq!(categorization.action, Action::Swap);
        assert_eq!(categorization.protocol, Protocol::Minswap);
    }

    #[test]
    fn test_qtoken_supply_and_withdraw() {
        let wallet = wallet_view();
        let qada = AssetAmount {
            unit: AssetUnit::from(QADA_UNIT),
            quantity: 95_000_000,
        };

        // Sending ADA, receiving a qToken: supplying to the market.
        let tx = raw_tx(
            vec![input(&wallet.address, vec![lovelace(100_000_000)])],
            vec![output(&wallet.address, vec![qada.clone()])],
        );
        let flows = flows_of(&tx, &wallet);
        let categorization = categorize(&tx, &flows, &wallet);
        assert_eq!(categorization.action, Action::Supply);
        assert_eq!(categorization.protocol, Protocol::Liqwid);

        // Sending the qToken back, receiving ADA: withdrawing.
        let tx = raw_tx(
            vec![input(&wallet.address, vec![qada])],
            vec![output(&wallet.address, vec![lovelace(101_000_000)])],
        );
        let flows = flows_of(&tx, &wallet);
        let categorization = categorize(&tx, &flows, &wallet);
        assert_eq!(categorization.action, Action::Withdraw);
        assert_eq!(categorization.protocol, Protocol::Liqwid);
    }

    #[test]
    fn test_claim_rewards() {
        let mut wallet = wallet_view();
        wallet.stake_address = Some(StakeAddress::from("stake1owned"));

        let mut tx = raw_tx(vec![], vec![output(&wallet.address, vec![lovelace(12_300_000)])]);
        tx.withdrawals.push(crate::domain::Withdrawal {
            stake_address: StakeAddress::from("stake1owned"),
            amount: 12_300_000,
        });
        let flows = flows_of(&tx, &wallet);

        let categorization = categorize(&tx, &flows, &wallet);
        assert_eq!(categorization.action, Action::ClaimRewards);
    }

    #[test]
    fn test_stake_delegation() {
        let wallet = wallet_view();
        let mut tx = raw_tx(
            vec![input(&wallet.address, vec![lovelace(3_000_000)])],
            vec![output(&wallet.address, vec![lovelace(800_000)])],
        );
        tx.delegation_count = 1;
        let flows = flows_of(&tx, &wallet);

        let categorization = categorize(&tx, &flows, &wallet);
        assert_eq!(categorization.action, Action::Stake);
    }

    #[test]
    fn test_fallback_unknown() {
        let wallet = wallet_view();
        // ADA in and out cancel exactly; nothing else moves.
        let tx = raw_tx(
            vec![input(&wallet.address, vec![lovelace(5_000_000)])],
            vec![output(&wallet.address, vec![lovelace(5_000_000)])],
        );
        let flows = flows_of(&tx, &wallet);

        let categorization = categorize(&tx, &flows, &wallet);
        assert_eq!(categorization.action, Action::Unknown);
        assert_eq!(categorization.protocol, Protocol::Unknown);
        assert_eq!(categorization.rule, "fallback");
    }
}

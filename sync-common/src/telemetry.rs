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

use fastrace::collector::{Config as FastraceConfig, ConsoleReporter};
use log::warn;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Deserialize;
use std::net::SocketAddr;

/// Telemetry settings. Metrics are exported via a Prometheus scrape endpoint
/// if an address is configured; tracing spans are reported to the console
/// when enabled.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub metrics_address: Option<SocketAddr>,

    #[serde(default)]
    pub console_tracing: bool,
}

/// Initialize logging to stderr, filtered by `RUST_LOG`. Must be called
/// before the first log statement.
pub fn init_logging() {
    logforth::starter_log::stderr().apply();
}

/// Initialize span collection.
pub fn init_tracing(config: &Config) {
    if config.console_tracing {
        fastrace::set_reporter(ConsoleReporter, FastraceConfig::default());
    }
}

/// Install the Prometheus metrics exporter if an address is configured.
/// Failure to bind is logged, not fatal.
pub fn init_metrics(config: &Config) {
    if let Some(address) = config.metrics_address {
        if let Err(error) = PrometheusBuilder::new()
            .with_http_listener(address)
            .install()
        {
            warn!(error:%; "cannot install Prometheus metrics exporter");
        }
    }
}

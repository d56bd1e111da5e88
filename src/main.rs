// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use termgate::config::{load_entries, GatewayConfig};

#[tokio::main]
async fn main() {
    let config = GatewayConfig::parse();

    init_tracing(&config);

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    let apps = match &config.apps {
        Some(path) => match load_entries(path) {
            Ok(apps) => apps,
            Err(e) => {
                error!("fatal: {e:#}");
                std::process::exit(1);
            }
        },
        None => Vec::new(),
    };

    if let Err(e) = termgate::server::run(config, apps).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(config: &GatewayConfig) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

//! Fetches a single chart from the command line: build a client from a
//! config file, run one operation, print the result.

use std::collections::HashMap;
use std::sync::Arc;

use chartgate::{
    ChartRequest, ClientEndpoint, Credentials, GatewayBuilder, GatewayConfig, InMemorySessionStore,
};
use tokio_util::sync::CancellationToken;

fn parse_args() -> Result<(String, String), pico_args::Error> {
    let mut args = pico_args::Arguments::from_env();
    let symbol: String = args
        .opt_value_from_str("--symbol")?
        .unwrap_or_else(|| "NSE:RELIANCE".to_string());
    let resolution: String = args
        .opt_value_from_str("--resolution")?
        .unwrap_or_else(|| "1D".to_string());
    Ok((symbol, resolution))
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let (symbol, resolution) = match parse_args() {
        Ok(v) => v,
        Err(e) => {
            eprintln!("argument error: {e}");
            std::process::exit(2);
        }
    };

    let mut endpoints = HashMap::new();
    endpoints.insert(
        "vendor".to_string(),
        ClientEndpoint {
            websocket_url: "wss://data.example-vendor.test/socket.io/websocket".to_string(),
            bootstrap_url: "https://example-vendor.test/chart-bootstrap".to_string(),
        },
    );

    let config = GatewayConfig {
        default_endpoint: "vendor".to_string(),
        endpoints,
        ..GatewayConfig::default()
    };

    let credentials = Credentials::vendor(
        std::env::var("CHARTGATE_USER_EMAIL").unwrap_or_default(),
        std::env::var("CHARTGATE_USER_PASSWORD").unwrap_or_default(),
    );

    let gateway = GatewayBuilder::new()
        .with_config(config)
        .with_credentials(credentials)
        .with_session_store(Arc::new(InMemorySessionStore::new()))
        .build()
        .await
        .expect("failed to build gateway");

    let request = ChartRequest {
        symbol,
        resolution: resolution.parse().expect("invalid resolution"),
        bar_count: 300,
        cvd: None,
    };

    match gateway.get_chart(request, CancellationToken::new()).await {
        Ok(payload) => {
            println!(
                "{} bars for {} @ {}",
                payload.bars.len(),
                payload.symbol,
                payload.resolution
            );
        }
        Err(e) => {
            eprintln!("fetch failed: {e}");
            std::process::exit(1);
        }
    }

    gateway.shutdown().await;
}

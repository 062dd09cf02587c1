// Inferload relay server
// Decision: Configured entirely from the environment (RELAY_ADDR, ENDPOINT_URL, API_ROUTE)

use anyhow::{Context, Result};
use inferload_core::telemetry::{init_telemetry, TelemetryConfig};
use inferload_relay::{router, RelayConfig, RelayState};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    // Configure logging via RUST_LOG (default: "inferload_relay=info,tower_http=info")
    let mut telemetry_config = TelemetryConfig::from_env("inferload-relay");
    if telemetry_config.log_filter.is_none() {
        telemetry_config.log_filter = Some("inferload_relay=info,tower_http=info".to_string());
    }
    init_telemetry(&telemetry_config);

    if let Ok(path) = dotenv {
        tracing::info!("Loaded .env from {:?}", path);
    }

    let config = RelayConfig::from_env().context("Invalid relay configuration")?;
    let state = RelayState::new(&config)?;
    tracing::info!(
        route = %config.api_route,
        upstream = %state.upstream(),
        "Forwarding requests"
    );

    let app = router(&config, state);
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("Relay listening on {}", config.listen_addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

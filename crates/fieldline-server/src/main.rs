//! Boots the FieldLine HTTP/WS surface: loads config, opens storage, and serves
//! the router built in `routes.rs` (spec §6).

use std::sync::Arc;

use fieldline_core::config::FieldlineConfig;
use fieldline_server::{routes, state::AppState};
use fieldline_storage::store::Store;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() {
    let config = load_config();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone()),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(config.logging.json))
        .init();

    let store = Store::connect(&config.storage.database_url).await.expect("failed to open storage");

    let bind_addr = config.bind_addr.clone();
    let state = Arc::new(AppState::new(store, config));
    let app = routes::build(state);

    tracing::info!(%bind_addr, "fieldline-server starting");
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(error) => {
            tracing::error!(%error, %bind_addr, "failed to bind listener");
            return;
        }
    };

    if let Err(error) = axum::serve(listener, app).await {
        tracing::error!(%error, "server exited with error");
    }
}

/// Loads config from the path named by `FIELDLINE_CONFIG`, falling back to an
/// in-memory SQLite store and defaults suitable for local development.
fn load_config() -> FieldlineConfig {
    match std::env::var("FIELDLINE_CONFIG") {
        Ok(path) => {
            let raw = std::fs::read_to_string(&path)
                .unwrap_or_else(|err| panic!("failed to read config at {path}: {err}"));
            FieldlineConfig::from_toml_str(&raw).unwrap_or_else(|err| panic!("invalid config at {path}: {err}"))
        }
        Err(_) => FieldlineConfig::from_toml_str(DEV_CONFIG).expect("default dev config is valid TOML"),
    }
}

const DEV_CONFIG: &str = r#"
[tenant]
default_language = "de-DE"
hq_location = { latitude = 52.52, longitude = 13.405 }
service_radius_km = 40.0

[tenant.business_hours]
"#;

//! orgmap-ei - Employer Import Microservice
//!
//! **Module Identity:**
//! - Name: orgmap-ei (Employer Import)
//! - Port: 5731
//!
//! Stages employer records from external feeds, detects duplicates
//! against the canonical store, and applies operator merge/create
//! decisions.

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use orgmap_common::events::EventBus;
use orgmap_ei::config::MatchingConfig;
use orgmap_ei::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting orgmap-ei (Employer Import) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve configuration and database location
    let toml_config = orgmap_common::config::load_toml_config("orgmap-ei")?;
    let db_path = orgmap_common::config::resolve_database_path(&toml_config);
    info!("Database: {}", db_path.display());

    // Initialize database connection pool (creates schema if missing)
    let db_pool = orgmap_common::db::init_database(&db_path).await?;
    info!("Database connection established");

    // Matching thresholds resolve Database -> ENV -> TOML -> defaults
    let matching_config = MatchingConfig::resolve(&db_pool, &toml_config).await?;
    info!(
        exact = matching_config.exact_threshold,
        similar = matching_config.similar_threshold,
        "Matching thresholds resolved"
    );

    // Event bus for SSE broadcasting
    let event_bus = EventBus::new(100);

    let state = AppState::new(db_pool, event_bus, matching_config)?;
    let app = orgmap_ei::build_router(state);

    let listen_addr = toml_config
        .listen_addr
        .clone()
        .unwrap_or_else(|| "127.0.0.1:5731".to_string());

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!("Listening on http://{}", listen_addr);
    info!("Health check: http://{}/health", listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

//! Coexpr Web Server
//!
//! Run with: cargo run -p coexpr-web
//! Set COEXPR_CONFIG to a YAML or JSON file to override the defaults.

use std::net::SocketAddr;

use tracing::info;
use tracing_subscriber::EnvFilter;

use coexpr_common::config::CoexprConfig;

/// Used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "coexpr_engine=debug,coexpr_web=debug,info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    info!("Starting Coexpr Web Server...");

    let config = CoexprConfig::load()?;
    let addr: SocketAddr = config.server.bind.parse()?;

    let state = coexpr_web::state::AppState::load(config)?;
    let app = coexpr_web::router::build_router(state);

    info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use moodscan_backend::utils::config::Config;
use moodscan_backend::utils::logging;
use moodscan_backend::{analysis, store, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cfg = Config::from_env();

    // Store credentials are consumed once here; a bad file stops startup.
    let store = store::from_config(&cfg)?;
    let analyzer = analysis::from_config(&cfg)?;
    let state = Arc::new(AppState::new(&cfg, analyzer, store));
    state.paths.ensure().context("Failed to create data directories")?;
    info!(
        screenshots = %state.paths.screenshots.display(),
        analyzer = state.analyzer.name(),
        store = state.store.name(),
        detector = %cfg.detector_backend,
        "configured"
    );

    let app = moodscan_backend::api::routes::router(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening" = %addr);
    axum::serve(listener, app).await?;
    Ok(())
}

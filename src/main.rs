//! This file defines the equistat binary entry point.

use std::sync::Arc;

use equistat::app;
use equistat::app_state::AppState;
use equistat::cli;
use equistat::metrics;
use equistat::server;
use equistat::tracing;

/// Application entry point
#[tokio::main]
async fn main() {
    let args = cli::parse();
    tracing::init_tracing(&args);
    metrics::register_metrics();
    let state = AppState::new(&args)
        .await
        .expect("failed to initialise application state");
    let service = app::service(Arc::new(state));
    server::serve(&args, service).await;
    tracing::shutdown_tracing();
}

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::routes;
use crate::api::state::AppState;
use crate::core::AppContext;
use crate::jobs::{ArchiveEndedEvents, SendReminders, shutdown_channel, spawn_periodic_job};

pub fn app(shared_state: Arc<AppState>) -> Router {
    Router::new()
        // API routes
        .nest("/api", routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(shared_state)
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down, waiting for running jobs to finish");
}

// Run the server
pub async fn serve(host: String, port: String, ctx: AppContext) -> Result<()> {
    let app = app(Arc::new(AppState::new(ctx.clone())?));

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    tracing::debug!("Server started. Listening on {}", listener.local_addr()?);

    // Run background jobs. Each job is spawned in it's own tokio task
    // in a loop.
    let (shutdown, signal) = shutdown_channel();
    let jobs = vec![
        spawn_periodic_job(ctx.clone(), SendReminders, signal.clone()),
        spawn_periodic_job(ctx.clone(), ArchiveEndedEvents, signal),
    ];

    axum::serve(listener, app)
        .with_graceful_shutdown(ctrl_c())
        .await?;

    // Jobs stop between passes, never in the middle of one
    if let Err(e) = shutdown.send(true) {
        tracing::debug!("No job left to stop: {}", e);
    }
    for result in futures::future::join_all(jobs).await {
        if let Err(e) = result {
            tracing::error!("Job task panicked: {}", e);
        }
    }

    ctx.close().await
}

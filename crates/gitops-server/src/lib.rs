pub mod apply;
pub mod embed;
pub mod error;
pub mod gateway;
pub mod routes;
pub mod scheduler;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use gitops_core::config::Config;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(app_state: state::AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Events (SSE)
        .route("/api/events", get(routes::events::sse_events))
        // Status
        .route("/api/status", get(routes::status::get_status))
        .route("/api/health", get(routes::health::health))
        // Deployments
        .route("/api/deploy/", post(routes::deploy::deploy_without_version))
        .route("/api/deploy/{version}", post(routes::deploy::deploy))
        .route("/api/rollback", post(routes::deploy::rollback))
        .route("/api/history", get(routes::history::get_history))
        // Config
        .route("/api/config", get(routes::config::get_config))
        .fallback(embed::fallback)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the status gateway on a pre-bound listener.
///
/// The caller binds the listener so it can report the actual port first
/// (the OS picks one when `port = 0`).
pub async fn serve_on(
    config: Config,
    listener: tokio::net::TcpListener,
    open_browser: bool,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app_name = config.app.name.clone();
    let app = build_router(state::AppState::new(config)?);

    tracing::info!(app = %app_name, "gitops dashboard listening on http://localhost:{actual_port}");

    if open_browser {
        let url = format!("http://localhost:{actual_port}");
        if let Err(e) = open::that(&url) {
            tracing::warn!(error = %e, "could not open browser");
        }
    }

    axum::serve(listener, app).await?;
    Ok(())
}

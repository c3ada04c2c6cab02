//! Bootstraps the HTTP/WS listener, grounded on the teacher's
//! `axon::commands::api::server::start_server` (CORS, `TraceLayer`,
//! `axum::serve` over a plain TCP listener).

use crate::routes::create_routes;
use crate::state::AppState;
use crate::ws::ws_handler;
use axum::routing::get;
use std::net::SocketAddr;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Runs until the socket is closed or the process receives a shutdown
/// signal; the caller decides how to wire `tokio::signal` into this.
pub async fn start_server(state: AppState) -> std::io::Result<()> {
    let port = state.config.port;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let router = create_routes()
        .route("/kernel", get(ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "kernel listening");
    axum::serve(listener, router).await
}

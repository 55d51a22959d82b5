//! Signet API Server - Backend for document e-signatures
//!
//! Provides REST endpoints for:
//! - User registration and login
//! - PDF upload and management
//! - Signature placement and finalization

use anyhow::Result;
use axum::{
    routing::{delete, get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

mod auth;
mod db;
mod error;
mod handlers;
mod models;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("signet_api=info".parse()?)
                .add_directive("signet_core=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    // Initialize application state
    info!("Initializing Signet API...");
    let state = AppState::new().await?;
    let state = Arc::new(state);

    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Auth endpoints
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        // Document endpoints
        .route("/api/docs/upload", post(handlers::upload_document))
        .route("/api/docs", get(handlers::list_documents))
        .route("/api/docs/:id", delete(handlers::delete_document))
        // Signature endpoints
        .route("/api/signatures/place", post(handlers::place))
        .route("/api/signatures/file/:fileId", get(handlers::list_placements))
        .route("/api/signatures/finalize", post(handlers::finalize))
        .route("/api/signatures/clear", delete(handlers::clear_placements))
        .route(
            "/api/signatures/remove/:signatureId",
            delete(handlers::remove_placement),
        )
        // Add middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    // Parse bind address
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3001);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting Signet API on http://{}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

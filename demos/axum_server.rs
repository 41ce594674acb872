//! Example Axum server with x402 payment middleware
//!
//! ```sh
//! X402_NETWORK=base-sepolia \
//! X402_TREASURY_ADDRESS=0x209693Bc6afc0C5328bA36FaF03C514EF312287C \
//! X402_FACILITATOR_URL=http://localhost:3000 \
//! cargo run --example axum_server
//! ```

use axum::{middleware::from_fn_with_state, response::Json, routing::get, Router};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use x402_lite::{
    middleware::{payment_middleware, PaymentGate},
    PaymentHandler, ServerConfig,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,x402_lite=debug")),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let network = config.network;
    let handler = Arc::new(PaymentHandler::new(config)?);

    // 0.01 USDC with 6 decimals
    let gate = PaymentGate::new(handler, "10000").on_payment_verified(|envelope| {
        tracing::info!(
            network = %envelope.payment_payload.network,
            "serving paid joke"
        );
    });

    let paid = Router::new()
        .route("/joke", get(joke_handler))
        .layer(from_fn_with_state(gate, payment_middleware));

    let app = Router::new()
        .merge(paid)
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind("0.0.0.0:4021").await?;
    tracing::info!(%network, "server running on http://0.0.0.0:4021");

    axum::serve(listener, app).await?;

    Ok(())
}

async fn joke_handler() -> Json<serde_json::Value> {
    Json(json!({
        "joke": "Why do programmers prefer dark mode? Because light attracts bugs!"
    }))
}

/// Health check handler (no payment required)
async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "x402-lite-axum-server",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

//! # x402-lite - the HTTP 402 payment handshake
//!
//! Client and server helpers for the x402 protocol.
//!
//! - [`X402Client`] sends a request, and when the server answers `402 Payment
//!   Required` it builds a payment envelope with a [`wallet::WalletAdapter`]
//!   and retries once with the `X-PAYMENT` header attached.
//! - [`PaymentHandler`] issues 402 challenges, and forwards presented payments
//!   to a facilitator for verification and settlement. With the `axum`
//!   feature, [`middleware::payment_middleware`] wraps it for axum routers.
//!
//! Verification and settlement always happen at the facilitator; this crate
//! performs no cryptography or chain access.

pub mod client;
pub mod config;
pub mod error;
pub mod facilitator;
pub mod nonce;
pub mod server;
pub mod types;
pub mod wallet;

#[cfg(feature = "axum")]
pub mod middleware;

// Re-exports for convenience
pub use client::X402Client;
pub use config::{ClientConfig, FacilitatorConfig, ServerConfig};
pub use error::{Result, X402Error};
pub use facilitator::FacilitatorClient;
pub use server::{GateOutcome, HeaderLookup, PaymentHandler};
pub use types::*;

/// Current version of the x402-lite library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Header carrying the payment envelope
pub const PAYMENT_HEADER: &str = "X-PAYMENT";

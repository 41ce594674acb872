//! Error types for the x402 library

use thiserror::Error;

/// Result type alias for x402 operations
pub type Result<T> = std::result::Result<T, X402Error>;

/// Main error type for x402 operations
#[derive(Error, Debug)]
pub enum X402Error {
    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Base64 encoding/decoding error
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// A 402 response did not carry usable payment requirements
    #[error("Invalid payment requirements: {message}")]
    InvalidPaymentRequirements { message: String },

    /// The requested amount is above the client's configured ceiling
    #[error("Payment amount {requested} exceeds maximum allowed {ceiling}")]
    PaymentCeilingExceeded { requested: String, ceiling: String },

    /// Amount string is not a non-negative base-10 integer
    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: String },

    /// Amount is a valid integer but does not fit a `Decimal` at that scale
    #[error("Amount {amount} cannot be represented with {decimals} decimals")]
    AmountOutOfRange { amount: String, decimals: u32 },

    /// Facilitator communication error
    #[error("Facilitator error: {message}")]
    FacilitatorError { message: String },

    /// Wallet adapter failure
    #[error("Wallet error: {message}")]
    Wallet { message: String },

    /// A 402 arrived for a request whose body cannot be replayed
    #[error("Request cannot be retried with payment: body is not cloneable")]
    RequestNotCloneable,

    /// Payment header could not be built
    #[error("Invalid header: {message}")]
    InvalidHeader { message: String },

    /// Network not supported
    #[error("Network not supported: {network}")]
    NetworkNotSupported { network: String },

    /// Scheme not supported
    #[error("Scheme not supported: {scheme}")]
    SchemeNotSupported { scheme: String },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl X402Error {
    /// Create an invalid payment requirements error
    pub fn invalid_payment_requirements(message: impl Into<String>) -> Self {
        Self::InvalidPaymentRequirements {
            message: message.into(),
        }
    }

    /// Create a ceiling rejection carrying both amounts
    pub fn payment_ceiling_exceeded(
        requested: impl ToString,
        ceiling: impl ToString,
    ) -> Self {
        Self::PaymentCeilingExceeded {
            requested: requested.to_string(),
            ceiling: ceiling.to_string(),
        }
    }

    /// Create an invalid amount error
    pub fn invalid_amount(amount: impl Into<String>) -> Self {
        Self::InvalidAmount {
            amount: amount.into(),
        }
    }

    /// Create an amount out of range error
    pub fn amount_out_of_range(amount: impl Into<String>, decimals: u32) -> Self {
        Self::AmountOutOfRange {
            amount: amount.into(),
            decimals,
        }
    }

    /// Create a facilitator error
    pub fn facilitator_error(message: impl Into<String>) -> Self {
        Self::FacilitatorError {
            message: message.into(),
        }
    }

    /// Create a wallet error
    pub fn wallet(message: impl Into<String>) -> Self {
        Self::Wallet {
            message: message.into(),
        }
    }

    /// Create an invalid header error
    pub fn invalid_header(message: impl Into<String>) -> Self {
        Self::InvalidHeader {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

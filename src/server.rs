//! Resource-server side of the handshake
//!
//! [`PaymentHandler`] issues 402 challenges and hands payment envelopes to a
//! remote facilitator. It never checks signatures or touches a chain itself.
//!
//! Per request the flow is:
//!
//! ```text
//! extract ── none ──────────────▶ 402
//!    │
//!    └─ envelope ── verify ── invalid ─▶ 402
//!                     │
//!                     └─ valid ─▶ serve resource, settle in background
//! ```

use crate::config::ServerConfig;
use crate::facilitator::FacilitatorClient;
use crate::types::*;
use crate::{Result, PAYMENT_HEADER};
use std::collections::HashMap;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Error text of the first-contact 402
pub const PAYMENT_REQUIRED_ERROR: &str = "X-PAYMENT header is required";

/// Error text of the 402 sent when the facilitator does not vouch for a payment
pub const INVALID_PAYMENT_ERROR: &str = "Invalid payment";

/// Case-insensitive access to request headers
///
/// Implemented for single-valued and multi-valued header maps so the handler
/// works with whatever shape the HTTP stack hands over.
pub trait HeaderLookup {
    /// First value of the header `name`
    fn first_value(&self, name: &str) -> Option<&str>;
}

impl HeaderLookup for HashMap<String, String> {
    fn first_value(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

impl HeaderLookup for HashMap<String, Vec<String>> {
    fn first_value(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }
}

impl HeaderLookup for http::HeaderMap {
    /// Accepts any UTF-8 value; `HeaderValue::to_str` would drop non-ASCII ones
    fn first_value(&self, name: &str) -> Option<&str> {
        self.get(name)
            .and_then(|value| std::str::from_utf8(value.as_bytes()).ok())
    }
}

/// Result of running one request through the payment gate
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome {
    /// No usable payment header; answer with the challenge
    PaymentRequired(PaymentRequiredResponse),
    /// A payment was presented but the facilitator did not accept it
    Invalid(PaymentRequiredResponse),
    /// The facilitator vouched for the payment
    Verified {
        envelope: PaymentEnvelope,
        requirements: PaymentRequirements,
    },
}

/// Issues challenges and forwards payments to the facilitator
#[derive(Debug, Clone)]
pub struct PaymentHandler {
    config: ServerConfig,
    facilitator: FacilitatorClient,
}

impl PaymentHandler {
    pub fn new(config: ServerConfig) -> Result<Self> {
        let facilitator = FacilitatorClient::new(config.facilitator.clone())?;
        Ok(Self {
            config,
            facilitator,
        })
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn facilitator(&self) -> &FacilitatorClient {
        &self.facilitator
    }

    /// Read the payment envelope from `headers`
    ///
    /// A missing header and a malformed one both yield `None`: the caller
    /// answers either with a fresh challenge.
    pub fn extract_payment<H>(headers: &H) -> Option<PaymentEnvelope>
    where
        H: HeaderLookup + ?Sized,
    {
        let value = headers.first_value(PAYMENT_HEADER)?;
        match PaymentEnvelope::from_header_value(value) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                debug!(error = %e, "ignoring malformed payment header");
                None
            }
        }
    }

    /// Terms for an `exact` payment of `amount` to the treasury
    pub fn create_payment_requirements(
        &self,
        amount: impl Into<String>,
        resource: impl Into<String>,
        asset: Option<&str>,
        description: Option<&str>,
    ) -> PaymentRequirements {
        let mut requirements = PaymentRequirements::new(
            PaymentScheme::Exact,
            self.config.network,
            amount,
            &self.config.treasury_address,
            resource,
        );
        requirements.asset = asset.map(str::to_string);
        requirements.description = description.map(str::to_string);
        requirements
    }

    /// Ask the facilitator whether `envelope` satisfies `requirements`
    ///
    /// Fails closed: transport and decoding errors count as invalid.
    pub async fn verify_payment(
        &self,
        envelope: &PaymentEnvelope,
        requirements: &PaymentRequirements,
    ) -> bool {
        match self
            .facilitator
            .verify(&envelope.payment_payload, requirements)
            .await
        {
            Ok(result) if result.is_valid => {
                info!(
                    resource = %requirements.resource,
                    payer = ?result.payer,
                    "payment verified"
                );
                true
            }
            Ok(result) => {
                debug!(
                    resource = %requirements.resource,
                    reason = ?result.error,
                    "facilitator rejected payment"
                );
                false
            }
            Err(e) => {
                warn!(
                    resource = %requirements.resource,
                    error = %e,
                    "payment verification failed, treating as invalid"
                );
                false
            }
        }
    }

    /// Ask the facilitator to settle `envelope`
    pub async fn settle_payment(
        &self,
        envelope: &PaymentEnvelope,
        requirements: &PaymentRequirements,
    ) -> Result<SettleResult> {
        self.facilitator
            .settle(&envelope.payment_payload, requirements)
            .await
    }

    /// Settle on a detached task; the outcome only reaches the log
    pub fn spawn_settlement(
        &self,
        envelope: PaymentEnvelope,
        requirements: PaymentRequirements,
    ) -> JoinHandle<()> {
        let handler = self.clone();
        tokio::spawn(async move {
            match handler.settle_payment(&envelope, &requirements).await {
                Ok(result) if result.is_valid => info!(
                    resource = %requirements.resource,
                    transaction = ?result.transaction_hash,
                    "payment settled"
                ),
                Ok(result) => warn!(
                    resource = %requirements.resource,
                    reason = ?result.error,
                    "facilitator refused settlement"
                ),
                Err(e) => warn!(
                    resource = %requirements.resource,
                    error = %e,
                    "background settlement failed"
                ),
            }
        })
    }

    /// The challenge sent when no payment is presented
    pub fn create_402_response(&self, requirements: PaymentRequirements) -> PaymentRequiredResponse {
        PaymentRequiredResponse::new(PAYMENT_REQUIRED_ERROR, requirements)
    }

    /// Run the extract and verify steps for one request
    pub async fn authorize<H>(
        &self,
        amount: &str,
        resource: impl Into<String>,
        headers: &H,
    ) -> GateOutcome
    where
        H: HeaderLookup + ?Sized,
    {
        let requirements = self.create_payment_requirements(amount, resource, None, None);

        let Some(envelope) = Self::extract_payment(headers) else {
            return GateOutcome::PaymentRequired(self.create_402_response(requirements));
        };

        if !self.verify_payment(&envelope, &requirements).await {
            return GateOutcome::Invalid(PaymentRequiredResponse::new(
                INVALID_PAYMENT_ERROR,
                requirements,
            ));
        }

        GateOutcome::Verified {
            envelope,
            requirements,
        }
    }
}

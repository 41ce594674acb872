//! Axum middleware gating routes behind x402 payments

use crate::server::{GateOutcome, PaymentHandler};
use crate::types::{PaymentEnvelope, PaymentRequiredResponse};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::debug;

/// Called once a payment has been verified, before the route runs
pub type PaymentCallback = Arc<dyn Fn(&PaymentEnvelope) + Send + Sync>;

impl IntoResponse for PaymentRequiredResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::PAYMENT_REQUIRED);
        (status, Json(self.body)).into_response()
    }
}

/// State for [`payment_middleware`]: what to charge for the wrapped routes
#[derive(Clone)]
pub struct PaymentGate {
    handler: Arc<PaymentHandler>,
    amount: String,
    resource: Option<String>,
    on_payment_verified: Option<PaymentCallback>,
}

impl std::fmt::Debug for PaymentGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentGate")
            .field("handler", &self.handler)
            .field("amount", &self.amount)
            .field("resource", &self.resource)
            .field("on_payment_verified", &"<function>")
            .finish()
    }
}

impl PaymentGate {
    /// Charge `amount` (atomic units) per request
    pub fn new(handler: Arc<PaymentHandler>, amount: impl Into<String>) -> Self {
        Self {
            handler,
            amount: amount.into(),
            resource: None,
            on_payment_verified: None,
        }
    }

    /// Fixed resource identifier; defaults to the request path
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn on_payment_verified<F>(mut self, callback: F) -> Self
    where
        F: Fn(&PaymentEnvelope) + Send + Sync + 'static,
    {
        self.on_payment_verified = Some(Arc::new(callback));
        self
    }

    pub fn amount(&self) -> &str {
        &self.amount
    }
}

impl PaymentHandler {
    /// Build the middleware state for routes costing `amount`
    ///
    /// Install with `axum::middleware::from_fn_with_state(gate, payment_middleware)`.
    pub fn middleware(
        self: &Arc<Self>,
        amount: impl Into<String>,
        resource: Option<String>,
        on_payment_verified: Option<PaymentCallback>,
    ) -> PaymentGate {
        PaymentGate {
            handler: Arc::clone(self),
            amount: amount.into(),
            resource,
            on_payment_verified,
        }
    }
}

/// Axum middleware function for handling x402 payments
///
/// Settlement is spawned after verification and is not awaited; the route
/// runs regardless of how settlement ends.
pub async fn payment_middleware(
    State(gate): State<PaymentGate>,
    request: Request,
    next: Next,
) -> Response {
    let resource = gate
        .resource
        .clone()
        .unwrap_or_else(|| request.uri().path().to_string());

    let outcome = gate
        .handler
        .authorize(&gate.amount, resource, request.headers())
        .await;

    match outcome {
        GateOutcome::PaymentRequired(challenge) => challenge.into_response(),
        GateOutcome::Invalid(rejection) => rejection.into_response(),
        GateOutcome::Verified {
            envelope,
            requirements,
        } => {
            if let Some(callback) = &gate.on_payment_verified {
                callback(&envelope);
            }
            debug!(resource = %requirements.resource, "payment accepted, serving request");
            gate.handler.spawn_settlement(envelope, requirements);
            next.run(request).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FacilitatorConfig, ServerConfig};
    use crate::types::{Network, PaymentRequirements, PaymentScheme};

    fn handler() -> Arc<PaymentHandler> {
        Arc::new(
            PaymentHandler::new(
                ServerConfig::new(Network::Base, "0xtreasury")
                    .with_facilitator(FacilitatorConfig::new("http://localhost:1")),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_payment_gate_builder() {
        let gate = PaymentGate::new(handler(), "1000")
            .with_resource("/premium")
            .on_payment_verified(|_| {});
        assert_eq!(gate.amount(), "1000");
        assert_eq!(gate.resource.as_deref(), Some("/premium"));
        assert!(gate.on_payment_verified.is_some());
    }

    #[test]
    fn test_handler_middleware_constructor() {
        let gate = handler().middleware("25", None, None);
        assert_eq!(gate.amount(), "25");
        assert!(gate.resource.is_none());
    }

    #[tokio::test]
    async fn test_payment_required_into_response() {
        let requirements =
            PaymentRequirements::new(PaymentScheme::Exact, Network::Base, "1", "0xa", "/r");
        let response = PaymentRequiredResponse::new("Payment required", requirements).into_response();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
    }
}

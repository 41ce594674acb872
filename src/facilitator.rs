//! Facilitator client for payment verification and settlement

use crate::config::FacilitatorConfig;
use crate::types::*;
use crate::{Result, X402Error};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Request body shared by `/verify` and `/settle`
#[derive(Debug, Serialize)]
struct FacilitatorRequest<'a> {
    #[serde(rename = "x402Version")]
    x402_version: u32,
    #[serde(rename = "paymentPayload")]
    payment_payload: &'a PaymentPayload,
    #[serde(rename = "paymentRequirements")]
    payment_requirements: &'a PaymentRequirements,
}

/// Facilitator client for verifying and settling payments
#[derive(Debug, Clone)]
pub struct FacilitatorClient {
    config: FacilitatorConfig,
    /// HTTP client
    client: Client,
}

impl FacilitatorClient {
    /// Create a new facilitator client
    pub fn new(config: FacilitatorConfig) -> Result<Self> {
        config.validate()?;

        let mut client_builder = Client::builder();

        if let Some(timeout) = config.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        let client = client_builder
            .build()
            .map_err(|e| X402Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Reuse an existing HTTP client
    pub fn with_client(config: FacilitatorConfig, client: Client) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, client })
    }

    /// Get the base URL of this facilitator
    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Check facilitator liveness
    pub async fn health(&self) -> Result<HealthResponse> {
        let response = self.client.get(self.config.endpoint("health")).send().await?;
        Self::parse(response, "Health check").await
    }

    /// Get supported networks, schemes, assets, and capabilities
    pub async fn supported(&self) -> Result<SupportedResponse> {
        let response = self
            .client
            .get(self.config.endpoint("supported"))
            .send()
            .await?;
        Self::parse(response, "Failed to get supported kinds").await
    }

    /// Verify a payment without executing the transaction
    pub async fn verify(
        &self,
        payment_payload: &PaymentPayload,
        payment_requirements: &PaymentRequirements,
    ) -> Result<VerifyResult> {
        debug!(
            resource = %payment_requirements.resource,
            network = %payment_payload.network,
            "verifying payment with facilitator"
        );
        let response = self
            .post("verify", payment_payload, payment_requirements)
            .await?;
        Self::parse(response, "Verification").await
    }

    /// Settle a verified payment by executing the transaction
    pub async fn settle(
        &self,
        payment_payload: &PaymentPayload,
        payment_requirements: &PaymentRequirements,
    ) -> Result<SettleResult> {
        debug!(
            resource = %payment_requirements.resource,
            network = %payment_payload.network,
            "settling payment with facilitator"
        );
        let response = self
            .post("settle", payment_payload, payment_requirements)
            .await?;
        Self::parse(response, "Settlement").await
    }

    async fn post(
        &self,
        path: &str,
        payment_payload: &PaymentPayload,
        payment_requirements: &PaymentRequirements,
    ) -> Result<Response> {
        let body = FacilitatorRequest {
            x402_version: X402_VERSION,
            payment_payload,
            payment_requirements,
        };

        Ok(self
            .client
            .post(self.config.endpoint(path))
            .json(&body)
            .send()
            .await?)
    }

    async fn parse<T: DeserializeOwned>(response: Response, what: &str) -> Result<T> {
        if !response.status().is_success() {
            return Err(X402Error::facilitator_error(format!(
                "{} failed with status: {}",
                what,
                response.status()
            )));
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

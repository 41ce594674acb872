//! HTTP client with x402 payment support

use crate::config::ClientConfig;
use crate::facilitator::FacilitatorClient;
use crate::nonce::{NonceSource, OsNonceSource};
use crate::types::*;
use crate::wallet::{create_payment_payload, WalletAdapter};
use crate::{Result, X402Error};
use chrono::Utc;
use ethereum_types::U256;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const PAYMENT_HEADER_NAME: HeaderName = HeaderName::from_static("x-payment");

/// Only the field of a 402 body the client acts on
#[derive(Debug, Deserialize)]
struct PaymentChallenge {
    #[serde(rename = "paymentRequirements")]
    payment_requirements: PaymentRequirements,
}

/// HTTP client with x402 payment support
#[derive(Clone)]
pub struct X402Client {
    /// Underlying HTTP client
    client: Client,
    facilitator: FacilitatorClient,
    wallet: Arc<dyn WalletAdapter>,
    nonce_source: Arc<dyn NonceSource>,
    network: Network,
    max_payment: Option<U256>,
}

impl std::fmt::Debug for X402Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X402Client")
            .field("facilitator", &self.facilitator)
            .field("wallet", &"<wallet>")
            .field("network", &self.network)
            .field("max_payment", &self.max_payment)
            .finish()
    }
}

impl X402Client {
    /// Create a new x402 client
    pub fn new(config: ClientConfig, wallet: Arc<dyn WalletAdapter>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| X402Error::config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            facilitator: FacilitatorClient::new(config.facilitator)?,
            client,
            wallet,
            nonce_source: Arc::new(OsNonceSource),
            network: config.network,
            max_payment: config.max_payment,
        })
    }

    /// Replace the randomness used for authorization nonces
    pub fn with_nonce_source(mut self, nonce_source: Arc<dyn NonceSource>) -> Self {
        self.nonce_source = nonce_source;
        self
    }

    /// Network the wallet pays on
    pub fn network(&self) -> Network {
        self.network
    }

    /// Configured payment ceiling, if any
    pub fn max_payment(&self) -> Option<U256> {
        self.max_payment
    }

    pub fn facilitator(&self) -> &FacilitatorClient {
        &self.facilitator
    }

    /// Create a GET request
    pub fn get(&self, url: &str) -> X402RequestBuilder<'_> {
        self.request(Method::GET, url)
    }

    /// Create a POST request
    pub fn post(&self, url: &str) -> X402RequestBuilder<'_> {
        self.request(Method::POST, url)
    }

    /// Create a PUT request
    pub fn put(&self, url: &str) -> X402RequestBuilder<'_> {
        self.request(Method::PUT, url)
    }

    /// Create a DELETE request
    pub fn delete(&self, url: &str) -> X402RequestBuilder<'_> {
        self.request(Method::DELETE, url)
    }

    pub fn request(&self, method: Method, url: &str) -> X402RequestBuilder<'_> {
        X402RequestBuilder::new(self, self.client.request(method, url))
    }

    /// Send `request`, paying and retrying once if the server answers 402
    ///
    /// Responses other than 402 are returned untouched. A 402 on the paid
    /// retry is also returned as-is.
    pub async fn fetch(&self, request: Request) -> Result<Response> {
        let retry = request.try_clone();
        let url = request.url().clone();

        let response = self.client.execute(request).await?;
        if response.status() != StatusCode::PAYMENT_REQUIRED {
            return Ok(response);
        }

        debug!(%url, "payment required");
        let requirements = Self::parse_challenge(response).await?;
        self.check_network(&requirements)?;
        self.check_ceiling(&requirements)?;

        let mut retry = retry.ok_or(X402Error::RequestNotCloneable)?;
        let envelope = self.create_envelope(requirements).await?;
        let header = HeaderValue::from_str(&envelope.to_header_value()?)
            .map_err(|e| X402Error::invalid_header(e.to_string()))?;
        retry
            .headers_mut()
            .insert(PAYMENT_HEADER_NAME, header);

        info!(
            %url,
            amount = %envelope.payment_requirements.max_amount_required,
            network = %envelope.payment_requirements.network,
            "retrying request with payment"
        );
        let response = self.client.execute(retry).await?;
        if response.status() == StatusCode::PAYMENT_REQUIRED {
            debug!(%url, "payment was not accepted");
        }
        Ok(response)
    }

    /// Build the envelope answering `requirements`
    pub async fn create_envelope(
        &self,
        requirements: PaymentRequirements,
    ) -> Result<PaymentEnvelope> {
        let payload = create_payment_payload(
            self.wallet.as_ref(),
            self.nonce_source.as_ref(),
            &requirements,
            Utc::now().timestamp(),
        )
        .await?;
        Ok(PaymentEnvelope::new(payload, requirements))
    }

    /// Reject requirements asking for payment on another network
    pub fn check_network(&self, requirements: &PaymentRequirements) -> Result<()> {
        if requirements.network != self.network {
            return Err(X402Error::NetworkNotSupported {
                network: requirements.network.to_string(),
            });
        }
        Ok(())
    }

    /// Reject requirements above the configured ceiling
    pub fn check_ceiling(&self, requirements: &PaymentRequirements) -> Result<()> {
        let requested = requirements.amount().map_err(|_| {
            X402Error::invalid_payment_requirements(format!(
                "maxAmountRequired is not a decimal integer: {}",
                requirements.max_amount_required
            ))
        })?;

        match self.max_payment {
            Some(ceiling) if requested > ceiling => {
                Err(X402Error::payment_ceiling_exceeded(requested, ceiling))
            }
            _ => Ok(()),
        }
    }

    /// Facilitator `/health` passthrough
    pub async fn get_health(&self) -> Result<HealthResponse> {
        self.facilitator.health().await
    }

    /// Facilitator `/supported` passthrough
    pub async fn get_supported(&self) -> Result<SupportedResponse> {
        self.facilitator.supported().await
    }

    async fn parse_challenge(response: Response) -> Result<PaymentRequirements> {
        let body = response.bytes().await?;
        let challenge: PaymentChallenge = serde_json::from_slice(&body).map_err(|e| {
            X402Error::invalid_payment_requirements(format!("malformed 402 response body: {}", e))
        })?;
        Ok(challenge.payment_requirements)
    }
}

/// Request builder for x402 client
#[derive(Debug)]
pub struct X402RequestBuilder<'a> {
    client: &'a X402Client,
    request: reqwest::RequestBuilder,
}

impl<'a> X402RequestBuilder<'a> {
    fn new(client: &'a X402Client, request: reqwest::RequestBuilder) -> Self {
        Self { client, request }
    }

    /// Add a header to the request
    pub fn header<K, V>(self, key: K, value: V) -> Self
    where
        HeaderName: TryFrom<K>,
        <HeaderName as TryFrom<K>>::Error: Into<http::Error>,
        HeaderValue: TryFrom<V>,
        <HeaderValue as TryFrom<V>>::Error: Into<http::Error>,
    {
        Self {
            request: self.request.header(key, value),
            ..self
        }
    }

    /// Add multiple headers to the request
    pub fn headers(self, headers: HeaderMap) -> Self {
        Self {
            request: self.request.headers(headers),
            ..self
        }
    }

    /// Set the request body
    pub fn body(self, body: impl Into<reqwest::Body>) -> Self {
        Self {
            request: self.request.body(body),
            ..self
        }
    }

    /// Set JSON body
    pub fn json<T: serde::Serialize>(self, json: &T) -> Self {
        Self {
            request: self.request.json(json),
            ..self
        }
    }

    /// Set query parameters
    pub fn query<T: serde::Serialize>(self, query: &T) -> Self {
        Self {
            request: self.request.query(query),
            ..self
        }
    }

    /// Set timeout for the request
    pub fn timeout(self, timeout: Duration) -> Self {
        Self {
            request: self.request.timeout(timeout),
            ..self
        }
    }

    /// Send the request, completing a 402 handshake if one is demanded
    pub async fn send(self) -> Result<Response> {
        let request = self.request.build()?;
        self.client.fetch(request).await
    }

    /// Send the request and return the response as JSON
    pub async fn send_and_get_json<T>(self) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.send().await?;
        response.json().await.map_err(X402Error::from)
    }
}

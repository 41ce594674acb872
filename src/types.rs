//! Core types for the x402 protocol

use crate::{Result, X402Error};
use base64::{engine::general_purpose, Engine as _};
use ethereum_types::U256;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// x402 protocol version
pub const X402_VERSION: u32 = 1;

fn default_x402_version() -> u32 {
    X402_VERSION
}

/// Payment scheme identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentScheme {
    /// Pay exactly the required amount
    Exact,
    /// Pay up to the required amount
    Upto,
    /// Payment is recorded now and collected later
    Deferred,
}

impl PaymentScheme {
    /// Get the scheme identifier string
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentScheme::Exact => "exact",
            PaymentScheme::Upto => "upto",
            PaymentScheme::Deferred => "deferred",
        }
    }
}

impl fmt::Display for PaymentScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentScheme {
    type Err = X402Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "exact" => Ok(PaymentScheme::Exact),
            "upto" => Ok(PaymentScheme::Upto),
            "deferred" => Ok(PaymentScheme::Deferred),
            other => Err(X402Error::SchemeNotSupported {
                scheme: other.to_string(),
            }),
        }
    }
}

/// Supported blockchain networks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Network {
    Base,
    BaseSepolia,
    Avalanche,
    AvalancheFuji,
    Polygon,
    PolygonAmoy,
}

impl Network {
    /// Every network this library knows about
    pub const ALL: [Network; 6] = [
        Network::Base,
        Network::BaseSepolia,
        Network::Avalanche,
        Network::AvalancheFuji,
        Network::Polygon,
        Network::PolygonAmoy,
    ];

    /// Get the network identifier string
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Base => "base",
            Network::BaseSepolia => "base-sepolia",
            Network::Avalanche => "avalanche",
            Network::AvalancheFuji => "avalanche-fuji",
            Network::Polygon => "polygon",
            Network::PolygonAmoy => "polygon-amoy",
        }
    }

    /// EVM chain ID
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Base => 8453,
            Network::BaseSepolia => 84532,
            Network::Avalanche => 43114,
            Network::AvalancheFuji => 43113,
            Network::Polygon => 137,
            Network::PolygonAmoy => 80002,
        }
    }

    /// Whether this is a test network
    pub fn is_testnet(&self) -> bool {
        matches!(
            self,
            Network::BaseSepolia | Network::AvalancheFuji | Network::PolygonAmoy
        )
    }

    /// Get the USDC contract address for this network
    pub fn usdc_address(&self) -> &'static str {
        match self {
            Network::Base => "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
            Network::BaseSepolia => "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
            Network::Avalanche => "0xB97EF9Ef8734C71904D8002F8b6Bc66Dd9c48a6E",
            Network::AvalancheFuji => "0x5425890298aed601595a70AB815c96711a31Bc65",
            Network::Polygon => "0x3c499c542cEF5E3811e1192ce70d8cC03d5c3359",
            Network::PolygonAmoy => "0x41E94Eb019C0762f9Bfcf9Fb1E58725BfB0e7582",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = X402Error;

    fn from_str(s: &str) -> Result<Self> {
        Network::ALL
            .iter()
            .copied()
            .find(|network| network.as_str() == s)
            .ok_or_else(|| X402Error::NetworkNotSupported {
                network: s.to_string(),
            })
    }
}

/// Parse a non-negative base-10 integer amount in the smallest token unit
pub fn parse_amount(amount: &str) -> Result<U256> {
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(X402Error::invalid_amount(amount));
    }
    U256::from_dec_str(amount).map_err(|_| X402Error::invalid_amount(amount))
}

/// Payment requirements for a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequirements {
    /// Payment scheme identifier
    pub scheme: PaymentScheme,
    /// Blockchain network identifier
    pub network: Network,
    /// Required payment amount in atomic token units
    #[serde(rename = "maxAmountRequired")]
    pub max_amount_required: String,
    /// Recipient wallet address for the payment
    #[serde(rename = "payTo")]
    pub pay_to: String,
    /// Identifier of the protected resource
    pub resource: String,
    /// Token contract address; absent means the network's native asset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<String>,
    /// Human-readable description of the resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Unix timestamp (seconds) after which these terms lapse
    #[serde(
        rename = "validUntil",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub valid_until: Option<u64>,
}

impl PaymentRequirements {
    /// Create a new payment requirements instance
    pub fn new(
        scheme: PaymentScheme,
        network: Network,
        max_amount_required: impl Into<String>,
        pay_to: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            scheme,
            network,
            max_amount_required: max_amount_required.into(),
            pay_to: pay_to.into(),
            resource: resource.into(),
            asset: None,
            description: None,
            nonce: None,
            valid_until: None,
        }
    }

    pub fn with_asset(mut self, asset: impl Into<String>) -> Self {
        self.asset = Some(asset.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn with_valid_until(mut self, valid_until: u64) -> Self {
        self.valid_until = Some(valid_until);
        self
    }

    /// Get the amount as an unsigned 256-bit integer
    pub fn amount(&self) -> Result<U256> {
        parse_amount(&self.max_amount_required)
    }

    /// Get the amount in decimal units (e.g., 0.01 for 10000 with 6 decimals)
    ///
    /// `Decimal` holds at most 96 bits of mantissa and 28 decimal places.
    /// Amounts above roughly 7.9e28, or `decimals > 28`, give
    /// [`X402Error::AmountOutOfRange`] even though [`Self::amount`] accepts them.
    pub fn amount_in_decimal_units(&self, decimals: u32) -> Result<Decimal> {
        parse_amount(&self.max_amount_required)?;
        let out_of_range =
            || X402Error::amount_out_of_range(&self.max_amount_required, decimals);
        let mut amount = Decimal::from_str(&self.max_amount_required).map_err(|_| out_of_range())?;
        amount.set_scale(decimals).map_err(|_| out_of_range())?;
        Ok(amount.normalize())
    }

    /// True when no token contract is named and the native asset is implied
    pub fn is_native_asset(&self) -> bool {
        self.asset.is_none()
    }

    /// Whether `valid_until` lies before `now` (unix seconds)
    pub fn is_expired_at(&self, now: i64) -> bool {
        match self.valid_until {
            Some(valid_until) => i64::try_from(valid_until).map_or(false, |until| now > until),
            None => false,
        }
    }
}

/// Payment payload for client payment authorization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentPayload {
    /// Protocol version identifier
    #[serde(rename = "x402Version", default = "default_x402_version")]
    pub x402_version: u32,
    /// Payment scheme identifier
    pub scheme: PaymentScheme,
    /// Blockchain network identifier
    pub network: Network,
    /// Scheme-specific fields, opaque to this library
    pub payload: Map<String, Value>,
}

impl PaymentPayload {
    /// Create a new payment payload
    pub fn new(scheme: PaymentScheme, network: Network, payload: Map<String, Value>) -> Self {
        Self {
            x402_version: X402_VERSION,
            scheme,
            network,
            payload,
        }
    }

    /// Create a payment payload from a typed scheme payload
    pub fn from_scheme_payload<T: Serialize>(
        scheme: PaymentScheme,
        network: Network,
        scheme_payload: &T,
    ) -> Result<Self> {
        match serde_json::to_value(scheme_payload)? {
            Value::Object(payload) => Ok(Self::new(scheme, network, payload)),
            other => Err(X402Error::invalid_payment_requirements(format!(
                "scheme payload must be a JSON object, got {}",
                other
            ))),
        }
    }

    /// Decode the opaque payload into a typed scheme payload
    pub fn scheme_payload<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(Value::Object(self.payload.clone()))?)
    }
}

/// Transfer authorization parameters of the `exact` scheme
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferAuthorization {
    /// Payer's wallet address
    pub from: String,
    /// Recipient's wallet address
    pub to: String,
    /// Payment amount in atomic units
    pub value: String,
    /// Unix timestamp when authorization becomes valid
    #[serde(rename = "validAfter")]
    pub valid_after: String,
    /// Unix timestamp when authorization expires
    #[serde(rename = "validBefore")]
    pub valid_before: String,
    /// 32-byte random nonce, hex encoded with a 0x prefix
    pub nonce: String,
}

/// Scheme payload carried by [`PaymentPayload::payload`] for `exact` payments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExactPayload {
    pub signature: String,
    pub authorization: TransferAuthorization,
}

/// Wire envelope sent in the payment header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEnvelope {
    #[serde(rename = "x402Version", default = "default_x402_version")]
    pub x402_version: u32,
    #[serde(rename = "paymentPayload")]
    pub payment_payload: PaymentPayload,
    #[serde(rename = "paymentRequirements")]
    pub payment_requirements: PaymentRequirements,
}

impl PaymentEnvelope {
    pub fn new(payment_payload: PaymentPayload, payment_requirements: PaymentRequirements) -> Self {
        Self {
            x402_version: X402_VERSION,
            payment_payload,
            payment_requirements,
        }
    }

    /// Encode the envelope as a compact JSON header value
    ///
    /// Non-ASCII characters are written as `\uXXXX` escapes: header values
    /// must stay visible ASCII to survive `HeaderValue::to_str` on the far side.
    pub fn to_header_value(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(escape_non_ascii(&json))
    }

    /// Encode the envelope as base64 JSON
    pub fn to_base64(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(general_purpose::STANDARD.encode(json))
    }

    /// Decode a header value holding either raw JSON or base64 JSON
    pub fn from_header_value(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.starts_with('{') {
            return Ok(serde_json::from_str(value)?);
        }
        let decoded = general_purpose::STANDARD.decode(value)?;
        Ok(serde_json::from_slice(&decoded)?)
    }
}

/// Rewrite non-ASCII characters of serialized JSON as UTF-16 `\u` escapes
///
/// Only string contents can hold such characters, so the result decodes to
/// the same value.
fn escape_non_ascii(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    let mut units = [0u16; 2];
    for c in json.chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            for unit in c.encode_utf16(&mut units).iter() {
                out.push_str(&format!("\\u{:04x}", *unit));
            }
        }
    }
    out
}

/// Payment verification response
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VerifyResult {
    /// Whether the payment is valid; absent means not valid
    #[serde(rename = "isValid", default)]
    pub is_valid: bool,
    /// Payer's address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Reason for invalidity (if applicable)
    #[serde(
        default,
        alias = "invalidReason",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
}

/// Payment settlement response
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SettleResult {
    /// Whether the settlement was accepted
    #[serde(rename = "isValid", default)]
    pub is_valid: bool,
    /// Payer address if applicable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer: Option<String>,
    /// Transaction hash or identifier
    #[serde(
        rename = "transactionHash",
        alias = "transaction",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub transaction_hash: Option<String>,
    /// Error reason if settlement failed
    #[serde(
        default,
        alias = "errorReason",
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<String>,
}

/// Facilitator health state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Body of the facilitator `/health` endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// Seconds since the facilitator started
    pub uptime: f64,
    pub version: String,
    pub network: String,
    #[serde(
        rename = "blockHeight",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub block_height: Option<u64>,
}

/// Body of the facilitator `/supported` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SupportedResponse {
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(rename = "paymentSchemes", default)]
    pub payment_schemes: Vec<String>,
    #[serde(default)]
    pub assets: Vec<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl SupportedResponse {
    /// Whether the facilitator lists both the network and the scheme
    pub fn supports(&self, network: Network, scheme: PaymentScheme) -> bool {
        self.networks.iter().any(|n| n == network.as_str())
            && self.payment_schemes.iter().any(|s| s == scheme.as_str())
    }
}

/// Body of a 402 Payment Required response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequiredBody {
    /// Human-readable error message
    pub error: String,
    /// Protocol version
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    #[serde(rename = "paymentRequirements")]
    pub payment_requirements: PaymentRequirements,
}

/// A 402 response ready to be written by whatever HTTP stack serves it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRequiredResponse {
    pub status: u16,
    pub body: PaymentRequiredBody,
}

impl PaymentRequiredResponse {
    /// Create a 402 response with a custom error message
    pub fn new(error: impl Into<String>, payment_requirements: PaymentRequirements) -> Self {
        Self {
            status: 402,
            body: PaymentRequiredBody {
                error: error.into(),
                x402_version: X402_VERSION,
                payment_requirements,
            },
        }
    }
}

//! Configuration for x402 clients, servers, and facilitator access

use crate::types::{parse_amount, Network};
use crate::{Result, X402Error};
use ethereum_types::U256;
use std::env;
use std::time::Duration;

/// Default facilitator URL
pub const DEFAULT_FACILITATOR_URL: &str = "https://x402.org/facilitator";

pub const ENV_FACILITATOR_URL: &str = "X402_FACILITATOR_URL";
pub const ENV_FACILITATOR_TIMEOUT_SECS: &str = "X402_FACILITATOR_TIMEOUT_SECS";
pub const ENV_NETWORK: &str = "X402_NETWORK";
pub const ENV_MAX_PAYMENT: &str = "X402_MAX_PAYMENT";
pub const ENV_TREASURY_ADDRESS: &str = "X402_TREASURY_ADDRESS";

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn network_from_env() -> Result<Network> {
    let value = env_var(ENV_NETWORK)
        .ok_or_else(|| X402Error::config(format!("{} must be set", ENV_NETWORK)))?;
    value.trim().parse()
}

/// Facilitator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacilitatorConfig {
    /// Base URL of the facilitator service
    pub url: String,
    /// Request timeout
    pub timeout: Option<Duration>,
}

impl FacilitatorConfig {
    /// Create a new facilitator config
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout: None,
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validate the facilitator configuration
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(X402Error::config("Facilitator URL cannot be empty"));
        }

        let parsed = url::Url::parse(&self.url)
            .map_err(|e| X402Error::config(format!("Invalid facilitator URL: {}", e)))?;

        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(X402Error::config(
                "Facilitator URL must start with http:// or https://",
            ));
        }

        Ok(())
    }

    /// Join an endpoint path onto the base URL
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Load from `X402_FACILITATOR_URL` and `X402_FACILITATOR_TIMEOUT_SECS`
    pub fn from_env() -> Result<Self> {
        let url = env_var(ENV_FACILITATOR_URL).unwrap_or_else(|| DEFAULT_FACILITATOR_URL.to_string());
        let mut config = Self::new(url);

        if let Some(secs) = env_var(ENV_FACILITATOR_TIMEOUT_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                X402Error::config(format!(
                    "{} must be a whole number of seconds",
                    ENV_FACILITATOR_TIMEOUT_SECS
                ))
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for FacilitatorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FACILITATOR_URL)
    }
}

/// Settings for the paying side of the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub facilitator: FacilitatorConfig,
    pub network: Network,
    /// Largest `maxAmountRequired` the client pays without intervention
    pub max_payment: Option<U256>,
}

impl ClientConfig {
    pub fn new(network: Network) -> Self {
        Self {
            facilitator: FacilitatorConfig::default(),
            network,
            max_payment: None,
        }
    }

    pub fn with_facilitator(mut self, facilitator: FacilitatorConfig) -> Self {
        self.facilitator = facilitator;
        self
    }

    pub fn with_max_payment(mut self, max_payment: U256) -> Self {
        self.max_payment = Some(max_payment);
        self
    }

    /// Load from the `X402_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(network_from_env()?)
            .with_facilitator(FacilitatorConfig::from_env()?);

        if let Some(max) = env_var(ENV_MAX_PAYMENT) {
            let max = parse_amount(max.trim()).map_err(|_| {
                X402Error::config(format!("{} must be a decimal integer", ENV_MAX_PAYMENT))
            })?;
            config = config.with_max_payment(max);
        }

        Ok(config)
    }
}

/// Settings for the resource server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub facilitator: FacilitatorConfig,
    pub network: Network,
    /// Address that receives payments
    pub treasury_address: String,
}

impl ServerConfig {
    pub fn new(network: Network, treasury_address: impl Into<String>) -> Self {
        Self {
            facilitator: FacilitatorConfig::default(),
            network,
            treasury_address: treasury_address.into(),
        }
    }

    pub fn with_facilitator(mut self, facilitator: FacilitatorConfig) -> Self {
        self.facilitator = facilitator;
        self
    }

    /// Load from the `X402_*` environment variables
    pub fn from_env() -> Result<Self> {
        let treasury = env_var(ENV_TREASURY_ADDRESS)
            .ok_or_else(|| X402Error::config(format!("{} must be set", ENV_TREASURY_ADDRESS)))?;

        Ok(Self::new(network_from_env()?, treasury.trim())
            .with_facilitator(FacilitatorConfig::from_env()?))
    }
}

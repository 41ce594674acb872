//! Example client paying for a protected resource
//!
//! Uses [`StaticWallet`], whose signatures are placeholders. A real facilitator
//! will reject them; swap in a signing `WalletAdapter` for live payments.

use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use x402_lite::{wallet::StaticWallet, ClientConfig, X402Client, X402Error};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let payer = std::env::var("X402_PAYER_ADDRESS")
        .unwrap_or_else(|_| "0x857b06519E91e3A54538791bDbb0E22373e36b66".to_string());
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:4021/joke".to_string());

    let config = ClientConfig::from_env()?;
    let client = X402Client::new(config, Arc::new(StaticWallet::new(payer)))?;

    match client.get_health().await {
        Ok(health) => println!("Facilitator {:?} (version {})", health.status, health.version),
        Err(e) => println!("Facilitator health unavailable: {}", e),
    }

    match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => {
            println!("Success: {}", response.text().await?);
        }
        Ok(response) => {
            println!("Request failed with status: {}", response.status());
        }
        Err(X402Error::PaymentCeilingExceeded { requested, ceiling }) => {
            println!("Refusing to pay {} (ceiling {})", requested, ceiling);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

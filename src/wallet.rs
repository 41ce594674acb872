//! Wallet capability used by the client to build payment payloads
//!
//! The library never holds keys. A [`WalletAdapter`] supplies the payer
//! address and a signature over the transfer authorization.
//!
//! # Signing status
//!
//! [`StaticWallet`] does not sign anything: it returns a zero-filled
//! 65-byte signature. Facilitators will reject such payloads. Production
//! callers must provide an adapter backed by a real signer (hardware
//! wallet, KMS, local key store) before this handshake can settle funds.

use crate::nonce::{generate_nonce, NonceSource};
use crate::types::{ExactPayload, PaymentPayload, PaymentRequirements, TransferAuthorization};
use crate::Result;
use async_trait::async_trait;

/// Seconds a freshly built authorization stays valid
pub const AUTHORIZATION_VALIDITY_SECS: i64 = 3600;

/// Length of an ECDSA signature with recovery byte
const SIGNATURE_LEN: usize = 65;

/// Zero-filled, `0x` prefixed signature used when no signer is available
pub fn placeholder_signature() -> String {
    format!("0x{}", "00".repeat(SIGNATURE_LEN))
}

/// Capability that identifies the payer and signs authorizations
#[async_trait]
pub trait WalletAdapter: Send + Sync {
    /// Public address of the paying account
    async fn address(&self) -> Result<String>;

    /// Produce a scheme-valid signature over `authorization`
    async fn sign_authorization(
        &self,
        requirements: &PaymentRequirements,
        authorization: &TransferAuthorization,
    ) -> Result<String>;
}

/// Wallet with a fixed address and placeholder signatures
#[derive(Debug, Clone)]
pub struct StaticWallet {
    address: String,
}

impl StaticWallet {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl WalletAdapter for StaticWallet {
    async fn address(&self) -> Result<String> {
        Ok(self.address.clone())
    }

    async fn sign_authorization(
        &self,
        _requirements: &PaymentRequirements,
        _authorization: &TransferAuthorization,
    ) -> Result<String> {
        // TODO: replace with an EIP-712 transferWithAuthorization signer once a key backend is chosen
        Ok(placeholder_signature())
    }
}

/// Build a payment payload answering `requirements`
///
/// The authorization pays `maxAmountRequired` to `payTo` and is valid for
/// one hour starting at `now` (unix seconds).
pub async fn create_payment_payload(
    wallet: &dyn WalletAdapter,
    nonce_source: &dyn NonceSource,
    requirements: &PaymentRequirements,
    now: i64,
) -> Result<PaymentPayload> {
    let from = wallet.address().await?;

    let authorization = TransferAuthorization {
        from,
        to: requirements.pay_to.clone(),
        value: requirements.max_amount_required.clone(),
        valid_after: now.to_string(),
        valid_before: (now + AUTHORIZATION_VALIDITY_SECS).to_string(),
        nonce: generate_nonce(nonce_source),
    };

    let signature = wallet
        .sign_authorization(requirements, &authorization)
        .await?;

    PaymentPayload::from_scheme_payload(
        requirements.scheme,
        requirements.network,
        &ExactPayload {
            signature,
            authorization,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nonce::FixedNonceSource;
    use crate::types::{Network, PaymentScheme};

    const PAYER: &str = "0x857b06519E91e3A54538791bDbb0E22373e36b66";
    const PAY_TO: &str = "0x209693Bc6afc0C5328bA36FaF03C514EF312287C";

    #[test]
    fn test_placeholder_signature() {
        let signature = placeholder_signature();
        assert_eq!(signature.len(), 2 + SIGNATURE_LEN * 2);
        assert!(signature[2..].chars().all(|c| c == '0'));
    }

    #[tokio::test]
    async fn test_create_payment_payload() {
        let wallet = StaticWallet::new(PAYER);
        let requirements = PaymentRequirements::new(
            PaymentScheme::Exact,
            Network::BaseSepolia,
            "250000",
            PAY_TO,
            "/premium",
        );

        let payload = create_payment_payload(
            &wallet,
            &FixedNonceSource([7; 32]),
            &requirements,
            1_745_323_800,
        )
        .await
        .unwrap();

        assert_eq!(payload.scheme, PaymentScheme::Exact);
        assert_eq!(payload.network, Network::BaseSepolia);

        let exact: ExactPayload = payload.scheme_payload().unwrap();
        assert_eq!(exact.signature, placeholder_signature());
        assert_eq!(exact.authorization.from, PAYER);
        assert_eq!(exact.authorization.to, PAY_TO);
        assert_eq!(exact.authorization.value, "250000");
        assert_eq!(exact.authorization.valid_after, "1745323800");
        assert_eq!(exact.authorization.valid_before, "1745327400");
        assert_eq!(exact.authorization.nonce, format!("0x{}", "07".repeat(32)));
    }

    struct FailingWallet;

    #[async_trait]
    impl WalletAdapter for FailingWallet {
        async fn address(&self) -> Result<String> {
            Err(crate::X402Error::wallet("locked"))
        }

        async fn sign_authorization(
            &self,
            _requirements: &PaymentRequirements,
            _authorization: &TransferAuthorization,
        ) -> Result<String> {
            unreachable!("address fails first")
        }
    }

    #[tokio::test]
    async fn test_wallet_failure_propagates() {
        let requirements =
            PaymentRequirements::new(PaymentScheme::Exact, Network::Base, "1", PAY_TO, "/r");
        let err = create_payment_payload(&FailingWallet, &FixedNonceSource([0; 32]), &requirements, 0)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("locked"));
    }
}

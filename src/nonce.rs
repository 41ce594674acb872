//! Randomness used for payment nonces

use rand::RngCore;

/// Source of 32 random bytes for each payment authorization
pub trait NonceSource: Send + Sync {
    fn random_bytes(&self) -> [u8; 32];
}

/// Thread-local CSPRNG seeded from the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct OsNonceSource;

impl NonceSource for OsNonceSource {
    fn random_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes
    }
}

/// Always returns the same bytes. Useful for reproducible payloads in tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedNonceSource(pub [u8; 32]);

impl NonceSource for FixedNonceSource {
    fn random_bytes(&self) -> [u8; 32] {
        self.0
    }
}

/// Draw a fresh nonce and hex encode it with a `0x` prefix
pub fn generate_nonce(source: &dyn NonceSource) -> String {
    format!("0x{}", hex::encode(source.random_bytes()))
}

//! Token secret generation.
//!
//! Secrets are 32 bytes (256 bits) from the OS CSPRNG, encoded as unpadded
//! URL-safe base64: 43 characters from `[A-Za-z0-9_-]`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use crate::errors::TokenError;

pub const SECRET_BYTES: usize = 32;

/// Source of token secrets.
pub trait SecretGenerator: Send + Sync {
    fn generate(&self) -> Result<String, TokenError>;
}

/// Draws from the operating system's secure random source. Never falls back.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsRngGenerator;

impl SecretGenerator for OsRngGenerator {
    fn generate(&self) -> Result<String, TokenError> {
        let mut bytes = [0u8; SECRET_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| TokenError::Randomness(e.to_string()))?;
        let secret = URL_SAFE_NO_PAD.encode(bytes);
        bytes.zeroize();
        Ok(secret)
    }
}

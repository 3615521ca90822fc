use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// Why a presented credential was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing API key")]
    Missing,
    #[error("invalid API key")]
    Invalid,
}

/// Holds the SHA-256 digest of the accepted key; the key itself is dropped.
#[derive(Clone)]
pub struct ApiKeyGate {
    digest: [u8; 32],
}

impl std::fmt::Debug for ApiKeyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyGate")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl ApiKeyGate {
    pub fn new(key: &str) -> Result<Self> {
        anyhow::ensure!(!key.trim().is_empty(), "API key must not be blank");
        Ok(Self {
            digest: digest(key),
        })
    }

    /// Read the key from the environment variable `var`.
    pub fn from_env(var: &str) -> Result<Self> {
        let key = std::env::var(var)
            .with_context(|| format!("API key environment variable {var} is not set"))?;
        Self::new(&key).with_context(|| format!("API key environment variable {var} is blank"))
    }

    /// Short hex prefix of the key digest, safe to log.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.digest[..4])
    }

    pub fn verify(&self, presented: Option<&str>) -> Result<(), AuthError> {
        let presented = presented.ok_or(AuthError::Missing)?;
        if digest(presented) == self.digest {
            Ok(())
        } else {
            Err(AuthError::Invalid)
        }
    }
}

fn digest(key: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(key.as_bytes()));
    out
}

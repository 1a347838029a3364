//! Content hash and optional signature over a canonical analysis result.

use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::canonical::CanonicalResult;
use crate::error::ConfigError;

/// Algorithm tag prefixed to every result hash. Bump alongside any change to
/// the canonical serialization.
pub const HASH_ALGORITHM: &str = "sha256";

const SIGNING_KEY_ENV: &str = "RESULT_SIGNING_KEY";

/// Content-addressed digest of a canonical result, rendered `sha256:<hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultHash(String);

impl ResultHash {
    pub fn compute(canonical: &CanonicalResult) -> Self {
        let digest = Sha256::digest(canonical.canonical_bytes());
        Self(format!("{HASH_ALGORITHM}:{}", alloy::hex::encode(digest)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ResultHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Detached signature over a result hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSignature {
    /// Ed25519 signature bytes, base64-encoded.
    pub signature: String,
    /// Hex-encoded public key of the signer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

/// Signs result hashes with a configured ed25519 key.
pub struct ResultSigner {
    key: SigningKey,
}

impl ResultSigner {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    /// Load the signer from `RESULT_SIGNING_KEY` (32-byte hex seed).
    /// Absent key means signing is simply not configured; a present but
    /// invalid key is a fatal configuration error.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let raw = match std::env::var(SIGNING_KEY_ENV) {
            Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => return Ok(None),
        };
        Ok(Some(Self::from_hex(&raw)?))
    }

    /// Parse a 32-byte hex seed (with or without 0x prefix).
    pub fn from_hex(raw: &str) -> Result<Self, ConfigError> {
        let bytes = alloy::hex::decode(raw.strip_prefix("0x").unwrap_or(raw))
            .map_err(|_| ConfigError::InvalidSigningKey("not valid hex".to_string()))?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| ConfigError::InvalidSigningKey("expected 32 bytes".to_string()))?;
        Ok(Self::new(SigningKey::from_bytes(&seed)))
    }

    /// Sign the textual hash (`sha256:<hex>`), so the signature can be
    /// checked against the published hash string alone.
    pub fn sign(&self, hash: &ResultHash) -> ResultSignature {
        let signature = self.key.sign(hash.as_str().as_bytes());
        ResultSignature {
            signature: base64::engine::general_purpose::STANDARD.encode(signature.to_bytes()),
            public_key: Some(alloy::hex::encode(self.key.verifying_key().to_bytes())),
        }
    }
}

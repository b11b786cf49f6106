//! Optional signing capability
//!
//! The chain hands each entry hash to an [`EntrySigner`] before commit.
//! Without a signing key the [`NoopSigner`] is used and the chain runs
//! unchanged; it just cannot be attested by a third party.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw signature bytes, hex-encoded on the wire
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySignature(#[serde(with = "hex::serde")] pub Vec<u8>);

impl fmt::Debug for EntrySignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntrySignature({})", hex::encode(&self.0))
    }
}

/// Signing capability consumed by the audit chain
pub trait EntrySigner: Send + Sync + fmt::Debug {
    /// Sign `message`; `None` when this signer cannot sign
    fn sign(&self, message: &[u8]) -> Option<EntrySignature>;

    /// Check `signature` over `message`
    fn verify(&self, message: &[u8], signature: &EntrySignature) -> bool;

    /// Whether verification should demand a valid signature on every entry
    fn is_attesting(&self) -> bool {
        true
    }
}

/// Signer used when no key is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSigner;

impl EntrySigner for NoopSigner {
    fn sign(&self, _message: &[u8]) -> Option<EntrySignature> {
        None
    }

    fn verify(&self, _message: &[u8], _signature: &EntrySignature) -> bool {
        false
    }

    fn is_attesting(&self) -> bool {
        false
    }
}

/// Ed25519 signer holding the private key
#[derive(Debug, Clone)]
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    /// Signer from an existing key
    #[must_use]
    pub fn new(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    /// Signer from a 32-byte secret seed
    #[must_use]
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::new(SigningKey::from_bytes(seed))
    }

    /// Public half, for third-party attestation
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl EntrySigner for Ed25519Signer {
    fn sign(&self, message: &[u8]) -> Option<EntrySignature> {
        let sig: Signature = self.signing_key.sign(message);
        Some(EntrySignature(sig.to_bytes().to_vec()))
    }

    fn verify(&self, message: &[u8], signature: &EntrySignature) -> bool {
        verify_ed25519(&self.verifying_key(), message, signature)
    }
}

/// Verify-only counterpart of [`Ed25519Signer`]
#[derive(Debug, Clone)]
pub struct Ed25519Attestor {
    verifying_key: VerifyingKey,
}

impl Ed25519Attestor {
    /// Attestor for a known public key
    #[must_use]
    pub fn new(verifying_key: VerifyingKey) -> Self {
        Self { verifying_key }
    }

    /// Attestor from a hex-encoded 32-byte public key
    ///
    /// # Errors
    /// Returns a description of the problem if the key is malformed
    pub fn from_hex(public_key: &str) -> Result<Self, String> {
        let bytes = hex::decode(public_key.trim()).map_err(|e| e.to_string())?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| format!("public key must be 32 bytes, got {}", bytes.len()))?;
        let key = VerifyingKey::from_bytes(&arr).map_err(|e| e.to_string())?;
        Ok(Self::new(key))
    }
}

impl EntrySigner for Ed25519Attestor {
    fn sign(&self, _message: &[u8]) -> Option<EntrySignature> {
        None
    }

    fn verify(&self, message: &[u8], signature: &EntrySignature) -> bool {
        verify_ed25519(&self.verifying_key, message, signature)
    }
}

fn verify_ed25519(key: &VerifyingKey, message: &[u8], signature: &EntrySignature) -> bool {
    Signature::from_slice(&signature.0)
        .map(|sig| key.verify(message, &sig).is_ok())
        .unwrap_or(false)
}

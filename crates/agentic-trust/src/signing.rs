//! Signing seam — the interfaces the core needs from the identity
//! subsystem, plus Ed25519 defaults.
//!
//! The signing scheme itself is a collaborator concern: records carry
//! opaque base64 signatures plus an algorithm tag, and the core only
//! talks to the `RecordSigner` / `SignatureVerifier` traits. The
//! shipped implementations use Ed25519.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;

use crate::error::{Result, TrustError};

/// Algorithm tag written into records signed by the Ed25519 signer.
pub const ED25519_ALGORITHM: &str = "ed25519";

/// Produces signatures over record hash inputs.
///
/// Implemented by whatever holds key material — here an in-process
/// Ed25519 key, in production the identity subsystem.
pub trait RecordSigner {
    /// Sign a message, returning the signature as base64.
    fn sign(&self, message: &[u8]) -> String;

    /// Stable algorithm identifier stored alongside signatures.
    fn algorithm(&self) -> &str;

    /// The signer's public key as base64, stored for later validation.
    fn public_key_base64(&self) -> String;
}

/// Validates opaque signatures produced by a `RecordSigner`.
pub trait SignatureVerifier: Send + Sync {
    /// Verify a base64 signature over `message` against a base64 public key.
    fn verify(&self, public_key_b64: &str, message: &[u8], signature_b64: &str) -> Result<()>;
}

// ── Ed25519 defaults ──────────────────────────────────────────────────────────

/// Ed25519 record signer wrapping a signing key.
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    /// Generate a signer with a fresh random key pair.
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Reconstruct a signer from 32 signing-key bytes.
    pub fn from_signing_key_bytes(bytes: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(bytes),
        }
    }

    /// Return the signing key bytes for persistence.
    pub fn signing_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Return the verifying (public) key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl RecordSigner for Ed25519Signer {
    fn sign(&self, message: &[u8]) -> String {
        let sig = self.signing_key.sign(message);
        base64::Engine::encode(&base64::engine::general_purpose::STANDARD, sig.to_bytes())
    }

    fn algorithm(&self) -> &str {
        ED25519_ALGORITHM
    }

    fn public_key_base64(&self) -> String {
        base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            self.signing_key.verifying_key().to_bytes(),
        )
    }
}

/// Ed25519 signature validation against base64 public keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, public_key_b64: &str, message: &[u8], signature_b64: &str) -> Result<()> {
        let pub_bytes =
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, public_key_b64)
                .map_err(|e| TrustError::InvalidKey(format!("invalid base64 public key: {e}")))?;

        let key_bytes: [u8; 32] = pub_bytes
            .try_into()
            .map_err(|_| TrustError::InvalidKey("public key must be 32 bytes".into()))?;

        let verifying_key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| TrustError::InvalidKey(format!("invalid Ed25519 public key: {e}")))?;

        let sig_bytes =
            base64::Engine::decode(&base64::engine::general_purpose::STANDARD, signature_b64)
                .map_err(|e| TrustError::InvalidKey(format!("invalid base64 signature: {e}")))?;

        let sig_array: [u8; 64] = sig_bytes
            .try_into()
            .map_err(|_| TrustError::InvalidKey("signature must be 64 bytes".into()))?;

        let signature = Signature::from_bytes(&sig_array);
        verifying_key
            .verify(message, &signature)
            .map_err(|_| TrustError::SignatureInvalid)
    }
}

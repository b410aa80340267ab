//! Error types for AgenticTrust.
//!
//! Only structural and operational failures are errors. Authorization
//! denials (missing capability, violated constraint, expired or revoked
//! authority) are normal results carried by `VerificationResult` and
//! `DelegationOutcome`, never propagated through this enum.

/// Trust error types covering all operations.
#[derive(Debug, thiserror::Error)]
pub enum TrustError {
    /// Structural chain failure: ambiguous or missing genesis, cycle,
    /// broken parent link. Fatal, never retried.
    #[error("Invalid trust chain: {0}")]
    InvalidChain(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Signature verification failed")]
    SignatureInvalid,

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Store I/O exceeded its caller-supplied budget. Distinct from any
    /// authorization denial.
    #[error("Store operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// chain_hash mismatch on commit, retried up to the configured cap.
    #[error("Concurrent modification detected after {attempts} attempts")]
    ConcurrentModification { attempts: u32 },

    #[error("Operation cancelled")]
    Cancelled,

    /// Revocation commit presented a token that does not match the target.
    #[error("Confirmation token does not match revocation target {0}")]
    ConfirmationMismatch(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid file format: {0}")]
    InvalidFileFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, TrustError>;

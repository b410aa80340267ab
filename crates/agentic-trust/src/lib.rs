//! AgenticTrust — capability-based trust delegation core for AI agents.
//!
//! Provides the data model and engines for a chain-of-custody trust
//! system: authorities establish trust via genesis records, agents
//! delegate subsets of their capabilities under tightening constraints,
//! a verifier decides whether an action is authorized by the resulting
//! chain, and revocation cascades deterministically over the delegation
//! graph. Every decision is explainable and auditable; storage is
//! append-only and content-addressed.

pub mod audit;
pub mod chain;
pub mod constraint;
pub mod delegate;
pub mod error;
pub mod record;
pub mod revoke;
pub mod signing;
pub mod store;
pub mod time;
pub mod verify;

// Re-export primary types
pub use error::{Result, TrustError};
pub use record::{
    AgentId, AnchorResult, AttestationBuilder, AuditAnchor, AuthorityType, CapabilityAttestation,
    CapabilityScope, CapabilityType, ConstraintId, DelegationBuilder, DelegationRecord,
    GenesisBuilder, GenesisRecord, RevocationReason, RevocationRecord, StoredRecord,
};

// Re-export constraint model
pub use constraint::{
    ActionContext, AuditMode, Constraint, ConstraintEnvelope, ConstraintType, ConstraintValue,
    ConstraintViolation, TighteningReport, TighteningViolation, TimeWindow,
};

// Re-export engines and stores
pub use audit::AuditLedger;
pub use chain::{assemble, TrustChain};
pub use delegate::{
    DelegateRequest, DelegationEngine, DelegationOutcome, DelegationViolation,
};
pub use revoke::{
    ActiveTaskSource, CancellationToken, ConfirmationToken, RevocationEngine,
    RevocationImpactPreview, RevocationResult,
};
pub use signing::{Ed25519Signer, Ed25519Verifier, RecordSigner, SignatureVerifier};
pub use store::{AttestationStore, FileStore, MemoryStore};
pub use verify::{
    DenialReason, TrustVerifier, VerificationLevel, VerificationResult, VerifyRequest,
};

//! Stored record types — the append-only data model.
//!
//! Four stored record families plus constraints: genesis records,
//! capability attestations, delegation records, revocation records, and
//! audit anchors. Every record is created once, never mutated, and
//! becomes terminal only via a separate revocation record referencing
//! it; status is always a computed projection.
//!
//! Record IDs are content-addressed: `{prefix}_` + base58 of the first
//! 16 bytes of SHA-256 over the record hash.

pub mod anchor;
pub mod attestation;
pub mod capability;
pub mod delegation;
pub mod genesis;
pub mod revocation;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub use anchor::{AnchorBuilder, AnchorId, AnchorResult, AuditAnchor};
pub use attestation::{
    AttestationBuilder, AttestationId, CapabilityAttestation, CapabilityScope, CapabilityType,
};
pub use capability::{capabilities_cover, capability_uri_covers};
pub use delegation::{DelegationBuilder, DelegationId, DelegationRecord};
pub use genesis::{AuthorityType, GenesisBuilder, GenesisId, GenesisRecord};
pub use revocation::{RevocationBuilder, RevocationId, RevocationReason, RevocationRecord};

use crate::constraint::Constraint;

/// Opaque agent identifier, issued by the identity subsystem.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a constraint record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConstraintId(pub String);

impl std::fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hex SHA-256 over a record's hash input.
pub(crate) fn hash_hex(input: &str) -> String {
    hex::encode(Sha256::digest(input.as_bytes()))
}

/// Derive a content-addressed record ID from a record hash.
pub(crate) fn derive_record_id(prefix: &str, record_hash: &str) -> String {
    let id_hash = Sha256::digest(record_hash.as_bytes());
    let encoded = bs58::encode(&id_hash[..16]).into_string();
    format!("{prefix}_{encoded}")
}

/// Any record the attestation store holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StoredRecord {
    Genesis(GenesisRecord),
    Attestation(CapabilityAttestation),
    Constraint(Constraint),
    Delegation(DelegationRecord),
    Revocation(RevocationRecord),
    Anchor(AuditAnchor),
}

impl StoredRecord {
    /// The record's content-addressed ID.
    pub fn id(&self) -> &str {
        match self {
            Self::Genesis(r) => &r.id.0,
            Self::Attestation(r) => &r.id.0,
            Self::Constraint(r) => &r.id.0,
            Self::Delegation(r) => &r.id.0,
            Self::Revocation(r) => &r.id.0,
            Self::Anchor(r) => &r.id.0,
        }
    }

    /// The record's content hash.
    pub fn record_hash(&self) -> &str {
        match self {
            Self::Genesis(r) => &r.record_hash,
            Self::Attestation(r) => &r.record_hash,
            Self::Constraint(r) => &r.record_hash,
            Self::Delegation(r) => &r.record_hash,
            Self::Revocation(r) => &r.record_hash,
            Self::Anchor(r) => &r.record_hash,
        }
    }

    /// Short type tag used for file layout and logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Genesis(_) => "genesis",
            Self::Attestation(_) => "attestation",
            Self::Constraint(_) => "constraint",
            Self::Delegation(_) => "delegation",
            Self::Revocation(_) => "revocation",
            Self::Anchor(_) => "anchor",
        }
    }

    /// Agents this record should be indexed under.
    pub fn agent_ids(&self) -> Vec<&AgentId> {
        match self {
            Self::Genesis(r) => vec![&r.agent_id],
            Self::Attestation(r) => vec![&r.agent_id],
            Self::Constraint(_) => Vec::new(),
            Self::Delegation(r) => vec![&r.delegator_id, &r.delegatee_id],
            Self::Revocation(r) => vec![&r.agent_id],
            Self::Anchor(r) => vec![&r.agent_id],
        }
    }
}

//! Revocation records — terminal records invalidating an agent's authority.
//!
//! A revocation never mutates the records it invalidates. Each affected
//! agent in a cascade gets its own revocation record carrying the
//! cascade root and the agent's delegation depth below it, so the full
//! blast radius stays auditable from the store alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::signing::RecordSigner;

use super::{derive_record_id, hash_hex, AgentId};

/// Unique identifier for a revocation record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RevocationId(pub String);

impl std::fmt::Display for RevocationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reason for revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevocationReason {
    /// Agent's key or system has been compromised.
    Compromised,
    /// Agent violated the terms of its authority.
    PolicyViolation,
    /// Manual revocation by an authority or ancestor.
    ManualRevocation,
    /// Revoked because an ancestor in the delegation graph was revoked.
    CascadeParent,
    /// Authority expired and was terminally marked.
    Expired,
    /// Custom reason.
    Custom(String),
}

impl RevocationReason {
    /// Return a stable string representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Compromised => "compromised",
            Self::PolicyViolation => "policy_violation",
            Self::ManualRevocation => "manual_revocation",
            Self::CascadeParent => "cascade_parent",
            Self::Expired => "expired",
            Self::Custom(s) => s.as_str(),
        }
    }
}

/// A terminal record revoking one agent's authority.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationRecord {
    /// Unique revocation ID.
    pub id: RevocationId,
    /// The agent being revoked.
    pub agent_id: AgentId,
    /// Why.
    pub reason: RevocationReason,
    /// Who initiated the revocation (supplied by the identity subsystem).
    pub actor: AgentId,
    /// The originally revoked agent this cascade started from.
    pub cascade_root: AgentId,
    /// Delegation depth below the cascade root (0 = the root itself).
    pub depth: u32,
    /// When.
    pub revoked_at: DateTime<Utc>,
    /// Actor's public key.
    pub actor_key: String,
    /// Actor's signature over the record hash.
    pub signature: String,
    /// Hash of all revocation fields.
    pub record_hash: String,
}

/// Builder for revocation records.
pub struct RevocationBuilder {
    agent_id: AgentId,
    reason: RevocationReason,
    actor: AgentId,
    cascade_root: AgentId,
    depth: u32,
}

impl RevocationBuilder {
    /// Start building a revocation of `agent_id` initiated by `actor`.
    pub fn new(agent_id: AgentId, reason: RevocationReason, actor: AgentId) -> Self {
        let cascade_root = agent_id.clone();
        Self {
            agent_id,
            reason,
            actor,
            cascade_root,
            depth: 0,
        }
    }

    /// Mark this record as part of a cascade rooted elsewhere.
    pub fn cascade(mut self, root: AgentId, depth: u32) -> Self {
        self.cascade_root = root;
        self.depth = depth;
        self
    }

    /// Sign and finalize the revocation record.
    pub fn sign(self, signer: &dyn RecordSigner) -> Result<RevocationRecord> {
        let revoked_at = crate::time::now();
        let actor_key = signer.public_key_base64();

        let hash_input = format!(
            "revoke:{}:{}:{}:{}:{}:{}",
            self.agent_id.0,
            self.reason.as_str(),
            self.actor.0,
            self.cascade_root.0,
            self.depth,
            revoked_at.to_rfc3339(),
        );
        let record_hash = hash_hex(&hash_input);
        let id = RevocationId(derive_record_id("arev", &record_hash));
        let signature = signer.sign(record_hash.as_bytes());

        Ok(RevocationRecord {
            id,
            agent_id: self.agent_id,
            reason: self.reason,
            actor: self.actor,
            cascade_root: self.cascade_root,
            depth: self.depth,
            revoked_at,
            actor_key,
            signature,
            record_hash,
        })
    }
}

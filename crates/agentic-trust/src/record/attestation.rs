//! Capability attestations — what an agent MAY do.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::signing::RecordSigner;

use super::{derive_record_id, hash_hex, AgentId, ConstraintId};

/// Unique identifier for a capability attestation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttestationId(pub String);

impl std::fmt::Display for AttestationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Broad classification of a capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityType {
    Access,
    Mutation,
    Execution,
    Delegation,
    Custom(String),
}

impl CapabilityType {
    /// Return a stable string representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Access => "access",
            Self::Mutation => "mutation",
            Self::Execution => "execution",
            Self::Delegation => "delegation",
            Self::Custom(s) => s.as_str(),
        }
    }
}

/// Where a capability applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapabilityScope {
    /// No scope narrowing.
    Unrestricted,
    /// Limited to resources matching a pattern.
    Resource(String),
    /// Limited to one task.
    Task(String),
}

/// A signed statement that an agent may exercise a capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityAttestation {
    /// Unique attestation ID.
    pub id: AttestationId,
    /// The agent being attested.
    pub agent_id: AgentId,
    /// Namespaced capability URI (e.g. "read:data").
    pub capability: String,
    /// Broad classification.
    pub capability_type: CapabilityType,
    /// Constraints attached to this capability.
    pub constraints: Vec<ConstraintId>,
    /// Who attested.
    pub attester_id: AgentId,
    /// When.
    pub attested_at: DateTime<Utc>,
    /// Optional expiry.
    pub expires_at: Option<DateTime<Utc>>,
    /// Attester's public key.
    pub attester_key: String,
    /// Attester's signature over the record hash.
    pub signature: String,
    /// Where the capability applies.
    pub scope: CapabilityScope,
    /// Hash of all attestation fields.
    pub record_hash: String,
}

/// Builder for capability attestations.
pub struct AttestationBuilder {
    agent_id: AgentId,
    capability: String,
    capability_type: CapabilityType,
    constraints: Vec<ConstraintId>,
    attester_id: AgentId,
    expires_at: Option<DateTime<Utc>>,
    scope: CapabilityScope,
}

impl AttestationBuilder {
    /// Start building an attestation of `capability` for `agent_id`.
    pub fn new(
        agent_id: AgentId,
        attester_id: AgentId,
        capability: impl Into<String>,
        capability_type: CapabilityType,
    ) -> Self {
        Self {
            agent_id,
            capability: capability.into(),
            capability_type,
            constraints: Vec::new(),
            attester_id,
            expires_at: None,
            scope: CapabilityScope::Unrestricted,
        }
    }

    /// Attach a constraint.
    pub fn constraint(mut self, id: ConstraintId) -> Self {
        self.constraints.push(id);
        self
    }

    /// Attach multiple constraints.
    pub fn constraints(mut self, ids: Vec<ConstraintId>) -> Self {
        self.constraints.extend(ids);
        self
    }

    /// Set an expiry.
    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Narrow the scope.
    pub fn scope(mut self, scope: CapabilityScope) -> Self {
        self.scope = scope;
        self
    }

    /// Sign and finalize the attestation.
    pub fn sign(self, signer: &dyn RecordSigner) -> Result<CapabilityAttestation> {
        let attested_at = crate::time::now();
        let attester_key = signer.public_key_base64();

        let constraints_json = serde_json::to_string(&self.constraints).unwrap_or_default();
        let scope_json = serde_json::to_string(&self.scope).unwrap_or_default();
        let hash_input = format!(
            "{}:{}:{}:{}:{}:{}:{}:{}",
            self.agent_id.0,
            self.capability,
            self.capability_type.as_str(),
            constraints_json,
            self.attester_id.0,
            attested_at.to_rfc3339(),
            self.expires_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            scope_json,
        );
        let record_hash = hash_hex(&hash_input);
        let id = AttestationId(derive_record_id("acap", &record_hash));
        let signature = signer.sign(record_hash.as_bytes());

        Ok(CapabilityAttestation {
            id,
            agent_id: self.agent_id,
            capability: self.capability,
            capability_type: self.capability_type,
            constraints: self.constraints,
            attester_id: self.attester_id,
            attested_at,
            expires_at: self.expires_at,
            attester_key,
            signature,
            scope: self.scope,
            record_hash,
        })
    }
}

impl CapabilityAttestation {
    /// Is the attestation past its expiry at the given time?
    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expiry) if at > expiry)
    }
}

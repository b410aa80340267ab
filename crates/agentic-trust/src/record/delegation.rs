//! Delegation records — an agent granting a subset of its authority.
//!
//! Delegation edges form a DAG over agents. `parent_delegation_id`
//! points at the delegator's own inbound edge, so a chain can be walked
//! backward to its genesis root. The invariants (capability subset,
//! constraint tightening, acyclicity, expiry clamp) are enforced by the
//! delegation engine before a record is ever created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::signing::RecordSigner;

use super::{derive_record_id, hash_hex, AgentId, ConstraintId};

/// Unique identifier for a delegation record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DelegationId(pub String);

impl std::fmt::Display for DelegationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A signed delegation of capabilities from delegator to delegatee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegationRecord {
    /// Unique delegation ID.
    pub id: DelegationId,
    /// Who is delegating.
    pub delegator_id: AgentId,
    /// Who receives the delegation.
    pub delegatee_id: AgentId,
    /// Optional task the delegation is bound to.
    pub task_id: Option<String>,
    /// Capability URIs delegated (subset of the delegator's effective set).
    pub capabilities_delegated: Vec<String>,
    /// Constraints imposed on the delegatee (tighten inherited ones).
    pub constraint_subset: Vec<ConstraintId>,
    /// When the delegation was made.
    pub delegated_at: DateTime<Utc>,
    /// Optional expiry (clamped to the delegator's own expiry).
    pub expires_at: Option<DateTime<Utc>>,
    /// Delegator's public key.
    pub delegator_key: String,
    /// Delegator's signature over the record hash.
    pub signature: String,
    /// The delegator's own inbound delegation edge (None = genesis-rooted).
    pub parent_delegation_id: Option<DelegationId>,
    /// Hash of all delegation fields.
    pub record_hash: String,
}

/// Builder for delegation records.
pub struct DelegationBuilder {
    delegator_id: AgentId,
    delegatee_id: AgentId,
    task_id: Option<String>,
    capabilities_delegated: Vec<String>,
    constraint_subset: Vec<ConstraintId>,
    expires_at: Option<DateTime<Utc>>,
    parent_delegation_id: Option<DelegationId>,
}

impl DelegationBuilder {
    /// Start building a delegation from delegator to delegatee.
    pub fn new(delegator_id: AgentId, delegatee_id: AgentId) -> Self {
        Self {
            delegator_id,
            delegatee_id,
            task_id: None,
            capabilities_delegated: Vec::new(),
            constraint_subset: Vec::new(),
            expires_at: None,
            parent_delegation_id: None,
        }
    }

    /// Bind the delegation to a task.
    pub fn task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    /// Add a delegated capability URI.
    pub fn capability(mut self, uri: impl Into<String>) -> Self {
        self.capabilities_delegated.push(uri.into());
        self
    }

    /// Add multiple delegated capability URIs.
    pub fn capabilities(mut self, uris: impl IntoIterator<Item = String>) -> Self {
        self.capabilities_delegated.extend(uris);
        self
    }

    /// Attach an imposed constraint.
    pub fn constraint(mut self, id: ConstraintId) -> Self {
        self.constraint_subset.push(id);
        self
    }

    /// Attach multiple imposed constraints.
    pub fn constraints(mut self, ids: impl IntoIterator<Item = ConstraintId>) -> Self {
        self.constraint_subset.extend(ids);
        self
    }

    /// Set an expiry.
    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }

    /// Point at the delegator's own inbound delegation edge.
    pub fn parent(mut self, parent: DelegationId) -> Self {
        self.parent_delegation_id = Some(parent);
        self
    }

    /// Sign and finalize the delegation record.
    pub fn sign(self, signer: &dyn RecordSigner) -> Result<DelegationRecord> {
        let delegated_at = crate::time::now();
        let delegator_key = signer.public_key_base64();

        let caps_json = serde_json::to_string(&self.capabilities_delegated).unwrap_or_default();
        let constraints_json = serde_json::to_string(&self.constraint_subset).unwrap_or_default();
        let hash_input = format!(
            "{}:{}:{}:{}:{}:{}:{}:{}",
            self.delegator_id.0,
            self.delegatee_id.0,
            self.task_id.as_deref().unwrap_or(""),
            caps_json,
            constraints_json,
            delegated_at.to_rfc3339(),
            self.expires_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            self.parent_delegation_id
                .as_ref()
                .map(|p| p.0.as_str())
                .unwrap_or(""),
        );
        let record_hash = hash_hex(&hash_input);
        let id = DelegationId(derive_record_id("adel", &record_hash));
        let signature = signer.sign(record_hash.as_bytes());

        Ok(DelegationRecord {
            id,
            delegator_id: self.delegator_id,
            delegatee_id: self.delegatee_id,
            task_id: self.task_id,
            capabilities_delegated: self.capabilities_delegated,
            constraint_subset: self.constraint_subset,
            delegated_at,
            expires_at: self.expires_at,
            delegator_key,
            signature,
            parent_delegation_id: self.parent_delegation_id,
            record_hash,
        })
    }
}

impl DelegationRecord {
    /// Is the delegation past its expiry at the given time?
    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expiry) if at > expiry)
    }
}

//! Audit anchors — immutable, hash-linked records of decisions.
//!
//! Every verified or denied action can be anchored. Anchors chain
//! per agent via `parent_anchor_id`, so tampering with history breaks
//! the link hashes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::signing::RecordSigner;

use super::{derive_record_id, hash_hex, AgentId};

/// Unique identifier for an audit anchor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorId(pub String);

impl std::fmt::Display for AnchorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Outcome recorded by an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnchorResult {
    Success,
    Failure,
    Denied,
    Partial,
}

impl AnchorResult {
    /// Return a stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Denied => "denied",
            Self::Partial => "partial",
        }
    }
}

/// An immutable audit record of one decision or action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditAnchor {
    /// Unique anchor ID.
    pub id: AnchorId,
    /// The agent the decision concerned.
    pub agent_id: AgentId,
    /// The action that was attempted.
    pub action: String,
    /// The resource acted on, if any.
    pub resource: Option<String>,
    /// When.
    pub timestamp: DateTime<Utc>,
    /// chain_hash of the trust chain the decision was made against.
    pub trust_chain_hash: String,
    /// The outcome.
    pub result: AnchorResult,
    /// Signer's public key.
    pub signer_key: String,
    /// Signature over the anchor hash.
    pub signature: String,
    /// Previous anchor for this agent (hash-chained).
    pub parent_anchor_id: Option<AnchorId>,
    /// Arbitrary decision context.
    pub context: Option<serde_json::Value>,
    /// Hash of all anchor fields.
    pub record_hash: String,
}

/// Builder for audit anchors.
pub struct AnchorBuilder {
    agent_id: AgentId,
    action: String,
    resource: Option<String>,
    trust_chain_hash: String,
    result: AnchorResult,
    parent_anchor_id: Option<AnchorId>,
    context: Option<serde_json::Value>,
}

impl AnchorBuilder {
    /// Start building an anchor for a decision about `agent_id`.
    pub fn new(
        agent_id: AgentId,
        action: impl Into<String>,
        result: AnchorResult,
        trust_chain_hash: impl Into<String>,
    ) -> Self {
        Self {
            agent_id,
            action: action.into(),
            resource: None,
            trust_chain_hash: trust_chain_hash.into(),
            result,
            parent_anchor_id: None,
            context: None,
        }
    }

    /// Name the resource acted on.
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Chain this anchor to the agent's previous anchor.
    pub fn chain_to(mut self, previous: AnchorId) -> Self {
        self.parent_anchor_id = Some(previous);
        self
    }

    /// Attach decision context.
    pub fn context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    /// Sign and finalize the anchor.
    pub fn sign(self, signer: &dyn RecordSigner) -> Result<AuditAnchor> {
        let timestamp = crate::time::now();
        let signer_key = signer.public_key_base64();

        let hash_input = anchor_hash_input(
            &self.agent_id,
            &self.action,
            self.resource.as_deref(),
            timestamp,
            &self.trust_chain_hash,
            self.result,
            self.parent_anchor_id.as_ref(),
            self.context.as_ref(),
        );
        let record_hash = hash_hex(&hash_input);
        let id = AnchorId(derive_record_id("aanc", &record_hash));
        let signature = signer.sign(record_hash.as_bytes());

        Ok(AuditAnchor {
            id,
            agent_id: self.agent_id,
            action: self.action,
            resource: self.resource,
            timestamp,
            trust_chain_hash: self.trust_chain_hash,
            result: self.result,
            signer_key,
            signature,
            parent_anchor_id: self.parent_anchor_id,
            context: self.context,
            record_hash,
        })
    }
}

impl AuditAnchor {
    /// Recompute the hash over this anchor's fields.
    ///
    /// A stored anchor whose `record_hash` no longer matches has been
    /// tampered with.
    pub fn compute_hash(&self) -> String {
        hash_hex(&anchor_hash_input(
            &self.agent_id,
            &self.action,
            self.resource.as_deref(),
            self.timestamp,
            &self.trust_chain_hash,
            self.result,
            self.parent_anchor_id.as_ref(),
            self.context.as_ref(),
        ))
    }
}

#[allow(clippy::too_many_arguments)]
fn anchor_hash_input(
    agent_id: &AgentId,
    action: &str,
    resource: Option<&str>,
    timestamp: DateTime<Utc>,
    trust_chain_hash: &str,
    result: AnchorResult,
    parent_anchor_id: Option<&AnchorId>,
    context: Option<&serde_json::Value>,
) -> String {
    format!(
        "{}:{}:{}:{}:{}:{}:{}:{}",
        agent_id.0,
        action,
        resource.unwrap_or(""),
        timestamp.to_rfc3339(),
        trust_chain_hash,
        result.as_str(),
        parent_anchor_id.map(|a| a.0.as_str()).unwrap_or(""),
        serde_json::to_string(&context).unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signing::Ed25519Signer;

    #[test]
    fn test_anchor_create() {
        let signer = Ed25519Signer::generate();
        let anchor = AnchorBuilder::new(
            AgentId::new("agent_a"),
            "read:data",
            AnchorResult::Success,
            "chainhash123",
        )
        .sign(&signer)
        .unwrap();

        assert!(anchor.id.0.starts_with("aanc_"));
        assert_eq!(anchor.result, AnchorResult::Success);
        assert!(anchor.parent_anchor_id.is_none());
    }

    #[test]
    fn test_anchor_chaining() {
        let signer = Ed25519Signer::generate();
        let first = AnchorBuilder::new(
            AgentId::new("agent_a"),
            "read:data",
            AnchorResult::Success,
            "chainhash123",
        )
        .sign(&signer)
        .unwrap();

        let second = AnchorBuilder::new(
            AgentId::new("agent_a"),
            "write:data",
            AnchorResult::Denied,
            "chainhash123",
        )
        .chain_to(first.id.clone())
        .resource("db.users")
        .sign(&signer)
        .unwrap();

        assert_eq!(second.parent_anchor_id.as_ref().unwrap(), &first.id);
        assert_eq!(second.resource.as_deref(), Some("db.users"));
    }

    #[test]
    fn test_anchor_result_strings() {
        assert_eq!(AnchorResult::Success.as_str(), "success");
        assert_eq!(AnchorResult::Denied.as_str(), "denied");
        assert_eq!(AnchorResult::Partial.as_str(), "partial");
    }
}

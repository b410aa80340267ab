//! Audit ledger — hash-chained anchors for every decision.
//!
//! Appends one anchor per verified/denied action, chained per agent via
//! `parent_anchor_id`. The ledger never mutates; verification walks the
//! links re-checking hashes and signatures.

use std::sync::Arc;

use crate::error::{Result, TrustError};
use crate::record::{AgentId, AnchorBuilder, AnchorResult, AuditAnchor, StoredRecord};
use crate::signing::{RecordSigner, SignatureVerifier};
use crate::store::AttestationStore;

/// Append-only ledger of audit anchors over an attestation store.
pub struct AuditLedger {
    store: Arc<dyn AttestationStore>,
}

impl AuditLedger {
    pub fn new(store: Arc<dyn AttestationStore>) -> Self {
        Self { store }
    }

    /// Append an anchor for a decision, chained to the agent's latest.
    pub fn append(
        &self,
        agent_id: &AgentId,
        action: impl Into<String>,
        resource: Option<String>,
        result: AnchorResult,
        trust_chain_hash: &str,
        context: Option<serde_json::Value>,
        signer: &dyn RecordSigner,
    ) -> Result<AuditAnchor> {
        let previous = self.store.anchors_for(agent_id)?.pop();

        let mut builder = AnchorBuilder::new(
            agent_id.clone(),
            action,
            result,
            trust_chain_hash.to_string(),
        );
        if let Some(resource) = resource {
            builder = builder.resource(resource);
        }
        if let Some(previous) = previous {
            builder = builder.chain_to(previous.id);
        }
        if let Some(context) = context {
            builder = builder.context(context);
        }

        let anchor = builder.sign(signer)?;
        self.store.put(StoredRecord::Anchor(anchor.clone()))?;
        Ok(anchor)
    }

    /// All anchors for an agent, oldest first.
    pub fn anchors_for(&self, agent_id: &AgentId) -> Result<Vec<AuditAnchor>> {
        self.store.anchors_for(agent_id)
    }

    /// Verify the agent's anchor chain: every link must point at its
    /// predecessor, every hash must match the anchor's content, and
    /// every signature must check out.
    ///
    /// # Errors
    ///
    /// `TrustError::InvalidChain` on a broken link or tampered anchor,
    /// `TrustError::SignatureInvalid` on a bad signature.
    pub fn verify_anchor_chain(
        &self,
        agent_id: &AgentId,
        verifier: &dyn SignatureVerifier,
    ) -> Result<usize> {
        let anchors = self.store.anchors_for(agent_id)?;

        for (i, anchor) in anchors.iter().enumerate() {
            if anchor.compute_hash() != anchor.record_hash {
                return Err(TrustError::InvalidChain(format!(
                    "anchor {} content does not match its hash",
                    anchor.id
                )));
            }
            verifier.verify(
                &anchor.signer_key,
                anchor.record_hash.as_bytes(),
                &anchor.signature,
            )?;

            if i > 0 {
                let expected = &anchors[i - 1].id;
                match &anchor.parent_anchor_id {
                    Some(parent) if parent == expected => {}
                    _ => {
                        return Err(TrustError::InvalidChain(format!(
                            "anchor {} does not chain to its predecessor {expected}",
                            anchor.id
                        )))
                    }
                }
            }
        }

        Ok(anchors.len())
    }
}

//! Attestation store — append-only, content-addressed record storage.
//!
//! The store has no update or delete: records go in once and are only
//! ever superseded by later terminal records. That is what makes
//! chain_hash recomputation pure and audit-safe.
//!
//! # Modules
//!
//! - [`memory`] — arena-map store with secondary indexes, for engines
//!   and tests.
//! - [`file`] — versioned-JSON directory store, one file per record.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::constraint::Constraint;
use crate::error::Result;
use crate::record::{
    AgentId, AuditAnchor, CapabilityAttestation, DelegationRecord, GenesisRecord,
    RevocationRecord, StoredRecord,
};

/// Append-only, content-addressed storage of all record types.
///
/// Implementations must be safe for concurrent readers; `put` must be
/// idempotent for identical content and must reject an existing ID with
/// different content.
pub trait AttestationStore: Send + Sync {
    /// Append a record; returns its content-addressed ID.
    fn put(&self, record: StoredRecord) -> Result<String>;

    /// Fetch a record by ID.
    fn get(&self, id: &str) -> Result<Option<StoredRecord>>;

    /// All records indexed under an agent (genesis, attestations,
    /// delegations in either direction, revocations, anchors).
    fn list_by_agent(&self, agent_id: &AgentId) -> Result<Vec<StoredRecord>>;

    /// Delegations where the agent is the delegator.
    fn list_delegations_by_delegator(&self, agent_id: &AgentId) -> Result<Vec<DelegationRecord>>;

    /// Delegations where the agent is the delegatee.
    fn list_delegations_by_delegatee(&self, agent_id: &AgentId) -> Result<Vec<DelegationRecord>>;

    // ── Projections over the required operations ──────────────────────────────

    /// The agent's genesis record, if one is stored.
    fn genesis_for(&self, agent_id: &AgentId) -> Result<Option<GenesisRecord>> {
        Ok(self
            .list_by_agent(agent_id)?
            .into_iter()
            .find_map(|r| match r {
                StoredRecord::Genesis(g) if &g.agent_id == agent_id => Some(g),
                _ => None,
            }))
    }

    /// Capability attestations naming the agent.
    fn attestations_for(&self, agent_id: &AgentId) -> Result<Vec<CapabilityAttestation>> {
        Ok(self
            .list_by_agent(agent_id)?
            .into_iter()
            .filter_map(|r| match r {
                StoredRecord::Attestation(a) if &a.agent_id == agent_id => Some(a),
                _ => None,
            })
            .collect())
    }

    /// Terminal revocation records naming the agent.
    fn revocations_for(&self, agent_id: &AgentId) -> Result<Vec<RevocationRecord>> {
        Ok(self
            .list_by_agent(agent_id)?
            .into_iter()
            .filter_map(|r| match r {
                StoredRecord::Revocation(rev) if &rev.agent_id == agent_id => Some(rev),
                _ => None,
            })
            .collect())
    }

    /// Audit anchors for the agent, oldest first.
    fn anchors_for(&self, agent_id: &AgentId) -> Result<Vec<AuditAnchor>> {
        let mut anchors: Vec<AuditAnchor> = self
            .list_by_agent(agent_id)?
            .into_iter()
            .filter_map(|r| match r {
                StoredRecord::Anchor(a) if &a.agent_id == agent_id => Some(a),
                _ => None,
            })
            .collect();
        anchors.sort_by_key(|a| a.timestamp);
        Ok(anchors)
    }

    /// Fetch a delegation record by ID.
    fn get_delegation(&self, id: &str) -> Result<Option<DelegationRecord>> {
        Ok(match self.get(id)? {
            Some(StoredRecord::Delegation(d)) => Some(d),
            _ => None,
        })
    }

    /// Fetch a constraint record by ID.
    fn get_constraint(&self, id: &str) -> Result<Option<Constraint>> {
        Ok(match self.get(id)? {
            Some(StoredRecord::Constraint(c)) => Some(c),
            _ => None,
        })
    }
}

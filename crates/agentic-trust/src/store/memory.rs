//! In-memory attestation store.
//!
//! All records live in one arena map keyed by ID; edges between records
//! are ID references, never live pointers. Secondary indexes keep the
//! agent-scoped listings O(records-per-agent).

use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::error::{Result, TrustError};
use crate::record::{AgentId, DelegationRecord, StoredRecord};

use super::AttestationStore;

#[derive(Default)]
struct Inner {
    /// Arena: every record, keyed by content-addressed ID.
    records: BTreeMap<String, StoredRecord>,
    /// Agent → record IDs touching that agent.
    by_agent: BTreeMap<AgentId, Vec<String>>,
    /// Delegator → delegation record IDs.
    by_delegator: BTreeMap<AgentId, Vec<String>>,
    /// Delegatee → delegation record IDs.
    by_delegatee: BTreeMap<AgentId, Vec<String>>,
}

/// Arena-backed in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored.
    pub fn len(&self) -> usize {
        self.inner.read().expect("store lock poisoned").records.len()
    }

    /// True when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AttestationStore for MemoryStore {
    fn put(&self, record: StoredRecord) -> Result<String> {
        let id = record.id().to_string();
        let mut inner = self.inner.write().expect("store lock poisoned");

        if let Some(existing) = inner.records.get(&id) {
            if existing.record_hash() == record.record_hash() {
                // Idempotent append of identical content.
                return Ok(id);
            }
            return Err(TrustError::StoreUnavailable(format!(
                "content address collision for {id}"
            )));
        }

        for agent in record.agent_ids() {
            inner
                .by_agent
                .entry(agent.clone())
                .or_default()
                .push(id.clone());
        }
        if let StoredRecord::Delegation(d) = &record {
            inner
                .by_delegator
                .entry(d.delegator_id.clone())
                .or_default()
                .push(id.clone());
            inner
                .by_delegatee
                .entry(d.delegatee_id.clone())
                .or_default()
                .push(id.clone());
        }

        inner.records.insert(id.clone(), record);
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Option<StoredRecord>> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner.records.get(id).cloned())
    }

    fn list_by_agent(&self, agent_id: &AgentId) -> Result<Vec<StoredRecord>> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(inner
            .by_agent
            .get(agent_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.records.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_delegations_by_delegator(&self, agent_id: &AgentId) -> Result<Vec<DelegationRecord>> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(collect_delegations(&inner, inner.by_delegator.get(agent_id)))
    }

    fn list_delegations_by_delegatee(&self, agent_id: &AgentId) -> Result<Vec<DelegationRecord>> {
        let inner = self.inner.read().expect("store lock poisoned");
        Ok(collect_delegations(&inner, inner.by_delegatee.get(agent_id)))
    }
}

fn collect_delegations(inner: &Inner, ids: Option<&Vec<String>>) -> Vec<DelegationRecord> {
    ids.map(|ids| {
        ids.iter()
            .filter_map(|id| match inner.records.get(id) {
                Some(StoredRecord::Delegation(d)) => Some(d.clone()),
                _ => None,
            })
            .collect()
    })
    .unwrap_or_default()
}

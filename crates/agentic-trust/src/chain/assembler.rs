//! Chain assembly — walking the delegation graph back to its genesis.
//!
//! Given an agent, the assembler walks backward via
//! `parent_delegation_id` to exactly one genesis record, collecting the
//! capability attestations and constraints on the path. The walk is a
//! bounded traversal over the record arena: edges are ID references, a
//! visited set catches cycles, and any ambiguity (two distinct genesis
//! roots, or a genesis plus an unrelated delegation lineage) is fatal
//! `InvalidChain`. Assembly is a pure function of stored state: equal
//! chain_hash implies equal output.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constraint::ConstraintEnvelope;
use crate::error::{Result, TrustError};
use crate::record::{
    AgentId, AuditAnchor, CapabilityAttestation, DelegationRecord, GenesisRecord,
};
use crate::store::AttestationStore;

/// A reconstructed, verifiable trust chain for one agent.
///
/// `delegations` runs root → agent; empty when the agent is
/// genesis-rooted. `chain_hash` covers every authority input (genesis,
/// path delegations, attestations, constraints, and revocations of path
/// agents) so callers can detect staleness between decisions. Audit
/// anchors are outputs of decisions, not inputs, and are excluded from
/// the hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustChain {
    /// The agent this chain authorizes.
    pub agent_id: AgentId,
    /// The single genesis record the chain roots in.
    pub genesis: GenesisRecord,
    /// Delegation path from the root agent down to this agent.
    pub delegations: Vec<DelegationRecord>,
    /// Capability attestations collected along the path.
    pub capabilities: Vec<CapabilityAttestation>,
    /// Componentwise-tightest constraints across the path.
    pub constraint_envelope: ConstraintEnvelope,
    /// Audit anchors for the agent, oldest first.
    pub audit_anchors: Vec<AuditAnchor>,
    /// Hash over all upstream inputs.
    pub chain_hash: String,
    /// When the chain was assembled.
    pub assembled_at: DateTime<Utc>,
}

impl TrustChain {
    /// Every agent on the path, root first, this agent last.
    pub fn path_agents(&self) -> Vec<&AgentId> {
        let mut agents = vec![&self.genesis.agent_id];
        for delegation in &self.delegations {
            agents.push(&delegation.delegatee_id);
        }
        agents
    }

    /// The agent's effective capability URIs.
    ///
    /// Genesis-rooted agents hold their attested capabilities; delegated
    /// agents hold exactly what their inbound edge delegates (the
    /// delegation engine already enforced the subset law upstream).
    pub fn effective_capabilities(&self, at: DateTime<Utc>) -> Vec<String> {
        match self.delegations.last() {
            Some(inbound) => inbound.capabilities_delegated.clone(),
            None => self
                .capabilities
                .iter()
                .filter(|a| a.agent_id == self.agent_id && !a.is_expired_at(at))
                .map(|a| a.capability.clone())
                .collect(),
        }
    }

    /// Earliest expiry across the genesis and the delegation path.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let mut earliest = self.genesis.expires_at;
        for delegation in &self.delegations {
            earliest = match (earliest, delegation.expires_at) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (None, b) => b,
                (a, None) => a,
            };
        }
        earliest
    }

    /// Is any path record past its expiry at the given time?
    pub fn is_expired_at(&self, at: DateTime<Utc>) -> bool {
        matches!(self.expires_at(), Some(expiry) if at > expiry)
    }
}

/// Assemble the trust chain for an agent from stored records.
///
/// # Errors
///
/// - `TrustError::NotFound` when no record mentions the agent at all.
/// - `TrustError::InvalidChain` on a cycle, a missing genesis behind a
///   delegation lineage, multiple distinct reachable genesis roots, or
///   an agent holding both a genesis and an inbound delegation.
pub fn assemble(store: &dyn AttestationStore, agent_id: &AgentId) -> Result<TrustChain> {
    let genesis_here = store.genesis_for(agent_id)?;
    let inbound = store.list_delegations_by_delegatee(agent_id)?;

    if genesis_here.is_some() && !inbound.is_empty() {
        return Err(TrustError::InvalidChain(format!(
            "agent {agent_id} holds both a genesis record and a delegation lineage"
        )));
    }

    let (genesis, delegations) = match genesis_here {
        Some(genesis) => (genesis, Vec::new()),
        None => {
            if inbound.is_empty() {
                return Err(TrustError::NotFound(format!(
                    "no trust records for agent {agent_id}"
                )));
            }
            walk_to_genesis(store, agent_id, inbound)?
        }
    };

    // Collect attestations for every agent on the path.
    let mut path_agents: Vec<AgentId> = vec![genesis.agent_id.clone()];
    for delegation in &delegations {
        path_agents.push(delegation.delegatee_id.clone());
    }
    let mut capabilities = Vec::new();
    for agent in &path_agents {
        capabilities.extend(store.attestations_for(agent)?);
    }

    // Resolve every constraint referenced on the path; a dangling
    // reference is structural corruption.
    let mut constraints = Vec::new();
    for attestation in &capabilities {
        for cid in &attestation.constraints {
            let constraint = store.get_constraint(&cid.0)?.ok_or_else(|| {
                TrustError::InvalidChain(format!(
                    "attestation {} references missing constraint {cid}",
                    attestation.id
                ))
            })?;
            constraints.push(constraint);
        }
    }
    for delegation in &delegations {
        for cid in &delegation.constraint_subset {
            let constraint = store.get_constraint(&cid.0)?.ok_or_else(|| {
                TrustError::InvalidChain(format!(
                    "delegation {} references missing constraint {cid}",
                    delegation.id
                ))
            })?;
            constraints.push(constraint);
        }
    }
    let constraint_envelope = ConstraintEnvelope::from_constraints(constraints.clone());

    let audit_anchors = store.anchors_for(agent_id)?;

    // chain_hash covers every authority input, including revocations of
    // path agents, so a concurrent revocation changes the hash.
    let mut hasher = Sha256::new();
    hasher.update(genesis.record_hash.as_bytes());
    for delegation in &delegations {
        hasher.update(delegation.record_hash.as_bytes());
    }
    for attestation in &capabilities {
        hasher.update(attestation.record_hash.as_bytes());
    }
    for constraint in &constraints {
        hasher.update(constraint.record_hash.as_bytes());
    }
    for agent in &path_agents {
        for revocation in store.revocations_for(agent)? {
            hasher.update(revocation.record_hash.as_bytes());
        }
    }
    let chain_hash = hex::encode(hasher.finalize());

    Ok(TrustChain {
        agent_id: agent_id.clone(),
        genesis,
        delegations,
        capabilities,
        constraint_envelope,
        audit_anchors,
        chain_hash,
        assembled_at: crate::time::now(),
    })
}

/// Walk every inbound edge back to a genesis; all edges must agree on
/// one root. Returns the genesis plus the primary path (via the most
/// recent inbound edge), ordered root → agent.
fn walk_to_genesis(
    store: &dyn AttestationStore,
    agent_id: &AgentId,
    mut inbound: Vec<DelegationRecord>,
) -> Result<(GenesisRecord, Vec<DelegationRecord>)> {
    inbound.sort_by_key(|d| d.delegated_at);

    let mut roots: BTreeSet<AgentId> = BTreeSet::new();
    let mut primary_path: Vec<DelegationRecord> = Vec::new();

    let last_index = inbound.len() - 1;
    for (i, edge) in inbound.into_iter().enumerate() {
        let mut path = vec![edge];
        let mut visited: BTreeSet<String> = BTreeSet::new();
        visited.insert(path[0].id.0.clone());

        loop {
            let current = path.last().expect("path never empty");
            let Some(parent_id) = current.parent_delegation_id.clone() else {
                break;
            };
            if !visited.insert(parent_id.0.clone()) {
                return Err(TrustError::InvalidChain(format!(
                    "delegation cycle detected at {parent_id}"
                )));
            }
            let parent = store.get_delegation(&parent_id.0)?.ok_or_else(|| {
                TrustError::InvalidChain(format!(
                    "delegation {} references missing parent {parent_id}",
                    current.id
                ))
            })?;
            if parent.delegatee_id != current.delegator_id {
                return Err(TrustError::InvalidChain(format!(
                    "delegation {} is not an inbound edge of its child's delegator",
                    parent.id
                )));
            }
            path.push(parent);
        }

        let root_agent = path.last().expect("path never empty").delegator_id.clone();
        if store.genesis_for(&root_agent)?.is_none() {
            return Err(TrustError::InvalidChain(format!(
                "delegation lineage of {agent_id} ends at {root_agent}, which has no genesis"
            )));
        }
        roots.insert(root_agent);

        if i == last_index {
            path.reverse();
            primary_path = path;
        }
    }

    if roots.len() > 1 {
        let names: Vec<String> = roots.iter().map(|a| a.0.clone()).collect();
        return Err(TrustError::InvalidChain(format!(
            "agent {agent_id} reaches multiple genesis roots: {}",
            names.join(", ")
        )));
    }

    let root_agent = roots.into_iter().next().expect("at least one root");
    let genesis = store
        .genesis_for(&root_agent)?
        .expect("root genesis checked during walk");

    Ok((genesis, primary_path))
}

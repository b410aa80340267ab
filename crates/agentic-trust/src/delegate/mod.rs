//! Delegation engine — the sole enforcement point for granting authority.
//!
//! A delegation must never grant more than its delegator holds:
//! capabilities must be a subset of the delegator's effective set,
//! constraints must tighten the inherited envelope, the delegation
//! relation must stay acyclic, and expiry may not exceed the
//! delegator's. Every check failure is collected and returned with the
//! exact offending names; a rejection is a normal outcome, not an error.
//!
//! The check-then-write sequence serializes per subtree via optimistic
//! concurrency: the delegator's chain_hash observed at check time is
//! recomputed immediately before commit, and on mismatch the whole
//! sequence retries up to a capped attempt count.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chain::assemble;
use crate::constraint::{check_envelope_tightening, Constraint, TighteningViolation};
use crate::error::{Result, TrustError};
use crate::record::{
    capabilities_cover, AgentId, DelegationBuilder, DelegationRecord, StoredRecord,
};
use crate::signing::RecordSigner;
use crate::store::AttestationStore;

/// Tunables for the delegation engine.
#[derive(Debug, Clone)]
pub struct DelegationConfig {
    /// Check-then-write attempts before surfacing `ConcurrentModification`.
    pub max_commit_attempts: u32,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            max_commit_attempts: 3,
        }
    }
}

/// A request to delegate capabilities to another agent.
#[derive(Debug, Clone)]
pub struct DelegateRequest {
    pub delegator_id: AgentId,
    pub delegatee_id: AgentId,
    /// Capability URIs to delegate.
    pub capabilities: Vec<String>,
    /// Constraints imposed on the delegatee.
    pub constraints: Vec<Constraint>,
    pub task_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl DelegateRequest {
    pub fn new(delegator_id: AgentId, delegatee_id: AgentId) -> Self {
        Self {
            delegator_id,
            delegatee_id,
            capabilities: Vec::new(),
            constraints: Vec::new(),
            task_id: None,
            expires_at: None,
        }
    }

    pub fn capability(mut self, uri: impl Into<String>) -> Self {
        self.capabilities.push(uri.into());
        self
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

/// One reason a delegation request was rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DelegationViolation {
    /// The delegator's effective set does not cover this capability.
    CapabilityNotGranted { capability: String },
    /// A requested constraint loosens its inherited counterpart.
    ConstraintNotTightened(TighteningViolation),
    /// The delegatee is the delegator or one of its ancestors.
    CycleDetected {
        delegator_id: AgentId,
        delegatee_id: AgentId,
    },
    /// Requested expiry is later than the delegator's own.
    ExpiryExceedsDelegator {
        requested: DateTime<Utc>,
        delegator_limit: DateTime<Utc>,
    },
    /// The delegator's authority is revoked.
    DelegatorRevoked { agent_id: AgentId },
    /// The delegator's authority is expired.
    DelegatorExpired { record_id: String },
}

impl std::fmt::Display for DelegationViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CapabilityNotGranted { capability } => {
                write!(f, "capability not granted to delegator: {capability}")
            }
            Self::ConstraintNotTightened(v) => write!(
                f,
                "constraint {} loosened (parent {}, child {})",
                v.constraint_type, v.parent_value, v.child_value
            ),
            Self::CycleDetected {
                delegator_id,
                delegatee_id,
            } => write!(
                f,
                "cycle detected: {delegatee_id} is an ancestor of {delegator_id}"
            ),
            Self::ExpiryExceedsDelegator {
                requested,
                delegator_limit,
            } => write!(
                f,
                "requested expiry {requested} exceeds delegator expiry {delegator_limit}"
            ),
            Self::DelegatorRevoked { agent_id } => {
                write!(f, "delegator authority revoked at {agent_id}")
            }
            Self::DelegatorExpired { record_id } => {
                write!(f, "delegator authority expired ({record_id})")
            }
        }
    }
}

/// The outcome of a delegation request.
#[derive(Debug, Clone)]
pub enum DelegationOutcome {
    /// The stored, immutable delegation record.
    Granted(DelegationRecord),
    /// Every violation found; nothing was written.
    Rejected(Vec<DelegationViolation>),
}

impl DelegationOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    pub fn record(&self) -> Option<&DelegationRecord> {
        match self {
            Self::Granted(record) => Some(record),
            Self::Rejected(_) => None,
        }
    }

    pub fn violations(&self) -> &[DelegationViolation] {
        match self {
            Self::Granted(_) => &[],
            Self::Rejected(violations) => violations,
        }
    }
}

/// Creates delegations, enforcing subset, tightening, acyclicity, and
/// expiry-clamp rules. Applied identically for agent-initiated and
/// human-initiated delegation.
pub struct DelegationEngine {
    store: Arc<dyn AttestationStore>,
    config: DelegationConfig,
}

impl DelegationEngine {
    pub fn new(store: Arc<dyn AttestationStore>) -> Self {
        Self {
            store,
            config: DelegationConfig::default(),
        }
    }

    pub fn with_config(store: Arc<dyn AttestationStore>, config: DelegationConfig) -> Self {
        Self { store, config }
    }

    /// Check and, if clean, commit a delegation signed by `signer`
    /// (the delegator's key, supplied by the identity subsystem).
    ///
    /// # Errors
    ///
    /// `InvalidChain`/`NotFound` for a structurally broken delegator,
    /// store errors, or `ConcurrentModification` once the retry cap is
    /// exhausted. Rule violations come back as `Rejected`, never `Err`.
    pub fn delegate(
        &self,
        request: &DelegateRequest,
        signer: &dyn RecordSigner,
    ) -> Result<DelegationOutcome> {
        for _attempt in 0..self.config.max_commit_attempts {
            let chain = assemble(self.store.as_ref(), &request.delegator_id)?;
            let violations = self.check(request, &chain)?;
            if !violations.is_empty() {
                return Ok(DelegationOutcome::Rejected(violations));
            }

            // Build the record pointing at the delegator's own inbound
            // edge (None when genesis-rooted).
            let mut builder =
                DelegationBuilder::new(request.delegator_id.clone(), request.delegatee_id.clone())
                    .capabilities(request.capabilities.iter().cloned())
                    .constraints(request.constraints.iter().map(|c| c.id.clone()));
            if let Some(task_id) = &request.task_id {
                builder = builder.task(task_id.clone());
            }
            if let Some(expires_at) = request.expires_at {
                builder = builder.expires_at(expires_at);
            }
            if let Some(inbound) = chain.delegations.last() {
                builder = builder.parent(inbound.id.clone());
            }
            let record = builder.sign(signer)?;

            // Optimistic concurrency: the delegator's chain must not
            // have moved between check and commit.
            let fresh = assemble(self.store.as_ref(), &request.delegator_id)?;
            if fresh.chain_hash != chain.chain_hash {
                log::warn!(
                    "chain for {} moved during delegation, retrying",
                    request.delegator_id
                );
                continue;
            }

            for constraint in &request.constraints {
                self.store
                    .put(StoredRecord::Constraint(constraint.clone()))?;
            }
            let id = self.store.put(StoredRecord::Delegation(record.clone()))?;
            log::info!(
                "delegation {id} stored: {} -> {} ({} capabilities)",
                request.delegator_id,
                request.delegatee_id,
                request.capabilities.len()
            );
            return Ok(DelegationOutcome::Granted(record));
        }

        Err(TrustError::ConcurrentModification {
            attempts: self.config.max_commit_attempts,
        })
    }

    /// Run every rule, accumulating all violations.
    fn check(
        &self,
        request: &DelegateRequest,
        chain: &crate::chain::TrustChain,
    ) -> Result<Vec<DelegationViolation>> {
        let now = crate::time::now();
        let mut violations = Vec::new();

        // Delegator must itself hold live authority.
        for agent in chain.path_agents() {
            if !self.store.revocations_for(agent)?.is_empty() {
                violations.push(DelegationViolation::DelegatorRevoked {
                    agent_id: agent.clone(),
                });
            }
        }
        if chain.genesis.is_expired_at(now) {
            violations.push(DelegationViolation::DelegatorExpired {
                record_id: chain.genesis.id.0.clone(),
            });
        }
        for delegation in &chain.delegations {
            if delegation.is_expired_at(now) {
                violations.push(DelegationViolation::DelegatorExpired {
                    record_id: delegation.id.0.clone(),
                });
            }
        }

        // (a) capability subset, naming each offender.
        let effective = chain.effective_capabilities(now);
        for capability in &request.capabilities {
            if !capabilities_cover(effective.iter().map(|s| s.as_str()), capability) {
                violations.push(DelegationViolation::CapabilityNotGranted {
                    capability: capability.clone(),
                });
            }
        }

        // (b) constraint tightening against the inherited envelope. A
        // type absent from the envelope is freely introduced.
        let report = check_envelope_tightening(&chain.constraint_envelope, &request.constraints);
        violations.extend(
            report
                .violations
                .into_iter()
                .map(DelegationViolation::ConstraintNotTightened),
        );

        // (c) acyclicity: the delegatee must not be the delegator or
        // any ancestor of it.
        if request.delegatee_id == request.delegator_id
            || chain.path_agents().contains(&&request.delegatee_id)
        {
            violations.push(DelegationViolation::CycleDetected {
                delegator_id: request.delegator_id.clone(),
                delegatee_id: request.delegatee_id.clone(),
            });
        }

        // (d) expiry clamp. An unset expiry is safe: the delegatee dies
        // with its ancestors anyway, since verification walks the path.
        if let (Some(requested), Some(limit)) = (request.expires_at, chain.expires_at()) {
            if requested > limit {
                violations.push(DelegationViolation::ExpiryExceedsDelegator {
                    requested,
                    delegator_limit: limit,
                });
            }
        }

        Ok(violations)
    }
}

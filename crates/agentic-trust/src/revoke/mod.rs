//! Revocation engine — cascade revocation over the delegation graph.
//!
//! Revoking an agent must invalidate every agent whose authority
//! derives from it, completely and idempotently. The engine exposes a
//! two-step contract: `compute_impact` previews the blast radius and
//! returns a confirmation token; `revoke` requires that token and
//! commits one terminal revocation record per affected agent.
//!
//! Traversal is frontier-by-frontier over the delegation index
//! (bounded-memory BFS, no recursion), holds no lock, operates on a
//! point-in-time snapshot, and honors a caller-supplied cancellation
//! token on large graphs.
//!
//! Partial-failure policy is fail-safe: over-revocation is always
//! acceptable, under-revocation never is. On a mid-batch write failure
//! only the unwritten remainder is retried; already-written revocations
//! are never rolled back, and the result lists confirmed vs pending
//! agents explicitly.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::audit::AuditLedger;
use crate::chain::assemble;
use crate::error::{Result, TrustError};
use crate::record::{
    AgentId, AnchorResult, RevocationBuilder, RevocationReason, RevocationRecord, StoredRecord,
};
use crate::signing::RecordSigner;
use crate::store::AttestationStore;

// ── Collaborator seams ────────────────────────────────────────────────────────

/// Supplies active-task counts from the task-execution subsystem.
pub trait ActiveTaskSource: Send + Sync {
    fn active_task_count(&self, agent_id: &AgentId) -> Result<u32>;
}

/// Default task source for deployments without task tracking.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTaskTracking;

impl ActiveTaskSource for NoTaskTracking {
    fn active_task_count(&self, _agent_id: &AgentId) -> Result<u32> {
        Ok(0)
    }
}

/// Cloneable cancellation handle for long-running traversals.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

// ── Preview types ─────────────────────────────────────────────────────────────

/// Current standing of a descendant at preview time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DescendantStatus {
    Active,
    Expired,
    AlreadyRevoked,
}

/// One agent in the cascade's blast radius.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescendantImpact {
    pub agent_id: AgentId,
    /// Delegation depth below the target (1 = direct delegatee).
    pub depth: u32,
    pub status: DescendantStatus,
    /// Active workload count from the task-execution subsystem.
    pub active_tasks: u32,
}

/// Token a caller must echo back to commit a previewed revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationToken(pub String);

impl ConfirmationToken {
    /// Derive the token for a target agent.
    fn for_target(target: &AgentId) -> Self {
        let hash = Sha256::digest(format!("confirm:{}", target.0).as_bytes());
        let encoded = bs58::encode(&hash[..16]).into_string();
        Self(format!("aconf_{encoded}"))
    }

    /// Does this token authorize revoking `target`?
    pub fn matches(&self, target: &AgentId) -> bool {
        self == &Self::for_target(target)
    }
}

/// Point-in-time preview of a cascade revocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevocationImpactPreview {
    pub target: AgentId,
    /// Every transitively reachable descendant, with depth.
    pub descendants: Vec<DescendantImpact>,
    /// Human-facing cautions: active workloads, oversized cascades.
    pub warnings: Vec<String>,
    pub confirmation_token: ConfirmationToken,
    pub computed_at: DateTime<Utc>,
}

// ── Commit types ──────────────────────────────────────────────────────────────

/// An agent whose revocation record could not be written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingRevocation {
    pub agent_id: AgentId,
    pub error: String,
}

/// Final state of a revocation commit.
#[derive(Debug, Clone)]
pub struct RevocationResult {
    pub target: AgentId,
    /// Revocation records written by THIS call.
    pub revoked: Vec<RevocationRecord>,
    /// Agents that already carried a terminal record (no-ops).
    pub already_revoked: Vec<AgentId>,
    /// Agents still unwritten after the retry pass.
    pub pending: Vec<PendingRevocation>,
}

impl RevocationResult {
    /// Agents newly invalidated by this call.
    pub fn newly_affected(&self) -> usize {
        self.revoked.len()
    }

    /// True when every computed agent carries a terminal record.
    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// Tunables for the revocation engine.
#[derive(Debug, Clone)]
pub struct RevocationConfig {
    /// Cascade size at which the preview warns.
    pub cascade_warning_threshold: usize,
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self {
            cascade_warning_threshold: 25,
        }
    }
}

/// Computes and applies cascade revocation.
pub struct RevocationEngine {
    store: Arc<dyn AttestationStore>,
    tasks: Arc<dyn ActiveTaskSource>,
    config: RevocationConfig,
}

impl RevocationEngine {
    pub fn new(store: Arc<dyn AttestationStore>) -> Self {
        Self {
            store,
            tasks: Arc::new(NoTaskTracking),
            config: RevocationConfig::default(),
        }
    }

    pub fn with_task_source(mut self, tasks: Arc<dyn ActiveTaskSource>) -> Self {
        self.tasks = tasks;
        self
    }

    pub fn with_config(mut self, config: RevocationConfig) -> Self {
        self.config = config;
        self
    }

    /// Preview the cascade: every descendant reachable from the target
    /// through the delegation graph, with depth, status, and workload.
    ///
    /// # Errors
    ///
    /// Store errors, or `TrustError::Cancelled` if the caller's token
    /// fires mid-traversal.
    pub fn compute_impact(
        &self,
        target: &AgentId,
        cancel: &CancellationToken,
    ) -> Result<RevocationImpactPreview> {
        let descendants = self.collect_descendants(target, cancel)?;

        let mut warnings = Vec::new();
        for d in &descendants {
            if d.active_tasks > 0 {
                warnings.push(format!(
                    "{} carries {} active task(s) at depth {}",
                    d.agent_id, d.active_tasks, d.depth
                ));
            }
        }
        if descendants.len() >= self.config.cascade_warning_threshold {
            warnings.push(format!(
                "cascade touches {} agents (threshold {})",
                descendants.len(),
                self.config.cascade_warning_threshold
            ));
        }

        Ok(RevocationImpactPreview {
            target: target.clone(),
            descendants,
            warnings,
            confirmation_token: ConfirmationToken::for_target(target),
            computed_at: crate::time::now(),
        })
    }

    /// Commit the cascade. Requires the confirmation token from a
    /// preview of the same target. Idempotent: already-revoked agents
    /// are skipped and reported; a second call writes nothing.
    ///
    /// Descendants are recomputed at commit time, so a cascade that
    /// grew since the preview is still fully revoked.
    ///
    /// # Errors
    ///
    /// `ConfirmationMismatch` for a token naming a different target;
    /// store errors during traversal. Per-agent write failures are NOT
    /// errors; they are reported in `pending`.
    pub fn revoke(
        &self,
        target: &AgentId,
        reason: RevocationReason,
        actor: &AgentId,
        confirmation: &ConfirmationToken,
        signer: &dyn RecordSigner,
    ) -> Result<RevocationResult> {
        if !confirmation.matches(target) {
            return Err(TrustError::ConfirmationMismatch(target.0.clone()));
        }

        // Pre-revocation chain hash for the audit anchor; a target with
        // a broken chain is still revocable.
        let chain_hash = assemble(self.store.as_ref(), target)
            .map(|chain| chain.chain_hash)
            .unwrap_or_default();

        let descendants = self.collect_descendants(target, &CancellationToken::new())?;

        // The target itself is depth 0; descendants follow in BFS order.
        let mut batch: Vec<(AgentId, u32)> = vec![(target.clone(), 0)];
        batch.extend(descendants.iter().map(|d| (d.agent_id.clone(), d.depth)));

        let mut revoked = Vec::new();
        let mut already_revoked = Vec::new();
        let mut failed: Vec<(AgentId, u32, String)> = Vec::new();

        let write_one = |agent_id: &AgentId, depth: u32| -> Result<RevocationRecord> {
            let record_reason = if depth == 0 {
                reason.clone()
            } else {
                RevocationReason::CascadeParent
            };
            let record = RevocationBuilder::new(agent_id.clone(), record_reason, actor.clone())
                .cascade(target.clone(), depth)
                .sign(signer)?;
            self.store.put(StoredRecord::Revocation(record.clone()))?;
            Ok(record)
        };

        for (agent_id, depth) in batch {
            if !self.store.revocations_for(&agent_id)?.is_empty() {
                already_revoked.push(agent_id);
                continue;
            }
            match write_one(&agent_id, depth) {
                Ok(record) => revoked.push(record),
                Err(e) => failed.push((agent_id, depth, e.to_string())),
            }
        }

        // Retry only the unwritten remainder; never roll back.
        if !failed.is_empty() {
            log::warn!(
                "revocation of {target}: {} write(s) failed, retrying remainder",
                failed.len()
            );
            let retry = std::mem::take(&mut failed);
            for (agent_id, depth, _) in retry {
                match write_one(&agent_id, depth) {
                    Ok(record) => revoked.push(record),
                    Err(e) => failed.push((agent_id, depth, e.to_string())),
                }
            }
        }

        let pending: Vec<PendingRevocation> = failed
            .into_iter()
            .map(|(agent_id, _, error)| PendingRevocation { agent_id, error })
            .collect();

        // Anchor the revocation action itself.
        let ledger = AuditLedger::new(self.store.clone());
        let anchor_result = if pending.is_empty() {
            AnchorResult::Success
        } else {
            AnchorResult::Partial
        };
        ledger.append(
            target,
            format!("revoke:{}", reason.as_str()),
            None,
            anchor_result,
            &chain_hash,
            Some(serde_json::json!({
                "actor": actor.0,
                "newly_revoked": revoked.len(),
                "already_revoked": already_revoked.len(),
                "pending": pending.len(),
            })),
            signer,
        )?;

        log::info!(
            "revoked {target}: {} new, {} already terminal, {} pending",
            revoked.len(),
            already_revoked.len(),
            pending.len()
        );

        Ok(RevocationResult {
            target: target.clone(),
            revoked,
            already_revoked,
            pending,
        })
    }

    /// Frontier-by-frontier BFS over the delegation graph.
    fn collect_descendants(
        &self,
        target: &AgentId,
        cancel: &CancellationToken,
    ) -> Result<Vec<DescendantImpact>> {
        let now = crate::time::now();
        let mut visited: BTreeSet<AgentId> = BTreeSet::new();
        visited.insert(target.clone());

        let mut descendants = Vec::new();
        let mut frontier = vec![target.clone()];
        let mut depth = 0u32;

        while !frontier.is_empty() {
            if cancel.is_cancelled() {
                return Err(TrustError::Cancelled);
            }
            depth += 1;
            let mut next = Vec::new();

            for agent in &frontier {
                for delegation in self.store.list_delegations_by_delegator(agent)? {
                    let delegatee = delegation.delegatee_id.clone();
                    if !visited.insert(delegatee.clone()) {
                        continue;
                    }
                    let status = if !self.store.revocations_for(&delegatee)?.is_empty() {
                        DescendantStatus::AlreadyRevoked
                    } else if delegation.is_expired_at(now) {
                        DescendantStatus::Expired
                    } else {
                        DescendantStatus::Active
                    };
                    let active_tasks = self.tasks.active_task_count(&delegatee)?;
                    descendants.push(DescendantImpact {
                        agent_id: delegatee.clone(),
                        depth,
                        status,
                        active_tasks,
                    });
                    next.push(delegatee);
                }
            }

            frontier = next;
        }

        Ok(descendants)
    }
}

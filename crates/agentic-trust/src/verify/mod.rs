//! Trust verification — deciding whether an action is authorized.
//!
//! Verification assembles the agent's chain, rejects terminal
//! (expired/revoked) authority, matches the action against the
//! effective capability set, and evaluates the effective constraint
//! envelope. A denial is a normal result carrying the specific reason;
//! verification never throws for "no" and has no side effects. Callers
//! append an audit anchor separately.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::chain::{assemble, TrustChain};
use crate::constraint::{ActionContext, ConstraintEnvelope, ConstraintViolation};
use crate::error::Result;
use crate::record::{capability_uri_covers, AgentId};
use crate::store::AttestationStore;

/// How much latency to trade for strictness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationLevel {
    /// Capability lookup and terminal-status checks only.
    Quick,
    /// Quick plus constraint-envelope evaluation.
    Standard,
    /// Standard plus a store re-read at decision time to catch
    /// concurrent revocation.
    Full,
}

/// Why a verification came back invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenialReason {
    /// An agent on the path has a terminal revocation record.
    Revoked { agent_id: AgentId },
    /// The genesis or a delegation on the path is past expiry.
    Expired { record_id: String },
    /// No effective capability covers the action.
    CapabilityNotGranted { action: String },
    /// One or more effective constraints reject the action.
    ConstraintViolation,
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Revoked { agent_id } => write!(f, "revoked: {agent_id}"),
            Self::Expired { record_id } => write!(f, "expired: {record_id}"),
            Self::CapabilityNotGranted { action } => {
                write!(f, "capability not granted: {action}")
            }
            Self::ConstraintViolation => write!(f, "constraint violation"),
        }
    }
}

/// A request to verify one action by one agent.
#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub agent_id: AgentId,
    pub action: String,
    pub resource: Option<String>,
    pub level: VerificationLevel,
    /// Caller-supplied facts for constraint evaluation.
    pub context: ActionContext,
}

impl VerifyRequest {
    /// A request with default (empty) action context.
    pub fn new(agent_id: AgentId, action: impl Into<String>, level: VerificationLevel) -> Self {
        Self {
            agent_id,
            action: action.into(),
            resource: None,
            level,
            context: ActionContext::default(),
        }
    }

    /// Name the resource acted on.
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Supply action context.
    pub fn context(mut self, context: ActionContext) -> Self {
        self.context = context;
        self
    }
}

/// The outcome of a verification.
///
/// `valid == false` is a normal result; the reason and violations name
/// exactly what failed. Generic denials are disallowed by design.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    pub level: VerificationLevel,
    pub reason: Option<DenialReason>,
    /// The granted capability URI that covered the action.
    pub capability_used: Option<String>,
    pub effective_constraints: ConstraintEnvelope,
    pub violations: Vec<ConstraintViolation>,
    pub latency_ms: u64,
    /// The chain hash the decision was made against.
    pub chain_hash: String,
}

/// Read-only verifier over an attestation store.
///
/// Safe to share across threads and to call in parallel for distinct
/// agents; staleness under concurrent revocation of the *same* agent is
/// governed by the request level.
pub struct TrustVerifier {
    store: Arc<dyn AttestationStore>,
}

impl TrustVerifier {
    pub fn new(store: Arc<dyn AttestationStore>) -> Self {
        Self { store }
    }

    /// Verify an action request against the agent's assembled chain.
    ///
    /// # Errors
    ///
    /// Only structural/operational failures (`InvalidChain`, `NotFound`,
    /// store errors). Denials come back as `valid: false`.
    pub fn verify(&self, request: &VerifyRequest) -> Result<VerificationResult> {
        let started = Instant::now();
        let chain = assemble(self.store.as_ref(), &request.agent_id)?;

        let mut result = self.evaluate(&chain, request)?;

        // FULL re-reads the store at decision time: if any upstream
        // input changed while we were deciding, decide again on the
        // fresh chain.
        if request.level == VerificationLevel::Full {
            let fresh = assemble(self.store.as_ref(), &request.agent_id)?;
            if fresh.chain_hash != chain.chain_hash {
                log::debug!(
                    "chain for {} changed during verification, re-evaluating",
                    request.agent_id
                );
                result = self.evaluate(&fresh, request)?;
            }
        }

        result.latency_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }

    fn evaluate(&self, chain: &TrustChain, request: &VerifyRequest) -> Result<VerificationResult> {
        let now = request.context.at.unwrap_or_else(crate::time::now);
        let deny = |reason: DenialReason, envelope: &ConstraintEnvelope| VerificationResult {
            valid: false,
            level: request.level,
            reason: Some(reason),
            capability_used: None,
            effective_constraints: envelope.clone(),
            violations: Vec::new(),
            latency_ms: 0,
            chain_hash: chain.chain_hash.clone(),
        };

        // Terminal status: any revocation on the path kills the chain.
        for agent in chain.path_agents() {
            if !self.store.revocations_for(agent)?.is_empty() {
                return Ok(deny(
                    DenialReason::Revoked {
                        agent_id: agent.clone(),
                    },
                    &chain.constraint_envelope,
                ));
            }
        }

        // Expiry of the genesis or any delegation on the path.
        if chain.genesis.is_expired_at(now) {
            return Ok(deny(
                DenialReason::Expired {
                    record_id: chain.genesis.id.0.clone(),
                },
                &chain.constraint_envelope,
            ));
        }
        for delegation in &chain.delegations {
            if delegation.is_expired_at(now) {
                return Ok(deny(
                    DenialReason::Expired {
                        record_id: delegation.id.0.clone(),
                    },
                    &chain.constraint_envelope,
                ));
            }
        }

        // Capability match: exact or namespaced-prefix.
        let effective = chain.effective_capabilities(now);
        let capability_used = effective
            .iter()
            .find(|uri| capability_uri_covers(uri, &request.action))
            .cloned();
        if capability_used.is_none() {
            return Ok(deny(
                DenialReason::CapabilityNotGranted {
                    action: request.action.clone(),
                },
                &chain.constraint_envelope,
            ));
        }

        // Constraint evaluation, skipped at QUICK.
        let violations = if request.level == VerificationLevel::Quick {
            Vec::new()
        } else {
            chain.constraint_envelope.evaluate(
                &request.action,
                request.resource.as_deref(),
                &request.context,
            )
        };

        if violations.is_empty() {
            Ok(VerificationResult {
                valid: true,
                level: request.level,
                reason: None,
                capability_used,
                effective_constraints: chain.constraint_envelope.clone(),
                violations,
                latency_ms: 0,
                chain_hash: chain.chain_hash.clone(),
            })
        } else {
            Ok(VerificationResult {
                valid: false,
                level: request.level,
                reason: Some(DenialReason::ConstraintViolation),
                capability_used,
                effective_constraints: chain.constraint_envelope.clone(),
                violations,
                latency_ms: 0,
                chain_hash: chain.chain_hash.clone(),
            })
        }
    }
}

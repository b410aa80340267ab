//! The effective constraint envelope.
//!
//! The envelope projects the set of constraints binding an agent down to
//! one effective (tightest) value per constraint type, and evaluates a
//! concrete action against those effective values.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::tighten::value_tightens;
use super::value::{Constraint, ConstraintType, ConstraintValue};
use crate::record::capability::capability_uri_covers;

/// Caller-supplied facts about the action being evaluated.
///
/// Usage-counter checks (rate, resource units, cost) only fire when the
/// caller supplies the observed figure; the core owns no counters.
#[derive(Debug, Clone, Default)]
pub struct ActionContext {
    /// Evaluation time; defaults to now.
    pub at: Option<DateTime<Utc>>,
    /// Cost of the requested action.
    pub cost: Option<f64>,
    /// Observed request rate for the agent.
    pub observed_rate: Option<f64>,
    /// Observed resource consumption for the agent.
    pub resource_units: Option<f64>,
}

/// One constraint the action fails against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstraintViolation {
    pub constraint_type: ConstraintType,
    pub effective_value: String,
    pub observed: String,
    pub message: String,
}

/// One effective (tightest) constraint per type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstraintEnvelope {
    effective: BTreeMap<ConstraintType, Constraint>,
}

impl ConstraintEnvelope {
    /// Empty envelope: unconstrained.
    pub fn new() -> Self {
        Self::default()
    }

    /// Project a constraint list down to the tightest value per type.
    ///
    /// Order-independent for valid chains (where later constraints
    /// tighten earlier ones). Ties are broken by priority, then by
    /// most-recently-imposed, then by id for determinism.
    pub fn from_constraints(constraints: impl IntoIterator<Item = Constraint>) -> Self {
        let mut envelope = Self::new();
        for c in constraints {
            envelope.absorb(c);
        }
        envelope
    }

    /// Fold one more constraint into the envelope, keeping the tighter.
    pub fn absorb(&mut self, candidate: Constraint) {
        match self.effective.get(&candidate.constraint_type) {
            None => {
                self.effective.insert(candidate.constraint_type, candidate);
            }
            Some(current) => {
                if Self::prefer_candidate(current, &candidate) {
                    self.effective.insert(candidate.constraint_type, candidate);
                }
            }
        }
    }

    /// Decide whether `candidate` replaces `current` as the effective
    /// constraint for its type.
    fn prefer_candidate(current: &Constraint, candidate: &Constraint) -> bool {
        let cand_tightens =
            value_tightens(candidate.constraint_type, &current.value, &candidate.value).is_ok();
        let cur_tightens =
            value_tightens(current.constraint_type, &candidate.value, &current.value).is_ok();

        match (cand_tightens, cur_tightens) {
            // Strictly tighter wins.
            (true, false) => true,
            (false, true) => false,
            // Equally restrictive: higher priority, then most recently
            // imposed, then smaller id. Deterministic by construction.
            (true, true) => {
                (candidate.priority, candidate.imposed_at, &current.id.0)
                    > (current.priority, current.imposed_at, &candidate.id.0)
            }
            // Incomparable values cannot arise on a chain that passed
            // tightening; fall back to the same deterministic order.
            (false, false) => {
                (candidate.priority, candidate.imposed_at, &current.id.0)
                    > (current.priority, current.imposed_at, &candidate.id.0)
            }
        }
    }

    /// The effective constraint for a type, if any.
    pub fn get(&self, constraint_type: ConstraintType) -> Option<&Constraint> {
        self.effective.get(&constraint_type)
    }

    /// Iterate effective constraints in type order.
    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.effective.values()
    }

    /// Number of constraint types bound.
    pub fn len(&self) -> usize {
        self.effective.len()
    }

    /// True when no constraint binds.
    pub fn is_empty(&self) -> bool {
        self.effective.is_empty()
    }

    /// Evaluate an action against every effective constraint.
    ///
    /// Accumulates all violations; never short-circuits.
    pub fn evaluate(
        &self,
        action: &str,
        resource: Option<&str>,
        ctx: &ActionContext,
    ) -> Vec<ConstraintViolation> {
        let mut violations = Vec::new();
        let at = ctx.at.unwrap_or_else(crate::time::now);

        for constraint in self.effective.values() {
            match (&constraint.constraint_type, &constraint.value) {
                (ConstraintType::TimeWindow, ConstraintValue::Window(window)) => {
                    let minute = crate::time::minute_of_day(at);
                    if !window.contains_minute(minute) {
                        violations.push(ConstraintViolation {
                            constraint_type: ConstraintType::TimeWindow,
                            effective_value: window.to_string(),
                            observed: format!("{:02}:{:02}", minute / 60, minute % 60),
                            message: format!(
                                "action at {:02}:{:02} outside allowed window {window}",
                                minute / 60,
                                minute % 60
                            ),
                        });
                    }
                }
                (ConstraintType::DataScope, ConstraintValue::Scope(allowed)) => {
                    if let Some(resource) = resource {
                        let covered = allowed
                            .iter()
                            .any(|pattern| capability_uri_covers(pattern, resource));
                        if !covered {
                            violations.push(ConstraintViolation {
                                constraint_type: ConstraintType::DataScope,
                                effective_value: constraint.value.describe(),
                                observed: resource.to_string(),
                                message: format!(
                                    "resource {resource} is outside the allowed data scope"
                                ),
                            });
                        }
                    }
                }
                (ConstraintType::ActionRestriction, ConstraintValue::Restriction(forbidden)) => {
                    let hit = forbidden
                        .iter()
                        .find(|pattern| capability_uri_covers(pattern, action));
                    if let Some(pattern) = hit {
                        violations.push(ConstraintViolation {
                            constraint_type: ConstraintType::ActionRestriction,
                            effective_value: constraint.value.describe(),
                            observed: action.to_string(),
                            message: format!("action {action} is restricted by {pattern}"),
                        });
                    }
                }
                (ConstraintType::CostLimit, ConstraintValue::Limit(limit)) => {
                    if let Some(cost) = ctx.cost {
                        if cost > *limit {
                            violations.push(ConstraintViolation {
                                constraint_type: ConstraintType::CostLimit,
                                effective_value: format!("{limit}"),
                                observed: format!("{cost}"),
                                message: format!("cost {cost} exceeds cost limit {limit}"),
                            });
                        }
                    }
                }
                (ConstraintType::RateLimit, ConstraintValue::Limit(limit)) => {
                    if let Some(rate) = ctx.observed_rate {
                        if rate > *limit {
                            violations.push(ConstraintViolation {
                                constraint_type: ConstraintType::RateLimit,
                                effective_value: format!("{limit}"),
                                observed: format!("{rate}"),
                                message: format!("observed rate {rate} exceeds rate limit {limit}"),
                            });
                        }
                    }
                }
                (ConstraintType::ResourceLimit, ConstraintValue::Limit(limit)) => {
                    if let Some(units) = ctx.resource_units {
                        if units > *limit {
                            violations.push(ConstraintViolation {
                                constraint_type: ConstraintType::ResourceLimit,
                                effective_value: format!("{limit}"),
                                observed: format!("{units}"),
                                message: format!(
                                    "resource usage {units} exceeds resource limit {limit}"
                                ),
                            });
                        }
                    }
                }
                // Audit requirements are carried, not evaluated here.
                (ConstraintType::AuditRequirement, _) => {}
                // Typed constructors keep (kind, value) pairs aligned.
                _ => {}
            }
        }

        violations
    }
}

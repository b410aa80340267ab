//! The tightening comparator.
//!
//! A delegated constraint must be at least as restrictive as its
//! inherited counterpart. Per kind:
//! - numeric limits: child <= parent
//! - time windows: child contained in parent (modular)
//! - data scopes: child set a subset of parent set
//! - action restrictions: child may only add forbidden actions
//! - audit requirements: child may only raise the mode
//!
//! Evaluation never short-circuits: every violation in a request is
//! accumulated so rejections are complete and explainable.

use serde::{Deserialize, Serialize};

use super::envelope::ConstraintEnvelope;
use super::value::{Constraint, ConstraintType, ConstraintValue};

/// One named tightening failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TighteningViolation {
    pub constraint_type: ConstraintType,
    pub parent_value: String,
    pub child_value: String,
    pub message: String,
}

/// Outcome of checking a proposed constraint set against an inherited
/// envelope. `valid` is false iff `violations` is non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TighteningReport {
    pub valid: bool,
    pub violations: Vec<TighteningViolation>,
}

impl TighteningReport {
    fn from_violations(violations: Vec<TighteningViolation>) -> Self {
        Self {
            valid: violations.is_empty(),
            violations,
        }
    }
}

/// Is `child` at least as restrictive as `parent`?
///
/// Returns `Ok(())` or the specific reason it loosens. A value-kind
/// mismatch is itself a violation, never a panic.
pub fn value_tightens(
    constraint_type: ConstraintType,
    parent: &ConstraintValue,
    child: &ConstraintValue,
) -> std::result::Result<(), String> {
    match (parent, child) {
        (ConstraintValue::Limit(p), ConstraintValue::Limit(c)) => {
            if c <= p {
                Ok(())
            } else {
                Err(format!(
                    "{constraint_type} loosened: child limit {c} exceeds parent limit {p}"
                ))
            }
        }
        (ConstraintValue::Window(p), ConstraintValue::Window(c)) => {
            if p.contains_window(c) {
                Ok(())
            } else {
                Err(format!(
                    "{constraint_type} loosened: child window {c} extends outside parent window {p}"
                ))
            }
        }
        (ConstraintValue::Scope(p), ConstraintValue::Scope(c)) => {
            let extra: Vec<&String> = c.difference(p).collect();
            if extra.is_empty() {
                Ok(())
            } else {
                let names: Vec<&str> = extra.iter().map(|s| s.as_str()).collect();
                Err(format!(
                    "{constraint_type} loosened: child scope adds [{}] not in parent scope",
                    names.join(", ")
                ))
            }
        }
        (ConstraintValue::Restriction(p), ConstraintValue::Restriction(c)) => {
            let removed: Vec<&String> = p.difference(c).collect();
            if removed.is_empty() {
                Ok(())
            } else {
                let names: Vec<&str> = removed.iter().map(|s| s.as_str()).collect();
                Err(format!(
                    "{constraint_type} loosened: child removes restrictions [{}]",
                    names.join(", ")
                ))
            }
        }
        (ConstraintValue::Audit(p), ConstraintValue::Audit(c)) => {
            if c >= p {
                Ok(())
            } else {
                Err(format!(
                    "{constraint_type} loosened: child audit mode {} below parent {}",
                    c.as_str(),
                    p.as_str()
                ))
            }
        }
        (p, c) => Err(format!(
            "{constraint_type} value kinds differ: parent is {}, child is {}",
            p.describe(),
            c.describe()
        )),
    }
}

/// Check every proposed constraint against the inherited envelope.
///
/// A constraint type absent from the envelope may be freely introduced:
/// adding restriction is always tightening relative to "unconstrained".
/// All violations are accumulated; nothing short-circuits.
pub fn check_envelope_tightening(
    inherited: &ConstraintEnvelope,
    proposed: &[Constraint],
) -> TighteningReport {
    let mut violations = Vec::new();

    for child in proposed {
        let Some(parent) = inherited.get(child.constraint_type) else {
            continue;
        };
        if let Err(message) =
            value_tightens(child.constraint_type, &parent.value, &child.value)
        {
            violations.push(TighteningViolation {
                constraint_type: child.constraint_type,
                parent_value: parent.value.describe(),
                child_value: child.value.describe(),
                message,
            });
        }
    }

    TighteningReport::from_violations(violations)
}

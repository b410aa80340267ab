//! Typed constraint values.
//!
//! Each constraint kind carries a value of a fixed shape. Constructors
//! are per-kind so a mismatched (kind, value) pair is unrepresentable.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{derive_record_id, hash_hex, AgentId, ConstraintId};
use crate::time::MINUTES_PER_DAY;

/// The seven constraint kinds.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum ConstraintType {
    ResourceLimit,
    TimeWindow,
    RateLimit,
    DataScope,
    ActionRestriction,
    AuditRequirement,
    CostLimit,
}

impl ConstraintType {
    /// Return a stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ResourceLimit => "resource_limit",
            Self::TimeWindow => "time_window",
            Self::RateLimit => "rate_limit",
            Self::DataScope => "data_scope",
            Self::ActionRestriction => "action_restriction",
            Self::AuditRequirement => "audit_requirement",
            Self::CostLimit => "cost_limit",
        }
    }
}

impl std::fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A daily time window in minutes of day, half-open `[start, end)`.
///
/// Windows where `end <= start` wrap past midnight: `[22:00, 06:00)`
/// covers the overnight hours. `start == end` covers the full day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start_minute: u32,
    pub end_minute: u32,
}

impl TimeWindow {
    /// Build a window from hours of day, e.g. `TimeWindow::hours(9, 17)`.
    pub fn hours(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_minute: (start_hour % 24) * 60,
            end_minute: (end_hour % 24) * 60,
        }
    }

    /// Window length in minutes; the full day is `MINUTES_PER_DAY`.
    pub fn len_minutes(&self) -> u32 {
        if self.start_minute == self.end_minute {
            MINUTES_PER_DAY
        } else {
            (self.end_minute + MINUTES_PER_DAY - self.start_minute) % MINUTES_PER_DAY
        }
    }

    /// Does the window contain a given minute of day?
    pub fn contains_minute(&self, minute: u32) -> bool {
        let minute = minute % MINUTES_PER_DAY;
        let offset = (minute + MINUTES_PER_DAY - self.start_minute) % MINUTES_PER_DAY;
        offset < self.len_minutes()
    }

    /// Modular containment: is `child` fully inside `self`?
    ///
    /// Handles wrap-around on either side, so `[22:00, 06:00)` contains
    /// `[23:00, 05:00)` but not `[21:00, 05:00)`.
    pub fn contains_window(&self, child: &TimeWindow) -> bool {
        if self.len_minutes() == MINUTES_PER_DAY {
            return true;
        }
        if child.len_minutes() == MINUTES_PER_DAY {
            return false;
        }
        let offset =
            (child.start_minute + MINUTES_PER_DAY - self.start_minute) % MINUTES_PER_DAY;
        offset + child.len_minutes() <= self.len_minutes()
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{:02}:{:02}, {:02}:{:02})",
            self.start_minute / 60,
            self.start_minute % 60,
            self.end_minute / 60,
            self.end_minute % 60,
        )
    }
}

/// How strictly actions under a grant must be audited.
///
/// Ordered: a child may only raise the requirement, never lower it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum AuditMode {
    None,
    OnFailure,
    Always,
}

impl AuditMode {
    /// Return a stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::OnFailure => "on_failure",
            Self::Always => "always",
        }
    }
}

/// A constraint value, typed per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstraintValue {
    /// Numeric ceiling: resource, rate, and cost limits.
    Limit(f64),
    /// Daily validity window.
    Window(TimeWindow),
    /// Allowed resource names/patterns.
    Scope(BTreeSet<String>),
    /// Forbidden action names/patterns.
    Restriction(BTreeSet<String>),
    /// Required audit mode.
    Audit(AuditMode),
}

impl ConstraintValue {
    /// Human-readable rendering used in violation messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Limit(v) => format!("{v}"),
            Self::Window(w) => w.to_string(),
            Self::Scope(s) => format!("{{{}}}", s.iter().cloned().collect::<Vec<_>>().join(", ")),
            Self::Restriction(s) => {
                format!("!{{{}}}", s.iter().cloned().collect::<Vec<_>>().join(", "))
            }
            Self::Audit(m) => m.as_str().to_string(),
        }
    }
}

/// A stored constraint record binding an agent.
///
/// Immutable once created; the set of constraints currently binding an
/// agent is projected into a `ConstraintEnvelope`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    /// Unique constraint ID (content-addressed).
    pub id: ConstraintId,
    /// The constraint kind.
    pub constraint_type: ConstraintType,
    /// The typed value.
    pub value: ConstraintValue,
    /// Who imposed the constraint.
    pub source: AgentId,
    /// Priority among constraints of the same kind (higher binds first).
    pub priority: u32,
    /// When the constraint was imposed.
    pub imposed_at: DateTime<Utc>,
    /// Hash of all constraint fields.
    pub record_hash: String,
}

impl Constraint {
    fn build(
        constraint_type: ConstraintType,
        value: ConstraintValue,
        source: AgentId,
        priority: u32,
    ) -> Self {
        let imposed_at = crate::time::now();
        let value_json = serde_json::to_string(&value).unwrap_or_default();
        let hash_input = format!(
            "{}:{}:{}:{}:{}",
            constraint_type.as_str(),
            value_json,
            source.0,
            priority,
            imposed_at.to_rfc3339(),
        );
        let record_hash = hash_hex(&hash_input);
        let id = ConstraintId(derive_record_id("acon", &record_hash));
        Self {
            id,
            constraint_type,
            value,
            source,
            priority,
            imposed_at,
            record_hash,
        }
    }

    /// Numeric ceiling on resource consumption.
    pub fn resource_limit(limit: f64, source: AgentId, priority: u32) -> Self {
        Self::build(
            ConstraintType::ResourceLimit,
            ConstraintValue::Limit(limit),
            source,
            priority,
        )
    }

    /// Numeric ceiling on request rate.
    pub fn rate_limit(limit: f64, source: AgentId, priority: u32) -> Self {
        Self::build(
            ConstraintType::RateLimit,
            ConstraintValue::Limit(limit),
            source,
            priority,
        )
    }

    /// Numeric ceiling on spend.
    pub fn cost_limit(limit: f64, source: AgentId, priority: u32) -> Self {
        Self::build(
            ConstraintType::CostLimit,
            ConstraintValue::Limit(limit),
            source,
            priority,
        )
    }

    /// Daily validity window.
    pub fn time_window(window: TimeWindow, source: AgentId, priority: u32) -> Self {
        Self::build(
            ConstraintType::TimeWindow,
            ConstraintValue::Window(window),
            source,
            priority,
        )
    }

    /// Allowed resource set.
    pub fn data_scope(
        resources: impl IntoIterator<Item = String>,
        source: AgentId,
        priority: u32,
    ) -> Self {
        Self::build(
            ConstraintType::DataScope,
            ConstraintValue::Scope(resources.into_iter().collect()),
            source,
            priority,
        )
    }

    /// Forbidden action set.
    pub fn action_restriction(
        actions: impl IntoIterator<Item = String>,
        source: AgentId,
        priority: u32,
    ) -> Self {
        Self::build(
            ConstraintType::ActionRestriction,
            ConstraintValue::Restriction(actions.into_iter().collect()),
            source,
            priority,
        )
    }

    /// Required audit mode.
    pub fn audit_requirement(mode: AuditMode, source: AgentId, priority: u32) -> Self {
        Self::build(
            ConstraintType::AuditRequirement,
            ConstraintValue::Audit(mode),
            source,
            priority,
        )
    }
}

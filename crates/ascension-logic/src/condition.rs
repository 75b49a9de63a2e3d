//! Declarative unlock conditions and their evaluator.
//!
//! Achievements and story triggers carry small condition expressions such
//! as `tier_min:4,turns_max:100`. The text form is parsed once into a
//! closed [`Condition`] type and evaluated against a read-only
//! [`StatModel`] snapshot. Evaluation never mutates anything; callers
//! apply rewards only after a `true` result on a node not yet completed.
//!
//! # Grammar
//!
//! ```text
//! expr   := clause ("," clause)*          comma = conjunction
//! clause := "tier:" n                     tier index equals n
//!         | "tier_min:" n                 tier index at least n
//!         | "resource:" name ":" n        resource amount at least n
//!         | "progress:" n                 progress points at least n
//!         | "turns_max:" n                elapsed turns at most n
//!         | "turns_min:" n                elapsed turns at least n
//!         | "flag:" id                    flag has been recorded
//! ```
//!
//! ```
//! use ascension_logic::condition::{evaluate_expr, Condition};
//! use ascension_logic::stats::StatModel;
//!
//! let model = StatModel::new("Tester");
//! assert!(evaluate_expr("tier:0,resource:spirit_stones:100", &model));
//! assert!(!evaluate_expr("tier:banana", &model)); // fails closed
//! assert_eq!(Condition::parse("turns_max:100").unwrap(), Condition::TurnsAtMost(100));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stats::StatModel;

/// A parsed condition expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    TierEquals(usize),
    TierAtLeast(usize),
    ResourceAtLeast(String, u64),
    ProgressAtLeast(u32),
    TurnsAtMost(u64),
    TurnsAtLeast(u64),
    HasFlag(String),
    /// Conjunction. An empty list is vacuously true.
    All(Vec<Condition>),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("empty condition expression")]
    Empty,
    #[error("expression `{0}` has an empty clause")]
    EmptyClause(String),
    #[error("clause `{0}` has no `kind:value` separator")]
    MissingSeparator(String),
    #[error("unknown condition kind `{0}`")]
    UnknownKind(String),
    #[error("clause `{clause}` has invalid number `{value}`")]
    InvalidNumber { clause: String, value: String },
    #[error("clause `{0}` is missing a name")]
    MissingName(String),
}

impl Condition {
    /// Parse the text form. Single clauses parse to the bare variant;
    /// several clauses parse to [`Condition::All`].
    pub fn parse(expr: &str) -> Result<Self, ConditionError> {
        let clauses: Vec<&str> = expr.split(',').map(str::trim).collect();
        if clauses.iter().all(|c| c.is_empty()) {
            return Err(ConditionError::Empty);
        }
        if clauses.iter().any(|c| c.is_empty()) {
            return Err(ConditionError::EmptyClause(expr.to_string()));
        }

        match clauses.as_slice() {
            [] => Err(ConditionError::Empty),
            [single] => parse_clause(single),
            many => many
                .iter()
                .map(|c| parse_clause(c))
                .collect::<Result<Vec<_>, _>>()
                .map(Condition::All),
        }
    }

    /// Pure, exhaustive evaluation against a stat snapshot.
    pub fn evaluate(&self, model: &StatModel) -> bool {
        match self {
            Condition::TierEquals(n) => model.tier_index() == *n,
            Condition::TierAtLeast(n) => model.tier_index() >= *n,
            Condition::ResourceAtLeast(name, n) => model.resource(name) >= *n,
            Condition::ProgressAtLeast(n) => model.progress_points() >= *n,
            Condition::TurnsAtMost(n) => model.elapsed_turns() <= *n,
            Condition::TurnsAtLeast(n) => model.elapsed_turns() >= *n,
            Condition::HasFlag(flag) => model.has_flag(flag),
            Condition::All(parts) => parts.iter().all(|c| c.evaluate(model)),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::TierEquals(n) => write!(f, "tier:{n}"),
            Condition::TierAtLeast(n) => write!(f, "tier_min:{n}"),
            Condition::ResourceAtLeast(name, n) => write!(f, "resource:{name}:{n}"),
            Condition::ProgressAtLeast(n) => write!(f, "progress:{n}"),
            Condition::TurnsAtMost(n) => write!(f, "turns_max:{n}"),
            Condition::TurnsAtLeast(n) => write!(f, "turns_min:{n}"),
            Condition::HasFlag(flag) => write!(f, "flag:{flag}"),
            Condition::All(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{part}")?;
                }
                Ok(())
            }
        }
    }
}

/// Parse and evaluate in one step. Malformed input evaluates to `false`
/// and is logged; it never propagates.
pub fn evaluate_expr(expr: &str, model: &StatModel) -> bool {
    match Condition::parse(expr) {
        Ok(condition) => condition.evaluate(model),
        Err(e) => {
            log::warn!("Rejected condition `{}`: {}", expr, e);
            false
        }
    }
}

fn parse_clause(clause: &str) -> Result<Condition, ConditionError> {
    let (kind, value) = clause
        .split_once(':')
        .ok_or_else(|| ConditionError::MissingSeparator(clause.to_string()))?;
    let value = value.trim();

    match kind.trim() {
        "tier" => Ok(Condition::TierEquals(number(clause, value)?)),
        "tier_min" => Ok(Condition::TierAtLeast(number(clause, value)?)),
        "progress" => Ok(Condition::ProgressAtLeast(number(clause, value)?)),
        "turns_max" => Ok(Condition::TurnsAtMost(number(clause, value)?)),
        "turns_min" => Ok(Condition::TurnsAtLeast(number(clause, value)?)),
        "flag" if !value.is_empty() => Ok(Condition::HasFlag(value.to_string())),
        "flag" => Err(ConditionError::MissingName(clause.to_string())),
        "resource" => {
            let (name, amount) = value
                .rsplit_once(':')
                .ok_or_else(|| ConditionError::MissingSeparator(clause.to_string()))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ConditionError::MissingName(clause.to_string()));
            }
            Ok(Condition::ResourceAtLeast(
                name.to_string(),
                number(clause, amount.trim())?,
            ))
        }
        other => Err(ConditionError::UnknownKind(other.to_string())),
    }
}

fn number<T: std::str::FromStr>(clause: &str, value: &str) -> Result<T, ConditionError> {
    value.parse().map_err(|_| ConditionError::InvalidNumber {
        clause: clause.to_string(),
        value: value.to_string(),
    })
}

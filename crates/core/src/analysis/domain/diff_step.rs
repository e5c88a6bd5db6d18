use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::analyzer::RawStep;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StepError {
    #[error("unknown diff action '{0}'")]
    UnknownAction(String),
    #[error("{action} step has invalid cost {cost}")]
    InvalidCost { action: DiffAction, cost: f64 },
    #[error("EQ step must have cost 0, got {0}")]
    NonZeroEqualCost(f64),
    #[error("{action} step has left {left} and right {right}")]
    SidePresence {
        action: DiffAction,
        left: &'static str,
        right: &'static str,
    },
    #[error("diff totals must be finite and non-negative, got cost {cost} and length {length}")]
    InvalidTotals { cost: f64, length: f64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiffAction {
    Sub,
    Eq,
    Del,
    Ins,
}

impl DiffAction {
    pub fn as_str(self) -> &'static str {
        match self {
            DiffAction::Sub => "SUB",
            DiffAction::Eq => "EQ",
            DiffAction::Del => "DEL",
            DiffAction::Ins => "INS",
        }
    }

    fn expects_left(self) -> bool {
        !matches!(self, DiffAction::Ins)
    }

    fn expects_right(self) -> bool {
        !matches!(self, DiffAction::Del)
    }
}

impl fmt::Display for DiffAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiffAction {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUB" => Ok(DiffAction::Sub),
            "EQ" => Ok(DiffAction::Eq),
            "DEL" => Ok(DiffAction::Del),
            "INS" => Ok(DiffAction::Ins),
            _ => Err(StepError::UnknownAction(s.to_string())),
        }
    }
}

/// One alignment step between the left and right token sequences.
///
/// Construction validates side presence against the action: `left` exists
/// for SUB/EQ/DEL, `right` for SUB/EQ/INS. Cost is finite and non-negative,
/// and exactly 0 for EQ.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DiffStep {
    action: DiffAction,
    left: Option<String>,
    right: Option<String>,
    cost: f64,
}

impl DiffStep {
    pub fn new(
        action: DiffAction,
        left: Option<String>,
        right: Option<String>,
        cost: f64,
    ) -> Result<Self, StepError> {
        if action.expects_left() != left.is_some() || action.expects_right() != right.is_some() {
            return Err(StepError::SidePresence {
                action,
                left: presence(&left),
                right: presence(&right),
            });
        }
        if !cost.is_finite() || cost < 0.0 {
            return Err(StepError::InvalidCost { action, cost });
        }
        if action == DiffAction::Eq && cost != 0.0 {
            return Err(StepError::NonZeroEqualCost(cost));
        }
        Ok(Self {
            action,
            left,
            right,
            cost,
        })
    }

    pub fn equal(left: &str, right: &str) -> Self {
        Self {
            action: DiffAction::Eq,
            left: Some(left.to_string()),
            right: Some(right.to_string()),
            cost: 0.0,
        }
    }

    pub fn substitution(left: &str, right: &str, cost: f64) -> Result<Self, StepError> {
        Self::new(
            DiffAction::Sub,
            Some(left.to_string()),
            Some(right.to_string()),
            cost,
        )
    }

    pub fn deletion(left: &str, cost: f64) -> Result<Self, StepError> {
        Self::new(DiffAction::Del, Some(left.to_string()), None, cost)
    }

    pub fn insertion(right: &str, cost: f64) -> Result<Self, StepError> {
        Self::new(DiffAction::Ins, None, Some(right.to_string()), cost)
    }

    /// Normalizes an analyzer step. Empty tokens count as absent.
    pub fn from_raw(raw: RawStep) -> Result<Self, StepError> {
        let action = raw.action.parse()?;
        Self::new(action, non_empty(raw.left), non_empty(raw.right), raw.cost)
    }

    pub fn action(&self) -> DiffAction {
        self.action
    }

    pub fn left(&self) -> Option<&str> {
        self.left.as_deref()
    }

    pub fn right(&self) -> Option<&str> {
        self.right.as_deref()
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// True for any step that contributes to the distance.
    pub fn is_error(&self) -> bool {
        self.cost > 0.0
    }
}

fn non_empty(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.trim().is_empty())
}

fn presence(side: &Option<String>) -> &'static str {
    if side.is_some() {
        "present"
    } else {
        "absent"
    }
}

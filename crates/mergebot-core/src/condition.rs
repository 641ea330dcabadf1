//! Condition grammar and evaluation.
//!
//! A condition key is a name optionally followed by `__<operator>`, e.g.
//! `title_contains`, `older_than__not`, `minus__ge`. Keys are parsed and
//! checked when the configuration is loaded, so a rule that reaches
//! evaluation only holds well-formed conditions.

use crate::comments::{count_votes, Vote};
use crate::error::{BotError, Result};
use crate::evaluation::Evaluation;
use crate::reltime;
use chrono::Utc;
use std::fmt;

pub const OPERATOR_DELIMITER: &str = "__";

// ---------------------------------------------------------------------------
// ConditionKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    TitleContains,
    State,
    Plus,
    Minus,
    ToBranch,
    OlderThan,
}

impl ConditionKind {
    pub fn all() -> &'static [ConditionKind] {
        &[
            ConditionKind::TitleContains,
            ConditionKind::State,
            ConditionKind::Plus,
            ConditionKind::Minus,
            ConditionKind::ToBranch,
            ConditionKind::OlderThan,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConditionKind::TitleContains => "title_contains",
            ConditionKind::State => "state",
            ConditionKind::Plus => "plus",
            ConditionKind::Minus => "minus",
            ConditionKind::ToBranch => "to_branch",
            ConditionKind::OlderThan => "older_than",
        }
    }

    /// Vote conditions produce a count and take comparison operators.
    pub fn is_numeric(self) -> bool {
        matches!(self, ConditionKind::Plus | ConditionKind::Minus)
    }
}

impl fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ConditionKind {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        ConditionKind::all()
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| BotError::UnknownCondition(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Operator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Not,
    Gt,
    Ge,
    Eq,
    Ne,
    Lt,
    Le,
}

impl Operator {
    pub fn parse(s: &str) -> Option<Operator> {
        match s {
            "not" => Some(Operator::Not),
            "gt" => Some(Operator::Gt),
            "ge" => Some(Operator::Ge),
            "eq" => Some(Operator::Eq),
            "ne" => Some(Operator::Ne),
            "lt" => Some(Operator::Lt),
            "le" => Some(Operator::Le),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Not => "not",
            Operator::Gt => "gt",
            Operator::Ge => "ge",
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Lt => "lt",
            Operator::Le => "le",
        }
    }

    pub fn is_numeric(self) -> bool {
        !matches!(self, Operator::Not)
    }

    /// Compare `lhs` against `rhs`. `Not` never reaches here.
    fn compare(self, lhs: i64, rhs: i64) -> bool {
        match self {
            Operator::Gt => lhs > rhs,
            Operator::Ge => lhs >= rhs,
            Operator::Eq => lhs == rhs,
            Operator::Ne => lhs != rhs,
            Operator::Lt => lhs < rhs,
            Operator::Le => lhs <= rhs,
            Operator::Not => false,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Raw result of a condition before its operator is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Flag(bool),
    Count(u64),
}

// ---------------------------------------------------------------------------
// Condition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    key: String,
    kind: ConditionKind,
    op: Option<Operator>,
    value: String,
    threshold: Option<i64>,
}

impl Condition {
    /// Parse and validate a `key: value` pair from a rule's conditions.
    pub fn parse(key: &str, value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let (name, op_str) = match key.split_once(OPERATOR_DELIMITER) {
            Some((name, op)) => (name, Some(op)),
            None => (key, None),
        };
        let kind: ConditionKind = name.parse()?;
        let op = match op_str {
            Some(s) => Some(Operator::parse(s).ok_or_else(|| BotError::UnknownOperator {
                condition: name.to_string(),
                operator: s.to_string(),
            })?),
            None => None,
        };

        let threshold = if kind.is_numeric() {
            match op {
                None => return Err(BotError::MissingOperator(key.to_string())),
                Some(o) if !o.is_numeric() => {
                    return Err(BotError::OperatorMismatch {
                        condition: name.to_string(),
                        operator: o.to_string(),
                    })
                }
                Some(_) => {}
            }
            let parsed = value.trim().parse::<i64>().map_err(|_| BotError::InvalidThreshold {
                condition: key.to_string(),
                value: value.clone(),
            })?;
            Some(parsed)
        } else {
            if let Some(o) = op.filter(|o| o.is_numeric()) {
                return Err(BotError::OperatorMismatch {
                    condition: name.to_string(),
                    operator: o.to_string(),
                });
            }
            None
        };

        if kind == ConditionKind::OlderThan {
            reltime::resolve(&value, Utc::now())?;
        }

        Ok(Self {
            key: key.to_string(),
            kind,
            op,
            value,
            threshold,
        })
    }

    /// The key as written in the configuration.
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> ConditionKind {
        self.kind
    }

    pub fn operator(&self) -> Option<Operator> {
        self.op
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Run the condition's handler without applying the operator.
    pub fn check(&self, ev: &mut Evaluation<'_>) -> Result<Outcome> {
        let pr = ev.pr;
        let outcome = match self.kind {
            ConditionKind::TitleContains => Outcome::Flag(pr.title.contains(self.value.as_str())),
            ConditionKind::State => Outcome::Flag(pr.state.as_str() == self.value),
            ConditionKind::ToBranch => Outcome::Flag(pr.base_ref == self.value),
            ConditionKind::OlderThan => {
                let cutoff = reltime::resolve(&self.value, ev.now)?;
                Outcome::Flag(pr.created_at < cutoff)
            }
            ConditionKind::Plus | ConditionKind::Minus => {
                let vote = if self.kind == ConditionKind::Plus {
                    Vote::Plus
                } else {
                    Vote::Minus
                };
                let settings = ev.settings;
                let pages = ev.comments()?;
                Outcome::Count(count_votes(pages, vote, &settings.approvers))
            }
        };
        Ok(outcome)
    }

    /// Run the handler and apply the operator.
    pub fn evaluate(&self, ev: &mut Evaluation<'_>) -> Result<bool> {
        let outcome = self.check(ev)?;
        let passed = match (outcome, self.op, self.threshold) {
            (Outcome::Count(n), Some(op), Some(rhs)) => {
                op.compare(i64::try_from(n).unwrap_or(i64::MAX), rhs)
            }
            (Outcome::Flag(b), Some(Operator::Not), _) => !b,
            (Outcome::Flag(b), None, _) => b,
            _ => {
                return Err(BotError::OperatorMismatch {
                    condition: self.kind.to_string(),
                    operator: self.op.map(|o| o.to_string()).unwrap_or_default(),
                })
            }
        };
        tracing::debug!(
            pr = ev.pr.number,
            condition = %self.key,
            value = %self.value,
            ?outcome,
            passed,
            "evaluated condition"
        );
        Ok(passed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

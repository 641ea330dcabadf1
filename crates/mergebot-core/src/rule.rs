use crate::action::Action;
use crate::condition::Condition;
use crate::error::{BotError, Result};
use crate::evaluation::Evaluation;

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// A named set of conditions and the actions to run when all of them hold.
///
/// Conditions are grouped the way they were written in the configuration;
/// the grouping is cosmetic and every condition in every group must pass.
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    groups: Vec<Vec<Condition>>,
    actions: Vec<Action>,
}

impl Rule {
    pub fn new(name: impl Into<String>, groups: Vec<Vec<Condition>>, actions: Vec<Action>) -> Self {
        let rule = Self {
            name: name.into(),
            groups,
            actions,
        };
        tracing::info!(rule = %rule.name, "registered rule");
        rule
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Every condition across every group, in declaration order.
    pub fn conditions(&self) -> impl Iterator<Item = &Condition> {
        self.groups.iter().flatten()
    }

    /// True iff every condition passes. Stops at the first failure.
    pub fn matches(&self, ev: &mut Evaluation<'_>) -> Result<bool> {
        for cond in self.conditions() {
            let passed = cond.evaluate(ev).map_err(|e| BotError::Condition {
                rule: self.name.clone(),
                key: cond.key().to_string(),
                source: Box::new(e),
            })?;
            if !passed {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Run the actions if the rule matches. Returns whether it fired.
    pub fn apply(&self, ev: &mut Evaluation<'_>) -> Result<bool> {
        if !self.matches(ev)? {
            return Ok(false);
        }
        tracing::info!(rule = %self.name, pr = %ev.pr, "matched");
        for action in &self.actions {
            let applied = action.execute(ev)?;
            tracing::debug!(rule = %self.name, action = action.kind(), ?applied, "executed action");
        }
        Ok(true)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! One moderation run: fetch open pull requests, pick the ones that changed
//! since the last run, evaluate every rule against each, and record them as
//! seen.
//!
//! A run is a single pass with no retry. Any error aborts the run; pull
//! requests recorded before the failure stay recorded, and the one that
//! failed is left dirty so the next run picks it up again.

use crate::error::{BotError, Result};
use crate::evaluation::{Evaluation, RepoSettings};
use crate::github::GitHubApi;
use crate::rule::Rule;
use crate::tracker::ChangeTracker;
use crate::types::PullRequest;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Open pull requests returned by the API.
    pub open: usize,
    /// Pull requests that were new or changed and got evaluated.
    pub examined: usize,
    /// Rule firings across all examined pull requests.
    pub fired: usize,
}

pub struct Orchestrator<'a> {
    settings: RepoSettings,
    rules: Vec<Rule>,
    api: &'a dyn GitHubApi,
    tracker: &'a ChangeTracker,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        settings: RepoSettings,
        rules: Vec<Rule>,
        api: &'a dyn GitHubApi,
        tracker: &'a ChangeTracker,
    ) -> Self {
        Self {
            settings,
            rules,
            api,
            tracker,
        }
    }

    /// Open pull requests (count) and the subset that needs evaluating.
    pub fn dirty_pull_requests(&self) -> Result<(usize, Vec<PullRequest>)> {
        let pages = self.api.list_open_pull_requests(&self.settings.repo)?;
        let mut open = 0;
        let mut dirty = Vec::new();
        for pr in pages.into_iter().flatten() {
            open += 1;
            if self.tracker.is_dirty(&pr)? {
                dirty.push(pr);
            }
        }
        Ok((open, dirty))
    }

    /// Run every rule against `pr` in order, then record it as seen.
    /// Returns how many rules fired.
    pub fn evaluate(&self, pr: &PullRequest) -> Result<usize> {
        let mut ev = Evaluation::new(pr, &self.settings, self.api);
        let mut fired = 0;
        for rule in &self.rules {
            let hit = rule.apply(&mut ev).map_err(|e| BotError::Rule {
                rule: rule.name().to_string(),
                pr: pr.to_string(),
                source: Box::new(e),
            })?;
            if hit {
                fired += 1;
            }
        }
        self.tracker.mark_seen(pr)?;
        Ok(fired)
    }

    pub fn run(&self) -> Result<RunReport> {
        let (open, dirty) = self.dirty_pull_requests()?;
        tracing::info!(open, dirty = dirty.len(), "found pull requests to examine");

        let mut report = RunReport {
            open,
            ..RunReport::default()
        };
        for pr in &dirty {
            report.fired += self.evaluate(pr)?;
            report.examined += 1;
        }
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! State for one evaluation pass over one pull request.
//!
//! The pass owns the comment cache: comments are fetched at most once, on
//! first use, and dropped with the pass. Comments posted during the pass are
//! appended so later rules observe them.

use crate::error::Result;
use crate::github::GitHubApi;
use crate::types::{Comment, Pages, PullRequest, RepoRef};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// RepoSettings
// ---------------------------------------------------------------------------

/// Repository-wide settings every rule evaluates against.
#[derive(Debug, Clone)]
pub struct RepoSettings {
    pub repo: RepoRef,
    /// Logins whose `+1`/`-1` votes count.
    pub approvers: BTreeSet<String>,
    /// Login the bot posts as; used to recognise its own comments.
    pub bot_user: String,
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

pub struct Evaluation<'a> {
    pub pr: &'a PullRequest,
    pub settings: &'a RepoSettings,
    /// Instant relative time phrases are anchored to.
    pub now: DateTime<Utc>,
    api: &'a dyn GitHubApi,
    comments: Option<Pages<Comment>>,
}

impl<'a> Evaluation<'a> {
    pub fn new(pr: &'a PullRequest, settings: &'a RepoSettings, api: &'a dyn GitHubApi) -> Self {
        Self {
            pr,
            settings,
            now: Utc::now(),
            api,
            comments: None,
        }
    }

    /// Pin the evaluation instant instead of using the wall clock.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn api(&self) -> &'a dyn GitHubApi {
        self.api
    }

    /// Comments on the pull request, fetched on first call.
    pub fn comments(&mut self) -> Result<&[Vec<Comment>]> {
        if self.comments.is_none() {
            let pages = self
                .api
                .list_issue_comments(self.pr.number, &self.settings.repo)?;
            tracing::debug!(
                pr = self.pr.number,
                count = pages.iter().map(Vec::len).sum::<usize>(),
                "fetched comments"
            );
            self.comments = Some(pages);
        }
        Ok(self.comments.as_deref().unwrap_or_default())
    }

    /// Append a comment posted during this pass to the cached thread.
    pub fn record_comment(&mut self, comment: Comment) {
        if let Some(pages) = self.comments.as_mut() {
            match pages.last_mut() {
                Some(page) => page.push(comment),
                None => pages.push(vec![comment]),
            }
        }
    }
}

//! In-memory GitHub double for unit tests.

use crate::error::{BotError, Result};
use crate::evaluation::RepoSettings;
use crate::github::GitHubApi;
use crate::types::{Comment, Pages, PullRequest, PullState, RepoRef};
use chrono::{Duration, Utc};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

pub const PR_NUMBER: u64 = 12;
pub const BOT: &str = "galaxybot";

pub fn settings(approvers: &[&str]) -> RepoSettings {
    RepoSettings {
        repo: RepoRef::new("galaxyproject", "galaxy"),
        approvers: approvers.iter().map(|s| s.to_string()).collect(),
        bot_user: BOT.to_string(),
    }
}

/// Open PR #12 into `dev`, created `age_days` ago.
pub fn pull_request(age_days: i64) -> PullRequest {
    let created = Utc::now() - Duration::days(age_days);
    PullRequest {
        id: 9000 + PR_NUMBER,
        number: PR_NUMBER,
        title: "[PROCEDURES] Testing…".to_string(),
        author: "erasche".to_string(),
        state: PullState::Open,
        created_at: created,
        updated_at: created,
        base_ref: "dev".to_string(),
        html_url: format!("https://github.com/galaxyproject/galaxy/pull/{PR_NUMBER}"),
    }
}

#[derive(Default)]
pub struct FakeGitHub {
    comments: RefCell<HashMap<u64, Pages<Comment>>>,
    posted: RefCell<Vec<(u64, String)>>,
    fetches: Cell<usize>,
    fail_posts: bool,
}

impl FakeGitHub {
    pub fn with_comments(self, pages: Pages<Comment>) -> Self {
        self.comments.borrow_mut().insert(PR_NUMBER, pages);
        self
    }

    pub fn failing_posts(mut self) -> Self {
        self.fail_posts = true;
        self
    }

    pub fn posted(&self) -> Vec<(u64, String)> {
        self.posted.borrow().clone()
    }

    pub fn comment_fetches(&self) -> usize {
        self.fetches.get()
    }
}

impl GitHubApi for FakeGitHub {
    fn list_open_pull_requests(&self, _repo: &RepoRef) -> Result<Pages<PullRequest>> {
        Ok(vec![vec![pull_request(1)]])
    }

    fn list_issue_comments(&self, number: u64, _repo: &RepoRef) -> Result<Pages<Comment>> {
        self.fetches.set(self.fetches.get() + 1);
        Ok(self.comments.borrow().get(&number).cloned().unwrap_or_default())
    }

    fn create_issue_comment(&self, number: u64, _repo: &RepoRef, body: &str) -> Result<Comment> {
        if self.fail_posts {
            return Err(BotError::GitHub("create issue comment failed with 502".into()));
        }
        self.posted.borrow_mut().push((number, body.to_string()));
        let mut comments = self.comments.borrow_mut();
        let pages = comments.entry(number).or_default();
        let id = 1000 + pages.iter().map(Vec::len).sum::<usize>() as u64;
        let comment = Comment::new(id, BOT, body);
        pages.push(vec![comment.clone()]);
        Ok(comment)
    }
}

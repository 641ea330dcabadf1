//! Actions a rule performs once all its conditions pass.
//!
//! Actions are idempotent per rendered text: before posting, the existing
//! thread is searched for the exact comment and nothing is posted if it is
//! already there.

use crate::comments::{find_in_comments, multiline};
use crate::error::{BotError, Result};
use crate::evaluation::Evaluation;

pub const AUTHOR_PLACEHOLDER: &str = "{author}";

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Post `template` with `{author}` replaced by `@<login>`.
    Comment { template: String },
}

/// What executing an action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Posted,
    /// The bot already posted this text.
    AlreadyApplied,
    /// Someone other than the bot posted this text; nothing was posted.
    ForeignDuplicate,
}

impl Action {
    /// Build an action from its configured kind tag.
    pub fn from_config(kind: &str, comment: Option<&str>) -> Result<Self> {
        match kind {
            "comment" => {
                let template = comment.ok_or_else(|| {
                    BotError::InvalidConfig("comment action is missing 'comment' text".into())
                })?;
                Ok(Action::Comment {
                    template: template.to_string(),
                })
            }
            other => Err(BotError::UnsupportedAction(other.to_string())),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Action::Comment { .. } => "comment",
        }
    }

    pub fn execute(&self, ev: &mut Evaluation<'_>) -> Result<Applied> {
        match self {
            Action::Comment { template } => {
                let text = render_comment(template, &ev.pr.author);
                post_once(ev, &text)
            }
        }
    }
}

/// Substitute the author and flatten to one trimmed line.
pub fn render_comment(template: &str, author: &str) -> String {
    template
        .replace(AUTHOR_PLACEHOLDER, &format!("@{author}"))
        .trim()
        .replace("\r\n", " ")
        .replace('\n', " ")
}

fn post_once(ev: &mut Evaluation<'_>, text: &str) -> Result<Applied> {
    let pattern = multiline(&regex::escape(text))?;
    let settings = ev.settings;
    let bot_user = settings.bot_user.as_str();
    let number = ev.pr.number;

    let previous = find_in_comments(ev.comments()?, &pattern)
        .next()
        .map(|c| c.author == bot_user);
    match previous {
        Some(true) => {
            tracing::info!(pr = number, "comment action previously applied, not duplicating");
            return Ok(Applied::AlreadyApplied);
        }
        Some(false) => {
            tracing::warn!(
                pr = number,
                bot_user,
                "comment action previously applied under a different user, not duplicating"
            );
            return Ok(Applied::ForeignDuplicate);
        }
        None => {}
    }

    let created = ev
        .api()
        .create_issue_comment(number, &settings.repo, text)?;
    tracing::info!(pr = number, comment_id = created.id, "posted comment");
    ev.record_comment(created);
    Ok(Applied::Posted)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

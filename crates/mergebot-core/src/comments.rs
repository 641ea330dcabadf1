//! Comment scanning: pattern search over paginated comment threads and the
//! vote counting built on top of it.

use crate::error::{BotError, Result};
use crate::types::Comment;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Compile `pattern` with `^`/`$` anchoring at line boundaries.
pub fn multiline(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .multi_line(true)
        .build()
        .map_err(|e| BotError::InvalidConfig(format!("bad pattern '{pattern}': {e}")))
}

/// Lazily yield every comment whose body contains a match for `pattern`.
///
/// Pages are walked in order and nothing is copied, so the same pages can be
/// scanned again with a different pattern.
pub fn find_in_comments<'a>(
    pages: &'a [Vec<Comment>],
    pattern: &'a Regex,
) -> impl Iterator<Item = &'a Comment> + 'a {
    pages.iter().flatten().filter(move |c| {
        let hit = pattern.is_match(&c.body);
        tracing::trace!(pattern = %pattern, body = %c.body, hit, "scanning comment");
        hit
    })
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Plus,
    Minus,
}

static PLUS_RE: OnceLock<Regex> = OnceLock::new();
static MINUS_RE: OnceLock<Regex> = OnceLock::new();

impl Vote {
    /// `:+1:` anywhere, or a line holding nothing but `+1` (same for `-1`).
    pub fn pattern(self) -> &'static Regex {
        match self {
            Vote::Plus => PLUS_RE.get_or_init(|| {
                RegexBuilder::new(r"(:\+1:|^\s*\+1\s*$)")
                    .multi_line(true)
                    .build()
                    .unwrap()
            }),
            Vote::Minus => MINUS_RE.get_or_init(|| {
                RegexBuilder::new(r"(:-1:|^\s*-1\s*$)")
                    .multi_line(true)
                    .build()
                    .unwrap()
            }),
        }
    }
}

/// Number of `vote` comments cast by members of `approvers`.
pub fn count_votes(pages: &[Vec<Comment>], vote: Vote, approvers: &BTreeSet<String>) -> u64 {
    find_in_comments(pages, vote.pattern())
        .filter(|c| approvers.contains(&c.author))
        .count() as u64
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

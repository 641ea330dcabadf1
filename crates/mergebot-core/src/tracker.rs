//! Durable record of the last `updated_at` seen for each pull request,
//! stored with redb.
//!
//! # Table design
//!
//! A single `pr_data` table maps the pull request id (`u64`, the stable id,
//! not the display number) to the timestamp string
//! `YYYY-MM-DDTHH:MM:SS.Z`. Rows are created on first sighting, overwritten
//! after every pass, and never removed.

use std::fmt::Display;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};
use redb::{Database, ReadableTable, TableDefinition};

use crate::error::{BotError, Result};
use crate::types::PullRequest;

const PR_DATA: TableDefinition<u64, &str> = TableDefinition::new("pr_data");

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.Z";

fn store_err(e: impl Display) -> BotError {
    BotError::Store(e.to_string())
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| BotError::Store(format!("bad timestamp '{s}': {e}")))
}

// ---------------------------------------------------------------------------
// ChangeTracker
// ---------------------------------------------------------------------------

pub struct ChangeTracker {
    db: Database,
}

impl ChangeTracker {
    /// Open or create the database at `path`, creating `pr_data` if absent.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path).map_err(store_err)?;
        let wt = db.begin_write().map_err(store_err)?;
        wt.open_table(PR_DATA).map_err(store_err)?;
        wt.commit().map_err(store_err)?;
        Ok(Self { db })
    }

    /// Last timestamp recorded for `id`, or `None` if never seen.
    pub fn lookup(&self, id: u64) -> Result<Option<DateTime<Utc>>> {
        let rt = self.db.begin_read().map_err(store_err)?;
        let table = rt.open_table(PR_DATA).map_err(store_err)?;
        let row = table.get(id).map_err(store_err)?;
        row.map(|v| parse_timestamp(v.value())).transpose()
    }

    /// Create the record for `id`. Fails if one exists.
    pub fn insert(&self, id: u64, updated_at: DateTime<Utc>) -> Result<()> {
        self.write(id, updated_at, false)
    }

    /// Overwrite the record for `id`. Fails if none exists.
    pub fn update(&self, id: u64, updated_at: DateTime<Utc>) -> Result<()> {
        self.write(id, updated_at, true)
    }

    fn write(&self, id: u64, updated_at: DateTime<Utc>, must_exist: bool) -> Result<()> {
        let value = format_timestamp(updated_at);
        let wt = self.db.begin_write().map_err(store_err)?;
        {
            let mut table = wt.open_table(PR_DATA).map_err(store_err)?;
            let exists = table.get(id).map_err(store_err)?.is_some();
            match (exists, must_exist) {
                (true, false) => return Err(BotError::RecordExists(id)),
                (false, true) => return Err(BotError::RecordMissing(id)),
                _ => {}
            }
            table.insert(id, value.as_str()).map_err(store_err)?;
        }
        wt.commit().map_err(store_err)?;
        Ok(())
    }

    /// True if `pr` was never seen or changed since it was last seen.
    pub fn is_dirty(&self, pr: &PullRequest) -> Result<bool> {
        let seen = self.lookup(pr.id)?;
        let dirty = seen != Some(pr.updated_at.trunc_subsecs(0));
        tracing::debug!(pr = pr.number, id = pr.id, ?seen, updated_at = %pr.updated_at, dirty, "checked tracker");
        Ok(dirty)
    }

    /// Record that `pr` has been evaluated at its current `updated_at`.
    pub fn mark_seen(&self, pr: &PullRequest) -> Result<()> {
        match self.lookup(pr.id)? {
            Some(_) => self.update(pr.id, pr.updated_at),
            None => self.insert(pr.id, pr.updated_at),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

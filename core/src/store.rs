//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The request service and the orchestration driver call store methods —
//! they never execute SQL directly.

mod request;
mod state;

use crate::error::ClosureResult;
use crate::types::{AgentId, BusinessId, RequestId, RequestStatus, StateKind};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;

pub use request::{RequestFilter, SortDirection, SortField, StatusBucket};

pub struct ClosureStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl ClosureStore {
    pub fn open(path: &str) -> ClosureResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files; memory-mode URIs stay on their
        // default journal.
        if !path.contains("mode=memory") {
            conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        }
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> ClosureResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases this is only shared when the path is a
    /// `file:...?cache=shared` URI; a plain :memory: store is isolated.
    pub fn reopen(&self) -> ClosureResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> ClosureResult<()> {
        self.conn
            .execute_batch(include_str!("../../migrations/001_closure.sql"))?;
        Ok(())
    }
}

// ── Row types ────────────────────────────────────────────────────────────────

/// One `account_closure_request` row.
#[derive(Debug, Clone)]
pub struct ClosureRequestRow {
    pub id: RequestId,
    pub business_id: BusinessId,
    pub status: RequestStatus,
    pub reason: String,
    pub description: Option<String>,
    pub refund_amount: Option<Decimal>,
    pub digital_check_number: Option<String>,
    pub csp_agent_id: Option<AgentId>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub closed: Option<DateTime<Utc>>,
}

/// One `account_closure_state` row — immutable once written.
#[derive(Debug, Clone)]
pub struct ClosureStateRow {
    /// Assigned by SQLite on insert; None before.
    pub id: Option<i64>,
    pub request_id: RequestId,
    pub state: StateKind,
    /// The card or account a step applied to, when any.
    pub item_id: Option<String>,
    /// Exact decimal amount for balance-sweep events.
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

// ── Column codecs ────────────────────────────────────────────────────────────
// Timestamps are RFC3339 with fixed microsecond precision and a Z suffix, so
// lexicographic ORDER BY matches chronological order. Amounts are canonical
// decimal strings; SQLite's float SUM is never used on them.

pub(crate) fn ts_to_sql(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn ts_from_sql(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub(crate) fn opt_ts_from_sql(
    idx: usize,
    raw: Option<String>,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|s| ts_from_sql(idx, s)).transpose()
}

pub(crate) fn amount_to_sql(d: Option<Decimal>) -> Option<String> {
    d.map(|d| d.to_string())
}

pub(crate) fn amount_from_sql(idx: usize, raw: Option<String>) -> rusqlite::Result<Option<Decimal>> {
    raw.map(|s| {
        s.parse::<Decimal>().map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

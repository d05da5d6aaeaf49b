use super::{amount_from_sql, amount_to_sql, ts_from_sql, ts_to_sql, ClosureStateRow, ClosureStore};
use crate::error::ClosureResult;
use crate::types::StateKind;
use rusqlite::{params, Row};
use rust_decimal::Decimal;

// Append-only: this module exposes insert and ordered reads. There is no
// UPDATE or DELETE on account_closure_state anywhere in the crate.

fn row_to_state(r: &Row<'_>) -> rusqlite::Result<ClosureStateRow> {
    Ok(ClosureStateRow {
        id: Some(r.get(0)?),
        request_id: r.get(1)?,
        state: r.get(2)?,
        item_id: r.get(3)?,
        amount: amount_from_sql(4, r.get(4)?)?,
        description: r.get(5)?,
        created: ts_from_sql(6, r.get(6)?)?,
        modified: ts_from_sql(7, r.get(7)?)?,
    })
}

impl ClosureStore {
    pub fn append_state(&self, row: &ClosureStateRow) -> ClosureResult<i64> {
        self.conn.execute(
            "INSERT INTO account_closure_state (
                 account_closure_request_id, closure_state, item_id,
                 amount, description, created, modified
             ) VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![
                row.request_id,
                row.state,
                row.item_id,
                amount_to_sql(row.amount),
                row.description,
                ts_to_sql(row.created),
                ts_to_sql(row.modified),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// The audit view: all state rows for a request in the order they were
    /// written. Row id breaks same-timestamp ties so the order is total.
    pub fn states_for_request(&self, request_id: &str) -> ClosureResult<Vec<ClosureStateRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, account_closure_request_id, closure_state, item_id,
                    amount, description, created, modified
             FROM account_closure_state
             WHERE account_closure_request_id = ?1
             ORDER BY created ASC, id ASC",
        )?;
        let rows = stmt
            .query_map(params![request_id], row_to_state)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Idempotency probe: has this step already succeeded for this item?
    pub fn has_state(
        &self,
        request_id: &str,
        state: StateKind,
        item_id: Option<&str>,
    ) -> ClosureResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM account_closure_state
             WHERE account_closure_request_id = ?1
               AND closure_state = ?2
               AND (?3 IS NULL OR item_id = ?3)",
            params![request_id, state, item_id],
            |r| r.get(0),
        )?;
        Ok(count > 0)
    }

    /// Decimal-exact sum of all recorded balance sweeps for a request.
    /// Summed in Rust — SQLite's SUM would go through floating point.
    pub fn sum_swept(&self, request_id: &str) -> ClosureResult<Decimal> {
        let mut stmt = self.conn.prepare(
            "SELECT amount FROM account_closure_state
             WHERE account_closure_request_id = ?1
               AND closure_state = 'pull_balance_success'
               AND amount IS NOT NULL",
        )?;
        let amounts = stmt
            .query_map(params![request_id], |r| {
                amount_from_sql(0, r.get(0)?)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(amounts.into_iter().flatten().sum())
    }
}

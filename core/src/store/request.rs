use super::{amount_from_sql, amount_to_sql, opt_ts_from_sql, ts_from_sql, ts_to_sql, ClosureRequestRow, ClosureStore};
use crate::error::{ClosureError, ClosureResult};
use crate::types::{AgentId, BusinessId, RequestStatus};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use rust_decimal::Decimal;

/// Which slice of the request table a listing wants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatusBucket {
    /// pending | approved
    Active,
    /// account_closed | canceled | refund_pending
    Closed,
    Exact(RequestStatus),
    #[default]
    All,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Created,
    Modified,
    Status,
}

impl SortField {
    fn column(&self) -> &'static str {
        match self {
            SortField::Created => "created",
            SortField::Modified => "modified",
            SortField::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

/// Listing filter for the CSP-facing request view.
#[derive(Debug, Clone, Default)]
pub struct RequestFilter {
    pub bucket: StatusBucket,
    pub business_id: Option<BusinessId>,
    pub csp_agent_id: Option<AgentId>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub sort: SortField,
    pub direction: SortDirection,
    pub limit: Option<u32>,
    pub offset: u32,
}

const REQUEST_COLUMNS: &str = "id, business_id, status, reason, description, refund_amount,
        digital_check_number, csp_agent_id, created, modified, closed";

fn row_to_request(r: &Row<'_>) -> rusqlite::Result<ClosureRequestRow> {
    Ok(ClosureRequestRow {
        id: r.get(0)?,
        business_id: r.get(1)?,
        status: r.get(2)?,
        reason: r.get(3)?,
        description: r.get(4)?,
        refund_amount: amount_from_sql(5, r.get(5)?)?,
        digital_check_number: r.get(6)?,
        csp_agent_id: r.get(7)?,
        created: ts_from_sql(8, r.get(8)?)?,
        modified: ts_from_sql(9, r.get(9)?)?,
        closed: opt_ts_from_sql(10, r.get(10)?)?,
    })
}

impl ClosureStore {
    /// Insert a new request. The unique partial index on
    /// (business_id WHERE status IN ('pending','approved')) turns a
    /// concurrent duplicate into a constraint violation, reported here as
    /// `AlreadyInProgress` — there is no pre-insert lookup to race against.
    pub fn insert_request(&self, row: &ClosureRequestRow) -> ClosureResult<()> {
        let result = self.conn.execute(
            "INSERT INTO account_closure_request (
                 id, business_id, status, reason, description, refund_amount,
                 digital_check_number, csp_agent_id, created, modified, closed
             ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
            params![
                row.id,
                row.business_id,
                row.status,
                row.reason,
                row.description,
                amount_to_sql(row.refund_amount),
                row.digital_check_number,
                row.csp_agent_id,
                ts_to_sql(row.created),
                ts_to_sql(row.modified),
                row.closed.map(ts_to_sql),
            ],
        );
        match result {
            Ok(_) => Ok(()),
            // Only a hit on the active-request index is a duplicate; other
            // constraint failures (primary key, FK) stay database errors.
            Err(rusqlite::Error::SqliteFailure(e, msg))
                if e.code == rusqlite::ErrorCode::ConstraintViolation
                    && msg
                        .as_deref()
                        .is_some_and(|m| m.contains("idx_one_active_request_per_business")) =>
            {
                Err(ClosureError::AlreadyInProgress {
                    business_id: row.business_id.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_request(&self, id: &str) -> ClosureResult<Option<ClosureRequestRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM account_closure_request WHERE id = ?1"
        ))?;
        Ok(stmt.query_row(params![id], row_to_request).optional()?)
    }

    /// Requests the driver should pick up, oldest first.
    pub fn list_actionable(&self, limit: usize) -> ClosureResult<Vec<ClosureRequestRow>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM account_closure_request
             WHERE status IN ('approved', 'failed_retry')
             ORDER BY created ASC LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_request)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn list_requests(&self, filter: &RequestFilter) -> ClosureResult<Vec<ClosureRequestRow>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        match &filter.bucket {
            StatusBucket::Active => {
                clauses.push("status IN ('pending', 'approved')".into());
            }
            StatusBucket::Closed => {
                clauses.push("status IN ('account_closed', 'canceled', 'refund_pending')".into());
            }
            StatusBucket::Exact(status) => {
                values.push(Value::Text(status.as_str().to_string()));
                clauses.push(format!("status = ?{}", values.len()));
            }
            StatusBucket::All => {}
        }
        if let Some(business_id) = &filter.business_id {
            values.push(Value::Text(business_id.clone()));
            clauses.push(format!("business_id = ?{}", values.len()));
        }
        if let Some(agent_id) = &filter.csp_agent_id {
            values.push(Value::Text(agent_id.clone()));
            clauses.push(format!("csp_agent_id = ?{}", values.len()));
        }
        if let Some(after) = filter.created_after {
            values.push(Value::Text(ts_to_sql(after)));
            clauses.push(format!("created >= ?{}", values.len()));
        }
        if let Some(before) = filter.created_before {
            values.push(Value::Text(ts_to_sql(before)));
            clauses.push(format!("created < ?{}", values.len()));
        }

        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };
        let direction = match filter.direction {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        };
        let limit = filter.limit.map(i64::from).unwrap_or(-1);
        let sql = format!(
            "SELECT {REQUEST_COLUMNS} FROM account_closure_request{where_sql}
             ORDER BY {} {direction} LIMIT {limit} OFFSET {}",
            filter.sort.column(),
            filter.offset,
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(values), row_to_request)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Status transition issued by the request service. `agent_id` stamps the
    /// acting agent; `closed` is set only when moving to a closed-out status.
    pub fn update_request_status(
        &self,
        id: &str,
        status: RequestStatus,
        agent_id: Option<&str>,
        closed: Option<DateTime<Utc>>,
    ) -> ClosureResult<ClosureRequestRow> {
        let now = Utc::now();
        let affected = self.conn.execute(
            "UPDATE account_closure_request
             SET status = ?2,
                 csp_agent_id = COALESCE(?3, csp_agent_id),
                 closed = COALESCE(?4, closed),
                 modified = ?5
             WHERE id = ?1",
            params![id, status, agent_id, closed.map(ts_to_sql), ts_to_sql(now)],
        )?;
        if affected == 0 {
            return Err(ClosureError::NotFound {
                entity: "closure request",
                id: id.to_string(),
            });
        }
        self.get_request(id)?.ok_or(ClosureError::NotFound {
            entity: "closure request",
            id: id.to_string(),
        })
    }

    /// Persist a driver run's outcome: final status plus the exact refund
    /// total. Automated caller — no agent identity involved.
    pub fn record_processed(
        &self,
        id: &str,
        refund_amount: Decimal,
        status: RequestStatus,
        closed: Option<DateTime<Utc>>,
    ) -> ClosureResult<ClosureRequestRow> {
        let now = Utc::now();
        let affected = self.conn.execute(
            "UPDATE account_closure_request
             SET status = ?2,
                 refund_amount = ?3,
                 closed = COALESCE(?4, closed),
                 modified = ?5
             WHERE id = ?1",
            params![
                id,
                status,
                refund_amount.to_string(),
                closed.map(ts_to_sql),
                ts_to_sql(now)
            ],
        )?;
        if affected == 0 {
            return Err(ClosureError::NotFound {
                entity: "closure request",
                id: id.to_string(),
            });
        }
        self.get_request(id)?.ok_or(ClosureError::NotFound {
            entity: "closure request",
            id: id.to_string(),
        })
    }
}

//! Shared primitive types used across the closure engine.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closure-request row identifier.
pub type RequestId = String;

/// Business identifier, as issued by the business domain.
pub type BusinessId = String;

/// Bank-account identifier.
pub type AccountId = String;

/// Card identifier.
pub type CardId = String;

/// CSP (customer support platform) agent identifier.
pub type AgentId = String;

/// End-user identifier (business owner).
pub type UserId = String;

/// Lifecycle status of a closure request. Persisted as plain strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    AccountClosed,
    Canceled,
    RefundPending,
    Failed,
    FailedRetry,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::AccountClosed => "account_closed",
            RequestStatus::Canceled => "canceled",
            RequestStatus::RefundPending => "refund_pending",
            RequestStatus::Failed => "failed",
            RequestStatus::FailedRetry => "failed_retry",
        }
    }

    /// A request the business is still waiting on: blocks creation of another.
    pub fn is_active(&self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Approved)
    }

    /// Settled one way or the other; no further orchestration will happen.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::AccountClosed
                | RequestStatus::Canceled
                | RequestStatus::RefundPending
        )
    }

    /// Eligible for pickup by the orchestration driver.
    pub fn is_actionable(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::FailedRetry)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "account_closed" => Ok(RequestStatus::AccountClosed),
            "canceled" => Ok(RequestStatus::Canceled),
            "refund_pending" => Ok(RequestStatus::RefundPending),
            "failed" => Ok(RequestStatus::Failed),
            "failed_retry" => Ok(RequestStatus::FailedRetry),
            other => Err(format!("unknown request status: {other}")),
        }
    }
}

impl ToSql for RequestStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RequestStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

/// One entry kind in the append-only closure audit trail.
/// Persisted as plain strings. Variants are added per step — never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    // Request-level events, written by the request service.
    RequestCreated,
    RequestApproved,
    RequestCanceled,
    RetryRequested,

    // Step-level events, written by the orchestration driver.
    CancelCardStarted,
    CancelCardSuccess,
    CancelCardFailed,
    PullBalanceStarted,
    PullBalanceSuccess,
    PullBalanceFailed,
    DeactivateAccountStarted,
    DeactivateAccountSuccess,
    DeactivateAccountFailed,
    DeactivateBusinessStarted,
    DeactivateBusinessSuccess,
    DeactivateBusinessFailed,

    // Non-primary accounts are left open; the skip is still recorded.
    AccountSkipped,
    // Business or account listing failed before any step could run.
    BusinessLookupFailed,
}

impl StateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKind::RequestCreated => "request_created",
            StateKind::RequestApproved => "request_approved",
            StateKind::RequestCanceled => "request_canceled",
            StateKind::RetryRequested => "retry_requested",
            StateKind::CancelCardStarted => "cancel_card_started",
            StateKind::CancelCardSuccess => "cancel_card_success",
            StateKind::CancelCardFailed => "cancel_card_failed",
            StateKind::PullBalanceStarted => "pull_balance_started",
            StateKind::PullBalanceSuccess => "pull_balance_success",
            StateKind::PullBalanceFailed => "pull_balance_failed",
            StateKind::DeactivateAccountStarted => "deactivate_account_started",
            StateKind::DeactivateAccountSuccess => "deactivate_account_success",
            StateKind::DeactivateAccountFailed => "deactivate_account_failed",
            StateKind::DeactivateBusinessStarted => "deactivate_business_started",
            StateKind::DeactivateBusinessSuccess => "deactivate_business_success",
            StateKind::DeactivateBusinessFailed => "deactivate_business_failed",
            StateKind::AccountSkipped => "account_skipped",
            StateKind::BusinessLookupFailed => "business_lookup_failed",
        }
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "request_created" => Ok(StateKind::RequestCreated),
            "request_approved" => Ok(StateKind::RequestApproved),
            "request_canceled" => Ok(StateKind::RequestCanceled),
            "retry_requested" => Ok(StateKind::RetryRequested),
            "cancel_card_started" => Ok(StateKind::CancelCardStarted),
            "cancel_card_success" => Ok(StateKind::CancelCardSuccess),
            "cancel_card_failed" => Ok(StateKind::CancelCardFailed),
            "pull_balance_started" => Ok(StateKind::PullBalanceStarted),
            "pull_balance_success" => Ok(StateKind::PullBalanceSuccess),
            "pull_balance_failed" => Ok(StateKind::PullBalanceFailed),
            "deactivate_account_started" => Ok(StateKind::DeactivateAccountStarted),
            "deactivate_account_success" => Ok(StateKind::DeactivateAccountSuccess),
            "deactivate_account_failed" => Ok(StateKind::DeactivateAccountFailed),
            "deactivate_business_started" => Ok(StateKind::DeactivateBusinessStarted),
            "deactivate_business_success" => Ok(StateKind::DeactivateBusinessSuccess),
            "deactivate_business_failed" => Ok(StateKind::DeactivateBusinessFailed),
            "account_skipped" => Ok(StateKind::AccountSkipped),
            "business_lookup_failed" => Ok(StateKind::BusinessLookupFailed),
            other => Err(format!("unknown closure state: {other}")),
        }
    }
}

impl ToSql for StateKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for StateKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

//! Closure-request service — the CRUD and status-transition API consumed by
//! the internal support (CSP) UI and by the orchestration driver.
//!
//! Balances shown in listings are fetched live from the accounts
//! collaborator and never persisted; the stored row only ever carries the
//! final refund amount computed by a driver run.

use crate::collaborators::{AccountService, AgentDirectory, CollaboratorError};
use crate::error::{ClosureError, ClosureResult};
use crate::store::{ClosureRequestRow, ClosureStateRow, ClosureStore, RequestFilter};
use crate::types::{RequestStatus, StateKind};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// A request row enriched for the support UI: live balances and the acting
/// agent's display name.
#[derive(Debug, Clone)]
pub struct RequestDetails {
    pub request: ClosureRequestRow,
    pub available_balance: Decimal,
    pub posted_balance: Decimal,
    pub agent_name: Option<String>,
}

pub struct ClosureRequestService {
    pub store: ClosureStore,
    accounts: Arc<dyn AccountService>,
    agents: Arc<dyn AgentDirectory>,
}

impl ClosureRequestService {
    pub fn new(
        store: ClosureStore,
        accounts: Arc<dyn AccountService>,
        agents: Arc<dyn AgentDirectory>,
    ) -> Self {
        Self {
            store,
            accounts,
            agents,
        }
    }

    /// Open a new closure request for a business. Fails with
    /// `AlreadyInProgress` if a pending/approved request already exists —
    /// enforced by the store's unique partial index, not a lookup.
    pub fn create_request(
        &self,
        business_id: &str,
        reason: &str,
        description: Option<&str>,
        agent_id: &str,
    ) -> ClosureResult<ClosureRequestRow> {
        let now = Utc::now();
        let row = ClosureRequestRow {
            id: Uuid::new_v4().to_string(),
            business_id: business_id.to_string(),
            status: RequestStatus::Pending,
            reason: reason.to_string(),
            description: description.map(str::to_string),
            refund_amount: None,
            digital_check_number: None,
            csp_agent_id: Some(agent_id.to_string()),
            created: now,
            modified: now,
            closed: None,
        };
        self.store.insert_request(&row)?;
        self.append_state(
            &row.id,
            StateKind::RequestCreated,
            None,
            None,
            Some(format!("created by agent {agent_id}: {reason}")),
        )?;
        log::info!(
            "closure: request {} created for business {business_id} (reason: {reason})",
            row.id,
        );
        Ok(row)
    }

    /// List requests for the support UI, enriched with live balances and
    /// resolved agent names.
    pub fn list_requests(&self, filter: &RequestFilter) -> ClosureResult<Vec<RequestDetails>> {
        let rows = self.store.list_requests(filter)?;
        rows.into_iter().map(|row| self.enrich(row)).collect()
    }

    pub fn get_request_details(&self, id: &str) -> ClosureResult<RequestDetails> {
        let row = self.store.get_request(id)?.ok_or(ClosureError::NotFound {
            entity: "closure request",
            id: id.to_string(),
        })?;
        self.enrich(row)
    }

    /// Human-driven status transition. The acting agent must resolve to a
    /// known identity; the transition is recorded as a request-level state
    /// event where one is defined for the target status.
    pub fn update_status(
        &self,
        id: &str,
        new_status: RequestStatus,
        agent_id: &str,
    ) -> ClosureResult<ClosureRequestRow> {
        let current = self.store.get_request(id)?.ok_or(ClosureError::NotFound {
            entity: "closure request",
            id: id.to_string(),
        })?;

        let agent = self.agents.resolve_agent(agent_id).map_err(|e| match e {
            CollaboratorError::NotFound { .. } => ClosureError::NotFound {
                entity: "csp agent",
                id: agent_id.to_string(),
            },
            other => ClosureError::Collaborator(other),
        })?;

        let event = match (current.status, new_status) {
            (RequestStatus::Pending, RequestStatus::Approved) => Some(StateKind::RequestApproved),
            (RequestStatus::Pending, RequestStatus::Canceled) => Some(StateKind::RequestCanceled),
            (RequestStatus::Failed, RequestStatus::FailedRetry) => Some(StateKind::RetryRequested),
            // Manual close-out after operator remediation of a failed run.
            (RequestStatus::Failed, RequestStatus::AccountClosed)
            | (RequestStatus::Failed, RequestStatus::RefundPending) => None,
            (from, to) => {
                return Err(ClosureError::InvalidTransition { from, to });
            }
        };

        let closed = matches!(
            new_status,
            RequestStatus::AccountClosed | RequestStatus::RefundPending
        )
        .then(Utc::now);

        let updated = self
            .store
            .update_request_status(id, new_status, Some(agent_id), closed)?;
        if let Some(kind) = event {
            self.append_state(
                id,
                kind,
                None,
                None,
                Some(format!("status set to {new_status} by {}", agent.display_name)),
            )?;
        }
        log::info!(
            "closure: request {id} {} -> {new_status} (agent {})",
            current.status,
            agent.id,
        );
        Ok(updated)
    }

    /// Persist a driver run's outcome. Automated caller — no agent identity
    /// is required or recorded.
    pub fn record_processed(
        &self,
        id: &str,
        total_refund: Decimal,
        status: RequestStatus,
    ) -> ClosureResult<ClosureRequestRow> {
        let closed = matches!(
            status,
            RequestStatus::AccountClosed | RequestStatus::RefundPending
        )
        .then(Utc::now);
        let updated = self.store.record_processed(id, total_refund, status, closed)?;
        log::info!("closure: request {id} processed, refund {total_refund}, status {status}");
        Ok(updated)
    }

    /// The audit view: every state row for a request, oldest first.
    pub fn list_states(&self, request_id: &str) -> ClosureResult<Vec<ClosureStateRow>> {
        self.store.states_for_request(request_id)
    }

    /// Append one audit event. Used by this service for request-level events
    /// and by the orchestration driver for step-level events.
    pub fn append_state(
        &self,
        request_id: &str,
        state: StateKind,
        item_id: Option<&str>,
        amount: Option<Decimal>,
        description: Option<String>,
    ) -> ClosureResult<()> {
        let now = Utc::now();
        self.store.append_state(&ClosureStateRow {
            id: None,
            request_id: request_id.to_string(),
            state,
            item_id: item_id.map(str::to_string),
            amount,
            description,
            created: now,
            modified: now,
        })?;
        Ok(())
    }

    fn enrich(&self, row: ClosureRequestRow) -> ClosureResult<RequestDetails> {
        let mut available = Decimal::ZERO;
        let mut posted = Decimal::ZERO;
        for account in self.accounts.accounts_for_business(&row.business_id)? {
            let balance = self.accounts.balance(&account.id)?;
            available += balance.available;
            posted += balance.posted;
        }

        // A stale or departed agent must not break the listing.
        let agent_name = match &row.csp_agent_id {
            Some(agent_id) => match self.agents.resolve_agent(agent_id) {
                Ok(agent) => Some(agent.display_name),
                Err(e) => {
                    log::warn!("closure: agent {agent_id} unresolvable: {e}");
                    None
                }
            },
            None => None,
        };

        Ok(RequestDetails {
            request: row,
            available_balance: available,
            posted_balance: posted,
            agent_name,
        })
    }
}

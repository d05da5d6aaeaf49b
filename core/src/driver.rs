//! The orchestration driver — the saga that winds down a business's banking
//! relationship.
//!
//! EXECUTION ORDER per business (fixed, documented, never reordered):
//!   1. cancel cards          (per primary account)
//!   2. pull balance          (sweep remaining funds to the refund account)
//!   3. deactivate account
//!   4. deactivate business   (after every primary account succeeded)
//!   5. finalize the request from the reconciled sweep total
//!
//! RULES:
//!   - Every `*_started` state is written before its mutating call; every
//!     `*_success`/`*_failed` after. A crash mid-step still leaves the log
//!     reflecting the true last-known state.
//!   - A step failure abandons the business, not the batch: the request is
//!     marked `failed` for manual review and the driver moves on.
//!   - There is no rollback. Partner-bank actions are irreversible; the
//!     append-only log is the artifact human compensation works from.
//!   - Steps are idempotency-checked on entry, so a `failed_retry` pass can
//!     re-run the pipeline without re-canceling cards or double-sweeping.

use crate::collaborators::{
    AccountService, AccountUsage, BalanceSweep, BankAccount, BusinessProfile, BusinessService,
    CardService, CardStatus, CollaboratorError, NewLinkedAccount,
};
use crate::config::ClosureConfig;
use crate::error::{ClosureError, ClosureResult};
use crate::request_service::ClosureRequestService;
use crate::store::ClosureRequestRow;
use crate::types::{RequestStatus, StateKind};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Reason code passed to account deactivation.
const DEACTIVATION_REASON: &str = "customer request";

/// How a single step left the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step performed its mutation on this pass.
    Completed,
    /// The step found its work already done (earlier pass, or nothing to do)
    /// and touched nothing.
    AlreadySatisfied,
}

/// Internal step error. `Abandon` means the failure is already recorded in
/// the state log and processing of this business must stop; `Store` means
/// the log itself could not be written.
enum StepError {
    Abandon,
    Store(ClosureError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BatchSummary {
    pub discovered: usize,
    pub closed: usize,
    pub refund_pending: usize,
    pub failed: usize,
    pub errored: usize,
}

pub struct OrchestrationDriver {
    config: ClosureConfig,
    pub service: ClosureRequestService,
    accounts: Arc<dyn AccountService>,
    cards: Arc<dyn CardService>,
    sweep: Arc<dyn BalanceSweep>,
    businesses: Arc<dyn BusinessService>,
}

impl OrchestrationDriver {
    pub fn new(
        config: ClosureConfig,
        service: ClosureRequestService,
        accounts: Arc<dyn AccountService>,
        cards: Arc<dyn CardService>,
        sweep: Arc<dyn BalanceSweep>,
        businesses: Arc<dyn BusinessService>,
    ) -> Self {
        Self {
            config,
            service,
            accounts,
            cards,
            sweep,
            businesses,
        }
    }

    /// One scheduled batch run: discover approved/failed_retry requests and
    /// drive each through the saga, strictly sequentially.
    pub fn run_batch(&self) -> ClosureResult<BatchSummary> {
        let batch = self.service.store.list_actionable(self.config.batch_limit)?;
        log::info!("closure: batch started, {} actionable request(s)", batch.len());

        let mut summary = BatchSummary {
            discovered: batch.len(),
            ..Default::default()
        };
        for req in &batch {
            match self.process_request(req) {
                Ok(RequestStatus::AccountClosed) => summary.closed += 1,
                Ok(RequestStatus::RefundPending) => summary.refund_pending += 1,
                Ok(RequestStatus::Failed) => summary.failed += 1,
                Ok(other) => {
                    log::warn!("closure: request {} finished in {other}", req.id);
                }
                Err(e) => {
                    // Failure isolation: one broken request never stalls the batch.
                    log::error!("closure: request {} aborted: {e}", req.id);
                    summary.errored += 1;
                }
            }
        }

        log::info!(
            "closure: batch done ({} closed, {} refund_pending, {} failed, {} errored)",
            summary.closed,
            summary.refund_pending,
            summary.failed,
            summary.errored,
        );
        Ok(summary)
    }

    /// Drive one request to a terminal status. Returns the status the
    /// request was left in.
    fn process_request(&self, req: &ClosureRequestRow) -> ClosureResult<RequestStatus> {
        log::info!(
            "closure: processing request {} (business {}, status {})",
            req.id,
            req.business_id,
            req.status,
        );

        let business = match self.businesses.find_business(&req.business_id) {
            Ok(b) => b,
            Err(e) => {
                return self.abandon(req, StateKind::BusinessLookupFailed, Some(&req.business_id), e)
            }
        };
        let accounts = match self.accounts.accounts_for_business(&business.id) {
            Ok(a) => a,
            Err(e) => {
                return self.abandon(req, StateKind::BusinessLookupFailed, Some(&business.id), e)
            }
        };

        for account in &accounts {
            if account.usage != AccountUsage::Primary {
                self.service.append_state(
                    &req.id,
                    StateKind::AccountSkipped,
                    Some(&account.id),
                    None,
                    Some("non-primary account left open".to_string()),
                )?;
                continue;
            }
            match self.wind_down_account(req, &business, account) {
                Ok(()) => {}
                Err(StepError::Abandon) => return self.mark_failed(req),
                Err(StepError::Store(e)) => return Err(e),
            }
        }

        match self.deactivate_business(req, &business) {
            Ok(_) => {}
            Err(StepError::Abandon) => return self.mark_failed(req),
            Err(StepError::Store(e)) => return Err(e),
        }

        // Final reconciliation: the refund total is the decimal-exact sum of
        // every sweep recorded in the log — including sweeps from an earlier
        // pass whose transfer this pass skipped.
        let total = self.service.store.sum_swept(&req.id)?;
        let status = if total.is_zero() {
            RequestStatus::AccountClosed
        } else {
            RequestStatus::RefundPending
        };
        self.service.record_processed(&req.id, total, status)?;
        Ok(status)
    }

    /// Per-account pipeline. Any step failure has already been logged when
    /// this returns `StepError::Abandon`.
    fn wind_down_account(
        &self,
        req: &ClosureRequestRow,
        business: &BusinessProfile,
        account: &BankAccount,
    ) -> Result<(), StepError> {
        self.cancel_cards(req, account)?;
        self.pull_balance(req, business, account)?;
        self.deactivate_account(req, account)?;
        Ok(())
    }

    fn cancel_cards(&self, req: &ClosureRequestRow, account: &BankAccount) -> Result<(), StepError> {
        let cards = self
            .cards
            .cards_for_account(&account.id)
            .map_err(|e| self.log_failure(req, StateKind::CancelCardFailed, Some(&account.id), e))?;

        for card in &cards {
            if card.status == CardStatus::Canceled {
                // Canceled on an earlier pass or by the customer.
                log::debug!("closure: request {} card {} already canceled", req.id, card.id);
                continue;
            }
            self.append(req, StateKind::CancelCardStarted, Some(&card.id), None, None)?;
            match self.cards.cancel_card(&card.id) {
                Ok(status) => self.append(
                    req,
                    StateKind::CancelCardSuccess,
                    Some(&card.id),
                    None,
                    Some(format!("card status: {}", status.as_str())),
                )?,
                Err(e) => {
                    return Err(self.log_failure(req, StateKind::CancelCardFailed, Some(&card.id), e))
                }
            }
        }
        Ok(())
    }

    fn pull_balance(
        &self,
        req: &ClosureRequestRow,
        business: &BusinessProfile,
        account: &BankAccount,
    ) -> Result<StepOutcome, StepError> {
        // Retry pass: a sweep recorded for this account already moved the
        // funds, and its amount still counts toward the final refund.
        if self
            .service
            .store
            .has_state(&req.id, StateKind::PullBalanceSuccess, Some(&account.id))
            .map_err(StepError::Store)?
        {
            log::info!(
                "closure: request {} account {} already swept, skipping transfer",
                req.id,
                account.id,
            );
            return Ok(StepOutcome::AlreadySatisfied);
        }

        // Live fetch — balances move asynchronously while cards settle.
        let balance = self
            .accounts
            .balance(&account.id)
            .map_err(|e| self.log_failure(req, StateKind::PullBalanceFailed, Some(&account.id), e))?;
        if balance.available <= Decimal::ZERO {
            // Nothing to move; the transfer sub-step is skipped outright.
            return Ok(StepOutcome::AlreadySatisfied);
        }

        self.append(
            req,
            StateKind::PullBalanceStarted,
            Some(&account.id),
            Some(balance.available),
            None,
        )?;

        let found = self
            .sweep
            .find_linked_account(
                &self.config.clearing_business_id,
                &account.account_number,
                &account.routing_number,
            )
            .map_err(|e| self.log_failure(req, StateKind::PullBalanceFailed, Some(&account.id), e))?;
        let linked = match found {
            Some(linked) => linked,
            None => self
                .sweep
                .create_linked_account(&NewLinkedAccount {
                    clearing_business_id: self.config.clearing_business_id.clone(),
                    clearing_user_id: self.config.clearing_user_id.clone(),
                    account_number: account.account_number.clone(),
                    routing_number: account.routing_number.clone(),
                    holder_name: business.legal_name.clone(),
                })
                .map_err(|e| {
                    self.log_failure(req, StateKind::PullBalanceFailed, Some(&account.id), e)
                })?,
        };

        match self
            .sweep
            .transfer(&linked.id, &self.config.refund_account_id, balance.available)
        {
            Ok(receipt) => {
                self.append(
                    req,
                    StateKind::PullBalanceSuccess,
                    Some(&account.id),
                    Some(receipt.amount),
                    Some(format!("transfer {}", receipt.transfer_id)),
                )?;
                Ok(StepOutcome::Completed)
            }
            Err(e) => {
                Err(self.log_failure(req, StateKind::PullBalanceFailed, Some(&account.id), e))
            }
        }
    }

    fn deactivate_account(
        &self,
        req: &ClosureRequestRow,
        account: &BankAccount,
    ) -> Result<StepOutcome, StepError> {
        if !account.active {
            // Deactivated on an earlier pass.
            return Ok(StepOutcome::AlreadySatisfied);
        }
        self.append(req, StateKind::DeactivateAccountStarted, Some(&account.id), None, None)?;
        match self.accounts.deactivate_account(&account.id, DEACTIVATION_REASON) {
            Ok(()) => {
                self.append(
                    req,
                    StateKind::DeactivateAccountSuccess,
                    Some(&account.id),
                    None,
                    None,
                )?;
                Ok(StepOutcome::Completed)
            }
            Err(e) => Err(self.log_failure(
                req,
                StateKind::DeactivateAccountFailed,
                Some(&account.id),
                e,
            )),
        }
    }

    fn deactivate_business(
        &self,
        req: &ClosureRequestRow,
        business: &BusinessProfile,
    ) -> Result<StepOutcome, StepError> {
        if self
            .service
            .store
            .has_state(&req.id, StateKind::DeactivateBusinessSuccess, Some(&business.id))
            .map_err(StepError::Store)?
        {
            return Ok(StepOutcome::AlreadySatisfied);
        }
        self.append(req, StateKind::DeactivateBusinessStarted, Some(&business.id), None, None)?;
        // Acting as the business owner: downstream audit attributes the
        // deactivation to the account holder, not a CSP agent.
        match self
            .businesses
            .deactivate_business(&business.id, &business.owner_user_id)
        {
            Ok(()) => {
                self.append(
                    req,
                    StateKind::DeactivateBusinessSuccess,
                    Some(&business.id),
                    None,
                    None,
                )?;
                Ok(StepOutcome::Completed)
            }
            Err(e) => Err(self.log_failure(
                req,
                StateKind::DeactivateBusinessFailed,
                Some(&business.id),
                e,
            )),
        }
    }

    // ── Failure plumbing ─────────────────────────────────────────────────

    /// Record a collaborator failure in the state log and signal abandon.
    fn log_failure(
        &self,
        req: &ClosureRequestRow,
        kind: StateKind,
        item_id: Option<&str>,
        err: CollaboratorError,
    ) -> StepError {
        log::warn!(
            "closure: request {} {kind} item={}: {err}",
            req.id,
            item_id.unwrap_or("-"),
        );
        match self
            .service
            .append_state(&req.id, kind, item_id, None, Some(err.to_string()))
        {
            Ok(()) => StepError::Abandon,
            Err(e) => StepError::Store(e),
        }
    }

    /// Pre-pipeline failure: log it, mark the request failed, move on.
    fn abandon(
        &self,
        req: &ClosureRequestRow,
        kind: StateKind,
        item_id: Option<&str>,
        err: CollaboratorError,
    ) -> ClosureResult<RequestStatus> {
        match self.log_failure(req, kind, item_id, err) {
            StepError::Abandon => self.mark_failed(req),
            StepError::Store(e) => Err(e),
        }
    }

    /// Leave the request in `failed` for manual review, keeping whatever
    /// refund total has been swept so far on the row for diagnosis.
    fn mark_failed(&self, req: &ClosureRequestRow) -> ClosureResult<RequestStatus> {
        let total = self.service.store.sum_swept(&req.id)?;
        self.service
            .record_processed(&req.id, total, RequestStatus::Failed)?;
        log::warn!("closure: request {} failed, left for manual review", req.id);
        Ok(RequestStatus::Failed)
    }

    fn append(
        &self,
        req: &ClosureRequestRow,
        kind: StateKind,
        item_id: Option<&str>,
        amount: Option<Decimal>,
        description: Option<String>,
    ) -> Result<(), StepError> {
        self.service
            .append_state(&req.id, kind, item_id, amount, description)
            .map_err(StepError::Store)
    }
}

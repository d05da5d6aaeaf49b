//! External banking collaborators, as traits.
//!
//! RULE: The driver and service never talk to partner rails directly.
//! Every outside system — accounts, cards, transfers, businesses, agents —
//! is reached through one of these traits, so the saga can be exercised
//! against fakes and partner failures stay typed.

use crate::types::{AccountId, AgentId, BusinessId, CardId, UserId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure of an external call. `NotFound` is a distinct variant so callers
/// can branch on it without matching error text.
#[derive(Error, Debug)]
pub enum CollaboratorError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("{service} call failed: {detail}")]
    Unavailable {
        service: &'static str,
        detail: String,
    },
}

pub type CollabResult<T> = Result<T, CollaboratorError>;

/// How a bank account is used by the business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountUsage {
    /// The business's operating account — the closure saga winds these down.
    Primary,
    /// Contact/secondary accounts; left untouched by closure.
    Contact,
}

#[derive(Debug, Clone)]
pub struct BankAccount {
    pub id: AccountId,
    pub business_id: BusinessId,
    pub account_number: String,
    pub routing_number: String,
    pub usage: AccountUsage,
    pub active: bool,
}

/// Live balance snapshot. Always re-fetched, never cached by the saga.
#[derive(Debug, Clone, Copy, Default)]
pub struct Balance {
    pub available: Decimal,
    pub posted: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Active,
    Suspended,
    Canceled,
}

impl CardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardStatus::Active => "active",
            CardStatus::Suspended => "suspended",
            CardStatus::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Card {
    pub id: CardId,
    pub account_id: AccountId,
    pub status: CardStatus,
}

/// An internal counterpart of an external (account, routing) pair, held
/// under the fixed clearing business so funds can be pulled from it.
#[derive(Debug, Clone)]
pub struct LinkedAccount {
    pub id: String,
    pub account_number: String,
    pub routing_number: String,
    pub holder_name: String,
}

#[derive(Debug, Clone)]
pub struct NewLinkedAccount {
    pub clearing_business_id: BusinessId,
    pub clearing_user_id: UserId,
    pub account_number: String,
    pub routing_number: String,
    /// The business's legal name, used as the account-holder label.
    pub holder_name: String,
}

#[derive(Debug, Clone)]
pub struct TransferReceipt {
    pub transfer_id: String,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct BusinessProfile {
    pub id: BusinessId,
    pub legal_name: String,
    pub owner_user_id: UserId,
}

#[derive(Debug, Clone)]
pub struct AgentProfile {
    pub id: AgentId,
    pub display_name: String,
}

/// Account lookup, live balances, and deactivation.
pub trait AccountService: Send + Sync {
    fn accounts_for_business(&self, business_id: &str) -> CollabResult<Vec<BankAccount>>;

    /// Live fetch; balances move asynchronously, so callers must not reuse
    /// a value fetched before a mutating step.
    fn balance(&self, account_id: &str) -> CollabResult<Balance>;

    /// Must tolerate repeat calls on an already-inactive account.
    fn deactivate_account(&self, account_id: &str, reason: &str) -> CollabResult<()>;
}

/// Card listing and cancellation.
pub trait CardService: Send + Sync {
    fn cards_for_account(&self, account_id: &str) -> CollabResult<Vec<Card>>;

    /// Returns the card's resulting status. Must tolerate repeat
    /// cancellation of an already-canceled card.
    fn cancel_card(&self, card_id: &str) -> CollabResult<CardStatus>;
}

/// Linked-account lookup/creation and inter-account transfer — the sweep of
/// remaining funds into the internal refund-clearing account.
pub trait BalanceSweep: Send + Sync {
    /// Lookup keyed by (account number, routing number) under the clearing
    /// business. `None` means no linked account exists yet.
    fn find_linked_account(
        &self,
        clearing_business_id: &str,
        account_number: &str,
        routing_number: &str,
    ) -> CollabResult<Option<LinkedAccount>>;

    fn create_linked_account(&self, req: &NewLinkedAccount) -> CollabResult<LinkedAccount>;

    fn transfer(
        &self,
        from_linked_account_id: &str,
        to_account_id: &str,
        amount: Decimal,
    ) -> CollabResult<TransferReceipt>;
}

/// Business lookup and deactivation.
pub trait BusinessService: Send + Sync {
    fn find_business(&self, business_id: &str) -> CollabResult<BusinessProfile>;

    /// `acting_user_id` is the business owner — downstream audit attributes
    /// the deactivation to the account holder, not to a CSP agent.
    fn deactivate_business(&self, business_id: &str, acting_user_id: &str) -> CollabResult<()>;
}

/// CSP agent identity resolution.
pub trait AgentDirectory: Send + Sync {
    fn resolve_agent(&self, agent_id: &str) -> CollabResult<AgentProfile>;
}

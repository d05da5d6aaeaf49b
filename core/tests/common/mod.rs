//! Shared test fakes: a scriptable in-memory bank implementing every
//! collaborator trait, with per-item failure injection and call recording.
#![allow(dead_code)]

use closure_core::collaborators::{
    AccountService, AccountUsage, AgentDirectory, AgentProfile, Balance, BalanceSweep, BankAccount,
    BusinessProfile, BusinessService, Card, CardService, CardStatus, CollabResult,
    CollaboratorError, LinkedAccount, NewLinkedAccount, TransferReceipt,
};
use closure_core::config::ClosureConfig;
use closure_core::driver::OrchestrationDriver;
use closure_core::error::ClosureResult;
use closure_core::request_service::ClosureRequestService;
use closure_core::store::ClosureStore;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const CLEARING_BUSINESS: &str = "biz-clearing";
pub const CLEARING_USER: &str = "user-clearing";
pub const REFUND_ACCOUNT: &str = "acct-refund";
pub const ROUTING: &str = "021000021";

pub fn test_config() -> ClosureConfig {
    ClosureConfig {
        clearing_business_id: CLEARING_BUSINESS.to_string(),
        clearing_user_id: CLEARING_USER.to_string(),
        refund_account_id: REFUND_ACCOUNT.to_string(),
        batch_limit: 50,
    }
}

/// Build a driver over an in-memory store wired entirely to `bank`.
pub fn build_driver(bank: &Arc<FakeBank>) -> ClosureResult<OrchestrationDriver> {
    let store = ClosureStore::in_memory()?;
    store.migrate()?;
    let service = ClosureRequestService::new(store, bank.clone(), bank.clone());
    Ok(OrchestrationDriver::new(
        test_config(),
        service,
        bank.clone(),
        bank.clone(),
        bank.clone(),
        bank.clone(),
    ))
}

#[derive(Default)]
struct BankState {
    businesses: HashMap<String, BusinessProfile>,
    accounts: Vec<BankAccount>,
    balances: HashMap<String, Balance>,
    cards: Vec<Card>,
    linked: Vec<LinkedAccount>,
    agents: HashMap<String, AgentProfile>,

    transfers: Vec<(String, String, Decimal)>,
    business_deactivations: Vec<(String, String)>,

    fail_cancel_cards: HashSet<String>,
    fail_balance_accounts: HashSet<String>,
    fail_deactivate_accounts: HashSet<String>,
    fail_transfers: bool,
    fail_business_deactivation: bool,
}

#[derive(Default)]
pub struct FakeBank {
    state: Mutex<BankState>,
}

impl FakeBank {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // ── Seeding ──────────────────────────────────────────────────────────

    pub fn add_business(&self, id: &str, legal_name: &str, owner_user_id: &str) {
        self.state.lock().unwrap().businesses.insert(
            id.to_string(),
            BusinessProfile {
                id: id.to_string(),
                legal_name: legal_name.to_string(),
                owner_user_id: owner_user_id.to_string(),
            },
        );
    }

    pub fn add_account(&self, id: &str, business_id: &str, usage: AccountUsage, available: Decimal) {
        let mut state = self.state.lock().unwrap();
        state.accounts.push(BankAccount {
            id: id.to_string(),
            business_id: business_id.to_string(),
            account_number: format!("num-{id}"),
            routing_number: ROUTING.to_string(),
            usage,
            active: true,
        });
        state.balances.insert(
            id.to_string(),
            Balance {
                available,
                posted: available,
            },
        );
    }

    pub fn add_card(&self, id: &str, account_id: &str, status: CardStatus) {
        self.state.lock().unwrap().cards.push(Card {
            id: id.to_string(),
            account_id: account_id.to_string(),
            status,
        });
    }

    pub fn add_agent(&self, id: &str, display_name: &str) {
        self.state.lock().unwrap().agents.insert(
            id.to_string(),
            AgentProfile {
                id: id.to_string(),
                display_name: display_name.to_string(),
            },
        );
    }

    pub fn add_linked_account(&self, account_number: &str) -> String {
        let mut state = self.state.lock().unwrap();
        let id = format!("linked-{}", state.linked.len() + 1);
        state.linked.push(LinkedAccount {
            id: id.clone(),
            account_number: account_number.to_string(),
            routing_number: ROUTING.to_string(),
            holder_name: "pre-existing".to_string(),
        });
        id
    }

    pub fn set_balance(&self, account_id: &str, available: Decimal) {
        self.state.lock().unwrap().balances.insert(
            account_id.to_string(),
            Balance {
                available,
                posted: available,
            },
        );
    }

    // ── Failure injection ────────────────────────────────────────────────

    pub fn fail_cancel_card(&self, card_id: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_cancel_cards
            .insert(card_id.to_string());
    }

    pub fn clear_cancel_card_failure(&self, card_id: &str) {
        self.state.lock().unwrap().fail_cancel_cards.remove(card_id);
    }

    pub fn fail_balance(&self, account_id: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_balance_accounts
            .insert(account_id.to_string());
    }

    pub fn fail_deactivate_account(&self, account_id: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_deactivate_accounts
            .insert(account_id.to_string());
    }

    pub fn clear_deactivate_account_failure(&self, account_id: &str) {
        self.state
            .lock()
            .unwrap()
            .fail_deactivate_accounts
            .remove(account_id);
    }

    pub fn fail_transfers(&self) {
        self.state.lock().unwrap().fail_transfers = true;
    }

    pub fn fail_business_deactivation(&self) {
        self.state.lock().unwrap().fail_business_deactivation = true;
    }

    // ── Inspection ───────────────────────────────────────────────────────

    pub fn transfer_count(&self) -> usize {
        self.state.lock().unwrap().transfers.len()
    }

    pub fn transfers(&self) -> Vec<(String, String, Decimal)> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn card_status(&self, card_id: &str) -> Option<CardStatus> {
        self.state
            .lock()
            .unwrap()
            .cards
            .iter()
            .find(|c| c.id == card_id)
            .map(|c| c.status)
    }

    pub fn account_active(&self, account_id: &str) -> Option<bool> {
        self.state
            .lock()
            .unwrap()
            .accounts
            .iter()
            .find(|a| a.id == account_id)
            .map(|a| a.active)
    }

    pub fn business_deactivations(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().business_deactivations.clone()
    }

    pub fn linked_account_count(&self) -> usize {
        self.state.lock().unwrap().linked.len()
    }
}

impl AccountService for FakeBank {
    fn accounts_for_business(&self, business_id: &str) -> CollabResult<Vec<BankAccount>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .accounts
            .iter()
            .filter(|a| a.business_id == business_id)
            .cloned()
            .collect())
    }

    fn balance(&self, account_id: &str) -> CollabResult<Balance> {
        let state = self.state.lock().unwrap();
        if state.fail_balance_accounts.contains(account_id) {
            return Err(CollaboratorError::Unavailable {
                service: "accounts",
                detail: format!("balance fetch timed out for {account_id}"),
            });
        }
        state
            .balances
            .get(account_id)
            .copied()
            .ok_or_else(|| CollaboratorError::NotFound {
                entity: "account",
                id: account_id.to_string(),
            })
    }

    fn deactivate_account(&self, account_id: &str, _reason: &str) -> CollabResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_deactivate_accounts.contains(account_id) {
            return Err(CollaboratorError::Unavailable {
                service: "accounts",
                detail: format!("deactivation rejected for {account_id}"),
            });
        }
        for account in &mut state.accounts {
            if account.id == account_id {
                account.active = false;
                return Ok(());
            }
        }
        Err(CollaboratorError::NotFound {
            entity: "account",
            id: account_id.to_string(),
        })
    }
}

impl CardService for FakeBank {
    fn cards_for_account(&self, account_id: &str) -> CollabResult<Vec<Card>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .cards
            .iter()
            .filter(|c| c.account_id == account_id)
            .cloned()
            .collect())
    }

    fn cancel_card(&self, card_id: &str) -> CollabResult<CardStatus> {
        let mut state = self.state.lock().unwrap();
        if state.fail_cancel_cards.contains(card_id) {
            return Err(CollaboratorError::Unavailable {
                service: "cards",
                detail: format!("issuer declined cancellation of {card_id}"),
            });
        }
        for card in &mut state.cards {
            if card.id == card_id {
                card.status = CardStatus::Canceled;
                return Ok(CardStatus::Canceled);
            }
        }
        Err(CollaboratorError::NotFound {
            entity: "card",
            id: card_id.to_string(),
        })
    }
}

impl BalanceSweep for FakeBank {
    fn find_linked_account(
        &self,
        _clearing_business_id: &str,
        account_number: &str,
        routing_number: &str,
    ) -> CollabResult<Option<LinkedAccount>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .linked
            .iter()
            .find(|l| l.account_number == account_number && l.routing_number == routing_number)
            .cloned())
    }

    fn create_linked_account(&self, req: &NewLinkedAccount) -> CollabResult<LinkedAccount> {
        let mut state = self.state.lock().unwrap();
        let linked = LinkedAccount {
            id: format!("linked-{}", state.linked.len() + 1),
            account_number: req.account_number.clone(),
            routing_number: req.routing_number.clone(),
            holder_name: req.holder_name.clone(),
        };
        state.linked.push(linked.clone());
        Ok(linked)
    }

    fn transfer(
        &self,
        from_linked_account_id: &str,
        to_account_id: &str,
        amount: Decimal,
    ) -> CollabResult<TransferReceipt> {
        let mut state = self.state.lock().unwrap();
        if state.fail_transfers {
            return Err(CollaboratorError::Unavailable {
                service: "transfers",
                detail: "transfer rail unavailable".to_string(),
            });
        }
        let account_number = state
            .linked
            .iter()
            .find(|l| l.id == from_linked_account_id)
            .map(|l| l.account_number.clone())
            .ok_or_else(|| CollaboratorError::NotFound {
                entity: "linked account",
                id: from_linked_account_id.to_string(),
            })?;
        // Drain the swept account so a live re-fetch sees zero.
        if let Some(account_id) = state
            .accounts
            .iter()
            .find(|a| a.account_number == account_number)
            .map(|a| a.id.clone())
        {
            state.balances.insert(account_id, Balance::default());
        }
        state.transfers.push((
            from_linked_account_id.to_string(),
            to_account_id.to_string(),
            amount,
        ));
        Ok(TransferReceipt {
            transfer_id: format!("xfer-{}", state.transfers.len()),
            amount,
        })
    }
}

impl BusinessService for FakeBank {
    fn find_business(&self, business_id: &str) -> CollabResult<BusinessProfile> {
        self.state
            .lock()
            .unwrap()
            .businesses
            .get(business_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound {
                entity: "business",
                id: business_id.to_string(),
            })
    }

    fn deactivate_business(&self, business_id: &str, acting_user_id: &str) -> CollabResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_business_deactivation {
            return Err(CollaboratorError::Unavailable {
                service: "businesses",
                detail: format!("deactivation rejected for {business_id}"),
            });
        }
        if !state.businesses.contains_key(business_id) {
            return Err(CollaboratorError::NotFound {
                entity: "business",
                id: business_id.to_string(),
            });
        }
        state
            .business_deactivations
            .push((business_id.to_string(), acting_user_id.to_string()));
        Ok(())
    }
}

impl AgentDirectory for FakeBank {
    fn resolve_agent(&self, agent_id: &str) -> CollabResult<AgentProfile> {
        self.state
            .lock()
            .unwrap()
            .agents
            .get(agent_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound {
                entity: "agent",
                id: agent_id.to_string(),
            })
    }
}

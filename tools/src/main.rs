//! closure-runner: headless batch runner for the account-closure engine.
//!
//! Seeds a small in-process demo bank, opens and approves a closure request
//! for the demo business, runs one driver batch, and prints the resulting
//! request plus its full audit trail.
//!
//! Usage:
//!   closure-runner
//!   closure-runner --db closure.db --balance 150.00

use anyhow::Result;
use closure_core::collaborators::{
    AccountService, AccountUsage, AgentDirectory, AgentProfile, Balance, BalanceSweep, BankAccount,
    BusinessProfile, BusinessService, Card, CardService, CardStatus, CollabResult,
    CollaboratorError, LinkedAccount, NewLinkedAccount, TransferReceipt,
};
use closure_core::config::{ClosureConfig, DEFAULT_BATCH_LIMIT};
use closure_core::driver::OrchestrationDriver;
use closure_core::request_service::ClosureRequestService;
use closure_core::store::ClosureStore;
use closure_core::types::RequestStatus;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::env;
use std::sync::{Arc, Mutex};

const DEMO_BUSINESS: &str = "biz-demo";
const DEMO_AGENT: &str = "agent-demo";

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = arg_value(&args, "--db").unwrap_or_else(|| ":memory:".to_string());
    let json_output = args.iter().any(|a| a == "--json");
    let balance: Decimal = arg_value(&args, "--balance")
        .unwrap_or_else(|| "150.00".to_string())
        .parse()?;

    if !json_output {
        println!("closure-runner");
        println!("  db:      {db}");
        println!("  balance: {balance}");
        println!();
    }

    let store = if db == ":memory:" {
        ClosureStore::in_memory()?
    } else {
        ClosureStore::open(&db)?
    };
    store.migrate()?;

    let config = ClosureConfig {
        clearing_business_id: "biz-internal-clearing".to_string(),
        clearing_user_id: "user-internal-clearing".to_string(),
        refund_account_id: "acct-refund-clearing".to_string(),
        batch_limit: DEFAULT_BATCH_LIMIT,
    };

    log::debug!("runner config: {config:?}");

    let bank = Arc::new(DemoBank::seeded(balance));
    let service = ClosureRequestService::new(store, bank.clone(), bank.clone());
    let driver = OrchestrationDriver::new(
        config,
        service,
        bank.clone(),
        bank.clone(),
        bank.clone(),
        bank.clone(),
    );

    let request = driver.service.create_request(
        DEMO_BUSINESS,
        "business wind-down",
        Some("demo closure"),
        DEMO_AGENT,
    )?;
    driver
        .service
        .update_status(&request.id, RequestStatus::Approved, DEMO_AGENT)?;

    let summary = driver.run_batch()?;

    if json_output {
        let details = driver.service.get_request_details(&request.id)?;
        println!(
            "{}",
            serde_json::json!({
                "request_id": details.request.id,
                "status": details.request.status,
                "refund_amount": details.request.refund_amount,
                "discovered": summary.discovered,
                "closed": summary.closed,
                "refund_pending": summary.refund_pending,
                "failed": summary.failed,
            })
        );
        return Ok(());
    }

    println!("batch summary:");
    println!("  discovered:     {}", summary.discovered);
    println!("  closed:         {}", summary.closed);
    println!("  refund_pending: {}", summary.refund_pending);
    println!("  failed:         {}", summary.failed);
    println!();

    let details = driver.service.get_request_details(&request.id)?;
    println!(
        "request {}: status={} refund={}",
        details.request.id,
        details.request.status,
        details
            .request
            .refund_amount
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string()),
    );
    println!("business active: {}", bank.business_active());
    println!();
    println!("audit trail:");
    for state in driver.service.list_states(&request.id)? {
        println!(
            "  {}  {:<28} item={:<14} amount={:<8} {}",
            state.created.format("%H:%M:%S%.6f"),
            state.state.to_string(),
            state.item_id.as_deref().unwrap_or("-"),
            state
                .amount
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            state.description.as_deref().unwrap_or(""),
        );
    }

    Ok(())
}

fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].clone())
}

// ── Demo bank ────────────────────────────────────────────────────────────────
// A tiny in-process rendition of the external banking services: one business
// with a primary and a contact account, one active card, one CSP agent.

struct DemoState {
    accounts: Vec<BankAccount>,
    balances: HashMap<String, Balance>,
    cards: Vec<Card>,
    linked: Vec<LinkedAccount>,
    transfer_seq: u64,
    business_active: bool,
}

struct DemoBank {
    state: Mutex<DemoState>,
}

impl DemoBank {
    fn seeded(primary_balance: Decimal) -> Self {
        let accounts = vec![
            BankAccount {
                id: "acct-primary".to_string(),
                business_id: DEMO_BUSINESS.to_string(),
                account_number: "100200300".to_string(),
                routing_number: "021000021".to_string(),
                usage: AccountUsage::Primary,
                active: true,
            },
            BankAccount {
                id: "acct-contact".to_string(),
                business_id: DEMO_BUSINESS.to_string(),
                account_number: "100200301".to_string(),
                routing_number: "021000021".to_string(),
                usage: AccountUsage::Contact,
                active: true,
            },
        ];
        let mut balances = HashMap::new();
        balances.insert(
            "acct-primary".to_string(),
            Balance {
                available: primary_balance,
                posted: primary_balance,
            },
        );
        balances.insert("acct-contact".to_string(), Balance::default());
        let cards = vec![Card {
            id: "card-1".to_string(),
            account_id: "acct-primary".to_string(),
            status: CardStatus::Active,
        }];
        Self {
            state: Mutex::new(DemoState {
                accounts,
                balances,
                cards,
                linked: Vec::new(),
                transfer_seq: 0,
                business_active: true,
            }),
        }
    }

    fn business_active(&self) -> bool {
        self.state.lock().unwrap().business_active
    }
}

impl AccountService for DemoBank {
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

impl CardService for DemoBank {
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

impl BalanceSweep for DemoBank {
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
        _to_account_id: &str,
        amount: Decimal,
    ) -> CollabResult<TransferReceipt> {
        let mut state = self.state.lock().unwrap();
        let account_number = state
            .linked
            .iter()
            .find(|l| l.id == from_linked_account_id)
            .map(|l| l.account_number.clone())
            .ok_or_else(|| CollaboratorError::NotFound {
                entity: "linked account",
                id: from_linked_account_id.to_string(),
            })?;
        // Drain the swept account so a re-fetch sees zero.
        if let Some(account_id) = state
            .accounts
            .iter()
            .find(|a| a.account_number == account_number)
            .map(|a| a.id.clone())
        {
            state.balances.insert(account_id, Balance::default());
        }
        state.transfer_seq += 1;
        Ok(TransferReceipt {
            transfer_id: format!("xfer-{}", state.transfer_seq),
            amount,
        })
    }
}

impl BusinessService for DemoBank {
    fn find_business(&self, business_id: &str) -> CollabResult<BusinessProfile> {
        if business_id != DEMO_BUSINESS {
            return Err(CollaboratorError::NotFound {
                entity: "business",
                id: business_id.to_string(),
            });
        }
        Ok(BusinessProfile {
            id: DEMO_BUSINESS.to_string(),
            legal_name: "Acme Industrial LLC".to_string(),
            owner_user_id: "user-owner-demo".to_string(),
        })
    }

    fn deactivate_business(&self, business_id: &str, _acting_user_id: &str) -> CollabResult<()> {
        if business_id != DEMO_BUSINESS {
            return Err(CollaboratorError::NotFound {
                entity: "business",
                id: business_id.to_string(),
            });
        }
        self.state.lock().unwrap().business_active = false;
        Ok(())
    }
}

impl AgentDirectory for DemoBank {
    fn resolve_agent(&self, agent_id: &str) -> CollabResult<AgentProfile> {
        if agent_id != DEMO_AGENT {
            return Err(CollaboratorError::NotFound {
                entity: "agent",
                id: agent_id.to_string(),
            });
        }
        Ok(AgentProfile {
            id: DEMO_AGENT.to_string(),
            display_name: "Dana Reyes".to_string(),
        })
    }
}

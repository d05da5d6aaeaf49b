//! Orchestration configuration.
//!
//! Constructed once and passed into the driver — no globals. Tests build it
//! as a plain struct literal; the runner reads it from the environment.

use crate::error::{ClosureError, ClosureResult};
use crate::types::{AccountId, BusinessId, UserId};
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosureConfig {
    /// Internal business that owns the clearing linked-accounts.
    pub clearing_business_id: BusinessId,

    /// Internal user linked-account creation is attributed to.
    pub clearing_user_id: UserId,

    /// Internal refund-clearing account swept funds are transferred into.
    pub refund_account_id: AccountId,

    /// Maximum requests picked up per batch run.
    pub batch_limit: usize,
}

pub const DEFAULT_BATCH_LIMIT: usize = 100;

impl ClosureConfig {
    /// Read the fixed internal ids from the environment. Fails fast on any
    /// missing key rather than carrying empty ids into the saga.
    pub fn from_env() -> ClosureResult<Self> {
        Ok(Self {
            clearing_business_id: require_env("CLOSURE_CLEARING_BUSINESS_ID")?,
            clearing_user_id: require_env("CLOSURE_CLEARING_USER_ID")?,
            refund_account_id: require_env("CLOSURE_REFUND_ACCOUNT_ID")?,
            batch_limit: env::var("CLOSURE_BATCH_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_BATCH_LIMIT),
        })
    }
}

fn require_env(key: &'static str) -> ClosureResult<String> {
    env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ClosureError::MissingConfig { key })
}

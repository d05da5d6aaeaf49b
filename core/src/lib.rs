//! Account-closure orchestration engine.
//!
//! Permanently winds down a business's banking relationship: cancel its
//! cards, sweep remaining funds into an internal clearing account,
//! deactivate its bank accounts, and deactivate the business itself —
//! while money moves over partner rails that fail independently and cannot
//! be rolled back. The saga logs every step attempt to an append-only state
//! trail before and after each external call; a failed request is parked
//! for manual review and can be re-driven after an operator marks it
//! `failed_retry`.

pub mod collaborators;
pub mod config;
pub mod driver;
pub mod error;
pub mod request_service;
pub mod store;
pub mod types;

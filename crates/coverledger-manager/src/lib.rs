//! # coverledger-manager
//!
//! Orchestration of policy and claim operations over the record store and
//! the payment verifier.
//!
//! The manager is the library boundary an outer surface (HTTP, CLI) would
//! consume:
//!
//! - [`PolicyManager::create_or_renew_policy`] — verified payment, then a
//!   full-record write;
//! - [`PolicyManager::file_claim`] — claim creation against an existing
//!   policy;
//! - [`PolicyManager::update_policy`] / [`PolicyManager::update_claim`] —
//!   whitelist-checked partial updates;
//! - [`PolicyManager::get_policy`] / [`PolicyManager::get_claim`].
//!
//! Requests are traced through the [`RequestPhase`] lifecycle.

pub mod manager;
pub mod phase;

pub use manager::PolicyManager;
pub use phase::RequestPhase;

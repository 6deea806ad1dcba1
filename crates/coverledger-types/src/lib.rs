//! # coverledger-types
//!
//! Shared types, errors, and configuration for the **CoverLedger**
//! persistence core.
//!
//! This crate is the leaf dependency of the workspace — every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`PolicyId`], [`ClaimId`], [`PayerAddress`], [`RequestId`]
//! - **Record model**: [`Record`], [`RecordType`]
//! - **Update whitelist**: [`whitelist::validate`] and the per-type allow-lists
//! - **Payment authorization**: [`PaymentAuthorization`], [`VerifiedPayment`]
//! - **Configuration**: [`CoreConfig`]
//! - **Errors**: [`CoverledgerError`] with `CL_ERR_` prefix codes
//! - **Constants**: expiry horizon, lock timeout, and other defaults

pub mod authorization;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod record;
pub mod whitelist;

// Re-export all primary types at crate root for ergonomic imports:
//   use coverledger_types::{Record, RecordType, PaymentAuthorization, ...};

pub use authorization::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use record::*;

// Constants are accessed via `coverledger_types::constants::FOO`
// (not re-exported to avoid name collisions). The whitelist module is
// likewise addressed by path: `whitelist::validate(...)`.

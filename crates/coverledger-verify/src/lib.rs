//! # coverledger-verify
//!
//! Payment-authorization verification and replay protection.
//!
//! - [`NonceLedger`] — a durable set of used `(payer, nonce)` pairs with
//!   atomic check-and-insert, restart survival, and horizon-bounded
//!   eviction;
//! - [`PaymentVerifier`] — fixed-order verification of a
//!   [`PaymentAuthorization`](coverledger_types::PaymentAuthorization):
//!   signature, validity window, payee/asset, amount, then nonce burn.
//!
//! The nonce is consumed only by a fully valid authorization; every
//! rejection leaves it reservable.

pub mod ledger;
pub mod verifier;

pub use ledger::{NonceLedger, Reservation};
pub use verifier::PaymentVerifier;

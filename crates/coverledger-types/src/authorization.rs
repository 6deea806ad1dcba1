//! # PaymentAuthorization — the signed payment instruction
//!
//! A `PaymentAuthorization` is presented by a caller to justify creating or
//! renewing a policy. It is:
//!
//! - **Signature-bound**: ed25519 signature over the canonical payload,
//!   verifiable against the payer address alone
//! - **Nonce-bound**: each authorization carries a single-use nonce;
//!   the ledger rejects a second use
//! - **Time-bound**: valid only inside `[not_before, not_after]`
//!
//! The canonical payload fixes field order and length-prefixes every string
//! so the encoding of one authorization can never collide with another.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::PayerAddress;

/// A signed, time-bounded, nonce-bearing payment instruction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentAuthorization {
    /// Who pays. The address doubles as the signature verification key.
    pub payer: PayerAddress,
    /// Who gets paid. Must match the configured payee exactly.
    pub payee: String,
    /// Asset identifier (e.g., "USDC"). Must match the configured asset.
    pub asset: String,
    /// Authorized amount.
    pub amount: Decimal,
    /// Single-use value, paired with the payer, preventing replay.
    pub nonce: String,
    /// Validity window start, epoch seconds (inclusive).
    pub not_before: i64,
    /// Validity window end, epoch seconds (inclusive).
    pub not_after: i64,
    /// Ed25519 signature over [`Self::signing_payload`].
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

impl PaymentAuthorization {
    /// Canonical signing payload for ed25519 verification.
    ///
    /// Field order is fixed here, never inferred from input order. String
    /// fields are length-prefixed (u32 LE) so concatenation is unambiguous.
    ///
    /// Format: `"coverledger:payauth:v1:" || payer || payee || asset ||
    /// amount || nonce || not_before || not_after`
    #[must_use]
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut payload = Vec::with_capacity(256);
        payload.extend_from_slice(b"coverledger:payauth:v1:");
        push_str(&mut payload, self.payer.as_str());
        push_str(&mut payload, &self.payee);
        push_str(&mut payload, &self.asset);
        push_str(&mut payload, &self.amount.to_string());
        push_str(&mut payload, &self.nonce);
        payload.extend_from_slice(&self.not_before.to_le_bytes());
        payload.extend_from_slice(&self.not_after.to_le_bytes());
        payload
    }

    /// `true` when `now` falls inside the validity window.
    #[must_use]
    pub fn in_window(&self, now: i64) -> bool {
        now >= self.not_before && now <= self.not_after
    }
}

fn push_str(payload: &mut Vec<u8>, s: &str) {
    let len = u32::try_from(s.len()).unwrap_or(u32::MAX);
    payload.extend_from_slice(&len.to_le_bytes());
    payload.extend_from_slice(s.as_bytes());
}

/// The facts a successful verification hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedPayment {
    /// Verified payer identity.
    pub payer: PayerAddress,
    /// Verified amount (as a string to keep the type serde-stable).
    pub amount: String,
    /// The nonce that was burned for this payment.
    pub nonce: String,
}

/// Test-only constructor producing a validly signed authorization.
/// **Never use in production** — real authorizations arrive pre-signed.
#[cfg(any(test, feature = "test-helpers"))]
impl PaymentAuthorization {
    /// Sign an authorization with the given key; the payer address is
    /// derived from the key's public half.
    pub fn signed(
        key: &ed25519_dalek::SigningKey,
        payee: &str,
        asset: &str,
        amount: Decimal,
        nonce: &str,
        not_before: i64,
        not_after: i64,
    ) -> Self {
        use ed25519_dalek::Signer;

        let mut auth = Self {
            payer: PayerAddress::from_pubkey(&key.verifying_key()),
            payee: payee.to_string(),
            asset: asset.to_string(),
            amount,
            nonce: nonce.to_string(),
            not_before,
            not_after,
            signature: Vec::new(),
        };
        auth.signature = key.sign(&auth.signing_payload()).to_bytes().to_vec();
        auth
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;

    use super::*;

    fn make_auth() -> PaymentAuthorization {
        let key = SigningKey::generate(&mut OsRng);
        PaymentAuthorization::signed(
            &key,
            "acme-insurance",
            "USDC",
            Decimal::new(100, 0),
            "n1",
            1_000,
            1_300,
        )
    }

    #[test]
    fn signing_payload_deterministic() {
        let auth = make_auth();
        assert_eq!(auth.signing_payload(), auth.signing_payload());
    }

    #[test]
    fn signing_payload_differs_by_nonce() {
        let mut a = make_auth();
        a.nonce = "n1".into();
        let mut b = a.clone();
        b.nonce = "n2".into();
        assert_ne!(a.signing_payload(), b.signing_payload());
    }

    #[test]
    fn signing_payload_differs_by_window() {
        let a = make_auth();
        let mut b = a.clone();
        b.not_after += 1;
        assert_ne!(a.signing_payload(), b.signing_payload());
    }

    #[test]
    fn length_prefix_prevents_field_bleed() {
        // ("ab", "c") and ("a", "bc") must not encode identically
        let mut a = make_auth();
        a.payee = "ab".into();
        a.asset = "c".into();
        let mut b = a.clone();
        b.payee = "a".into();
        b.asset = "bc".into();
        assert_ne!(a.signing_payload(), b.signing_payload());
    }

    #[test]
    fn window_boundaries_inclusive() {
        let auth = make_auth();
        assert!(auth.in_window(1_000));
        assert!(auth.in_window(1_300));
        assert!(auth.in_window(1_150));
        assert!(!auth.in_window(999));
        assert!(!auth.in_window(1_301));
    }

    #[test]
    fn signed_helper_verifies() {
        use ed25519_dalek::{Signature, Verifier};

        let key = SigningKey::generate(&mut OsRng);
        let auth = PaymentAuthorization::signed(
            &key,
            "acme-insurance",
            "USDC",
            Decimal::new(250, 0),
            "n9",
            0,
            100,
        );
        let sig = Signature::from_slice(&auth.signature).unwrap();
        key.verifying_key()
            .verify(&auth.signing_payload(), &sig)
            .unwrap();
    }

    #[test]
    fn serde_roundtrip_with_hex_signature() {
        let auth = make_auth();
        let json = serde_json::to_string(&auth).unwrap();
        // Signature travels as hex, not a byte array
        assert!(json.contains(&hex::encode(&auth.signature)));
        let back: PaymentAuthorization = serde_json::from_str(&json).unwrap();
        assert_eq!(auth.signature, back.signature);
        assert_eq!(auth.nonce, back.nonce);
        assert_eq!(auth.amount, back.amount);
    }
}

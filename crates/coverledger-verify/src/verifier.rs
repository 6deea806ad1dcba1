//! Payment-authorization verification.
//!
//! Checks run in a fixed order, cheapest-to-revoke last:
//!
//! 1. signature — ed25519 `verify_strict` over the canonical payload,
//!    against the key embedded in the payer address
//! 2. validity window — `not_before <= now <= not_after`, both inclusive
//! 3. payee and asset — exact match against the configured values
//! 4. amount — at least the configured minimum premium
//! 5. nonce — atomic check-and-insert in the ledger
//!
//! The nonce reservation comes last so that an authorization failing any
//! earlier check never consumes its nonce: an expired or mis-addressed
//! authorization can be re-presented (with a fresh window or corrected
//! fields) under the same nonce.

use std::sync::Arc;

use ed25519_dalek::Signature;
use tracing::{debug, warn};

use coverledger_types::{
    CoreConfig, CoverledgerError, PaymentAuthorization, Result, VerifiedPayment,
};

use crate::ledger::{NonceLedger, Reservation};

/// Verifies [`PaymentAuthorization`]s against the deployment's expected
/// payee, asset, and minimum premium, burning the nonce on success.
pub struct PaymentVerifier {
    expected_payee: String,
    expected_asset: String,
    min_premium: rust_decimal::Decimal,
    ledger: Arc<NonceLedger>,
}

impl PaymentVerifier {
    #[must_use]
    pub fn new(config: &CoreConfig, ledger: Arc<NonceLedger>) -> Self {
        Self {
            expected_payee: config.expected_payee.clone(),
            expected_asset: config.expected_asset.clone(),
            min_premium: config.min_premium,
            ledger,
        }
    }

    /// Shared handle to the underlying nonce ledger.
    #[must_use]
    pub fn ledger(&self) -> Arc<NonceLedger> {
        Arc::clone(&self.ledger)
    }

    /// Verify an authorization at time `now` (epoch seconds) and, on
    /// success, burn its nonce.
    ///
    /// Every rejection path leaves the nonce unburned; only a fully valid
    /// authorization reaches the ledger.
    pub fn verify(&self, auth: &PaymentAuthorization, now: i64) -> Result<VerifiedPayment> {
        self.check_signature(auth)?;
        self.check_window(auth, now)?;
        self.check_destination(auth)?;
        self.check_amount(auth)?;

        match self.ledger.try_reserve(&auth.payer, &auth.nonce, now)? {
            Reservation::Accepted => {
                debug!(payer = %auth.payer, nonce = auth.nonce, "authorization verified");
                Ok(VerifiedPayment {
                    payer: auth.payer.clone(),
                    amount: auth.amount.to_string(),
                    nonce: auth.nonce.clone(),
                })
            }
            Reservation::AlreadyUsed => {
                warn!(payer = %auth.payer, nonce = auth.nonce, "replay attempt rejected");
                Err(CoverledgerError::NonceReplay {
                    payer: auth.payer.to_string(),
                    nonce: auth.nonce.clone(),
                })
            }
        }
    }

    fn check_signature(&self, auth: &PaymentAuthorization) -> Result<()> {
        let key = auth.payer.verifying_key()?;
        let signature = Signature::from_slice(&auth.signature)
            .map_err(|_| CoverledgerError::BadSignature)?;
        key.verify_strict(&auth.signing_payload(), &signature)
            .map_err(|_| CoverledgerError::BadSignature)
    }

    fn check_window(&self, auth: &PaymentAuthorization, now: i64) -> Result<()> {
        if now < auth.not_before {
            return Err(CoverledgerError::AuthorizationNotYetValid {
                not_before: auth.not_before,
                now,
            });
        }
        if now > auth.not_after {
            return Err(CoverledgerError::AuthorizationExpired {
                not_after: auth.not_after,
                now,
            });
        }
        Ok(())
    }

    fn check_destination(&self, auth: &PaymentAuthorization) -> Result<()> {
        if auth.payee != self.expected_payee {
            return Err(CoverledgerError::WrongPayee {
                expected: self.expected_payee.clone(),
                actual: auth.payee.clone(),
            });
        }
        if auth.asset != self.expected_asset {
            return Err(CoverledgerError::WrongAsset {
                expected: self.expected_asset.clone(),
                actual: auth.asset.clone(),
            });
        }
        Ok(())
    }

    fn check_amount(&self, auth: &PaymentAuthorization) -> Result<()> {
        if auth.amount < self.min_premium {
            return Err(CoverledgerError::InsufficientAmount {
                minimum: self.min_premium,
                actual: auth.amount,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use rust_decimal::Decimal;

    use super::*;

    const PAYEE: &str = "acme-insurance";
    const ASSET: &str = "USDC";

    fn setup(dir: &std::path::Path) -> PaymentVerifier {
        let cfg = CoreConfig::new(dir, PAYEE, ASSET, Decimal::new(50, 0));
        let ledger = Arc::new(NonceLedger::load(&cfg, 0).unwrap());
        PaymentVerifier::new(&cfg, ledger)
    }

    fn auth(key: &SigningKey, nonce: &str) -> PaymentAuthorization {
        PaymentAuthorization::signed(key, PAYEE, ASSET, Decimal::new(100, 0), nonce, 1_000, 1_300)
    }

    #[test]
    fn valid_authorization_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = setup(dir.path());
        let key = SigningKey::generate(&mut OsRng);
        let auth = auth(&key, "n1");

        let verified = verifier.verify(&auth, 1_100).unwrap();
        assert_eq!(verified.payer, auth.payer);
        assert_eq!(verified.amount, "100");
        assert_eq!(verified.nonce, "n1");
    }

    #[test]
    fn window_boundaries_are_inclusive() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = setup(dir.path());
        let key = SigningKey::generate(&mut OsRng);

        verifier.verify(&auth(&key, "n-start"), 1_000).unwrap();
        verifier.verify(&auth(&key, "n-end"), 1_300).unwrap();
    }

    #[test]
    fn tampered_field_rejected_as_bad_signature() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = setup(dir.path());
        let key = SigningKey::generate(&mut OsRng);

        let mut tampered = auth(&key, "n1");
        tampered.amount = Decimal::new(1_000_000, 0);
        let err = verifier.verify(&tampered, 1_100).unwrap_err();
        assert!(matches!(err, CoverledgerError::BadSignature));
    }

    #[test]
    fn signature_from_other_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = setup(dir.path());
        let key = SigningKey::generate(&mut OsRng);
        let other = SigningKey::generate(&mut OsRng);

        let mut forged = auth(&key, "n1");
        forged.signature = auth(&other, "n1").signature;
        let err = verifier.verify(&forged, 1_100).unwrap_err();
        assert!(matches!(err, CoverledgerError::BadSignature));
    }

    #[test]
    fn malformed_payer_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = setup(dir.path());
        let key = SigningKey::generate(&mut OsRng);

        let mut bad = auth(&key, "n1");
        bad.payer = coverledger_types::PayerAddress::new("0xdeadbeef");
        let err = verifier.verify(&bad, 1_100).unwrap_err();
        assert!(matches!(err, CoverledgerError::MalformedPayer { .. }));
    }

    #[test]
    fn not_yet_valid_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = setup(dir.path());
        let key = SigningKey::generate(&mut OsRng);

        let err = verifier.verify(&auth(&key, "n1"), 999).unwrap_err();
        assert!(matches!(
            err,
            CoverledgerError::AuthorizationNotYetValid { not_before: 1_000, now: 999 }
        ));
    }

    #[test]
    fn expired_rejected_and_nonce_not_burned() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = setup(dir.path());
        let key = SigningKey::generate(&mut OsRng);

        let expired = auth(&key, "n1");
        let err = verifier.verify(&expired, 1_301).unwrap_err();
        assert!(matches!(err, CoverledgerError::AuthorizationExpired { .. }));

        // The same nonce under a fresh window still works: rejection never
        // consumes the nonce.
        let fresh = PaymentAuthorization::signed(
            &key,
            PAYEE,
            ASSET,
            Decimal::new(100, 0),
            "n1",
            1_301,
            1_600,
        );
        verifier.verify(&fresh, 1_400).unwrap();
    }

    #[test]
    fn wrong_payee_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = setup(dir.path());
        let key = SigningKey::generate(&mut OsRng);

        let wrong = PaymentAuthorization::signed(
            &key,
            "mallory-insurance",
            ASSET,
            Decimal::new(100, 0),
            "n1",
            1_000,
            1_300,
        );
        let err = verifier.verify(&wrong, 1_100).unwrap_err();
        assert!(matches!(err, CoverledgerError::WrongPayee { .. }));
        assert!(!verifier.ledger().contains(&wrong.payer, "n1"));
    }

    #[test]
    fn wrong_asset_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = setup(dir.path());
        let key = SigningKey::generate(&mut OsRng);

        let wrong = PaymentAuthorization::signed(
            &key,
            PAYEE,
            "DOGE",
            Decimal::new(100, 0),
            "n1",
            1_000,
            1_300,
        );
        let err = verifier.verify(&wrong, 1_100).unwrap_err();
        assert!(matches!(err, CoverledgerError::WrongAsset { .. }));
    }

    #[test]
    fn below_minimum_premium_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = setup(dir.path());
        let key = SigningKey::generate(&mut OsRng);

        let small = PaymentAuthorization::signed(
            &key,
            PAYEE,
            ASSET,
            Decimal::new(49, 0),
            "n1",
            1_000,
            1_300,
        );
        let err = verifier.verify(&small, 1_100).unwrap_err();
        assert!(matches!(err, CoverledgerError::InsufficientAmount { .. }));
    }

    #[test]
    fn exact_minimum_premium_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = setup(dir.path());
        let key = SigningKey::generate(&mut OsRng);

        let exact = PaymentAuthorization::signed(
            &key,
            PAYEE,
            ASSET,
            Decimal::new(50, 0),
            "n1",
            1_000,
            1_300,
        );
        verifier.verify(&exact, 1_100).unwrap();
    }

    #[test]
    fn replay_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = setup(dir.path());
        let key = SigningKey::generate(&mut OsRng);

        let auth = auth(&key, "n1");
        verifier.verify(&auth, 1_100).unwrap();
        let err = verifier.verify(&auth, 1_200).unwrap_err();
        assert!(matches!(err, CoverledgerError::NonceReplay { .. }));
    }

    #[test]
    fn replay_protection_is_per_payer() {
        let dir = tempfile::tempdir().unwrap();
        let verifier = setup(dir.path());
        let alice = SigningKey::generate(&mut OsRng);
        let bob = SigningKey::generate(&mut OsRng);

        verifier.verify(&auth(&alice, "n1"), 1_100).unwrap();
        // Same nonce string, different payer: independent.
        verifier.verify(&auth(&bob, "n1"), 1_100).unwrap();
    }
}

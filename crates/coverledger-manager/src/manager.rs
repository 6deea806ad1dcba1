//! The policy/claim manager: orchestration over store and verifier.
//!
//! Each mutating request moves through the phases in [`RequestPhase`],
//! traced against a fresh [`RequestId`]. Creation and renewal demand a
//! verified payment before any record is touched; once verification
//! succeeds the nonce is burned, so a subsequent store failure surfaces as
//! `FulfillmentFailed` rather than a plain storage error — the caller must
//! reconcile out-of-band instead of retrying the same authorization.
//!
//! Records are opaque at creation; partial updates go through the store's
//! whitelist check.

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use coverledger_store::RecordStore;
use coverledger_types::{
    whitelist, ClaimId, CoverledgerError, PaymentAuthorization, Record, RecordType, RequestId,
    Result, VerifiedPayment,
};
use coverledger_verify::PaymentVerifier;

use crate::phase::RequestPhase;

/// Orchestrates policy and claim operations.
pub struct PolicyManager {
    store: Arc<dyn RecordStore>,
    verifier: PaymentVerifier,
}

impl PolicyManager {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, verifier: PaymentVerifier) -> Self {
        Self { store, verifier }
    }

    /// Create a policy, or renew it when the id already exists. Requires a
    /// valid payment authorization; `policy_fields` must carry the
    /// `policy_id`.
    ///
    /// Creation stores the caller's fields plus the verified payment facts.
    /// Renewal merges only update-whitelisted fields into the existing
    /// record (a new `expiry` among them extends the term), then increments
    /// `renewal_count` and accumulates `cumulative_fees`.
    pub fn create_or_renew_policy(
        &self,
        auth: &PaymentAuthorization,
        policy_fields: &Map<String, Value>,
        now: i64,
    ) -> Result<Record> {
        let request = RequestId::new();
        debug!(%request, phase = %RequestPhase::Received, "policy request");

        // The id must be known before payment: a request we cannot persist
        // must never burn a nonce.
        let id = policy_fields
            .get(RecordType::Policy.id_field())
            .and_then(Value::as_str)
            .ok_or(CoverledgerError::MissingRecordId {
                record_type: RecordType::Policy,
            })?
            .to_string();

        // The branch is decided before payment: renewal field sets are held
        // to the update whitelist, and that rejection — like a missing id —
        // must land before any nonce burn.
        let renewing = self.store.exists(RecordType::Policy, &id)?;
        if renewing {
            whitelist::validate(
                RecordType::Policy,
                policy_fields
                    .keys()
                    .map(String::as_str)
                    .filter(|name| *name != RecordType::Policy.id_field()),
            )
            .map_err(|rejected| CoverledgerError::InvalidUpdateFields {
                record_type: RecordType::Policy,
                fields: rejected,
            })?;
        }

        debug!(%request, phase = %RequestPhase::Verifying, policy_id = id, "verifying payment");
        let payment = match self.verifier.verify(auth, now) {
            Ok(payment) => payment,
            Err(e) => {
                debug!(%request, phase = %RequestPhase::Rejected, error = %e, "payment rejected");
                return Err(e);
            }
        };
        debug!(%request, phase = %RequestPhase::Verified, payer = %payment.payer, "payment verified");

        debug!(%request, phase = %RequestPhase::Persisting, policy_id = id, "writing policy");
        match self.stage_policy(&id, renewing, policy_fields, &payment, now) {
            Ok(record) => {
                info!(%request, phase = %RequestPhase::Committed, policy_id = id, "policy committed");
                Ok(record)
            }
            Err(e) => {
                // Nonce already burned; report the partial state distinctly.
                warn!(%request, phase = %RequestPhase::Failed, error = %e, "write failed after verification");
                Err(CoverledgerError::FulfillmentFailed {
                    payer: payment.payer.to_string(),
                    nonce: payment.nonce,
                    cause: e.to_string(),
                })
            }
        }
    }

    fn stage_policy(
        &self,
        id: &str,
        renewing: bool,
        fields: &Map<String, Value>,
        payment: &VerifiedPayment,
        now: i64,
    ) -> Result<Record> {
        let paid = Decimal::from_str(&payment.amount)
            .map_err(|e| CoverledgerError::Internal(format!("verified amount: {e}")))?;

        let record = if renewing {
            let mut record = self.store.get(RecordType::Policy, id)?;
            record.merge(fields);
            let renewals = int_field(&record, "renewal_count") + 1;
            let fees = decimal_field(&record, "cumulative_fees") + paid;
            record.set("renewal_count", json!(renewals));
            record.set("cumulative_fees", Value::String(fees.to_string()));
            record.set("renewal_ts", json!(now));
            record.set("status", json!("active"));
            record
        } else {
            let mut record = Record(fields.clone());
            record.set("status", json!("active"));
            record.set("renewal_count", json!(0));
            record.set("premium", Value::String(payment.amount.clone()));
            record.set("cumulative_fees", Value::String(payment.amount.clone()));
            record.set("merchant_ref", Value::String(payment.payer.to_string()));
            record.set("created_at", json!(now));
            record
        };

        self.store.put(RecordType::Policy, id, &record)?;
        // put stamps the id field into the stored copy; mirror it here so
        // the returned record matches what was written.
        let mut record = record;
        record.set(RecordType::Policy.id_field(), Value::String(id.to_string()));
        Ok(record)
    }

    /// Partial update of a policy; field names go through the whitelist.
    pub fn update_policy(&self, id: &str, fields: &Map<String, Value>) -> Result<()> {
        self.store.update_fields(RecordType::Policy, id, fields)
    }

    /// Partial update of a claim; field names go through the whitelist.
    pub fn update_claim(&self, id: &str, fields: &Map<String, Value>) -> Result<()> {
        self.store.update_fields(RecordType::Claim, id, fields)
    }

    /// File a claim against an existing policy. Mints a fresh claim id and
    /// stamps the filing metadata.
    pub fn file_claim(
        &self,
        policy_id: &str,
        claim_fields: &Map<String, Value>,
        now: i64,
    ) -> Result<Record> {
        let request = RequestId::new();
        if !self.store.exists(RecordType::Policy, policy_id)? {
            return Err(CoverledgerError::RecordNotFound {
                collection: RecordType::Policy.collection().to_string(),
                id: policy_id.to_string(),
            });
        }

        let claim_id = ClaimId::mint();
        let mut record = Record(claim_fields.clone());
        record.set("claim_id", Value::String(claim_id.to_string()));
        record.set("policy_id", Value::String(policy_id.to_string()));
        record.set("status", json!("filed"));
        record.set("filed_at", json!(now));

        self.store.put(RecordType::Claim, claim_id.as_str(), &record)?;
        info!(%request, %claim_id, policy_id, "claim filed");
        Ok(record)
    }

    pub fn get_policy(&self, id: &str) -> Result<Record> {
        self.store.get(RecordType::Policy, id)
    }

    pub fn get_claim(&self, id: &str) -> Result<Record> {
        self.store.get(RecordType::Claim, id)
    }
}

/// Integer field with absent-or-non-integer treated as zero.
fn int_field(record: &Record, name: &str) -> i64 {
    record.get(name).and_then(Value::as_i64).unwrap_or(0)
}

/// Decimal field stored as a string (or bare number); absent or
/// unparseable values count as zero.
fn decimal_field(record: &Record, name: &str) -> Decimal {
    match record.get(name) {
        Some(Value::String(s)) => Decimal::from_str(s).unwrap_or_default(),
        Some(Value::Number(n)) => Decimal::from_str(&n.to_string()).unwrap_or_default(),
        _ => Decimal::ZERO,
    }
}

//! Per-type update whitelists.
//!
//! A partial update may only touch a pre-approved set of fields. The check
//! compares names verbatim — no trimming, no case folding, no unicode
//! normalization — so no identifier can be smuggled past it in a disguised
//! spelling. It runs before any file is opened or SQL text is built.

use crate::RecordType;

/// Fields a policy update is allowed to touch.
pub const POLICY_UPDATE_FIELDS: &[&str] = &[
    "status",
    "expiry",
    "renewal_ts",
    "renewal_count",
    "cumulative_fees",
    "merchant_ref",
    "coverage_amount",
    "coverage_unit",
    "premium",
    "premium_unit",
];

/// Fields a claim update is allowed to touch.
pub const CLAIM_UPDATE_FIELDS: &[&str] = &[
    "status",
    "amount",
    "amount_unit",
    "evidence_ref",
    "assessed_at",
    "payout_ref",
    "resolution_note",
];

/// The allow-list for a record type.
#[must_use]
pub fn allowed_fields(record_type: RecordType) -> &'static [&'static str] {
    match record_type {
        RecordType::Policy => POLICY_UPDATE_FIELDS,
        RecordType::Claim => CLAIM_UPDATE_FIELDS,
    }
}

/// Validate a set of field names against the type's whitelist.
///
/// Pure, no I/O. Returns the rejected names (sorted, deduplicated) on
/// failure so the error message is deterministic.
pub fn validate<'a, I>(record_type: RecordType, field_names: I) -> Result<(), Vec<String>>
where
    I: IntoIterator<Item = &'a str>,
{
    let allowed = allowed_fields(record_type);
    let mut rejected: Vec<String> = field_names
        .into_iter()
        .filter(|name| !allowed.contains(name))
        .map(str::to_owned)
        .collect();

    if rejected.is_empty() {
        Ok(())
    } else {
        rejected.sort_unstable();
        rejected.dedup();
        Err(rejected)
    }
}

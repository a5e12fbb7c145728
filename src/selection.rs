//! Entity selection: filter raw detector candidates and resolve overlaps
//! into the final replacement set for one paragraph.

use crate::spans::{EntityLabel, EntitySpan};
use std::collections::HashSet;

/// Role words that follow "THE " in contract boilerplate. "THE BUYER" or
/// "THE LICENSOR" names a structural role, not an identity, and is never
/// pseudonymized no matter what a detector thinks of it.
const ROLE_WORDS: [&str; 36] = [
    "AGENT",
    "ASSIGNEE",
    "ASSIGNOR",
    "BENEFICIARY",
    "BORROWER",
    "BUYER",
    "CLIENT",
    "COMPANY",
    "CONSULTANT",
    "CONTRACTOR",
    "CUSTOMER",
    "DISTRIBUTOR",
    "EMPLOYEE",
    "EMPLOYER",
    "EXECUTOR",
    "GUARANTOR",
    "INVESTOR",
    "LANDLORD",
    "LENDER",
    "LESSEE",
    "LESSOR",
    "LICENSEE",
    "LICENSOR",
    "PARTNER",
    "PARTNERS",
    "PARTIES",
    "PARTY",
    "PRINCIPAL",
    "PROVIDER",
    "RECIPIENT",
    "SELLER",
    "SUBCONTRACTOR",
    "SUPPLIER",
    "TENANT",
    "TRUSTEE",
    "VENDOR",
];

/// True when `text` is a role label like "the Tenant" (case-insensitive).
pub fn is_role_label(text: &str) -> bool {
    let upper = text.trim().to_uppercase();
    match upper.strip_prefix("THE ") {
        Some(rest) => ROLE_WORDS.contains(&rest.trim()),
        None => false,
    }
}

/// Reduce raw detector candidates to the final, non-overlapping set.
///
/// A candidate survives the filter when its label is allowed, its confidence
/// clears the floor, it covers at least one character, and it is not a role
/// label. Survivors are ranked by confidence, then span length, then
/// earliest start, and accepted greedily so no two selected spans overlap.
/// The winners come back sorted ascending by start.
pub fn select_entities(
    candidates: Vec<EntitySpan>,
    allowed_labels: &HashSet<EntityLabel>,
    min_confidence: f64,
) -> Vec<EntitySpan> {
    let mut survivors: Vec<EntitySpan> = candidates
        .into_iter()
        .filter(|span| {
            allowed_labels.contains(&span.label)
                && span.confidence >= min_confidence
                && !span.is_empty()
                && !is_role_label(&span.text)
        })
        .collect();

    survivors.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| b.len().cmp(&a.len()))
            .then_with(|| a.start.cmp(&b.start))
    });

    let mut accepted: Vec<EntitySpan> = Vec::new();
    for span in survivors {
        if accepted.iter().all(|kept| !kept.overlaps(&span)) {
            accepted.push(span);
        }
    }

    accepted.sort_by_key(|span| span.start);
    accepted
}

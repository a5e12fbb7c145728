//! Core value types: entity labels, detected spans, and replacement ranges.
//!
//! All offsets in this crate are character offsets (Unicode scalar values)
//! into a paragraph's concatenated run text, half-open `[start, end)`. Byte
//! offsets from regex matches diverge from character offsets as soon as the
//! text contains smart quotes or accented names, so they are converted at
//! the boundary and never stored.

use crate::error::PrivyError;
use std::fmt;
use std::str::FromStr;

// ─── Labels ──────────────────────────────────────────────────────────────────

/// Entity categories eligible for pseudonymization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityLabel {
    Person,
    Company,
    Address,
    Email,
    Phone,
    DocId,
    NationalId,
}

impl EntityLabel {
    /// Every label, in canonical order.
    pub const ALL: [EntityLabel; 7] = [
        EntityLabel::Person,
        EntityLabel::Company,
        EntityLabel::Address,
        EntityLabel::Email,
        EntityLabel::Phone,
        EntityLabel::DocId,
        EntityLabel::NationalId,
    ];

    /// Canonical name, as used in placeholder ids and mapping files.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityLabel::Person => "PERSON",
            EntityLabel::Company => "COMPANY",
            EntityLabel::Address => "ADDRESS",
            EntityLabel::Email => "EMAIL",
            EntityLabel::Phone => "PHONE",
            EntityLabel::DocId => "DOC_ID",
            EntityLabel::NationalId => "NATIONAL_ID",
        }
    }
}

impl fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityLabel {
    type Err = PrivyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_label(s).ok_or_else(|| {
            let known: Vec<&str> = EntityLabel::ALL.iter().map(|l| l.as_str()).collect();
            PrivyError::Configuration(format!(
                "unsupported entity type '{}' (known: {})",
                s,
                known.join(", ")
            ))
        })
    }
}

/// Map a label as reported by a detector onto the fixed label set.
///
/// Detection backends disagree on naming ("PER", "ORG", "LOCATION", ...);
/// the aliases here fold the common variants onto canonical labels. Returns
/// `None` for anything the engine does not recognize.
pub fn normalize_label(raw: &str) -> Option<EntityLabel> {
    let upper = raw.trim().to_uppercase();
    match upper.as_str() {
        "PERSON" | "PER" | "NAME" | "HUMAN" => Some(EntityLabel::Person),
        "COMPANY" | "ORG" | "ORGANIZATION" => Some(EntityLabel::Company),
        "ADDRESS" | "LOCATION" | "LOC" => Some(EntityLabel::Address),
        "EMAIL" | "MAIL" => Some(EntityLabel::Email),
        "PHONE" | "PHONE NUMBER" | "TEL" | "MOBILE" => Some(EntityLabel::Phone),
        "DOC_ID" => Some(EntityLabel::DocId),
        "NATIONAL_ID" => Some(EntityLabel::NationalId),
        _ => None,
    }
}

// ─── Spans ───────────────────────────────────────────────────────────────────

/// A candidate entity occurrence within one paragraph's concatenated text.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySpan {
    /// First character of the span.
    pub start: usize,
    /// One past the last character of the span.
    pub end: usize,
    /// Entity category.
    pub label: EntityLabel,
    /// The matched text, kept for filtering and diagnostics.
    pub text: String,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f64,
}

impl EntitySpan {
    /// Span length in characters.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// True for degenerate (empty or inverted) ranges.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True when the two spans share at least one character position.
    pub fn overlaps(&self, other: &EntitySpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One text replacement, in the same coordinate space as [`EntitySpan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanReplacement {
    pub start: usize,
    pub end: usize,
    /// Text to put in place of the range.
    pub replacement: String,
}

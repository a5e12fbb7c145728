//! Deterministic placeholder assignment, scoped to one anonymization run.

use crate::mapping::{MappingData, MappingEntry};
use crate::spans::EntityLabel;
use std::collections::HashMap;

/// Mints stable placeholder ids (`PERSON_001`, `COMPANY_002`, ...).
///
/// Counters are per label and start at 1. Ids use three-digit zero padding
/// and simply grow wider past 999. A `(label, original text)` pair seen
/// before returns the id minted the first time, so the same name maps to
/// the same placeholder across the whole document.
#[derive(Default)]
pub struct PlaceholderAssigner {
    counters: HashMap<EntityLabel, u32>,
    assigned: HashMap<(EntityLabel, String), String>,
}

impl PlaceholderAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder id for `(label, original)`. First sight mints a fresh id
    /// and records the pair in `mapping`; repeats change nothing.
    pub fn assign(
        &mut self,
        label: EntityLabel,
        original: &str,
        mapping: &mut MappingData,
    ) -> String {
        let key = (label, original.to_string());
        if let Some(id) = self.assigned.get(&key) {
            return id.clone();
        }

        let counter = self.counters.entry(label).or_insert(0);
        *counter += 1;
        let id = format!("{}_{:03}", label.as_str(), counter);

        self.assigned.insert(key, id.clone());
        mapping.insert(
            id.clone(),
            MappingEntry {
                label: label.as_str().to_string(),
                original: original.to_string(),
            },
        );
        id
    }
}

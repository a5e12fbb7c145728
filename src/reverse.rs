//! Placeholder scanning for the restore direction: find every placeholder
//! occurrence in a paragraph and resolve it back to the original text.

use crate::mapping::{MappingData, MappingEntry};
use crate::spans::SpanReplacement;

/// Locate placeholder occurrences in `text` and produce the replacements
/// that restore the original wording.
///
/// Ids are matched longest first so an id can never be shadowed by a
/// shorter one that happens to be its prefix; collected hits are then
/// accepted greedily left to right. An id present in the text but missing
/// from `mapping` is left alone: a partial mapping is a legitimate input,
/// not an error.
pub fn locate_placeholders(text: &str, mapping: &MappingData) -> Vec<SpanReplacement> {
    let chars: Vec<char> = text.chars().collect();

    let mut ids: Vec<(&String, &MappingEntry)> = mapping.placeholders.iter().collect();
    ids.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut hits: Vec<(usize, usize, &str)> = Vec::new();
    for (id, entry) in ids {
        let id_chars: Vec<char> = id.chars().collect();
        let n = id_chars.len();
        if n == 0 || n > chars.len() {
            continue;
        }
        let mut pos = 0usize;
        while pos + n <= chars.len() {
            if chars[pos..pos + n] == id_chars[..] {
                hits.push((pos, pos + n, entry.original.as_str()));
                pos += n;
            } else {
                pos += 1;
            }
        }
    }

    hits.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| (b.1 - b.0).cmp(&(a.1 - a.0))));

    let mut accepted: Vec<SpanReplacement> = Vec::new();
    let mut last_end = 0usize;
    for (start, end, original) in hits {
        if start >= last_end {
            accepted.push(SpanReplacement {
                start,
                end,
                replacement: original.to_string(),
            });
            last_end = end;
        }
    }
    accepted
}

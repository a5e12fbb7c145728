//! Cross-run span splicing: rewrite character ranges that may cross
//! formatting-run boundaries while leaving every character outside the
//! ranges, and all run formatting, untouched.

use crate::error::{PrivyError, Result};
use crate::spans::SpanReplacement;

/// Mutable-text view of one formatting run. The splicer only ever rewrites
/// a run's text; formatting stays wherever the implementor keeps it.
pub trait RunText {
    fn text(&self) -> &str;
    fn set_text(&mut self, text: String);
}

/// Apply non-overlapping replacements to a paragraph's runs.
///
/// Offsets are character offsets into the concatenation of all run texts.
/// The replacement text lands whole in the first run the span touches, so
/// it inherits that run's formatting; every other touched run keeps only
/// its text outside the span. Returns the number of rewrites that changed
/// a run's text; a run hit by two replacements counts once per rewrite.
///
/// The whole batch is validated before any run is mutated: a range past the
/// end of the paragraph or any pairwise overlap fails with
/// [`PrivyError::Validation`] and leaves the runs untouched. Degenerate
/// (empty) ranges are ignored, and a replacement that intersects no run is
/// skipped, since it can only mean the offsets were computed against some
/// other text.
pub fn apply_replacements<R: RunText>(
    runs: &mut [R],
    replacements: &[SpanReplacement],
) -> Result<usize> {
    // Cumulative [start, end) coverage per run, in characters
    let mut bounds: Vec<(usize, usize)> = Vec::with_capacity(runs.len());
    let mut cursor = 0usize;
    for run in runs.iter() {
        let len = run.text().chars().count();
        bounds.push((cursor, cursor + len));
        cursor += len;
    }
    let total = cursor;

    let mut batch: Vec<&SpanReplacement> =
        replacements.iter().filter(|r| r.end > r.start).collect();

    for rep in &batch {
        if rep.end > total {
            return Err(PrivyError::Validation(format!(
                "replacement {}..{} exceeds paragraph length {}",
                rep.start, rep.end, total
            )));
        }
    }
    for (i, a) in batch.iter().enumerate() {
        for b in &batch[i + 1..] {
            if a.start < b.end && b.start < a.end {
                return Err(PrivyError::Validation(format!(
                    "overlapping replacements {}..{} and {}..{}",
                    a.start, a.end, b.start, b.end
                )));
            }
        }
    }

    // Right to left, so replacements already processed keep valid offsets
    batch.sort_by(|a, b| b.start.cmp(&a.start));

    let mut changed = 0usize;
    for rep in batch {
        let touched: Vec<usize> = bounds
            .iter()
            .enumerate()
            .filter(|(_, (s, e))| *s < rep.end && rep.start < *e)
            .map(|(i, _)| i)
            .collect();
        let (first, last) = match (touched.first(), touched.last()) {
            (Some(&f), Some(&l)) => (f, l),
            _ => continue,
        };

        for &idx in &touched {
            let (run_start, _) = bounds[idx];
            let chars: Vec<char> = runs[idx].text().chars().collect();
            let local_start = rep.start.saturating_sub(run_start).min(chars.len());
            let local_end = rep.end.saturating_sub(run_start).min(chars.len());

            let mut new_text = String::new();
            if idx == first {
                new_text.extend(&chars[..local_start]);
                new_text.push_str(&rep.replacement);
            }
            if idx == last {
                new_text.extend(&chars[local_end..]);
            }

            if new_text != runs[idx].text() {
                runs[idx].set_text(new_text);
                changed += 1;
            }
        }
    }

    Ok(changed)
}

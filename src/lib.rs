//! Reversible pseudonymization for DOCX documents.
//!
//! Detected entities (names, companies, addresses, emails, phone numbers,
//! identifiers) are swapped for stable placeholders like `PERSON_001`, the
//! placeholder dictionary is persisted next to the output (plain JSON or
//! password-encrypted), and a later run restores the original wording
//! exactly, character formatting included.
//!
//! This library provides:
//! - `detect`: detection backends (regex heuristics, external-command adapter)
//! - `selection`: candidate filtering and overlap resolution
//! - `placeholder`: stable placeholder assignment
//! - `splice`: cross-run text splicing that leaves formatting untouched
//! - `reverse`: placeholder scanning for the restore direction
//! - `mapping`: mapping persistence, plain or encrypted
//! - `docx`: the DOCX container adapter
//! - `pipeline`: the anonymize/deanonymize operations the CLI drives
//!
//! Binaries:
//! - `privy-docx`: command-line front end for all of the above

pub mod detect;
pub mod docx;
pub mod error;
pub mod mapping;
pub mod pipeline;
pub mod placeholder;
pub mod reverse;
pub mod selection;
pub mod spans;
pub mod splice;

// Re-export the types nearly every caller needs
pub use error::{PrivyError, Result};
pub use spans::{EntityLabel, EntitySpan, SpanReplacement};

//! Top-level anonymize and restore operations for programmatic use by the
//! CLI or by embedding applications.
//!
//! Each operation takes a config struct, drives the document and detector
//! ports, and returns a [`ProcessingReport`]. Nothing is written to disk
//! until the whole document has processed cleanly; the mapping file is then
//! written before the document itself, so an anonymized document can never
//! exist without the dictionary that restores it.

use crate::detect::EntityDetector;
use crate::docx::{self, DocxPackage};
use crate::error::{PrivyError, Result};
use crate::mapping::{self, MappingData};
use crate::placeholder::PlaceholderAssigner;
use crate::reverse::locate_placeholders;
use crate::selection::select_entities;
use crate::spans::{EntityLabel, SpanReplacement};
use crate::splice::apply_replacements;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Configuration for one anonymization run.
pub struct AnonymizeConfig {
    /// Input DOCX path
    pub input: PathBuf,
    /// Output DOCX path
    pub output: PathBuf,
    /// Where to write the placeholder mapping
    pub map_path: PathBuf,
    /// Encrypt the mapping with this password; plain JSON when absent
    pub map_password: Option<String>,
    /// Entity categories to pseudonymize
    pub entity_types: Vec<EntityLabel>,
    /// Drop detector candidates below this confidence
    pub min_confidence: f64,
    /// Optional JSON report destination
    pub report_path: Option<PathBuf>,
}

/// Configuration for one restore run.
pub struct DeanonymizeConfig {
    /// Input (anonymized) DOCX path
    pub input: PathBuf,
    /// Output (restored) DOCX path
    pub output: PathBuf,
    /// Mapping file written by the anonymize run
    pub map_path: PathBuf,
    /// Password, when the mapping is encrypted
    pub map_password: Option<String>,
    /// Optional JSON report destination
    pub report_path: Option<PathBuf>,
}

/// Counters summarizing one operation.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingReport {
    /// Paragraphs whose text was scanned (whitespace-only ones are skipped)
    pub paragraphs_scanned: usize,
    /// Forward: entity occurrences replaced; reverse: placeholders restored
    pub entities_detected: usize,
    /// Run rewrites that changed text, one per replacement per touched run
    pub run_mutations_applied: usize,
}

impl ProcessingReport {
    fn new() -> Self {
        ProcessingReport {
            paragraphs_scanned: 0,
            entities_detected: 0,
            run_mutations_applied: 0,
        }
    }
}

// ─── Anonymize ───────────────────────────────────────────────────────────────

/// Replace every configured entity in `config.input` with a placeholder and
/// persist the mapping.
pub fn anonymize_docx(
    config: &AnonymizeConfig,
    detector: &dyn EntityDetector,
) -> Result<ProcessingReport> {
    if config.entity_types.is_empty() {
        return Err(PrivyError::Configuration(
            "no entity types requested".to_string(),
        ));
    }
    let allowed: HashSet<EntityLabel> = config.entity_types.iter().copied().collect();

    let mut package = DocxPackage::read(&config.input)?;
    let mut mapping = MappingData::new();
    let mut assigner = PlaceholderAssigner::new();
    let mut report = ProcessingReport::new();

    for part_name in package.text_part_names() {
        let xml = package.part_text(&part_name)?;
        let mut paragraphs = docx::scan_paragraphs(&xml);

        for para in &mut paragraphs {
            let text = para.text();
            if text.trim().is_empty() {
                continue;
            }
            report.paragraphs_scanned += 1;

            let candidates = detector.detect(&text)?;
            let selected = select_entities(candidates, &allowed, config.min_confidence);
            if selected.is_empty() {
                continue;
            }

            let chars: Vec<char> = text.chars().collect();
            let mut replacements = Vec::with_capacity(selected.len());
            for span in &selected {
                if span.end > chars.len() {
                    log::warn!(
                        "detector span {}..{} exceeds paragraph length {}",
                        span.start,
                        span.end,
                        chars.len()
                    );
                    continue;
                }
                // The mapping records what the document really says there,
                // not what the detector echoed back
                let original: String = chars[span.start..span.end].iter().collect();
                let placeholder = assigner.assign(span.label, &original, &mut mapping);
                replacements.push(SpanReplacement {
                    start: span.start,
                    end: span.end,
                    replacement: placeholder,
                });
            }
            report.entities_detected += replacements.len();
            report.run_mutations_applied += apply_replacements(&mut para.runs, &replacements)?;
        }

        let updated = docx::apply_paragraph_edits(&xml, &paragraphs);
        if updated != xml {
            package.set_part(&part_name, updated);
        }
    }

    log::info!(
        "anonymized {}: {} entities across {} paragraphs, {} placeholder ids",
        config.input.display(),
        report.entities_detected,
        report.paragraphs_scanned,
        mapping.len()
    );

    match config.map_password.as_deref() {
        Some(password) => mapping::save_encrypted_mapping(&mapping, &config.map_path, password)?,
        None => mapping::save_mapping(&mapping, &config.map_path)?,
    }
    package.write(&config.output)?;
    write_report(&report, config.report_path.as_deref())?;
    Ok(report)
}

// ─── Deanonymize ─────────────────────────────────────────────────────────────

/// Restore a previously anonymized document from its mapping.
pub fn deanonymize_docx(config: &DeanonymizeConfig) -> Result<ProcessingReport> {
    let mapping = match config.map_password.as_deref() {
        Some(password) => mapping::load_encrypted_mapping(&config.map_path, password)?,
        None => mapping::load_mapping(&config.map_path)?,
    };
    if mapping.is_empty() {
        return Err(PrivyError::Configuration(format!(
            "mapping {} has no placeholders",
            config.map_path.display()
        )));
    }

    let mut package = DocxPackage::read(&config.input)?;
    let mut report = ProcessingReport::new();

    for part_name in package.text_part_names() {
        let xml = package.part_text(&part_name)?;
        let mut paragraphs = docx::scan_paragraphs(&xml);

        for para in &mut paragraphs {
            let text = para.text();
            if text.trim().is_empty() {
                continue;
            }
            report.paragraphs_scanned += 1;

            let replacements = locate_placeholders(&text, &mapping);
            if replacements.is_empty() {
                continue;
            }
            report.entities_detected += replacements.len();
            report.run_mutations_applied += apply_replacements(&mut para.runs, &replacements)?;
        }

        let updated = docx::apply_paragraph_edits(&xml, &paragraphs);
        if updated != xml {
            package.set_part(&part_name, updated);
        }
    }

    log::info!(
        "restored {}: {} placeholders across {} paragraphs",
        config.input.display(),
        report.entities_detected,
        report.paragraphs_scanned
    );

    package.write(&config.output)?;
    write_report(&report, config.report_path.as_deref())?;
    Ok(report)
}

fn write_report(report: &ProcessingReport, path: Option<&Path>) -> Result<()> {
    let path = match path {
        Some(p) => p,
        None => return Ok(()),
    };
    let json = serde_json::to_vec_pretty(report)
        .map_err(|e| PrivyError::Format(format!("cannot serialize report: {e}")))?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| PrivyError::io(parent, e))?;
        }
    }
    std::fs::write(path, json).map_err(|e| PrivyError::io(path, e))
}

//! Reversibly pseudonymize DOCX documents from the command line.
//!
//! Usage:
//!   privy-docx anonymize contract.docx -o contract_anon.docx \
//!     [--map PATH] [--map-password PW] [--detector heuristic|command] \
//!     [--model-cmd CMD] [-e PERSON -e COMPANY] [--min-confidence 0.5] \
//!     [--report report.json]
//!   privy-docx deanonymize contract_anon.docx -o restored.docx --map PATH \
//!     [--map-password PW] [--report report.json]
//!   privy-docx models list
//!   privy-docx models validate [--detector DETECTOR] [--model-cmd CMD]
//!
//! The mapping password can also come from PRIVY_MAP_PASSWORD and the model
//! command from PRIVY_MODEL_CMD.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use privy_docx::detect::{available_detectors, build_detector, validate_detector};
use privy_docx::pipeline::{anonymize_docx, deanonymize_docx, AnonymizeConfig, DeanonymizeConfig};
use privy_docx::spans::EntityLabel;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(
    name = "privy-docx",
    about = "Reversible pseudonymization for DOCX documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replace sensitive entities with placeholders and write the mapping
    Anonymize {
        /// Input DOCX file
        input: PathBuf,

        /// Output DOCX file
        #[arg(short, long)]
        output: PathBuf,

        /// Mapping file (default: <output>.map.json, or .map.enc.json when encrypted)
        #[arg(long)]
        map: Option<PathBuf>,

        /// Encrypt the mapping with this password
        #[arg(long, env = "PRIVY_MAP_PASSWORD")]
        map_password: Option<String>,

        /// Detection backend: heuristic or command
        #[arg(long, default_value = "heuristic")]
        detector: String,

        /// External detector command (for the command backend)
        #[arg(long, env = "PRIVY_MODEL_CMD")]
        model_cmd: Option<String>,

        /// Entity type to pseudonymize (repeatable; default: PERSON, COMPANY, ADDRESS)
        #[arg(short = 'e', long = "entity-type")]
        entity_types: Vec<String>,

        /// Drop detector candidates below this confidence
        #[arg(long, default_value_t = 0.5)]
        min_confidence: f64,

        /// Write a JSON processing report here
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Restore a previously anonymized document from its mapping
    Deanonymize {
        /// Input (anonymized) DOCX file
        input: PathBuf,

        /// Output (restored) DOCX file
        #[arg(short, long)]
        output: PathBuf,

        /// Mapping file written by the anonymize run
        #[arg(long)]
        map: PathBuf,

        /// Password, when the mapping is encrypted
        #[arg(long, env = "PRIVY_MAP_PASSWORD")]
        map_password: Option<String>,

        /// Write a JSON processing report here
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Inspect detection backends
    #[command(subcommand)]
    Models(ModelsCommand),
}

#[derive(Subcommand)]
enum ModelsCommand {
    /// List the available detection backends
    List,

    /// Run a backend against a known sentence and print what it finds
    Validate {
        /// Detection backend: heuristic or command
        #[arg(long, default_value = "heuristic")]
        detector: String,

        /// External detector command (for the command backend)
        #[arg(long, env = "PRIVY_MODEL_CMD")]
        model_cmd: Option<String>,
    },
}

/// Refuse paths that do not end in .docx; everything downstream assumes the
/// WordprocessingML container.
fn check_docx_extension(path: &Path) -> Result<()> {
    let ok = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("docx"))
        .unwrap_or(false);
    if !ok {
        anyhow::bail!("{} is not a .docx path", path.display());
    }
    Ok(())
}

/// Parse -e values into labels; defaults to PERSON, COMPANY, ADDRESS.
fn resolve_entity_types(raw: &[String]) -> Result<Vec<EntityLabel>> {
    if raw.is_empty() {
        return Ok(vec![
            EntityLabel::Person,
            EntityLabel::Company,
            EntityLabel::Address,
        ]);
    }
    raw.iter()
        .map(|s| s.parse::<EntityLabel>().map_err(anyhow::Error::from))
        .collect()
}

/// Default mapping path: the output path plus a suffix.
fn default_map_path(output: &Path, encrypted: bool) -> PathBuf {
    let suffix = if encrypted { ".map.enc.json" } else { ".map.json" };
    let mut name = output.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Anonymize {
            input,
            output,
            map,
            map_password,
            detector,
            model_cmd,
            entity_types,
            min_confidence,
            report,
        } => {
            check_docx_extension(&input)?;
            check_docx_extension(&output)?;
            let labels = resolve_entity_types(&entity_types)?;
            let map_path = map.unwrap_or_else(|| default_map_path(&output, map_password.is_some()));
            let backend = build_detector(&detector, model_cmd.as_deref())?;

            let config = AnonymizeConfig {
                input: input.clone(),
                output: output.clone(),
                map_path: map_path.clone(),
                map_password,
                entity_types: labels,
                min_confidence,
                report_path: report,
            };
            let summary = anonymize_docx(&config, backend.as_ref())
                .with_context(|| format!("Failed to anonymize {}", input.display()))?;

            println!("Anonymized {} -> {}", input.display(), output.display());
            println!("  {} paragraphs scanned", summary.paragraphs_scanned);
            println!("  {} entities replaced", summary.entities_detected);
            println!("  {} run rewrites applied", summary.run_mutations_applied);
            println!("  mapping: {}", map_path.display());
            Ok(())
        }

        Commands::Deanonymize {
            input,
            output,
            map,
            map_password,
            report,
        } => {
            check_docx_extension(&input)?;
            check_docx_extension(&output)?;

            let config = DeanonymizeConfig {
                input: input.clone(),
                output: output.clone(),
                map_path: map,
                map_password,
                report_path: report,
            };
            let summary = deanonymize_docx(&config)
                .with_context(|| format!("Failed to restore {}", input.display()))?;

            println!("Restored {} -> {}", input.display(), output.display());
            println!("  {} paragraphs scanned", summary.paragraphs_scanned);
            println!("  {} placeholders restored", summary.entities_detected);
            println!("  {} run rewrites applied", summary.run_mutations_applied);
            Ok(())
        }

        Commands::Models(ModelsCommand::List) => {
            println!("Available detection backends:");
            for name in available_detectors() {
                println!("  {}", name);
            }
            Ok(())
        }

        Commands::Models(ModelsCommand::Validate {
            detector,
            model_cmd,
        }) => {
            let backend = build_detector(&detector, model_cmd.as_deref())?;
            let spans = validate_detector(backend.as_ref())
                .with_context(|| format!("Backend '{}' failed validation", detector))?;
            println!(
                "Backend '{}' is working: {} entities in the sample sentence",
                detector,
                spans.len()
            );
            for span in &spans {
                println!(
                    "  {} {}..{} \"{}\" ({:.2})",
                    span.label, span.start, span.end, span.text, span.confidence
                );
            }
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    run(cli)
}

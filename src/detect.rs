//! Entity detection backends.
//!
//! The engine treats detection as a single capability: hand in one
//! paragraph of text, get candidate spans back. Two backends ship here: a
//! conservative regex heuristic that needs no setup, and an adapter that
//! pipes the text through an external command speaking a one-shot JSON
//! protocol, which is how heavyweight NER models are plugged in without
//! linking them into this process.

use crate::error::{PrivyError, Result};
use crate::spans::{normalize_label, EntityLabel, EntitySpan};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::io::{Read, Write};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// How long a command backend may run for one paragraph before it is killed.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// A detection backend. Offsets in returned spans are character offsets
/// into `text`.
pub trait EntityDetector {
    /// Backend name, for listings and reports.
    fn name(&self) -> &str;

    /// Candidate entity spans for one paragraph of text.
    fn detect(&self, text: &str) -> Result<Vec<EntitySpan>>;
}

// ─── Heuristic backend ───────────────────────────────────────────────────────

lazy_static! {
    // Two capitalized words: catches most Western-style full names and
    // plenty of false positives, hence the low confidence.
    static ref PERSON_RE: Regex =
        Regex::new(r"\b[A-Z][a-z]+\s+[A-Z][a-z]+\b").expect("invalid regex");
    // Up to four capitalized tokens ending in a legal-entity suffix
    static ref COMPANY_RE: Regex = Regex::new(
        r"\b(?:[A-Z][\w&.-]*\s+){0,3}[A-Z][\w&.-]*\s(?:Inc|LLC|Ltd|Corporation|Corp|GmbH|s\.r\.o\.)\b"
    )
    .expect("invalid regex");
    // House number plus capitalized street name plus a street-type suffix
    static ref ADDRESS_RE: Regex = Regex::new(
        r"\b\d{1,5}\s+[A-Z][A-Za-z0-9.'-]*(?:\s+[A-Z][A-Za-z0-9.'-]*){0,5}\s(?:Street|St|Road|Rd|Avenue|Ave|Boulevard|Blvd|Drive|Dr|Lane|Ln|Way|Court|Ct)\b"
    )
    .expect("invalid regex");
    static ref EMAIL_RE: Regex =
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("invalid regex");
    static ref PHONE_RE: Regex = Regex::new(
        r"\b(?:\+?\d{1,3}[\s.-]?)?(?:\(?\d{3}\)?[\s.-]?)\d{3}[\s.-]?\d{4}\b"
    )
    .expect("invalid regex");
}

/// Pattern-based backend: obvious emails, phone numbers, street addresses,
/// capitalized name pairs, and company suffixes. No setup, no network, and
/// deliberately conservative confidences.
pub struct HeuristicDetector;

impl EntityDetector for HeuristicDetector {
    fn name(&self) -> &str {
        "heuristic"
    }

    fn detect(&self, text: &str) -> Result<Vec<EntitySpan>> {
        let mut spans = Vec::new();
        push_matches(&mut spans, &PERSON_RE, EntityLabel::Person, 0.65, text);
        push_matches(&mut spans, &COMPANY_RE, EntityLabel::Company, 0.85, text);
        push_matches(&mut spans, &ADDRESS_RE, EntityLabel::Address, 0.8, text);
        push_matches(&mut spans, &EMAIL_RE, EntityLabel::Email, 0.95, text);
        push_matches(&mut spans, &PHONE_RE, EntityLabel::Phone, 0.9, text);
        Ok(spans)
    }
}

fn push_matches(
    spans: &mut Vec<EntitySpan>,
    re: &Regex,
    label: EntityLabel,
    confidence: f64,
    text: &str,
) {
    for m in re.find_iter(text) {
        // Regex reports byte offsets; spans carry character offsets
        let start = text[..m.start()].chars().count();
        let end = start + m.as_str().chars().count();
        spans.push(EntitySpan {
            start,
            end,
            label,
            text: m.as_str().to_string(),
            confidence,
        });
    }
}

// ─── Command backend ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct DetectRequest<'a> {
    text: &'a str,
}

/// External-process backend. The command is spawned once per paragraph,
/// receives `{"text": ...}` on stdin, and must print either
/// `{"entities": [...]}` or a bare JSON array of entities on stdout.
///
/// Each entity needs integer `start`/`end` character offsets and a `label`;
/// `text` and `confidence` are optional. Malformed entities are dropped
/// with a warning, never fatal, and an object without an `entities` key
/// counts as an empty result. A command that exits non-zero, prints
/// something other than JSON, or outlives its timeout is a
/// [`PrivyError::Detector`].
pub struct CommandDetector {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandDetector {
    /// Build from a command line, split on whitespace.
    pub fn new(command_line: &str) -> Result<Self> {
        let command: Vec<String> = command_line
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if command.is_empty() {
            return Err(PrivyError::Configuration(
                "model command is empty".to_string(),
            ));
        }
        Ok(CommandDetector {
            command,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl EntityDetector for CommandDetector {
    fn name(&self) -> &str {
        "command"
    }

    fn detect(&self, text: &str) -> Result<Vec<EntitySpan>> {
        // Not worth a process spawn
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let payload = serde_json::to_string(&DetectRequest { text })
            .map_err(|e| PrivyError::Detector(format!("cannot encode request: {e}")))?;

        let child = Command::new(&self.command[0])
            .args(&self.command[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                PrivyError::Detector(format!("cannot spawn '{}': {e}", self.command[0]))
            })?;

        let output = wait_with_timeout(child, payload.into_bytes(), self.timeout, &self.command[0])?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PrivyError::Detector(format!(
                "'{}' exited with {}: {}",
                self.command[0],
                output.status,
                stderr.trim()
            )));
        }

        let value: serde_json::Value = serde_json::from_slice(&output.stdout).map_err(|e| {
            PrivyError::Detector(format!("'{}' printed invalid JSON: {e}", self.command[0]))
        })?;
        let entities = match &value {
            serde_json::Value::Array(items) => items.as_slice(),
            serde_json::Value::Object(map) => match map.get("entities") {
                // A missing key is a model that found nothing
                None => &[],
                Some(serde_json::Value::Array(items)) => items.as_slice(),
                Some(_) => {
                    return Err(PrivyError::Detector(format!(
                        "'{}' entities field is not an array",
                        self.command[0]
                    )))
                }
            },
            _ => {
                return Err(PrivyError::Detector(format!(
                    "'{}' response is neither an object nor an array",
                    self.command[0]
                )))
            }
        };

        let text_len = text.chars().count();
        let mut spans = Vec::new();
        for item in entities {
            match normalize_entity(item, text, text_len) {
                Some(span) => spans.push(span),
                None => log::warn!("dropping malformed detector entity: {item}"),
            }
        }
        Ok(spans)
    }
}

/// Validate one raw entity from a command backend. Anything missing or
/// out of range disqualifies the entity, not the whole response.
fn normalize_entity(
    value: &serde_json::Value,
    text: &str,
    text_len: usize,
) -> Option<EntitySpan> {
    let obj = value.as_object()?;
    let start = obj.get("start")?.as_u64()? as usize;
    let end = obj.get("end")?.as_u64()? as usize;
    if end <= start || end > text_len {
        return None;
    }
    let label = normalize_label(obj.get("label")?.as_str()?)?;
    let confidence = obj
        .get("confidence")
        .and_then(|v| v.as_f64())
        .unwrap_or(1.0);
    let span_text = match obj.get("text").and_then(|v| v.as_str()) {
        Some(s) => s.to_string(),
        None => text.chars().skip(start).take(end - start).collect(),
    };
    Some(EntitySpan {
        start,
        end,
        label,
        text: span_text,
        confidence,
    })
}

/// Feed the child its stdin and wait for it to exit, killing it once the
/// timeout elapses. All three pipes are serviced on worker threads so a
/// child that never reads its input, or floods an output pipe, cannot
/// stall the deadline; past it the threads are abandoned to finish on
/// their own as the pipes close.
fn wait_with_timeout(
    mut child: Child,
    input: Vec<u8>,
    timeout: Duration,
    name: &str,
) -> Result<Output> {
    let mut stdin_pipe = child.stdin.take();
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    // Never joined; when the reader dies first the write ends in a broken
    // pipe and the exit status tells the real story.
    let _stdin_writer = thread::spawn(move || {
        if let Some(ref mut pipe) = stdin_pipe {
            let _ = pipe.write_all(&input);
        }
    });
    let stdout_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(ref mut pipe) = stdout_pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    });
    let stderr_handle = thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(ref mut pipe) = stderr_pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    });

    let deadline = Instant::now() + timeout;
    let waited = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Ok(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    break Err(PrivyError::Detector(format!(
                        "'{}' timed out after {:?}",
                        name, timeout
                    )));
                }
                thread::sleep(Duration::from_millis(20));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                break Err(PrivyError::Detector(format!(
                    "waiting for '{}' failed: {e}",
                    name
                )));
            }
        }
    };

    let status = waited?;
    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();
    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

// ─── Backend registry ────────────────────────────────────────────────────────

/// Names of the built-in backends.
pub fn available_detectors() -> Vec<&'static str> {
    vec!["heuristic", "command"]
}

/// Instantiate a backend by name.
pub fn build_detector(name: &str, model_cmd: Option<&str>) -> Result<Box<dyn EntityDetector>> {
    match name {
        "heuristic" => Ok(Box::new(HeuristicDetector)),
        "command" => {
            let cmd = model_cmd.ok_or_else(|| {
                PrivyError::Configuration(
                    "the command backend needs a model command (--model-cmd or PRIVY_MODEL_CMD)"
                        .to_string(),
                )
            })?;
            Ok(Box::new(CommandDetector::new(cmd)?))
        }
        other => Err(PrivyError::Configuration(format!(
            "unknown detector backend '{other}'"
        ))),
    }
}

/// Run a backend against a fixed sample sentence and return what it reports.
pub fn validate_detector(detector: &dyn EntityDetector) -> Result<Vec<EntitySpan>> {
    detector.detect("Jane Doe works at Acme LLC.")
}

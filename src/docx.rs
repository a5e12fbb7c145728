//! DOCX container adapter.
//!
//! A .docx file is a zip of XML parts; visible text lives in `<w:t>`
//! elements inside `<w:p>` paragraphs, split into runs wherever formatting
//! changes. This module reads the package, exposes each paragraph as a list
//! of mutable run texts, and writes back only the `<w:t>` contents that
//! changed. Everything else in the package, formatting properties
//! included, keeps its original bytes.

use crate::error::{PrivyError, Result};
use crate::splice::RunText;
use lazy_static::lazy_static;
use regex::Regex;
use std::io::{Read, Write};
use std::path::Path;

/// The main body part. Processed before headers and footers so placeholder
/// numbering follows the reading order.
pub const DOCUMENT_PART: &str = "word/document.xml";

lazy_static! {
    // Open tags (possibly self-closing) and close tags of w:p elements
    static ref P_TAG_RE: Regex = Regex::new(r"<w:p(?: [^>]*)?/?>|</w:p>").expect("invalid regex");
    static ref WT_RE: Regex =
        Regex::new(r"<w:t(?: [^>]*)?>([^<]*)</w:t>").expect("invalid regex");
}

// ─── Package I/O ─────────────────────────────────────────────────────────────

/// An in-memory DOCX package: the zip entries in their original order.
pub struct DocxPackage {
    entries: Vec<(String, Vec<u8>)>,
}

impl DocxPackage {
    /// Read a package into ordered (entry name, bytes) pairs.
    pub fn read(path: &Path) -> Result<DocxPackage> {
        let file = std::fs::File::open(path).map_err(|e| PrivyError::io(path, e))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| {
            PrivyError::Docx(format!("{} is not a DOCX package: {e}", path.display()))
        })?;
        let mut entries = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| {
                PrivyError::Docx(format!("cannot read entry {i} of {}: {e}", path.display()))
            })?;
            let name = entry.name().to_string();
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| PrivyError::io(path, e))?;
            entries.push((name, data));
        }
        if !entries.iter().any(|(name, _)| name == DOCUMENT_PART) {
            return Err(PrivyError::Docx(format!(
                "{} has no {DOCUMENT_PART}",
                path.display()
            )));
        }
        Ok(DocxPackage { entries })
    }

    /// Write the package back out, creating parent directories as needed.
    /// Media entries are stored uncompressed and everything else deflated,
    /// the layout Word itself produces.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| PrivyError::io(parent, e))?;
            }
        }
        let file = std::fs::File::create(path).map_err(|e| PrivyError::io(path, e))?;
        let mut zip = zip::ZipWriter::new(file);
        let deflated = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        let stored = zip::write::SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored);
        for (name, data) in &self.entries {
            let opts = if name.starts_with("word/media/") {
                stored
            } else {
                deflated
            };
            zip.start_file(name.as_str(), opts)
                .map_err(|e| PrivyError::Docx(format!("cannot start entry {name}: {e}")))?;
            zip.write_all(data).map_err(|e| PrivyError::io(path, e))?;
        }
        zip.finish()
            .map_err(|e| PrivyError::Docx(format!("cannot finish {}: {e}", path.display())))?;
        Ok(())
    }

    /// Names of the text-bearing parts: the main document first, then
    /// headers and footers in name order.
    pub fn text_part_names(&self) -> Vec<String> {
        let mut names = vec![DOCUMENT_PART.to_string()];
        let mut extras: Vec<String> = self
            .entries
            .iter()
            .filter(|(name, _)| is_header_or_footer(name))
            .map(|(name, _)| name.clone())
            .collect();
        extras.sort();
        names.extend(extras);
        names
    }

    /// Decode one part as UTF-8 XML.
    pub fn part_text(&self, name: &str) -> Result<String> {
        let (_, data) = self
            .entries
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| PrivyError::Docx(format!("no part named {name}")))?;
        String::from_utf8(data.clone())
            .map_err(|_| PrivyError::Docx(format!("part {name} is not UTF-8")))
    }

    /// Replace one part's bytes.
    pub fn set_part(&mut self, name: &str, xml: String) {
        if let Some((_, data)) = self.entries.iter_mut().find(|(n, _)| n == name) {
            *data = xml.into_bytes();
        }
    }
}

fn is_header_or_footer(name: &str) -> bool {
    (name.starts_with("word/header") || name.starts_with("word/footer")) && name.ends_with(".xml")
}

// ─── Paragraph and run scanning ──────────────────────────────────────────────

/// One `<w:t>` element: its decoded text plus where its pieces live in the
/// part XML, so changed text can be written back in place.
pub struct TextRun {
    /// Byte range of the element content within the part.
    content_start: usize,
    content_end: usize,
    /// Whether the open tag already carries an xml:space attribute.
    has_space_attr: bool,
    original: String,
    text: String,
}

impl RunText for TextRun {
    fn text(&self) -> &str {
        &self.text
    }

    fn set_text(&mut self, text: String) {
        self.text = text;
    }
}

/// One paragraph's runs, in document order.
pub struct Paragraph {
    pub runs: Vec<TextRun>,
}

impl Paragraph {
    /// The paragraph's logical text: run texts concatenated in order.
    pub fn text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }
}

/// Byte ranges of the outermost `<w:p>` elements.
///
/// Paragraphs nested inside another paragraph (text-box content) fold into
/// their enclosing range, so every run belongs to exactly one unit.
/// Self-closing `<w:p/>` elements carry no text and are skipped.
fn paragraph_ranges(xml: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    for m in P_TAG_RE.find_iter(xml) {
        let tag = m.as_str();
        if tag.starts_with("</") {
            if let Some(start) = stack.pop() {
                if stack.is_empty() {
                    ranges.push((start, m.end()));
                }
            }
        } else if !tag.ends_with("/>") {
            stack.push(m.start());
        }
    }
    ranges
}

/// Split a part's XML into paragraphs of decoded text runs.
pub fn scan_paragraphs(xml: &str) -> Vec<Paragraph> {
    paragraph_ranges(xml)
        .into_iter()
        .map(|(p_start, p_end)| {
            let runs = WT_RE
                .captures_iter(&xml[p_start..p_end])
                .filter_map(|caps| {
                    let whole = caps.get(0)?;
                    let content = caps.get(1)?;
                    let open_tag = &xml[p_start + whole.start()..p_start + content.start()];
                    let decoded = unescape_xml(content.as_str());
                    Some(TextRun {
                        content_start: p_start + content.start(),
                        content_end: p_start + content.end(),
                        has_space_attr: open_tag.contains("xml:space"),
                        original: decoded.clone(),
                        text: decoded,
                    })
                })
                .collect();
            Paragraph { runs }
        })
        .collect()
}

/// Write changed run texts back into the part XML.
///
/// Only `<w:t>` contents are rewritten, right to left so pending offsets
/// stay valid. A rewritten run whose text now starts or ends with
/// whitespace gains `xml:space="preserve"`, otherwise Word trims it.
pub fn apply_paragraph_edits(xml: &str, paragraphs: &[Paragraph]) -> String {
    let mut edits: Vec<(usize, usize, String)> = Vec::new();
    for para in paragraphs {
        for run in &para.runs {
            if run.text == run.original {
                continue;
            }
            edits.push((run.content_start, run.content_end, escape_xml(&run.text)));
            if !run.has_space_attr && needs_space_attr(&run.text) {
                let at = run.content_start - 1;
                edits.push((at, at, " xml:space=\"preserve\"".to_string()));
            }
        }
    }
    edits.sort_by(|a, b| b.0.cmp(&a.0));

    let mut out = xml.to_string();
    for (start, end, replacement) in edits {
        out.replace_range(start..end, &replacement);
    }
    out
}

fn needs_space_attr(text: &str) -> bool {
    text.starts_with(char::is_whitespace) || text.ends_with(char::is_whitespace)
}

// ─── XML text escaping ───────────────────────────────────────────────────────

/// Escape the characters that must not appear literally in XML text.
pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Decode the five predefined XML entities plus numeric character
/// references. Unrecognized entities are kept literally.
pub fn unescape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    loop {
        let amp = match rest.find('&') {
            Some(pos) => pos,
            None => {
                out.push_str(rest);
                return out;
            }
        };
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match rest.find(';') {
            Some(semi) => match decode_entity(&rest[1..semi]) {
                Some(ch) => {
                    out.push(ch);
                    rest = &rest[semi + 1..];
                }
                None => {
                    out.push('&');
                    rest = &rest[1..];
                }
            },
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = if let Some(hex) = num.strip_prefix('x').or_else(|| num.strip_prefix('X')) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                num.parse::<u32>().ok()?
            };
            char::from_u32(code)
        }
    }
}

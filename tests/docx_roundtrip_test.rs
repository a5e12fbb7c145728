//! End-to-end tests over real .docx containers: anonymize a document built
//! from known WordprocessingML, check what landed in the output package, then
//! restore it and compare against the source text paragraph by paragraph.

use privy_docx::detect::HeuristicDetector;
use privy_docx::docx::scan_paragraphs;
use privy_docx::mapping::{load_mapping, save_mapping, MappingData};
use privy_docx::pipeline::{
    anonymize_docx, deanonymize_docx, AnonymizeConfig, DeanonymizeConfig,
};
use privy_docx::{EntityLabel, PrivyError};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const CONTENT_TYPES_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="xml" ContentType="application/xml"/></Types>"#
);

// A body exercising the interesting shapes: a full name split across a bold
// and a plain run, a self-closing paragraph, an empty run, a role-prefixed
// sentence, a repeated name, and a span that ends mid-run.
const DOCUMENT_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    "<w:body>",
    r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">John </w:t></w:r>"#,
    "<w:r><w:t>Doe</w:t></w:r>",
    r#"<w:r><w:t xml:space="preserve"> signs for Acme LLC.</w:t></w:r></w:p>"#,
    "<w:p/>",
    "<w:p><w:r><w:t></w:t></w:r></w:p>",
    "<w:p><w:r><w:t>THE CONSULTANT: John Smith, residing at 123 Main Street.</w:t></w:r></w:p>",
    "<w:p><w:r><w:t>John Doe again.</w:t></w:r></w:p>",
    r#"<w:p><w:r><w:t xml:space="preserve">see John </w:t></w:r><w:r><w:t>Doe today</w:t></w:r></w:p>"#,
    "</w:body></w:document>"
);

const HEADER_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:hdr xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    "<w:p><w:r><w:t>Acme LLC confidential</w:t></w:r></w:p>",
    "</w:hdr>"
);

const LOGO_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0, 0, 1];

fn write_docx(path: &Path, parts: &[(&str, &[u8])]) {
    let file = fs::File::create(path).unwrap();
    let mut writer = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in parts {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
}

fn build_fixture(path: &Path) {
    write_docx(
        path,
        &[
            ("[Content_Types].xml", CONTENT_TYPES_XML.as_bytes()),
            ("word/document.xml", DOCUMENT_XML.as_bytes()),
            ("word/header1.xml", HEADER_XML.as_bytes()),
            ("word/media/logo.png", LOGO_BYTES),
        ],
    );
}

fn read_part(path: &Path, name: &str) -> Vec<u8> {
    let file = fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut buf = Vec::new();
    entry.read_to_end(&mut buf).unwrap();
    buf
}

fn part_string(path: &Path, name: &str) -> String {
    String::from_utf8(read_part(path, name)).unwrap()
}

fn paragraph_texts(xml: &str) -> Vec<String> {
    scan_paragraphs(xml).iter().map(|p| p.text()).collect()
}

fn anonymize_config(dir: &Path) -> (AnonymizeConfig, PathBuf, PathBuf, PathBuf) {
    let input = dir.join("contract.docx");
    let output = dir.join("contract.anon.docx");
    let map_path = dir.join("contract.anon.docx.map.json");
    let config = AnonymizeConfig {
        input: input.clone(),
        output: output.clone(),
        map_path: map_path.clone(),
        map_password: None,
        entity_types: vec![
            EntityLabel::Person,
            EntityLabel::Company,
            EntityLabel::Address,
        ],
        min_confidence: 0.5,
        report_path: Some(dir.join("report.json")),
    };
    (config, input, output, map_path)
}

#[test]
fn test_anonymize_then_restore_round_trip() {
    let dir = tempdir().unwrap();
    let (config, input, output, map_path) = anonymize_config(dir.path());
    build_fixture(&input);

    let report = anonymize_docx(&config, &HeuristicDetector).unwrap();
    // the self-closing and the empty paragraph are not scanned
    assert_eq!(report.paragraphs_scanned, 5);
    assert_eq!(report.entities_detected, 7);
    // one rewrite per replacement per touched run; the role sentence's
    // single run takes two
    assert_eq!(report.run_mutations_applied, 9);

    let anon_doc = part_string(&output, "word/document.xml");
    assert_eq!(
        paragraph_texts(&anon_doc),
        vec![
            "PERSON_001 signs for COMPANY_001.",
            "",
            "THE CONSULTANT: PERSON_002, residing at ADDRESS_001.",
            "PERSON_001 again.",
            "see PERSON_001 today",
        ]
    );
    // no original value may survive in the document part
    assert!(!anon_doc.contains("John"));
    assert!(!anon_doc.contains("Acme"));
    assert!(!anon_doc.contains("Main Street"));

    // the placeholder inherits the bold run; the drained run stays in place
    assert!(anon_doc.contains(concat!(
        r#"<w:rPr><w:b/></w:rPr><w:t xml:space="preserve">PERSON_001</w:t></w:r>"#,
        "<w:r><w:t></w:t></w:r>"
    )));
    // the suffix left behind in the second run gained xml:space
    assert!(anon_doc.contains(r#"<w:t xml:space="preserve"> today</w:t>"#));
    assert!(anon_doc.contains("<w:p/>"));

    let anon_header = part_string(&output, "word/header1.xml");
    assert!(anon_header.contains("COMPANY_001 confidential"));
    assert!(!anon_header.contains("Acme"));

    // untouched binary parts come through byte for byte
    assert_eq!(read_part(&output, "word/media/logo.png"), LOGO_BYTES);

    // document body is processed before headers, so body entities get the
    // low ids; order on disk is minting order
    let mapping = load_mapping(&map_path).unwrap();
    let ids: Vec<&String> = mapping.placeholders.keys().collect();
    assert_eq!(
        ids,
        vec!["PERSON_001", "COMPANY_001", "PERSON_002", "ADDRESS_001"]
    );
    assert_eq!(mapping.placeholders["PERSON_001"].original, "John Doe");
    assert_eq!(mapping.placeholders["PERSON_002"].original, "John Smith");
    assert_eq!(mapping.placeholders["COMPANY_001"].original, "Acme LLC");
    assert_eq!(
        mapping.placeholders["ADDRESS_001"].original,
        "123 Main Street"
    );
    assert_eq!(mapping.placeholders["ADDRESS_001"].label, "ADDRESS");

    let report_json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join("report.json")).unwrap()).unwrap();
    assert_eq!(report_json["entities_detected"], 7);

    // now restore into a third file
    let restored_path = dir.path().join("contract.restored.docx");
    let restore = deanonymize_docx(&DeanonymizeConfig {
        input: output.clone(),
        output: restored_path.clone(),
        map_path: map_path.clone(),
        map_password: None,
        report_path: None,
    })
    .unwrap();
    assert_eq!(restore.paragraphs_scanned, 5);
    assert_eq!(restore.entities_detected, 7);
    assert_eq!(restore.run_mutations_applied, 7);

    let restored_doc = part_string(&restored_path, "word/document.xml");
    assert_eq!(
        paragraph_texts(&restored_doc),
        paragraph_texts(DOCUMENT_XML)
    );
    // the restored name sits in the run that opened the span, still bold,
    // and no run attribute changed anywhere
    assert!(restored_doc.contains(concat!(
        r#"<w:rPr><w:b/></w:rPr><w:t xml:space="preserve">John Doe</w:t></w:r>"#,
        "<w:r><w:t></w:t></w:r>"
    )));
    // paragraphs whose spans stayed inside one run restore byte for byte
    assert!(restored_doc
        .contains("<w:t>THE CONSULTANT: John Smith, residing at 123 Main Street.</w:t>"));
    assert!(restored_doc.contains("<w:t>John Doe again.</w:t>"));

    // the header had a single-run span, so the whole part restores exactly
    assert_eq!(part_string(&restored_path, "word/header1.xml"), HEADER_XML);
    assert_eq!(read_part(&restored_path, "word/media/logo.png"), LOGO_BYTES);
}

#[test]
fn test_round_trip_with_encrypted_mapping() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("contract.docx");
    let output = dir.path().join("contract.anon.docx");
    let map_path = dir.path().join("contract.anon.docx.map.enc.json");
    build_fixture(&input);

    let config = AnonymizeConfig {
        input: input.clone(),
        output: output.clone(),
        map_path: map_path.clone(),
        map_password: Some("hunter2".to_string()),
        entity_types: vec![EntityLabel::Person, EntityLabel::Company],
        min_confidence: 0.5,
        report_path: None,
    };
    anonymize_docx(&config, &HeuristicDetector).unwrap();

    // the mapping on disk is an encrypted record, not plain JSON
    let raw = fs::read_to_string(&map_path).unwrap();
    assert!(raw.contains("ciphertext"));
    assert!(!raw.contains("John Doe"));

    let restored_path = dir.path().join("contract.restored.docx");
    let wrong = deanonymize_docx(&DeanonymizeConfig {
        input: output.clone(),
        output: restored_path.clone(),
        map_path: map_path.clone(),
        map_password: Some("letmein".to_string()),
        report_path: None,
    })
    .unwrap_err();
    assert!(matches!(wrong, PrivyError::Integrity(_)), "got {wrong:?}");
    // nothing may be written when the password is rejected
    assert!(!restored_path.exists());

    deanonymize_docx(&DeanonymizeConfig {
        input: output,
        output: restored_path.clone(),
        map_path,
        map_password: Some("hunter2".to_string()),
        report_path: None,
    })
    .unwrap();
    let restored_doc = part_string(&restored_path, "word/document.xml");
    assert_eq!(
        paragraph_texts(&restored_doc),
        paragraph_texts(DOCUMENT_XML)
    );
}

#[test]
fn test_deanonymize_rejects_an_empty_mapping() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("contract.docx");
    let map_path = dir.path().join("empty.map.json");
    build_fixture(&input);
    save_mapping(&MappingData::new(), &map_path).unwrap();

    let err = deanonymize_docx(&DeanonymizeConfig {
        input,
        output: dir.path().join("out.docx"),
        map_path,
        map_password: None,
        report_path: None,
    })
    .unwrap_err();
    assert!(matches!(err, PrivyError::Configuration(_)), "got {err:?}");
}

#[test]
fn test_package_without_document_part_is_rejected() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("hollow.docx");
    write_docx(&input, &[("[Content_Types].xml", CONTENT_TYPES_XML.as_bytes())]);

    let (mut config, _input, _output, _map) = anonymize_config(dir.path());
    config.input = input;

    let err = anonymize_docx(&config, &HeuristicDetector).unwrap_err();
    assert!(matches!(err, PrivyError::Docx(_)), "got {err:?}");
}

#[test]
fn test_nothing_is_written_when_detection_fails() {
    struct FailingDetector;
    impl privy_docx::detect::EntityDetector for FailingDetector {
        fn name(&self) -> &str {
            "failing"
        }
        fn detect(&self, _text: &str) -> privy_docx::Result<Vec<privy_docx::EntitySpan>> {
            Err(PrivyError::Detector("model went away".to_string()))
        }
    }

    let dir = tempdir().unwrap();
    let (config, input, output, map_path) = anonymize_config(dir.path());
    build_fixture(&input);

    let err = anonymize_docx(&config, &FailingDetector).unwrap_err();
    assert!(matches!(err, PrivyError::Detector(_)), "got {err:?}");
    // the operation is atomic: no partial document, no mapping
    assert!(!output.exists());
    assert!(!map_path.exists());
}

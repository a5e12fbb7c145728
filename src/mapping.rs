//! Mapping persistence: the placeholder dictionary that makes an anonymized
//! document restorable, stored as plain JSON or password-encrypted JSON.
//!
//! The encrypted form derives an AES-256-GCM key from the password with
//! PBKDF2-HMAC-SHA256 (390,000 iterations over a fresh 16-byte salt), so a
//! leaked mapping file is useless without the password and any tampering is
//! caught by the cipher's authentication tag.

use crate::error::{PrivyError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use indexmap::IndexMap;
use ring::rand::SecureRandom;
use ring::{aead, pbkdf2, rand};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::path::Path;

/// On-disk record version.
pub const MAPPING_VERSION: u32 = 1;
/// PBKDF2 iteration count used when writing encrypted mappings. Reads honor
/// whatever count the record declares.
pub const PBKDF2_ITERATIONS: u32 = 390_000;
/// KDF identifier stored in encrypted records.
pub const KDF_NAME: &str = "pbkdf2-sha256";

const SALT_LEN: usize = 16;
const KEY_LEN: usize = 32;

// ─── Data model ──────────────────────────────────────────────────────────────

/// One placeholder's entity label and exact original text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    pub label: String,
    pub original: String,
}

/// The placeholder dictionary for one anonymized document.
///
/// Entries keep the order they were minted in, and that order is preserved
/// on disk so repeated runs produce diffable files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingData {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub created_at: String,
    pub placeholders: IndexMap<String, MappingEntry>,
}

fn default_version() -> u32 {
    MAPPING_VERSION
}

impl MappingData {
    /// Fresh, empty dictionary stamped with the current time.
    pub fn new() -> Self {
        MappingData {
            version: MAPPING_VERSION,
            created_at: chrono::Utc::now().to_rfc3339(),
            placeholders: IndexMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.placeholders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placeholders.is_empty()
    }

    /// Record a newly minted placeholder.
    pub fn insert(&mut self, placeholder_id: String, entry: MappingEntry) {
        self.placeholders.insert(placeholder_id, entry);
    }
}

impl Default for MappingData {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Plain storage ───────────────────────────────────────────────────────────

/// Write the dictionary to `path` as plain JSON, creating parent directories
/// as needed.
pub fn save_mapping(mapping: &MappingData, path: &Path) -> Result<()> {
    let bytes = to_json(mapping)?;
    write_file(path, &bytes)
}

/// Read a plain JSON dictionary from `path`.
pub fn load_mapping(path: &Path) -> Result<MappingData> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| PrivyError::Format(format!("cannot read mapping {}: {e}", path.display())))?;
    parse_mapping(&raw, path)
}

fn to_json(mapping: &MappingData) -> Result<Vec<u8>> {
    serde_json::to_vec_pretty(mapping)
        .map_err(|e| PrivyError::Format(format!("cannot serialize mapping: {e}")))
}

fn parse_mapping(raw: &str, path: &Path) -> Result<MappingData> {
    serde_json::from_str(raw).map_err(|e| {
        PrivyError::Format(format!(
            "mapping {} is not a valid mapping record: {e}",
            path.display()
        ))
    })
}

// ─── Encrypted storage ───────────────────────────────────────────────────────

/// On-disk shape of an encrypted mapping file. `ciphertext` holds the GCM
/// nonce followed by the sealed plain record.
#[derive(Serialize, Deserialize)]
struct EncryptedRecord {
    version: u32,
    kdf: String,
    iterations: u32,
    salt: String,
    ciphertext: String,
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> Result<[u8; KEY_LEN]> {
    let iterations = NonZeroU32::new(iterations).ok_or_else(|| {
        PrivyError::Format("encrypted mapping declares zero KDF iterations".to_string())
    })?;
    let mut key = [0u8; KEY_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        salt,
        password.as_bytes(),
        &mut key,
    );
    Ok(key)
}

/// Encrypt the dictionary with `password` and write it to `path`.
pub fn save_encrypted_mapping(mapping: &MappingData, path: &Path, password: &str) -> Result<()> {
    let plaintext = to_json(mapping)?;

    let rng = rand::SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| PrivyError::Crypto("system randomness unavailable".to_string()))?;
    let mut nonce_bytes = [0u8; aead::NONCE_LEN];
    rng.fill(&mut nonce_bytes)
        .map_err(|_| PrivyError::Crypto("system randomness unavailable".to_string()))?;

    let key = derive_key(password, &salt, PBKDF2_ITERATIONS)?;
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, &key)
        .map_err(|_| PrivyError::Crypto("cannot build sealing key".to_string()))?;
    let sealing = aead::LessSafeKey::new(unbound);

    let mut sealed = plaintext;
    sealing
        .seal_in_place_append_tag(
            aead::Nonce::assume_unique_for_key(nonce_bytes),
            aead::Aad::empty(),
            &mut sealed,
        )
        .map_err(|_| PrivyError::Crypto("sealing the mapping failed".to_string()))?;

    let mut payload = Vec::with_capacity(aead::NONCE_LEN + sealed.len());
    payload.extend_from_slice(&nonce_bytes);
    payload.extend_from_slice(&sealed);

    let record = EncryptedRecord {
        version: MAPPING_VERSION,
        kdf: KDF_NAME.to_string(),
        iterations: PBKDF2_ITERATIONS,
        salt: BASE64.encode(salt),
        ciphertext: BASE64.encode(&payload),
    };
    let bytes = serde_json::to_vec_pretty(&record)
        .map_err(|e| PrivyError::Format(format!("cannot serialize encrypted mapping: {e}")))?;
    write_file(path, &bytes)
}

/// Load and decrypt a dictionary written by [`save_encrypted_mapping`].
///
/// Wrong passwords and tampered ciphertext both fail authentication and
/// surface as [`PrivyError::Integrity`]; a record that cannot even be parsed
/// is a [`PrivyError::Format`].
pub fn load_encrypted_mapping(path: &Path, password: &str) -> Result<MappingData> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| PrivyError::Format(format!("cannot read mapping {}: {e}", path.display())))?;
    let record: EncryptedRecord = serde_json::from_str(&raw).map_err(|e| {
        PrivyError::Format(format!(
            "mapping {} is not a valid encrypted record: {e}",
            path.display()
        ))
    })?;

    if record.kdf != KDF_NAME {
        return Err(PrivyError::Format(format!(
            "unsupported KDF '{}' in {}",
            record.kdf,
            path.display()
        )));
    }

    let salt = BASE64
        .decode(&record.salt)
        .map_err(|e| PrivyError::Format(format!("bad salt encoding in {}: {e}", path.display())))?;
    let payload = BASE64.decode(&record.ciphertext).map_err(|e| {
        PrivyError::Format(format!(
            "bad ciphertext encoding in {}: {e}",
            path.display()
        ))
    })?;
    if payload.len() < aead::NONCE_LEN + aead::AES_256_GCM.tag_len() {
        return Err(PrivyError::Format(format!(
            "ciphertext in {} is truncated",
            path.display()
        )));
    }

    let key = derive_key(password, &salt, record.iterations)?;
    let unbound = aead::UnboundKey::new(&aead::AES_256_GCM, &key)
        .map_err(|_| PrivyError::Crypto("cannot build opening key".to_string()))?;
    let opening = aead::LessSafeKey::new(unbound);

    let (nonce_bytes, sealed) = payload.split_at(aead::NONCE_LEN);
    let nonce = aead::Nonce::try_assume_unique_for_key(nonce_bytes)
        .map_err(|_| PrivyError::Format(format!("bad nonce in {}", path.display())))?;

    let mut in_out = sealed.to_vec();
    let plaintext = opening
        .open_in_place(nonce, aead::Aad::empty(), &mut in_out)
        .map_err(|_| {
            PrivyError::Integrity(format!(
                "cannot decrypt {}: wrong password or corrupted file",
                path.display()
            ))
        })?;

    let text = std::str::from_utf8(plaintext).map_err(|_| {
        PrivyError::Integrity(format!(
            "decrypted mapping {} is not UTF-8",
            path.display()
        ))
    })?;
    parse_mapping(text, path)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| PrivyError::io(parent, e))?;
        }
    }
    std::fs::write(path, bytes).map_err(|e| PrivyError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_survives_serialization() {
        let mut mapping = MappingData::new();
        mapping.insert(
            "PERSON_001".to_string(),
            MappingEntry {
                label: "PERSON".to_string(),
                original: "Jane Doe".to_string(),
            },
        );
        mapping.insert(
            "COMPANY_001".to_string(),
            MappingEntry {
                label: "COMPANY".to_string(),
                original: "Acme LLC".to_string(),
            },
        );
        mapping.insert(
            "PERSON_002".to_string(),
            MappingEntry {
                label: "PERSON".to_string(),
                original: "Bob Carr".to_string(),
            },
        );

        let json = String::from_utf8(to_json(&mapping).unwrap()).unwrap();
        let p1 = json.find("PERSON_001").unwrap();
        let c1 = json.find("COMPANY_001").unwrap();
        let p2 = json.find("PERSON_002").unwrap();
        assert!(p1 < c1 && c1 < p2, "entries serialized out of order");

        let reloaded: MappingData = serde_json::from_str(&json).unwrap();
        let ids: Vec<&String> = reloaded.placeholders.keys().collect();
        assert_eq!(ids, vec!["PERSON_001", "COMPANY_001", "PERSON_002"]);
    }

    #[test]
    fn test_missing_created_at_is_tolerated() {
        let json = r#"{"placeholders": {"PERSON_001": {"label": "PERSON", "original": "Jane Doe"}}}"#;
        let mapping: MappingData = serde_json::from_str(json).unwrap();
        assert_eq!(mapping.version, MAPPING_VERSION);
        assert_eq!(mapping.created_at, "");
        assert_eq!(mapping.len(), 1);
    }
}

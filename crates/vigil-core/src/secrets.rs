//! Encryption of the secret fields of the agent configuration.
//!
//! A key file holds arbitrary high-entropy text. The passphrase is derived from
//! its contents with HKDF-SHA256, and secrets are sealed with ChaCha20-Poly1305
//! using a random nonce stored in front of the ciphertext.

use std::fmt;
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::Sha256;

use crate::files::{change_owner, Ownership};

const HKDF_INFO: &[u8] = b"vigil:agent-secrets";
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_FILE_MODE: u32 = 0o600;

/// Symmetric key derived from a key file.
#[derive(Clone)]
pub struct Passphrase([u8; 32]);

impl Passphrase {
    /// Derive a passphrase from raw key material.
    pub fn derive(material: &[u8]) -> Result<Self> {
        let hk = Hkdf::<Sha256>::new(None, material);
        let mut okm = [0u8; 32];
        hk.expand(HKDF_INFO, &mut okm)
            .map_err(|e| anyhow::anyhow!("passphrase derivation failed: {e}"))?;
        Ok(Self(okm))
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(..)")
    }
}

/// Sealed secret: `nonce || ciphertext || tag`. Serialized as base64 text.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Ciphertext(Vec<u8>);

impl Ciphertext {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(&self.0)
    }

    pub fn from_base64(text: &str) -> Result<Self> {
        let bytes = general_purpose::STANDARD
            .decode(text.trim())
            .context("ciphertext is not valid base64")?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ciphertext({} bytes)", self.0.len())
    }
}

impl Serialize for Ciphertext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for Ciphertext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Ciphertext::from_base64(&text).map_err(serde::de::Error::custom)
    }
}

/// Read a key file and derive the passphrase that protects the secrets.
pub fn get_passphrase(key_file: &Path) -> Result<Passphrase> {
    let contents = std::fs::read_to_string(key_file)
        .with_context(|| format!("failed to read key file '{}'", key_file.display()))?;
    let material = contents.trim();
    if material.is_empty() {
        anyhow::bail!("key file '{}' is empty", key_file.display());
    }
    Passphrase::derive(material.as_bytes())
}

pub fn encrypt_data(plaintext: &[u8], passphrase: &Passphrase) -> Result<Ciphertext> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&passphrase.0));
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let sealed = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| anyhow::anyhow!("encryption failed"))?;

    let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(Ciphertext(out))
}

pub fn decrypt_data(ciphertext: &Ciphertext, passphrase: &Passphrase) -> Result<Vec<u8>> {
    let bytes = ciphertext.as_bytes();
    if bytes.len() < NONCE_LEN + TAG_LEN {
        anyhow::bail!("ciphertext too short ({} bytes)", bytes.len());
    }
    let (nonce, sealed) = bytes.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&passphrase.0));
    cipher
        .decrypt(Nonce::from_slice(nonce), sealed)
        .map_err(|_| anyhow::anyhow!("decryption failed: wrong key file or corrupted data"))
}

/// Create a new key file with random content. Refuses to overwrite.
pub fn generate_key_file(path: &Path, ownership: &Ownership) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory '{}'", parent.display()))?;
    }

    let key = ChaCha20Poly1305::generate_key(&mut OsRng);
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(KEY_FILE_MODE)
        .open(path)
        .with_context(|| format!("failed to create key file '{}'", path.display()))?;
    writeln!(file, "{}", general_purpose::STANDARD.encode(key))?;

    change_owner(path, ownership, KEY_FILE_MODE)
}

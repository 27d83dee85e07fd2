//! Chapter payload crypto: AES-128-CBC framing used by the origin service.
//!
//! Every encrypted blob on the wire is `base64(iv(16) || ciphertext)` with
//! PKCS#7 padding. The key registration payload is sealed under a fixed
//! bootstrap key; chapter bodies are sealed under the negotiated session key
//! and gzip-compressed before encryption.
//!
//! - [`session`] - Key-exchange handshake against the registration endpoint

mod session;

pub use session::{CryptoSession, DeviceParams};

use aes::Aes128;
use base64::{Engine, engine::general_purpose::STANDARD};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, block_padding::Pkcs7};
use std::collections::HashMap;
use std::io::Read;

use crate::error::AcquisitionError;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// AES block and IV length in bytes
pub const BLOCK_LEN: usize = 16;

// Kept in pieces so the key never appears as a single literal.
const BOOTSTRAP_KEY_PARTS: [&str; 8] = [
    "ac25", "c67d", "dd8f", "38c1", "b37a", "2348", "828e", "222e",
];

/// A raw 16-byte AES key
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SessionKey([u8; BLOCK_LEN]);

impl SessionKey {
    /// Wrap raw key bytes
    pub fn from_bytes(bytes: [u8; BLOCK_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a key from its hex form; the decoded key must be exactly 16 bytes
    pub fn from_hex(hex_key: &str) -> Result<Self, AcquisitionError> {
        let bytes = hex::decode(hex_key)
            .map_err(|e| AcquisitionError::Handshake(format!("key is not hex: {e}")))?;
        Self::from_slice(&bytes)
    }

    /// Copy a key out of a byte slice; the slice must be exactly 16 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, AcquisitionError> {
        let key: [u8; BLOCK_LEN] = bytes.try_into().map_err(|_| {
            AcquisitionError::Handshake(format!(
                "key length mismatch: expected {BLOCK_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(key))
    }

    /// The fixed key the registration payload and response are sealed under
    pub fn bootstrap() -> Self {
        let joined: String = BOOTSTRAP_KEY_PARTS.concat();
        let mut key = [0u8; BLOCK_LEN];
        for (i, byte) in key.iter_mut().enumerate() {
            let pair = &joined[i * 2..i * 2 + 2];
            // Every part is a literal hex constant above.
            *byte = u8::from_str_radix(pair, 16).unwrap_or_default();
        }
        Self(key)
    }

    /// Lowercase hex form of the key
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Raw key bytes
    pub fn as_bytes(&self) -> &[u8; BLOCK_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(<redacted>)")
    }
}

/// AES-128-CBC with PKCS#7 padding and `iv || ciphertext` framing
#[derive(Clone, Debug)]
pub struct PayloadCipher {
    key: SessionKey,
}

impl PayloadCipher {
    /// Create a cipher for the given key
    pub fn new(key: SessionKey) -> Self {
        Self { key }
    }

    /// Encrypt with an explicit IV, returning ciphertext only
    pub fn encrypt(&self, plaintext: &[u8], iv: &[u8; BLOCK_LEN]) -> Vec<u8> {
        Aes128CbcEnc::new(self.key.as_bytes().into(), iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
    }

    /// Decrypt an `iv || ciphertext` frame and strip the padding
    pub fn decrypt(&self, framed: &[u8]) -> Result<Vec<u8>, AcquisitionError> {
        if framed.len() < BLOCK_LEN * 2 || framed.len() % BLOCK_LEN != 0 {
            return Err(AcquisitionError::Decrypt(format!(
                "frame of {} bytes is not iv plus whole blocks",
                framed.len()
            )));
        }
        let (iv, ciphertext) = framed.split_at(BLOCK_LEN);
        Aes128CbcDec::new_from_slices(self.key.as_bytes(), iv)
            .map_err(|e| AcquisitionError::Decrypt(format!("cipher init: {e}")))?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|e| AcquisitionError::Decrypt(format!("bad padding: {e}")))
    }

    /// Encrypt under a fresh random IV and return `base64(iv || ciphertext)`
    pub fn seal(&self, plaintext: &[u8]) -> String {
        let iv: [u8; BLOCK_LEN] = rand::random();
        let mut framed = Vec::with_capacity(BLOCK_LEN * 2 + plaintext.len());
        framed.extend_from_slice(&iv);
        framed.extend_from_slice(&self.encrypt(plaintext, &iv));
        STANDARD.encode(framed)
    }

    /// Decode `base64(iv || ciphertext)` and decrypt it
    pub fn open(&self, encoded: &str) -> Result<Vec<u8>, AcquisitionError> {
        let framed = STANDARD
            .decode(encoded.trim())
            .map_err(|e| AcquisitionError::Decrypt(format!("invalid base64: {e}")))?;
        self.decrypt(&framed)
    }

    /// Open a chapter payload: decrypt, then gunzip into UTF-8 text
    pub fn open_chapter(&self, encoded: &str) -> Result<String, AcquisitionError> {
        let compressed = self.open(encoded)?;
        let mut text = String::new();
        flate2::read::GzDecoder::new(compressed.as_slice())
            .read_to_string(&mut text)
            .map_err(|e| AcquisitionError::Decrypt(format!("gzip: {e}")))?;
        Ok(text)
    }

    /// Open every entry of a batch independently
    ///
    /// A failing entry yields an `Err` for that chapter id only.
    pub fn open_batch<'a, I>(&self, payloads: I) -> HashMap<String, Result<String, AcquisitionError>>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        payloads
            .into_iter()
            .map(|(chapter_id, encoded)| (chapter_id.clone(), self.open_chapter(encoded)))
            .collect()
    }
}

/// Build the 16-byte `(device_id: u64 LE, value: u64 LE)` registration
/// payload and seal it under the bootstrap key.
///
/// Both inputs must be non-negative decimal integers.
pub fn register_key_content(server_device_id: &str, value: &str) -> Result<String, AcquisitionError> {
    let device = parse_unsigned(server_device_id, "server_device_id")?;
    let value = parse_unsigned(value, "value")?;

    let mut payload = [0u8; BLOCK_LEN];
    payload[..8].copy_from_slice(&device.to_le_bytes());
    payload[8..].copy_from_slice(&value.to_le_bytes());

    Ok(PayloadCipher::new(SessionKey::bootstrap()).seal(&payload))
}

fn parse_unsigned(raw: &str, field: &str) -> Result<u64, AcquisitionError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AcquisitionError::Handshake(format!(
            "{field} must be a non-negative integer, got {raw:?}"
        )));
    }
    raw.parse::<u64>()
        .map_err(|e| AcquisitionError::Handshake(format!("{field} out of range: {e}")))
}

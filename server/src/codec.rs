//! Authenticated encryption for at-rest match records.
//!
//! ChaCha20-Poly1305 with a fresh random 96-bit nonce per seal. The sealed
//! form keeps the nonce, ciphertext and auth tag as separate base64 fields so
//! a record can be stored or shipped as plain JSON. The codec is pure given
//! its key and never exposes the key (no Debug, no accessor).

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{AeadCore, ChaCha20Poly1305, Key, Nonce};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// An encrypted record: nonce, ciphertext and auth tag, each base64.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedRecord {
    pub iv: String,
    pub ciphertext: String,
    pub tag: String,
}

pub struct SecureCodec {
    cipher: ChaCha20Poly1305,
}

impl SecureCodec {
    pub fn new(key: &[u8; 32]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Encrypt any serializable value under a fresh random nonce.
    pub fn seal<T: Serialize>(&self, value: &T) -> Result<SealedRecord, CodecError> {
        let plaintext = serde_json::to_vec(value)?;
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let sealed = self
            .cipher
            .encrypt(&nonce, plaintext.as_ref())
            .map_err(|_| CodecError::Verification)?;
        // The AEAD output is ciphertext || tag; keep them as separate fields.
        let split = sealed.len() - TAG_LEN;
        Ok(SealedRecord {
            iv: B64.encode(nonce),
            ciphertext: B64.encode(&sealed[..split]),
            tag: B64.encode(&sealed[split..]),
        })
    }

    /// Decrypt and deserialize a sealed record. Fails on malformed fields or
    /// when the auth tag does not verify.
    pub fn open<T: DeserializeOwned>(&self, record: &SealedRecord) -> Result<T, CodecError> {
        let iv = B64
            .decode(&record.iv)
            .map_err(|_| CodecError::Malformed("iv is not valid base64"))?;
        if iv.len() != NONCE_LEN {
            return Err(CodecError::Malformed("iv must be 12 bytes"));
        }
        let tag = B64
            .decode(&record.tag)
            .map_err(|_| CodecError::Malformed("tag is not valid base64"))?;
        if tag.len() != TAG_LEN {
            return Err(CodecError::Malformed("tag must be 16 bytes"));
        }
        let mut sealed = B64
            .decode(&record.ciphertext)
            .map_err(|_| CodecError::Malformed("ciphertext is not valid base64"))?;
        sealed.extend_from_slice(&tag);

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&iv), sealed.as_ref())
            .map_err(|_| CodecError::Verification)?;
        Ok(serde_json::from_slice(&plaintext)?)
    }
}

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use openssl::symm::{Cipher, encrypt_aead, decrypt_aead};
use ring::rand::{SecureRandom, SystemRandom};

use crate::ciphers::errors::*;
use crate::ciphers::encoding::{to_url_safe, from_url_safe};

// length of key material for AES-256-GCM
pub const KEY_LEN: usize = 32;
// initialisation vector length expected by the consuming application
pub const IV_LEN: usize = 16;
// length of the GCM authentication tag
pub const TAG_LEN: usize = 16;

pub const MIN_ENVELOPE_LEN: usize = IV_LEN + TAG_LEN;

/// Seals `plain_text` with AES-256-GCM under a fresh random IV and returns the
/// url-safe base64 envelope `iv | cipher text | tag`.
pub fn seal(plain_text: &str, key: &[u8]) -> Result<String, SealError> {
    if key.len() != KEY_LEN {
        return Err(SealError::KeyLength);
    }
    let mut iv = [0u8; IV_LEN];
    SystemRandom::new().fill(&mut iv)
        .or(Err(SealError::Random))?;
    let mut tag = [0u8; TAG_LEN];
    let cipher_text = encrypt_aead(Cipher::aes_256_gcm(), key, Some(&iv), &[], plain_text.as_bytes(), &mut tag)
        .map_err(|e| {
            error!("Encryption error: {}", e);
            SealError::Cipher
        })?;
    let mut envelope = Vec::with_capacity(IV_LEN + cipher_text.len() + TAG_LEN);
    envelope.extend_from_slice(&iv);
    envelope.extend_from_slice(&cipher_text);
    envelope.extend_from_slice(&tag);
    Ok(to_url_safe(&B64.encode(&envelope)))
}

/// Opens an envelope produced by [`seal`].
///
/// Every failure after the key length check collapses into
/// `OpenError::DecryptFailure` so callers cannot tell a bad tag from bad
/// encoding.
pub fn open(envelope: &str, key: &[u8]) -> Result<String, OpenError> {
    if key.len() != KEY_LEN {
        return Err(OpenError::KeyLength);
    }
    let data = B64.decode(from_url_safe(envelope))
        .or(Err(OpenError::DecryptFailure))?;
    if data.len() < MIN_ENVELOPE_LEN {
        return Err(OpenError::DecryptFailure);
    }
    let (iv, rest) = data.split_at(IV_LEN);
    let (cipher_text, tag) = rest.split_at(rest.len() - TAG_LEN);
    let plain_text = decrypt_aead(Cipher::aes_256_gcm(), key, Some(iv), &[], cipher_text, tag)
        .or(Err(OpenError::DecryptFailure))?;
    String::from_utf8(plain_text)
        .or(Err(OpenError::DecryptFailure))
}

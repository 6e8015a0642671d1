use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use openssl::symm::{Cipher, Crypter, Mode};

use crate::ciphers::encoding::from_url_safe;
use crate::ciphers::envelope::KEY_LEN;

// national prefix every upstream identifier starts with
pub const IDENTIFIER_PREFIX: &str = "92";

const BLOCK_LEN: usize = 16;

/// Decodes an identifier produced by the upstream system with AES-256-ECB and
/// no padding, keyed by the raw UTF-8 bytes of `key`.
///
/// ECB offers no integrity, so this must only ever see upstream values. Any
/// failure, including a plaintext that is not a well-formed identifier, yields
/// `None`.
pub fn decode_legacy(cipher_text: &str, key: &str) -> Option<String> {
    let key = key.as_bytes();
    if key.len() != KEY_LEN {
        warn!("Legacy key must be {} bytes", KEY_LEN);
        return None;
    }
    let data = B64.decode(from_url_safe(cipher_text.trim())).ok()?;
    if data.is_empty() || data.len() % BLOCK_LEN != 0 {
        return None;
    }
    let plain_text = ecb_decrypt(&data, key)
        .map_err(|e| debug!("Legacy decryption error: {}", e))
        .ok()?;
    let identifier = strip_control_characters(&String::from_utf8_lossy(&plain_text));
    if is_valid_identifier(&identifier) {
        Some(identifier)
    } else {
        None
    }
}

fn ecb_decrypt(data: &[u8], key: &[u8]) -> Result<Vec<u8>, openssl::error::ErrorStack> {
    let cipher = Cipher::aes_256_ecb();
    let mut crypter = Crypter::new(cipher, Mode::Decrypt, key, None)?;
    crypter.pad(false);
    let mut plain_text = vec![0; data.len() + cipher.block_size()];
    let mut len = crypter.update(data, &mut plain_text)?;
    len += crypter.finalize(&mut plain_text[len..])?;
    plain_text.truncate(len);
    Ok(plain_text)
}

/// Removes C0 and C1 control characters (U+0000–U+001F, U+007F–U+009F).
///
/// This is a cleanup heuristic for the zero/garbage bytes the upstream leaves
/// in its last block, not padding removal: an identifier that genuinely
/// contained such characters would be altered.
pub fn strip_control_characters(text: &str) -> String {
    text.chars()
        .filter(|&c| !matches!(c, '\u{0}'..='\u{1f}' | '\u{7f}'..='\u{9f}'))
        .collect()
}

pub fn is_valid_identifier(identifier: &str) -> bool {
    identifier.starts_with(IDENTIFIER_PREFIX)
        && identifier.len() > IDENTIFIER_PREFIX.len()
        && identifier.bytes().all(|b| b.is_ascii_digit())
}


#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "MSISDNENMSISDNENMSISDNENMSISDNEN";

    fn ecb_encrypt(plain_text: &[u8], key: &str) -> String {
        let cipher = Cipher::aes_256_ecb();
        let mut crypter = Crypter::new(cipher, Mode::Encrypt, key.as_bytes(), None).unwrap();
        crypter.pad(false);
        let mut cipher_text = vec![0; plain_text.len() + cipher.block_size()];
        let mut len = crypter.update(plain_text, &mut cipher_text).unwrap();
        len += crypter.finalize(&mut cipher_text[len..]).unwrap();
        cipher_text.truncate(len);
        B64.encode(&cipher_text)
    }

    #[test]
    fn upstream_vector() {
        assert_eq!(decode_legacy("yuWlCR7wsIofB2v6GXHseg==", KEY).as_deref(), Some("923086094856"));
        // url-safe transport of the same value
        assert_eq!(decode_legacy("yuWlCR7wsIofB2v6GXHseg~~", KEY).as_deref(), Some("923086094856"));
    }

    #[test]
    fn wrong_key() {
        assert_eq!(decode_legacy("yuWlCR7wsIofB2v6GXHseg==", "msisdnenmsisdnenmsisdnenmsisdnen"), None);
        assert_eq!(decode_legacy("yuWlCR7wsIofB2v6GXHseg==", "MSISDNEN"), None);
    }

    #[test]
    fn malformed() {
        assert_eq!(decode_legacy("", KEY), None);
        assert_eq!(decode_legacy("%%%", KEY), None);
        // not a whole number of blocks
        assert_eq!(decode_legacy(&B64.encode([1u8; 15]), KEY), None);
    }

    #[test]
    fn format_mismatch() {
        let cipher_text = ecb_encrypt(b"123086094856\0\0\0\0", KEY);
        assert_eq!(decode_legacy(&cipher_text, KEY), None);
        let cipher_text = ecb_encrypt(b"92308609485abc\0\0", KEY);
        assert_eq!(decode_legacy(&cipher_text, KEY), None);
        let cipher_text = ecb_encrypt(b"923000000000001\x01", KEY);
        assert_eq!(decode_legacy(&cipher_text, KEY).as_deref(), Some("923000000000001"));
    }

    #[test]
    fn control_characters() {
        assert_eq!(strip_control_characters("92\u{0}30\u{1f}86\u{7f}09\u{85}4856\u{9f}"), "923086094856");
        assert_eq!(strip_control_characters("92 30\u{a0}"), "92 30\u{a0}");
        assert!(is_valid_identifier("923086094856"));
        assert!(!is_valid_identifier("92"));
        assert!(!is_valid_identifier("03086094856"));
    }
}

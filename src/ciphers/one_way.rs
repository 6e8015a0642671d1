use std::fmt::{Debug, Formatter, Result as FormatResult};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use openssl::encrypt::Encrypter;
use openssl::hash::MessageDigest;
use openssl::pkey::{Id, PKey, Public};
use openssl::rsa::{Rsa, Padding};

use crate::ciphers::errors::*;

// OAEP with SHA-256: 2 * digest length + 2
pub const OAEP_OVERHEAD: usize = 2 * 32 + 2;

/// RSA public key used to produce tokens only the private key holder can open.
pub struct PublicKey {
    key: PKey<Public>,
}

impl PublicKey {
    /// Accepts SPKI (`BEGIN PUBLIC KEY`) and PKCS#1 (`BEGIN RSA PUBLIC KEY`) encodings.
    pub fn from_pem<T>(pem: T) -> Result<PublicKey, PublicKeyError> where T: AsRef<[u8]> {
        let pem = pem.as_ref();
        let key = PKey::public_key_from_pem(pem)
            .or_else(|_| Rsa::public_key_from_pem_pkcs1(pem).and_then(PKey::from_rsa))
            .or(Err(PublicKeyError::Pem))?;
        if key.id() != Id::RSA {
            return Err(PublicKeyError::NotRsa);
        }
        Ok(PublicKey { key })
    }

    #[inline]
    pub fn modulus_len(&self) -> usize {
        self.key.size() as usize
    }

    #[inline]
    pub fn max_plain_text_len(&self) -> usize {
        self.modulus_len().saturating_sub(OAEP_OVERHEAD)
    }
}

impl Debug for PublicKey {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        write!(f, "PublicKey(RSA-{})", self.modulus_len() * 8)
    }
}

/// Encrypts `plain_text` with RSA-OAEP (SHA-256 digest and MGF1) and returns
/// standard base64. There is deliberately no matching decrypt here.
pub fn seal_one_way(plain_text: &str, public_key: &PublicKey) -> Result<String, OneWayError> {
    let data = plain_text.as_bytes();
    if data.len() > public_key.max_plain_text_len() {
        return Err(OneWayError::PayloadTooLarge);
    }
    let cipher_text = oaep_encrypt(data, &public_key.key)
        .map_err(|e| {
            error!("Encryption error: {}", e);
            OneWayError::Cipher
        })?;
    Ok(B64.encode(&cipher_text))
}

fn oaep_encrypt(data: &[u8], key: &PKey<Public>) -> Result<Vec<u8>, openssl::error::ErrorStack> {
    let mut encrypter = Encrypter::new(key)?;
    encrypter.set_rsa_padding(Padding::PKCS1_OAEP)?;
    encrypter.set_rsa_oaep_md(MessageDigest::sha256())?;
    encrypter.set_rsa_mgf1_md(MessageDigest::sha256())?;
    let mut cipher_text = vec![0; encrypter.encrypt_len(data)?];
    let len = encrypter.encrypt(data, &mut cipher_text)?;
    cipher_text.truncate(len);
    Ok(cipher_text)
}


#[cfg(test)]
mod tests {
    use super::*;

    use openssl::encrypt::Decrypter;
    use openssl::pkey::Private;

    lazy_static! {
        // the private half stays in tests, standing in for the remote key holder
        static ref TEST_KEY: Rsa<Private> = Rsa::generate(2048).expect("cannot generate RSA key");
    }

    fn public_key() -> PublicKey {
        let pem = TEST_KEY.public_key_to_pem().unwrap();
        PublicKey::from_pem(pem).unwrap()
    }

    fn private_decrypt(token: &str) -> Vec<u8> {
        let key = PKey::from_rsa(TEST_KEY.clone()).unwrap();
        let cipher_text = B64.decode(token).unwrap();
        let mut decrypter = Decrypter::new(&key).unwrap();
        decrypter.set_rsa_padding(Padding::PKCS1_OAEP).unwrap();
        decrypter.set_rsa_oaep_md(MessageDigest::sha256()).unwrap();
        decrypter.set_rsa_mgf1_md(MessageDigest::sha256()).unwrap();
        let mut plain_text = vec![0; decrypter.decrypt_len(&cipher_text).unwrap()];
        let len = decrypter.decrypt(&cipher_text, &mut plain_text).unwrap();
        plain_text.truncate(len);
        plain_text
    }

    #[test]
    fn pem_formats() {
        assert!(PublicKey::from_pem(TEST_KEY.public_key_to_pem().unwrap()).is_ok());
        let result = PublicKey::from_pem(TEST_KEY.public_key_to_pem_pkcs1().unwrap());
        assert!(result.is_ok(), "{:?}", result);
        assert_eq!(result.unwrap().max_plain_text_len(), 190);
        assert_eq!(PublicKey::from_pem("not a key").err(), Some(PublicKeyError::Pem));
        // private keys are not accepted as public keys
        assert!(PublicKey::from_pem(TEST_KEY.private_key_to_pem().unwrap()).is_err());
    }

    #[test]
    fn only_private_key_opens() {
        let public_key = public_key();
        let token = seal_one_way("923086094856", &public_key);
        assert!(token.is_ok(), "{:?}", token);
        let token = token.unwrap();
        assert_eq!(B64.decode(&token).unwrap().len(), 256);
        assert_eq!(private_decrypt(&token), b"923086094856");

        // randomised padding
        let other = seal_one_way("923086094856", &public_key).unwrap();
        assert_ne!(token, other);
        assert_eq!(private_decrypt(&other), b"923086094856");
    }

    #[test]
    fn payload_bounds() {
        let public_key = public_key();
        let largest = "9".repeat(190);
        let token = seal_one_way(&largest, &public_key).unwrap();
        assert_eq!(private_decrypt(&token), largest.as_bytes());
        assert_eq!(seal_one_way(&"9".repeat(191), &public_key), Err(OneWayError::PayloadTooLarge));
    }
}

use std::fmt::{Debug, Formatter, Result as FormatResult};

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use zeroize::Zeroizing;

use crate::ciphers::{self, PublicKey, KEY_LEN};
use crate::ciphers::errors::{SealError, OpenError, OneWayError};
use crate::config::Config;
use crate::error::ConfigurationError;

/// Key material loaded once at startup and only read afterwards.
pub struct SecretManager {
    key: Zeroizing<[u8; KEY_LEN]>,
    public_key: Option<PublicKey>,
    legacy_key: Option<Zeroizing<String>>,
}

impl SecretManager {
    pub fn from_config(config: &Config) -> Result<SecretManager, ConfigurationError> {
        let secret = config.encryption_secret.as_deref()
            .ok_or(ConfigurationError::MissingSecret)?;
        let public_key = match &config.rsa_public_key {
            Some(pem) => Some(PublicKey::from_pem(pem.trim())
                .map_err(|e| {
                    error!("Cannot load RSA public key: {}", e);
                    ConfigurationError::InvalidPublicKey
                })?),
            None => None,
        };
        let manager = SecretManager::new(secret, public_key, config.legacy_key.clone())?;
        info!(
            "Secrets loaded: one-way cipher {}, legacy decoder {}",
            if manager.public_key.is_some() { "enabled" } else { "disabled" },
            if manager.legacy_key.is_some() { "enabled" } else { "disabled" },
        );
        Ok(manager)
    }

    /// `secret` is the standard base64 form of exactly 32 bytes.
    pub fn new(secret: &str, public_key: Option<PublicKey>, legacy_key: Option<String>) -> Result<SecretManager, ConfigurationError> {
        let decoded = Zeroizing::new(B64.decode(secret.trim()).or(Err(ConfigurationError::InvalidSecret))?);
        if decoded.len() != KEY_LEN {
            return Err(ConfigurationError::InvalidSecret);
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(&decoded);
        Ok(SecretManager {
            key,
            public_key,
            legacy_key: legacy_key.map(Zeroizing::new),
        })
    }

    #[inline]
    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    #[inline]
    pub fn has_legacy_key(&self) -> bool {
        self.legacy_key.is_some()
    }

    pub fn seal(&self, plain_text: &str) -> Result<String, SealError> {
        ciphers::seal(plain_text, &self.key[..])
    }

    pub fn open(&self, envelope: &str) -> Result<String, OpenError> {
        ciphers::open(envelope, &self.key[..])
    }

    pub fn seal_one_way(&self, plain_text: &str) -> Result<String, OneWayError> {
        let public_key = self.public_key.as_ref().ok_or(OneWayError::MissingKey)?;
        ciphers::seal_one_way(plain_text, public_key)
    }

    /// `None` when no legacy key is configured or the value does not decode.
    pub fn decode_legacy(&self, cipher_text: &str) -> Option<String> {
        let legacy_key = self.legacy_key.as_ref()?;
        ciphers::decode_legacy(cipher_text, legacy_key)
    }
}

impl Debug for SecretManager {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        f.debug_struct("SecretManager")
            .field("key", &"<redacted>")
            .field("public_key", &self.public_key)
            .field("legacy_key", &self.legacy_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

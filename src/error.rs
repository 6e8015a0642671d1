use std::error::Error;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::io::Error as IoError;

use redis::RedisError;

use crate::ciphers::errors::{SealError, OpenError, OneWayError};
use crate::staging::StorageError;
use crate::upstream::UpstreamError;
use crate::validation::ValidationError;

/// Startup failure; the process must not serve requests after one of these.
#[derive(Debug)]
pub enum ConfigurationError {
    MissingSecret,
    InvalidSecret,
    InvalidPublicKey,
    MissingStoreCredentials,
    InvalidNumber(&'static str),
    InvalidUrl(&'static str),
    Io(IoError),
    Store(RedisError),
}

impl Error for ConfigurationError {}

impl Display for ConfigurationError {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        match self {
            ConfigurationError::MissingSecret => write!(f, "ENCRYPTION_SECRET_KEY is not set"),
            ConfigurationError::InvalidSecret => write!(f, "ENCRYPTION_SECRET_KEY must be base64 encoded 32 bytes"),
            ConfigurationError::InvalidPublicKey => write!(f, "RSA public key cannot be parsed"),
            ConfigurationError::MissingStoreCredentials => write!(f, "REDIS_USERNAME and REDIS_PASSWORD are required outside development"),
            ConfigurationError::InvalidNumber(name) => write!(f, "{} must be a positive number", name),
            ConfigurationError::InvalidUrl(name) => write!(f, "{} is not a valid url", name),
            ConfigurationError::Io(err) => write!(f, "IO error {}", err),
            ConfigurationError::Store(err) => write!(f, "Staging store error {}", err),
        }
    }
}

impl From<IoError> for ConfigurationError {
    fn from(err: IoError) -> ConfigurationError {
        ConfigurationError::Io(err)
    }
}

impl From<RedisError> for ConfigurationError {
    fn from(err: RedisError) -> ConfigurationError {
        ConfigurationError::Store(err)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoError {
    Seal(SealError),
    Open(OpenError),
    OneWay(OneWayError),
    // upstream cipher text that does not decode to a well-formed identifier
    Legacy,
}

impl Error for CryptoError {}

impl Display for CryptoError {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        match self {
            CryptoError::Seal(err) => write!(f, "Seal error {}", err),
            CryptoError::Open(err) => write!(f, "Open error {}", err),
            CryptoError::OneWay(err) => write!(f, "One-way error {}", err),
            CryptoError::Legacy => write!(f, "Legacy identifier rejected"),
        }
    }
}

impl From<SealError> for CryptoError {
    fn from(err: SealError) -> CryptoError {
        CryptoError::Seal(err)
    }
}

impl From<OpenError> for CryptoError {
    fn from(err: OpenError) -> CryptoError {
        CryptoError::Open(err)
    }
}

impl From<OneWayError> for CryptoError {
    fn from(err: OneWayError) -> CryptoError {
        CryptoError::OneWay(err)
    }
}

#[derive(Debug)]
pub enum HandoffError {
    Configuration(ConfigurationError),
    Validation(ValidationError),
    Crypto(CryptoError),
    Storage(StorageError),
    Upstream(UpstreamError),
}

impl HandoffError {
    /// Message that may be shown to whoever sent the request.
    ///
    /// Validation reasons are passed through; everything else is generic.
    pub fn public_message(&self) -> String {
        match self {
            HandoffError::Validation(err) => err.to_string(),
            HandoffError::Crypto(CryptoError::Seal(_)) |
            HandoffError::Crypto(CryptoError::OneWay(_)) => "Failed to encrypt data".to_owned(),
            HandoffError::Crypto(CryptoError::Open(_)) |
            HandoffError::Crypto(CryptoError::Legacy) => "Failed to decrypt data".to_owned(),
            HandoffError::Configuration(_) |
            HandoffError::Storage(_) |
            HandoffError::Upstream(_) => "Internal server error".to_owned(),
        }
    }
}

impl Error for HandoffError {}

impl Display for HandoffError {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        match self {
            HandoffError::Configuration(err) => write!(f, "Configuration error {}", err),
            HandoffError::Validation(err) => write!(f, "Validation error {}", err),
            HandoffError::Crypto(err) => write!(f, "Crypto error {}", err),
            HandoffError::Storage(err) => write!(f, "Storage error {}", err),
            HandoffError::Upstream(err) => write!(f, "Upstream error {}", err),
        }
    }
}

impl From<ConfigurationError> for HandoffError {
    fn from(err: ConfigurationError) -> HandoffError {
        HandoffError::Configuration(err)
    }
}

impl From<ValidationError> for HandoffError {
    fn from(err: ValidationError) -> HandoffError {
        HandoffError::Validation(err)
    }
}

impl From<CryptoError> for HandoffError {
    fn from(err: CryptoError) -> HandoffError {
        HandoffError::Crypto(err)
    }
}

impl From<SealError> for HandoffError {
    fn from(err: SealError) -> HandoffError {
        HandoffError::Crypto(err.into())
    }
}

impl From<OpenError> for HandoffError {
    fn from(err: OpenError) -> HandoffError {
        HandoffError::Crypto(err.into())
    }
}

impl From<OneWayError> for HandoffError {
    fn from(err: OneWayError) -> HandoffError {
        HandoffError::Crypto(err.into())
    }
}

impl From<StorageError> for HandoffError {
    fn from(err: StorageError) -> HandoffError {
        HandoffError::Storage(err)
    }
}

impl From<UpstreamError> for HandoffError {
    fn from(err: UpstreamError) -> HandoffError {
        HandoffError::Upstream(err)
    }
}

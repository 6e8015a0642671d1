use std::fmt::{Display, Formatter, Result as FormatResult};
use std::net::IpAddr;

use regex::Regex;
use serde_json::{Map, Value};

use crate::staging::{CampaignBundle, Origin};

pub const MAX_TOKEN_LEN: usize = 256;
pub const MAX_ENCRYPTED_DATA_LEN: usize = 2048;

lazy_static! {
    static ref RE_TOKEN: Regex = Regex::new(r"^[A-Za-z0-9_-]+$").expect("cannot compile regex");
    static ref RE_BASE64: Regex = Regex::new(r"^[A-Za-z0-9\-_~=]+$").expect("cannot compile regex");
    static ref RE_ANY_BASE64: Regex = Regex::new(r"^[A-Za-z0-9\-_~=+/]+$").expect("cannot compile regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    ClientId,
    Identifier,
    LegacyIdentifier,
    Msisdn,
    OriginateFromLanding,
    Variant,
    PartnerRef,
    Campaign,
}

impl Field {
    pub fn name(&self) -> &'static str {
        match self {
            Field::ClientId => "clientId",
            Field::Identifier => "identifier",
            Field::LegacyIdentifier => "legacyIdentifier",
            Field::Msisdn => "msisdn",
            Field::OriginateFromLanding => "originateFromLanding",
            Field::Variant => "variant",
            Field::PartnerRef => "partnerRef",
            Field::Campaign => "utm_campaign",
        }
    }

    fn max_len(&self) -> usize {
        match self {
            Field::Msisdn | Field::OriginateFromLanding | Field::LegacyIdentifier => MAX_ENCRYPTED_DATA_LEN,
            _ => MAX_TOKEN_LEN,
        }
    }
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        f.write_str(self.name())
    }
}

/// Reason an untrusted input was rejected. Messages are safe to return to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    InvalidRequest,
    NoFieldsPresent,
    Missing(Field),
    NotString(Field),
    TooLong(Field),
    InvalidFormat(Field),
}

impl std::error::Error for ValidationError {}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        match self {
            ValidationError::InvalidRequest => write!(f, "Invalid request body"),
            ValidationError::NoFieldsPresent => write!(f, "At least one field (msisdn or originateFromLanding) is required"),
            ValidationError::Missing(field) => write!(f, "Missing {} parameter", field),
            ValidationError::NotString(field) => write!(f, "{} must be a string", field),
            ValidationError::TooLong(field) => write!(f, "{} exceeds maximum size of {} characters", field, field.max_len()),
            ValidationError::InvalidFormat(field @ Field::Msisdn) |
            ValidationError::InvalidFormat(field @ Field::OriginateFromLanding) => write!(f, "Invalid encrypted {} format (must be base64 encoded)", field),
            ValidationError::InvalidFormat(field) => write!(f, "Invalid {} parameter", field),
        }
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Identifier-style token: `[A-Za-z0-9_-]{1,256}`.
///
/// Empty and over-length values get their own reasons, distinct from a
/// character set mismatch.
pub fn validate_token(field: Field, value: Option<&str>) -> ValidationResult<String> {
    let value = match value {
        Some(value) if !value.trim().is_empty() => value,
        _ => return Err(ValidationError::Missing(field)),
    };
    if value.len() > MAX_TOKEN_LEN {
        return Err(ValidationError::TooLong(field));
    }
    if !RE_TOKEN.is_match(value) {
        return Err(ValidationError::InvalidFormat(field));
    }
    Ok(value.to_owned())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientId(String);

impl ClientId {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut Formatter) -> FormatResult {
        f.write_str(&self.0)
    }
}

pub fn validate_client_id(client_id: Option<&str>) -> ValidationResult<ClientId> {
    validate_token(Field::ClientId, client_id).map(ClientId)
}

/// Accepts url-safe base64 whose length is a multiple of 4 once the url-safe
/// substitutions are reversed.
pub fn is_valid_base64(value: &str) -> bool {
    // substitutions are one-for-one so the length is unaffected
    RE_BASE64.is_match(value) && value.len() % 4 == 0
}

/// Trims and gates one transported cipher text field.
pub fn validate_encoded_field(field: Field, value: &str) -> ValidationResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Missing(field));
    }
    if value.len() > field.max_len() {
        return Err(ValidationError::TooLong(field));
    }
    if !is_valid_base64(value) {
        return Err(ValidationError::InvalidFormat(field));
    }
    Ok(value.to_owned())
}

/// Upstream cipher text arrives in a header and may use either alphabet.
pub fn validate_legacy_identifier(value: &str) -> ValidationResult<String> {
    let field = Field::LegacyIdentifier;
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Missing(field));
    }
    if value.len() > field.max_len() {
        return Err(ValidationError::TooLong(field));
    }
    if !RE_ANY_BASE64.is_match(value) || value.len() % 4 != 0 {
        return Err(ValidationError::InvalidFormat(field));
    }
    Ok(value.to_owned())
}

/// Cipher texts handed back by the consuming application.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EncryptedPayload {
    pub msisdn: Option<String>,
    pub originate_from_landing: Option<String>,
}

pub fn validate_encrypted_payload(body: &Value) -> ValidationResult<EncryptedPayload> {
    let body = body.as_object().ok_or(ValidationError::InvalidRequest)?;
    let msisdn = string_field(body, Field::Msisdn)?;
    let flag = string_field(body, Field::OriginateFromLanding)?;
    if msisdn.is_none() && flag.is_none() {
        return Err(ValidationError::NoFieldsPresent);
    }
    Ok(EncryptedPayload {
        msisdn: msisdn.map(|value| validate_encoded_field(Field::Msisdn, value)).transpose()?,
        originate_from_landing: flag.map(|value| validate_encoded_field(Field::OriginateFromLanding, value)).transpose()?,
    })
}

// present-but-blank counts as absent, present-but-not-a-string is rejected
fn string_field<'v>(body: &'v Map<String, Value>, field: Field) -> ValidationResult<Option<&'v str>> {
    match body.get(field.name()) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) if value.trim().is_empty() => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.as_str())),
        Some(_) => Err(ValidationError::NotString(field)),
    }
}

/// Campaign metadata is only staged when all three values are supplied.
pub fn validate_campaign(variant: Option<&str>, partner_ref: Option<&str>, campaign: Option<&str>) -> ValidationResult<Option<CampaignBundle>> {
    let present = |value: Option<&str>| value.map_or(false, |value| !value.trim().is_empty());
    if !(present(variant) && present(partner_ref) && present(campaign)) {
        return Ok(None);
    }
    Ok(Some(CampaignBundle {
        variant: validate_token(Field::Variant, variant)?,
        partner_id: validate_token(Field::PartnerRef, partner_ref)?,
        campaign_name: validate_token(Field::Campaign, campaign)?,
    }))
}

/// A plaintext identifier a client asks to have sealed.
pub fn validate_identifier_value(value: Option<&str>) -> ValidationResult<String> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(ValidationError::Missing(Field::Identifier));
    }
    if value.len() > MAX_TOKEN_LEN {
        return Err(ValidationError::TooLong(Field::Identifier));
    }
    if value.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat(Field::Identifier));
    }
    Ok(value.to_owned())
}

// origin only scopes staged records, so anything unparsable is recorded as unknown
pub fn validate_origin(origin: Option<&str>) -> Origin {
    origin
        .and_then(|origin| origin.split(',').next())
        .and_then(|origin| origin.trim().parse::<IpAddr>().ok())
        .into()
}

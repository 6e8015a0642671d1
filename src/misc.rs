use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use ring::rand::{SecureRandom, SystemRandom};

use crate::ciphers::KEY_LEN;

// `None` when the offset does not fit a timestamp
#[inline]
pub fn seconds_from_now(seconds: i64) -> Option<DateTime<Utc>> {
    ChronoDuration::try_seconds(seconds)
        .and_then(|offset| Utc::now().checked_add_signed(offset))
}

// fresh symmetric secret in the form operators put into ENCRYPTION_SECRET_KEY
pub fn generate_secret() -> Result<String, ()> {
    let mut secret = [0u8; KEY_LEN];
    SystemRandom::new().fill(&mut secret).or(Err(()))?;
    Ok(B64.encode(secret))
}

/// Masks the middle of a subscriber identifier so that it can appear in logs.
pub fn mask_identifier(identifier: &str) -> String {
    let chars: Vec<char> = identifier.chars().collect();
    let len = chars.len();
    if len <= 7 {
        return "*".repeat(len);
    }
    chars.iter()
        .enumerate()
        .map(|(index, &c)| if index < 5 || index >= len - 2 { c } else { '*' })
        .collect()
}

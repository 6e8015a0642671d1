pub mod errors;
mod encoding;
mod envelope;
mod one_way;
mod legacy;

pub use encoding::{to_url_safe, from_url_safe};
pub use envelope::{seal, open, KEY_LEN, IV_LEN, TAG_LEN, MIN_ENVELOPE_LEN};
pub use one_way::{PublicKey, seal_one_way, OAEP_OVERHEAD};
pub use legacy::{decode_legacy, strip_control_characters, is_valid_identifier, IDENTIFIER_PREFIX};

/*
envelope shape (before url-safe base64):
[ iv: [u8;16] | cipher text: [u8;?] | tag: [u8;16] ]

one-way token: standard base64 of a single RSA-OAEP(SHA-256, MGF1-SHA-256) block

legacy identifier: standard base64 of AES-256-ECB blocks, no padding scheme, key is the raw UTF-8 bytes
*/

//! Replica of the tokenserver's metrics hashing of user identifiers.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Number of hex characters the tokenserver keeps from a metrics hash.
pub const HASHED_ID_LEN: usize = 32;

/// Device id the tokenserver hashes for OAuth requests, which carry none.
pub const NO_DEVICE_ID: &str = "none";

/// HMAC-SHA256 of `value` keyed with `secret`, as a lowercase hex digest.
#[must_use]
pub fn fxa_metrics_hash(secret: &str, value: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(value.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// The `hashed_fxa_uid` field the tokenserver returns for `fxa_uid`.
#[must_use]
pub fn hashed_fxa_uid(secret: &str, fxa_uid: &str) -> String {
    let mut digest = fxa_metrics_hash(secret, fxa_uid);
    digest.truncate(HASHED_ID_LEN);
    digest
}

/// The `hashed_device_id` the tokenserver embeds in token payloads.
#[must_use]
pub fn hashed_device_id(secret: &str, fxa_uid: &str, device_id: Option<&str>) -> String {
    let value = format!("{fxa_uid}{}", device_id.unwrap_or(NO_DEVICE_ID));
    let mut digest = fxa_metrics_hash(secret, &value);
    digest.truncate(HASHED_ID_LEN);
    digest
}

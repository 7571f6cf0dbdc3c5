//! HKDF-SHA256 helpers and per-node secret derivation.
//!
//! The tokenserver never signs tokens with its configured master secret
//! directly. Each storage node gets its own secret, derived with HKDF from
//! the master secret and the node URL:
//!
//! ```text
//! node_secret = hex(HKDF-SHA256(ikm  = utf8(master_secret),
//!                               salt = none,
//!                               info = "services.mozilla.com/mozsvc/v1/node_secret/" + node_url,
//!                               len  = len(master_secret) / 2))
//! ```
//!
//! The harness recomputes this value to check server-issued tokens, so the
//! derivation must match the server byte for byte.

use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::CryptoError;

/// Prefix of the HKDF info string used for node secrets.
pub const NODE_SECRET_INFO_PREFIX: &str = "services.mozilla.com/mozsvc/v1/node_secret/";

/// Expands `ikm` into `len` bytes of HKDF-SHA256 output.
///
/// A `None` salt is treated as a hash-length string of zeros (RFC 5869).
///
/// # Errors
/// Returns `CryptoError::KeyDerivation` when `len` exceeds 255 * 32 bytes.
pub fn hkdf_sha256(
    ikm: &[u8],
    salt: Option<&[u8]>,
    info: &[u8],
    len: usize,
) -> Result<Vec<u8>, CryptoError> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = vec![0u8; len];
    hk.expand(info, &mut okm)
        .map_err(|e| CryptoError::key_derivation(format!("{e} (requested {len} bytes)")))?;
    Ok(okm)
}

/// Hex-encodes the raw token-signing secret.
///
/// Deployments configure the signing secret as an arbitrary string; the
/// tokenserver hex-encodes its UTF-8 bytes before using it as the HKDF
/// master secret.
#[must_use]
pub fn master_secret_from_raw(raw: &str) -> String {
    hex::encode(raw.as_bytes())
}

/// Derives the node-specific signing secret for `node_url`.
///
/// The output is hex-encoded and half the byte length of `master_secret`
/// in raw bytes, so its hex form has the same length as the master secret
/// (rounded down to even).
///
/// # Errors
/// Returns `CryptoError::KeyDerivation` if the master secret is empty or
/// too long for a single HKDF expansion.
pub fn derive_node_secret(master_secret: &str, node_url: &str) -> Result<String, CryptoError> {
    let size = master_secret.len() / 2;
    if size == 0 {
        return Err(CryptoError::key_derivation(
            "master secret must be at least two bytes long",
        ));
    }
    let info = format!("{NODE_SECRET_INFO_PREFIX}{node_url}");
    let derived = hkdf_sha256(master_secret.as_bytes(), None, info.as_bytes(), size)?;
    Ok(hex::encode(derived))
}

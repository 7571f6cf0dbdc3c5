//! Client side of the FxA "onepw" password protocol.
//!
//! The password never leaves the client. It is stretched with PBKDF2 and
//! then split with HKDF into independent sub-keys:
//!
//! ```text
//! quickStretchedPW = PBKDF2-SHA256(password, "identity.mozilla.com/picl/v1/quickStretch:" + email, 1000, 32)
//! authPW           = HKDF(quickStretchedPW, info = KW("authPW"), 32)       -- sent to the server
//! unwrapBKey       = HKDF(quickStretchedPW, info = KW("unwrapBkey"), 32)   -- unwraps kB locally
//! ```
//!
//! Session, key-fetch and password-change tokens are likewise expanded into
//! a Hawk id, a Hawk key and (for key fetch) a bundle key.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tokenserver_e2e_crypto::{CryptoError, hkdf_sha256};

use crate::error::FxaError;

type HmacSha256 = Hmac<Sha256>;

const NAMESPACE: &str = "identity.mozilla.com/picl/v1/";

/// PBKDF2 rounds of the quick stretch.
pub const QUICK_STRETCH_ROUNDS: u32 = 1000;

/// Byte length of every onepw key.
pub const KEY_LEN: usize = 32;

/// Token types the auth server hands out.
pub const SESSION_TOKEN: &str = "sessionToken";
/// Token authorizing `GET /account/keys`.
pub const KEY_FETCH_TOKEN: &str = "keyFetchToken";
/// Token authorizing `POST /password/change/finish`.
pub const PASSWORD_CHANGE_TOKEN: &str = "passwordChangeToken";

/// Fully qualified HKDF info for `name`.
#[must_use]
pub fn kw(name: &str) -> String {
    format!("{NAMESPACE}{name}")
}

/// `HKDF-SHA256(secret, salt = none, info = KW(name), len)`.
///
/// # Errors
/// Propagates `CryptoError::KeyDerivation` for impossible lengths.
pub fn derive_key(secret: &[u8], name: &str, len: usize) -> Result<Vec<u8>, CryptoError> {
    hkdf_sha256(secret, None, kw(name).as_bytes(), len)
}

/// The PBKDF2-stretched password, from which `authPW` and `unwrapBKey` derive.
#[derive(Clone)]
pub struct StretchedPassword([u8; KEY_LEN]);

impl std::fmt::Debug for StretchedPassword {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StretchedPassword(..)")
    }
}

impl StretchedPassword {
    /// Runs the quick stretch for `email` / `password`.
    ///
    /// `email` must be the address the account was created with; it salts the
    /// stretch, so a different spelling yields a different key.
    #[must_use]
    pub fn quick_stretch(email: &str, password: &str) -> Self {
        let salt = kw(&format!("quickStretch:{email}"));
        let mut out = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(
            password.as_bytes(),
            salt.as_bytes(),
            QUICK_STRETCH_ROUNDS,
            &mut out,
        );
        Self(out)
    }

    /// The raw stretched bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// `authPW`, hex-encoded as the auth server expects it.
    ///
    /// # Errors
    /// Propagates key-derivation failures.
    pub fn auth_pw_hex(&self) -> Result<String, CryptoError> {
        Ok(hex::encode(derive_key(&self.0, "authPW", KEY_LEN)?))
    }

    /// `unwrapBKey`, the key that wraps and unwraps kB.
    ///
    /// # Errors
    /// Propagates key-derivation failures.
    pub fn unwrap_b_key(&self) -> Result<[u8; KEY_LEN], CryptoError> {
        let key = derive_key(&self.0, "unwrapBkey", KEY_LEN)?;
        Ok(to_array(&key))
    }
}

/// Key material expanded from a hex token returned by the auth server.
#[derive(Clone)]
pub struct TokenKeys {
    /// Hawk credential id (hex).
    pub id: String,
    /// Hawk MAC key.
    pub hmac_key: Vec<u8>,
    /// Key used to open response bundles (only meaningful for key-fetch tokens).
    pub request_key: Vec<u8>,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl TokenKeys {
    /// Expands `token_hex` of type `token_type` (`sessionToken`, ...).
    ///
    /// # Errors
    /// Returns `FxaError::UnexpectedResponse` if the token is not hex.
    pub fn derive(token_hex: &str, token_type: &str) -> Result<Self, FxaError> {
        let token = hex::decode(token_hex)
            .map_err(|e| FxaError::unexpected("fxa-auth", format!("{token_type} is not hex: {e}")))?;
        let material = derive_key(&token, token_type, 3 * KEY_LEN)?;
        Ok(Self {
            id: hex::encode(&material[..KEY_LEN]),
            hmac_key: material[KEY_LEN..2 * KEY_LEN].to_vec(),
            request_key: material[2 * KEY_LEN..].to_vec(),
        })
    }
}

/// Opens the `/account/keys` bundle, returning `(kA, wrapKB)`.
///
/// # Errors
/// Returns `CryptoError::InvalidSignature` if the bundle MAC does not verify
/// and `FxaError::UnexpectedResponse` if the bundle has the wrong shape.
pub fn unbundle_account_keys(
    request_key: &[u8],
    bundle_hex: &str,
) -> Result<([u8; KEY_LEN], [u8; KEY_LEN]), FxaError> {
    let bundle = hex::decode(bundle_hex)
        .map_err(|e| FxaError::unexpected("fxa-auth", format!("key bundle is not hex: {e}")))?;
    if bundle.len() != 3 * KEY_LEN {
        return Err(FxaError::unexpected(
            "fxa-auth",
            format!("key bundle is {} bytes, expected {}", bundle.len(), 3 * KEY_LEN),
        ));
    }
    let material = derive_key(request_key, "account/keys", 3 * KEY_LEN)?;
    let (hmac_key, xor_key) = material.split_at(KEY_LEN);
    let (ciphertext, tag) = bundle.split_at(2 * KEY_LEN);

    let mut mac = HmacSha256::new_from_slice(hmac_key).expect("HMAC can take key of any size");
    mac.update(ciphertext);
    mac.verify_slice(tag).map_err(|_| CryptoError::InvalidSignature)?;

    let plaintext: Vec<u8> = ciphertext.iter().zip(xor_key).map(|(c, k)| c ^ k).collect();
    Ok((to_array(&plaintext[..KEY_LEN]), to_array(&plaintext[KEY_LEN..])))
}

/// XOR of two 32-byte keys.
#[must_use]
pub fn xor(a: &[u8; KEY_LEN], b: &[u8; KEY_LEN]) -> [u8; KEY_LEN] {
    let mut out = [0u8; KEY_LEN];
    for (o, (x, y)) in out.iter_mut().zip(a.iter().zip(b)) {
        *o = x ^ y;
    }
    out
}

fn to_array(bytes: &[u8]) -> [u8; KEY_LEN] {
    let mut out = [0u8; KEY_LEN];
    out.copy_from_slice(&bytes[..KEY_LEN]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMAIL: &str = "andré@example.org";
    const PASSWORD: &str = "pässwörd";

    #[test]
    fn test_quick_stretch_vector() {
        let stretched = StretchedPassword::quick_stretch(EMAIL, PASSWORD);
        assert_eq!(
            hex::encode(stretched.as_bytes()),
            "e4e8889bd8bd61ad6de6b95c059d56e7b50dacdaf62bd84644af7e2add84345d"
        );
    }

    #[test]
    fn test_auth_pw_vector() {
        let stretched = StretchedPassword::quick_stretch(EMAIL, PASSWORD);
        assert_eq!(
            stretched.auth_pw_hex().unwrap(),
            "247b675ffb4c46310bc87e26d712153abe5e1c90ef00a4784594f97ef54f2375"
        );
    }

    #[test]
    fn test_unwrap_b_key_vector() {
        let stretched = StretchedPassword::quick_stretch(EMAIL, PASSWORD);
        assert_eq!(
            hex::encode(stretched.unwrap_b_key().unwrap()),
            "de6a2648b78284fcb9ffa81ba95803309cfba7af583c01a8a1a63e567234dd28"
        );
    }

    #[test]
    fn test_debug_output_hides_key_material() {
        let stretched = StretchedPassword::quick_stretch(EMAIL, PASSWORD);
        assert_eq!(format!("{stretched:?}"), "StretchedPassword(..)");
    }

    #[test]
    fn test_token_keys_split_material() {
        let token = "a".repeat(64);
        let keys = TokenKeys::derive(&token, SESSION_TOKEN).unwrap();
        let material = derive_key(&hex::decode(&token).unwrap(), SESSION_TOKEN, 96).unwrap();

        assert_eq!(keys.id, hex::encode(&material[..32]));
        assert_eq!(keys.hmac_key, material[32..64].to_vec());
        assert_eq!(keys.request_key, material[64..].to_vec());
    }

    #[test]
    fn test_token_keys_reject_non_hex() {
        assert!(TokenKeys::derive("not-hex", SESSION_TOKEN).is_err());
    }

    fn bundle(request_key: &[u8], ka: &[u8; 32], wrap_kb: &[u8; 32]) -> String {
        let material = derive_key(request_key, "account/keys", 96).unwrap();
        let mut ciphertext: Vec<u8> = ka.iter().chain(wrap_kb.iter()).copied().collect();
        for (c, k) in ciphertext.iter_mut().zip(&material[32..]) {
            *c ^= k;
        }
        let mut mac = HmacSha256::new_from_slice(&material[..32]).unwrap();
        mac.update(&ciphertext);
        ciphertext.extend_from_slice(&mac.finalize().into_bytes());
        hex::encode(ciphertext)
    }

    #[test]
    fn test_unbundle_account_keys() {
        let keys = TokenKeys::derive(&"b".repeat(64), KEY_FETCH_TOKEN).unwrap();
        let ka = [1u8; 32];
        let wrap_kb = [2u8; 32];
        let bundle_hex = bundle(&keys.request_key, &ka, &wrap_kb);

        let (got_ka, got_wrap_kb) = unbundle_account_keys(&keys.request_key, &bundle_hex).unwrap();
        assert_eq!(got_ka, ka);
        assert_eq!(got_wrap_kb, wrap_kb);
    }

    #[test]
    fn test_unbundle_rejects_bad_mac() {
        let keys = TokenKeys::derive(&"b".repeat(64), KEY_FETCH_TOKEN).unwrap();
        let mut bundle_hex = bundle(&keys.request_key, &[1u8; 32], &[2u8; 32]);
        // Flip the last nibble of the MAC.
        let last = bundle_hex.pop().unwrap();
        bundle_hex.push(if last == '0' { '1' } else { '0' });

        let err = unbundle_account_keys(&keys.request_key, &bundle_hex).unwrap_err();
        assert!(matches!(err, FxaError::Crypto(CryptoError::InvalidSignature)));
    }

    #[test]
    fn test_xor_rewraps_kb() {
        let old = StretchedPassword::quick_stretch(EMAIL, PASSWORD).unwrap_b_key().unwrap();
        let new = StretchedPassword::quick_stretch(EMAIL, "new password").unwrap_b_key().unwrap();
        let kb = [7u8; 32];

        let wrapped_old = xor(&kb, &old);
        let recovered = xor(&wrapped_old, &old);
        let wrapped_new = xor(&recovered, &new);
        assert_eq!(xor(&wrapped_new, &new), kb);
    }
}

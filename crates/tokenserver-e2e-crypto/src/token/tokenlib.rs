//! Signed tokens in the tokenlib wire format.
//!
//! A token is the URL-safe base64 encoding of `payload || signature`:
//!
//! - `payload` is a UTF-8 JSON object (it always carries `salt` and `expires`)
//! - `signature` is the trailing 32 bytes, `HMAC-SHA256(signing_key, payload)`
//!
//! The signing key is itself derived from the shared secret with
//! `HKDF-SHA256(secret, salt = none, info = "SIGNING", 32)`. Alongside each
//! token the server hands out a derived secret (the Hawk `key`), computed as
//! `HKDF-SHA256(secret, salt = payload.salt, info = DERIVE_INFO_PREFIX + token, 32)`.
//!
//! ## Example
//!
//! ```
//! use serde_json::{Map, json};
//! use tokenserver_e2e_crypto::token::TokenManager;
//!
//! let manager = TokenManager::new("node-secret").unwrap();
//! let mut data = Map::new();
//! data.insert("uid".into(), json!(42));
//!
//! let token = manager.make_token(&data).unwrap();
//! let parsed = manager.parse_token(&token).unwrap();
//! assert_eq!(parsed["uid"], 42);
//! ```

use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::URL_SAFE;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use hmac::{Hmac, Mac};
use rand::Rng;
use serde_json::{Map, Value};
use sha2::Sha256;
use time::OffsetDateTime;

use super::json::to_python_json;
use crate::error::CryptoError;
use crate::node_secret::hkdf_sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length in bytes of the trailing HMAC-SHA256 signature.
pub const SIGNATURE_LEN: usize = 32;

/// Default token lifetime in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// HKDF info used to derive the payload signing key.
const SIGNING_INFO: &[u8] = b"SIGNING";

/// Prefix of the HKDF info used to derive the per-token secret.
pub const DERIVE_INFO_PREFIX: &str = "services.mozilla.com/tokenlib/v1/derive/";

/// URL-safe alphabet that accepts tokens with or without `=` padding.
const URL_SAFE_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A token split into its payload bytes and signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedToken {
    /// Raw UTF-8 JSON payload, exactly as the signer serialized it.
    pub payload: Vec<u8>,
    /// Trailing HMAC-SHA256 signature.
    pub signature: [u8; SIGNATURE_LEN],
}

impl SignedToken {
    /// Decodes `token` and splits off the trailing signature.
    ///
    /// No signature check happens here; see [`TokenManager::parse_token`].
    ///
    /// # Errors
    /// Returns `CryptoError::MalformedToken` if the token is not base64url or
    /// is too short to hold a signature.
    pub fn decode(token: &str) -> Result<Self, CryptoError> {
        let raw = URL_SAFE_LENIENT
            .decode(token.trim())
            .map_err(|e| CryptoError::malformed_token(e.to_string()))?;
        if raw.len() <= SIGNATURE_LEN {
            return Err(CryptoError::malformed_token(format!(
                "token is {} bytes, expected more than {SIGNATURE_LEN}",
                raw.len()
            )));
        }
        let (payload, signature) = raw.split_at(raw.len() - SIGNATURE_LEN);
        let mut sig = [0u8; SIGNATURE_LEN];
        sig.copy_from_slice(signature);
        Ok(Self {
            payload: payload.to_vec(),
            signature: sig,
        })
    }

    /// Parses the payload as a JSON object.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidPayload` if the payload is not UTF-8 JSON
    /// or not an object.
    pub fn payload_json(&self) -> Result<Map<String, Value>, CryptoError> {
        let text = std::str::from_utf8(&self.payload)
            .map_err(|e| CryptoError::invalid_payload(format!("payload is not UTF-8: {e}")))?;
        match serde_json::from_str::<Value>(text) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(CryptoError::invalid_payload(format!(
                "expected a JSON object, got {other}"
            ))),
            Err(e) => Err(CryptoError::invalid_payload(e.to_string())),
        }
    }

    /// Re-encodes payload and signature as a padded base64url token.
    #[must_use]
    pub fn encode(&self) -> String {
        let mut raw = Vec::with_capacity(self.payload.len() + SIGNATURE_LEN);
        raw.extend_from_slice(&self.payload);
        raw.extend_from_slice(&self.signature);
        URL_SAFE.encode(raw)
    }
}

/// Mints, verifies and derives secrets for tokens bound to one shared secret.
#[derive(Clone)]
pub struct TokenManager {
    secret: Vec<u8>,
    signing_key: Vec<u8>,
    timeout: u64,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl TokenManager {
    /// Creates a manager for `secret` with the default 300 second timeout.
    ///
    /// When the secret is a hex string (as node secrets are), pass the
    /// string itself: its UTF-8 bytes are the key material.
    ///
    /// # Errors
    /// Returns `CryptoError::KeyDerivation` if the signing key cannot be derived.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, CryptoError> {
        let secret = secret.as_ref().to_vec();
        let signing_key = hkdf_sha256(&secret, None, SIGNING_INFO, SIGNATURE_LEN)?;
        Ok(Self {
            secret,
            signing_key,
            timeout: DEFAULT_TIMEOUT_SECS,
        })
    }

    /// Sets the lifetime applied to tokens minted without an `expires` field.
    #[must_use]
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    /// Returns the configured token lifetime in seconds.
    #[must_use]
    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    /// HMAC-SHA256 of `payload` under the derived signing key.
    #[must_use]
    pub fn sign(&self, payload: &[u8]) -> [u8; SIGNATURE_LEN] {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .expect("HMAC can take key of any size");
        mac.update(payload);
        mac.finalize().into_bytes().into()
    }

    /// Checks `signature` against `payload` in constant time.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidSignature` on mismatch.
    pub fn verify_signature(&self, payload: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let mut mac = HmacSha256::new_from_slice(&self.signing_key)
            .expect("HMAC can take key of any size");
        mac.update(payload);
        mac.verify_slice(signature)
            .map_err(|_| CryptoError::InvalidSignature)
    }

    /// Mints a token for `data`, adding `salt` and `expires` when absent.
    ///
    /// # Errors
    /// Returns `CryptoError::InvalidPayload` if `data` cannot be serialized.
    pub fn make_token(&self, data: &Map<String, Value>) -> Result<String, CryptoError> {
        let mut data = data.clone();
        if !data.contains_key("salt") {
            let salt: [u8; 3] = rand::thread_rng().r#gen();
            data.insert("salt".to_string(), Value::String(hex::encode(salt)));
        }
        if !data.contains_key("expires") {
            let now = OffsetDateTime::now_utc().unix_timestamp().max(0) as u64;
            data.insert("expires".to_string(), Value::from(now + self.timeout));
        }
        let payload =
            to_python_json(&data).map_err(|e| CryptoError::invalid_payload(e.to_string()))?;
        let signature = self.sign(&payload);
        Ok(SignedToken { payload, signature }.encode())
    }

    /// Verifies `token` and returns its payload, rejecting expired tokens.
    ///
    /// # Errors
    /// Returns `MalformedToken`, `InvalidSignature`, `InvalidPayload` or `Expired`.
    pub fn parse_token(&self, token: &str) -> Result<Map<String, Value>, CryptoError> {
        let now = OffsetDateTime::now_utc().unix_timestamp_nanos() as f64 / 1e9;
        self.parse_token_at(token, now)
    }

    /// Like [`parse_token`](Self::parse_token) with an explicit clock.
    ///
    /// # Errors
    /// Returns `MalformedToken`, `InvalidSignature`, `InvalidPayload` or `Expired`.
    pub fn parse_token_at(&self, token: &str, now: f64) -> Result<Map<String, Value>, CryptoError> {
        let signed = SignedToken::decode(token)?;
        self.verify_signature(&signed.payload, &signed.signature)?;
        let data = signed.payload_json()?;
        let expires = data
            .get("expires")
            .and_then(Value::as_f64)
            .ok_or_else(|| CryptoError::invalid_payload("missing numeric `expires`"))?;
        if expires <= now {
            return Err(CryptoError::Expired { expires });
        }
        Ok(data)
    }

    /// Derives the per-token secret the server returns as `key`.
    ///
    /// The token string is used verbatim in the HKDF info, so pass exactly
    /// what the server returned.
    ///
    /// # Errors
    /// Returns `MalformedToken` or `InvalidPayload` if the payload carries no
    /// string `salt`.
    pub fn get_derived_secret(&self, token: &str) -> Result<String, CryptoError> {
        let data = SignedToken::decode(token)?.payload_json()?;
        let salt = data
            .get("salt")
            .and_then(Value::as_str)
            .ok_or_else(|| CryptoError::invalid_payload("missing string `salt`"))?;
        let info = format!("{DERIVE_INFO_PREFIX}{token}");
        let derived = hkdf_sha256(
            &self.secret,
            Some(salt.as_bytes()),
            info.as_bytes(),
            SIGNATURE_LEN,
        )?;
        Ok(URL_SAFE.encode(derived))
    }
}

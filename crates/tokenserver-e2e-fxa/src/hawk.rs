//! Hawk request signing (header scheme, version 1).
//!
//! Only the client half is implemented: building the `Authorization` header
//! for an outgoing request. Server-Authorization validation on responses is
//! not performed.

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use url::Url;

use crate::error::FxaError;
use crate::onepw::TokenKeys;

type HmacSha256 = Hmac<Sha256>;

/// Content type hashed for JSON request bodies.
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Hawk id and key for one token.
#[derive(Clone)]
pub struct HawkCredentials {
    pub id: String,
    pub key: Vec<u8>,
}

impl std::fmt::Debug for HawkCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HawkCredentials")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl From<&TokenKeys> for HawkCredentials {
    fn from(keys: &TokenKeys) -> Self {
        Self {
            id: keys.id.clone(),
            key: keys.hmac_key.clone(),
        }
    }
}

/// Everything that goes into one request MAC.
#[derive(Debug, Clone)]
pub struct Artifacts<'a> {
    pub method: &'a str,
    pub url: &'a Url,
    pub ts: i64,
    pub nonce: &'a str,
    /// Base64 payload hash, see [`payload_hash`].
    pub hash: Option<String>,
    pub ext: Option<&'a str>,
}

impl Artifacts<'_> {
    /// The `hawk.1.header` normalized string the MAC is computed over.
    ///
    /// # Errors
    /// Returns `FxaError::InvalidUrl` if the URL has no host or port.
    pub fn normalized_string(&self) -> Result<String, FxaError> {
        let host = self
            .url
            .host_str()
            .ok_or_else(|| FxaError::invalid_url(format!("{} has no host", self.url)))?;
        let port = self
            .url
            .port_or_known_default()
            .ok_or_else(|| FxaError::invalid_url(format!("{} has no port", self.url)))?;
        let resource = match self.url.query() {
            Some(query) => format!("{}?{query}", self.url.path()),
            None => self.url.path().to_string(),
        };
        Ok(format!(
            "hawk.1.header\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n{}\n",
            self.ts,
            self.nonce,
            self.method.to_uppercase(),
            resource,
            host.to_lowercase(),
            port,
            self.hash.as_deref().unwrap_or(""),
            self.ext.unwrap_or(""),
        ))
    }

    /// Base64 HMAC-SHA256 of the normalized string under `key`.
    ///
    /// # Errors
    /// See [`normalized_string`](Self::normalized_string).
    pub fn mac(&self, key: &[u8]) -> Result<String, FxaError> {
        let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
        mac.update(self.normalized_string()?.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// Full `Authorization` header value for `credentials`.
    ///
    /// # Errors
    /// See [`normalized_string`](Self::normalized_string).
    pub fn header(&self, credentials: &HawkCredentials) -> Result<String, FxaError> {
        let mac = self.mac(&credentials.key)?;
        let mut header = format!(
            r#"Hawk id="{}", ts="{}", nonce="{}""#,
            credentials.id, self.ts, self.nonce
        );
        if let Some(hash) = &self.hash {
            header.push_str(&format!(r#", hash="{hash}""#));
        }
        if let Some(ext) = self.ext {
            header.push_str(&format!(r#", ext="{ext}""#));
        }
        header.push_str(&format!(r#", mac="{mac}""#));
        Ok(header)
    }
}

/// Base64 SHA-256 of `hawk.1.payload\n<content-type>\n<payload>\n`.
///
/// Any parameters after `;` in the content type are dropped.
#[must_use]
pub fn payload_hash(content_type: &str, payload: &[u8]) -> String {
    let content_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    let mut hasher = Sha256::new();
    hasher.update(b"hawk.1.payload\n");
    hasher.update(content_type.as_bytes());
    hasher.update(b"\n");
    hasher.update(payload);
    hasher.update(b"\n");
    STANDARD.encode(hasher.finalize())
}

fn fresh_nonce() -> String {
    let mut bytes = [0u8; 6];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Signs a request at the current time with a random nonce.
///
/// `json_body` is hashed as `application/json` when present.
///
/// # Errors
/// Returns `FxaError::InvalidUrl` if the URL has no host or port.
pub fn authorization_header(
    credentials: &HawkCredentials,
    method: &str,
    url: &Url,
    json_body: Option<&[u8]>,
) -> Result<String, FxaError> {
    let nonce = fresh_nonce();
    let artifacts = Artifacts {
        method,
        url,
        ts: OffsetDateTime::now_utc().unix_timestamp(),
        nonce: &nonce,
        hash: json_body.map(|body| payload_hash(JSON_CONTENT_TYPE, body)),
        ext: None,
    };
    artifacts.header(credentials)
}

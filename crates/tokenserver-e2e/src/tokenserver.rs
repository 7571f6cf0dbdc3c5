//! HTTP client for the token-vending endpoint under test.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::HarnessError;

/// Path of the Sync 1.5 token endpoint.
pub const TOKEN_PATH: &str = "1.0/sync/1.5";
/// Header carrying `<keys_changed_at>-<base64url(client_state)>`.
pub const KEY_ID_HEADER: &str = "X-KeyID";

/// Successful token-endpoint body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Signed tokenlib token; the Hawk id for the storage node.
    pub id: String,
    /// Secret derived from `id`; the Hawk key.
    pub key: String,
    pub uid: i64,
    pub api_endpoint: String,
    pub duration: u64,
    pub hashalg: String,
    pub hashed_fxa_uid: String,
    pub node_type: String,
}

/// Status and JSON body of one token-endpoint call.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenEndpointResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TokenEndpointResponse {
    /// Parses a 200 answer.
    ///
    /// # Errors
    /// Returns `HarnessError::UnexpectedResponse` for any other status or a
    /// body missing required fields.
    pub fn into_token(self) -> Result<TokenResponse, HarnessError> {
        if self.status != StatusCode::OK {
            return Err(HarnessError::unexpected(
                self.status.as_u16(),
                self.body.to_string(),
            ));
        }
        serde_json::from_value(self.body).map_err(|e| {
            HarnessError::unexpected(StatusCode::OK.as_u16(), format!("bad token body: {e}"))
        })
    }
}

/// Formats an `X-KeyID` value from its parts.
#[must_use]
pub fn format_key_id(keys_changed_at: u64, client_state: &[u8]) -> String {
    format!("{keys_changed_at}-{}", URL_SAFE_NO_PAD.encode(client_state))
}

/// Splits an `X-KeyID` value into `keys_changed_at` and raw client state.
///
/// # Errors
/// Returns `HarnessError::Config` if the value is not `<int>-<base64url>`.
pub fn parse_key_id(key_id: &str) -> Result<(u64, Vec<u8>), HarnessError> {
    let (ts, state) = key_id
        .split_once('-')
        .ok_or_else(|| HarnessError::config(format!("X-KeyID {key_id:?} has no '-'")))?;
    let ts = ts
        .parse()
        .map_err(|e| HarnessError::config(format!("X-KeyID timestamp {ts:?}: {e}")))?;
    let state = URL_SAFE_NO_PAD
        .decode(state)
        .map_err(|e| HarnessError::config(format!("X-KeyID client state {state:?}: {e}")))?;
    Ok((ts, state))
}

#[derive(Debug, Clone)]
pub struct TokenserverClient {
    http: reqwest::Client,
    token_url: Url,
    key_id: String,
}

impl TokenserverClient {
    /// # Errors
    /// Returns `HarnessError::Config` for an unparsable base URL.
    pub fn new(
        base_url: &str,
        key_id: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, HarnessError> {
        let base = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(|e| HarnessError::config(format!("tokenserver.url: {e}")))?;
        let token_url = base
            .join(TOKEN_PATH)
            .map_err(|e| HarnessError::config(format!("tokenserver.url: {e}")))?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| HarnessError::Transport { source })?;
        Ok(Self {
            http,
            token_url,
            key_id: key_id.into(),
        })
    }

    #[must_use]
    pub fn token_url(&self) -> &Url {
        &self.token_url
    }

    /// `GET /1.0/sync/1.5` with a verbatim `Authorization` header.
    ///
    /// Non-2xx answers are returned, not turned into errors.
    ///
    /// # Errors
    /// Returns `Transport` if no response arrives and `UnexpectedResponse`
    /// if the body is not JSON.
    pub async fn get_token_with_authorization(
        &self,
        authorization: &str,
    ) -> Result<TokenEndpointResponse, HarnessError> {
        let resp = self
            .http
            .get(self.token_url.clone())
            .header(AUTHORIZATION, authorization)
            .header(KEY_ID_HEADER, &self.key_id)
            .send()
            .await
            .map_err(|source| HarnessError::Transport { source })?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|source| HarnessError::Transport { source })?;
        let body = serde_json::from_str(&text)
            .map_err(|_| HarnessError::unexpected(status.as_u16(), text.clone()))?;
        tracing::debug!(status = status.as_u16(), "tokenserver answered");
        Ok(TokenEndpointResponse { status, body })
    }

    /// `GET /1.0/sync/1.5` with `Authorization: Bearer <token>`.
    ///
    /// # Errors
    /// See [`get_token_with_authorization`](Self::get_token_with_authorization).
    pub async fn get_token(&self, bearer: &str) -> Result<TokenEndpointResponse, HarnessError> {
        self.get_token_with_authorization(&format!("Bearer {bearer}"))
            .await
    }
}

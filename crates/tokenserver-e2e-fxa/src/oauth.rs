//! FxA OAuth: access-token issuance, verification and revocation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use crate::account::{AccountClient, Session};
use crate::error::FxaError;
use crate::http::{build_client, handle_response, versioned_base};

const SERVICE: &str = "fxa-oauth";

/// Grant used to trade a session token for an access token.
pub const FXA_CREDENTIALS_GRANT: &str = "fxa-credentials";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// What the OAuth server knows about an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    /// FxA uid the token was issued to.
    pub user: String,
    pub client_id: String,
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default)]
    pub generation: Option<i64>,
}

/// OAuth client bound to one `client_id`.
///
/// Tokens are minted through the auth server's `/oauth/token` endpoint with
/// a Hawk-signed session; verification and revocation go to the OAuth server.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    client_id: String,
    accounts: AccountClient,
    http: reqwest::Client,
    base_url: Url,
}

impl OAuthClient {
    /// # Errors
    /// Returns `FxaError::InvalidUrl` for an unparsable `oauth_server_url`.
    pub fn new(
        client_id: impl Into<String>,
        oauth_server_url: &str,
        accounts: AccountClient,
        timeout: Duration,
    ) -> Result<Self, FxaError> {
        Ok(Self {
            client_id: client_id.into(),
            accounts,
            http: build_client(timeout)?,
            base_url: versioned_base(oauth_server_url, "v1")?,
        })
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Mints an access token for `scope` on behalf of `session`.
    ///
    /// # Errors
    /// Returns `FxaError::Api` if the session is invalid or the scope is refused.
    pub async fn authorize_token(&self, session: &Session, scope: &str) -> Result<String, FxaError> {
        let body = json!({
            "client_id": self.client_id,
            "grant_type": FXA_CREDENTIALS_GRANT,
            "scope": scope,
            "access_type": "online",
        });
        let resp: TokenResponse = self
            .accounts
            .post_with_session("oauth/token", session, &body)
            .await?;
        tracing::debug!(scope, "OAuth token issued");
        Ok(resp.access_token)
    }

    /// Logs in with `email` / `password` and mints a token for `scopes`
    /// (space-joined).
    ///
    /// # Errors
    /// Returns login or authorization failures.
    pub async fn get_bearer_token(
        &self,
        email: &str,
        password: &str,
        scopes: &[&str],
    ) -> Result<String, FxaError> {
        let session = self.accounts.login(email, password).await?;
        self.authorize_token(&session, &scopes.join(" ")).await
    }

    /// `POST /v1/verify` on the OAuth server.
    ///
    /// # Errors
    /// Returns `FxaError::Api` if the token is unknown or expired.
    pub async fn verify_token(&self, token: &str) -> Result<TokenInfo, FxaError> {
        self.post("verify", &json!({ "token": token })).await
    }

    /// `POST /v1/destroy` on the OAuth server.
    ///
    /// # Errors
    /// Returns `FxaError::Api` if the server refuses.
    pub async fn destroy_token(&self, token: &str) -> Result<(), FxaError> {
        let _: Value = self.post("destroy", &json!({ "token": token })).await?;
        Ok(())
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, FxaError> {
        let url = self.base_url.join(path)?;
        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| FxaError::transport(SERVICE, e))?;
        handle_response(SERVICE, resp).await
    }
}

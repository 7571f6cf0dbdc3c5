//! Firefox Accounts auth-server client.

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use crate::error::FxaError;
use crate::hawk::{HawkCredentials, JSON_CONTENT_TYPE, authorization_header};
use crate::http::{build_client, handle_response, versioned_base};
use crate::onepw::{
    KEY_FETCH_TOKEN, PASSWORD_CHANGE_TOKEN, SESSION_TOKEN, StretchedPassword, TokenKeys,
    unbundle_account_keys, xor,
};

const SERVICE: &str = "fxa-auth";

/// A logged-in FxA session.
#[derive(Clone)]
pub struct Session {
    pub uid: String,
    pub email: String,
    /// Hex session token; authorizes Hawk-signed calls.
    pub session_token: String,
    pub verified: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("verified", &self.verified)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Hawk credentials derived from the session token.
    ///
    /// # Errors
    /// Returns an error if the session token is not hex.
    pub fn credentials(&self) -> Result<HawkCredentials, FxaError> {
        Ok(HawkCredentials::from(&TokenKeys::derive(
            &self.session_token,
            SESSION_TOKEN,
        )?))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    uid: String,
    session_token: String,
    #[serde(default)]
    verified: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeStartResponse {
    key_fetch_token: String,
    password_change_token: String,
}

#[derive(Debug, Deserialize)]
struct KeysResponse {
    bundle: String,
}

/// Client for the FxA auth server (`/v1/account/*`, `/v1/password/*`, ...).
#[derive(Debug, Clone)]
pub struct AccountClient {
    http: reqwest::Client,
    base_url: Url,
}

impl AccountClient {
    /// Creates a client for `server_url`; `/v1` is appended when missing.
    ///
    /// # Errors
    /// Returns `FxaError::InvalidUrl` or a transport error if the HTTP client
    /// cannot be built.
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self, FxaError> {
        Ok(Self {
            http: build_client(timeout)?,
            base_url: versioned_base(server_url, "v1")?,
        })
    }

    /// The `/v1/` base URL requests are joined onto.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, FxaError> {
        Ok(self.base_url.join(path)?)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
        credentials: Option<&HawkCredentials>,
    ) -> Result<T, FxaError> {
        let url = self.endpoint(path)?;
        let payload = serde_json::to_vec(body)
            .map_err(|e| FxaError::unexpected(SERVICE, format!("cannot encode body: {e}")))?;

        let mut req = self
            .http
            .request(Method::POST, url.clone())
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE);
        if let Some(credentials) = credentials {
            let header = authorization_header(credentials, "POST", &url, Some(&payload))?;
            req = req.header(AUTHORIZATION, header);
        }
        let resp = req
            .body(payload)
            .send()
            .await
            .map_err(|e| FxaError::transport(SERVICE, e))?;
        handle_response(SERVICE, resp).await
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        credentials: &HawkCredentials,
    ) -> Result<T, FxaError> {
        let url = self.endpoint(path)?;
        let header = authorization_header(credentials, "GET", &url, None)?;
        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, header)
            .send()
            .await
            .map_err(|e| FxaError::transport(SERVICE, e))?;
        handle_response(SERVICE, resp).await
    }

    /// Signs a POST with the session's Hawk credentials.
    pub(crate) async fn post_with_session<T: DeserializeOwned>(
        &self,
        path: &str,
        session: &Session,
        body: &Value,
    ) -> Result<T, FxaError> {
        let credentials = session.credentials()?;
        self.post(path, body, Some(&credentials)).await
    }

    /// `POST /account/create`. The account starts unverified.
    ///
    /// # Errors
    /// Returns `FxaError::Api` if the server refuses (e.g. errno 101, account exists).
    pub async fn create_account(&self, email: &str, password: &str) -> Result<Session, FxaError> {
        let stretched = StretchedPassword::quick_stretch(email, password);
        let body = json!({ "email": email, "authPW": stretched.auth_pw_hex()? });
        let resp: SessionResponse = self.post("account/create", &body, None).await?;
        tracing::info!(uid = %resp.uid, "FxA account created");
        Ok(Self::session(email, resp))
    }

    /// `POST /account/login`, returning a fresh session.
    ///
    /// # Errors
    /// Returns `FxaError::Api` for bad credentials (errno 103) or unknown accounts (102).
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, FxaError> {
        let stretched = StretchedPassword::quick_stretch(email, password);
        let body = json!({ "email": email, "authPW": stretched.auth_pw_hex()? });
        let resp: SessionResponse = self.post("account/login", &body, None).await?;
        tracing::debug!(uid = %resp.uid, "FxA login succeeded");
        Ok(Self::session(email, resp))
    }

    fn session(email: &str, resp: SessionResponse) -> Session {
        Session {
            uid: resp.uid,
            email: email.to_string(),
            session_token: resp.session_token,
            verified: resp.verified,
        }
    }

    /// `POST /recovery_email/verify_code` for the account behind `session`.
    ///
    /// # Errors
    /// Returns `FxaError::Api` if the code is wrong or expired.
    pub async fn verify_email_code(&self, session: &Session, code: &str) -> Result<(), FxaError> {
        let body = json!({ "uid": session.uid, "code": code });
        let _: Value = self.post("recovery_email/verify_code", &body, None).await?;
        tracing::info!(uid = %session.uid, "FxA account verified");
        Ok(())
    }

    /// Runs the full password change: start, fetch and re-wrap kB, finish.
    ///
    /// Existing sessions are invalidated by the server; log in again afterwards.
    ///
    /// # Errors
    /// Returns `FxaError::Api` if the old password is wrong, or a crypto error
    /// if the key bundle does not verify.
    pub async fn change_password(
        &self,
        email: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), FxaError> {
        let old = StretchedPassword::quick_stretch(email, old_password);
        let new = StretchedPassword::quick_stretch(email, new_password);

        let body = json!({ "email": email, "oldAuthPW": old.auth_pw_hex()? });
        let start: ChangeStartResponse = self.post("password/change/start", &body, None).await?;

        let key_fetch = TokenKeys::derive(&start.key_fetch_token, KEY_FETCH_TOKEN)?;
        let keys: KeysResponse = self
            .get("account/keys", &HawkCredentials::from(&key_fetch))
            .await?;
        let (_ka, wrap_kb) = unbundle_account_keys(&key_fetch.request_key, &keys.bundle)?;
        let kb = xor(&wrap_kb, &old.unwrap_b_key()?);
        let new_wrap_kb = xor(&kb, &new.unwrap_b_key()?);

        let change = TokenKeys::derive(&start.password_change_token, PASSWORD_CHANGE_TOKEN)?;
        let body = json!({
            "authPW": new.auth_pw_hex()?,
            "wrapKb": hex::encode(new_wrap_kb),
        });
        let _: Value = self
            .post(
                "password/change/finish",
                &body,
                Some(&HawkCredentials::from(&change)),
            )
            .await?;
        tracing::info!("FxA password changed");
        Ok(())
    }

    /// Logs in and deletes the account.
    ///
    /// # Errors
    /// Returns `FxaError::Api` if the credentials are wrong or the account is gone.
    pub async fn destroy_account(&self, email: &str, password: &str) -> Result<(), FxaError> {
        let session = self.login(email, password).await?;
        let stretched = StretchedPassword::quick_stretch(email, password);
        let body = json!({ "email": email, "authPW": stretched.auth_pw_hex()? });
        let _: Value = self
            .post_with_session("account/destroy", &session, &body)
            .await?;
        tracing::info!(uid = %session.uid, "FxA account destroyed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_is_under_v1() {
        let client =
            AccountClient::new("https://api-accounts.stage.mozaws.net", Duration::from_secs(5))
                .unwrap();
        assert_eq!(
            client.endpoint("account/login").unwrap().as_str(),
            "https://api-accounts.stage.mozaws.net/v1/account/login"
        );
    }

    #[test]
    fn test_session_debug_hides_token() {
        let session = Session {
            uid: "abc".to_string(),
            email: "a@b.c".to_string(),
            session_token: "deadbeef".to_string(),
            verified: true,
        };
        assert!(!format!("{session:?}").contains("deadbeef"));
    }
}

//! restmail.net throwaway inboxes.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::FxaError;
use crate::http::{build_client, handle_response};

const SERVICE: &str = "restmail";

/// Header FxA sets on verification emails.
pub const VERIFY_CODE_HEADER: &str = "x-verify-code";

/// One message as restmail returns it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestmailMessage {
    #[serde(default)]
    pub headers: BTreeMap<String, Value>,
    #[serde(default)]
    pub subject: Option<String>,
}

impl RestmailMessage {
    /// Returns header `name` if it is a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(Value::as_str)
    }
}

/// First `x-verify-code` found across `messages`.
#[must_use]
pub fn find_verification_code(messages: &[RestmailMessage]) -> Option<&str> {
    messages.iter().find_map(|m| m.header(VERIFY_CODE_HEADER))
}

/// An inbox at `<user>@<restmail host>`.
#[derive(Debug, Clone)]
pub struct RestmailAccount {
    http: reqwest::Client,
    mailbox_url: Url,
    user: String,
    email: String,
}

impl RestmailAccount {
    /// Opens a fresh inbox with a random user name.
    ///
    /// # Errors
    /// Returns `FxaError::InvalidUrl` if `server_url` has no host.
    pub fn random(server_url: &str, timeout: Duration) -> Result<Self, FxaError> {
        let user = format!("tokenserver-e2e-{}", uuid::Uuid::new_v4().simple());
        Self::new(server_url, &user, timeout)
    }

    /// Opens the inbox of `user`.
    ///
    /// # Errors
    /// Returns `FxaError::InvalidUrl` if `server_url` has no host.
    pub fn new(server_url: &str, user: &str, timeout: Duration) -> Result<Self, FxaError> {
        let base = Url::parse(&format!("{}/", server_url.trim_end_matches('/')))?;
        let host = base
            .host_str()
            .ok_or_else(|| FxaError::invalid_url(format!("{server_url} has no host")))?;
        let email = format!("{user}@{host}");
        let mailbox_url = base.join(&format!("mail/{user}"))?;
        Ok(Self {
            http: build_client(timeout)?,
            mailbox_url,
            user: user.to_string(),
            email,
        })
    }

    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// `GET /mail/<user>`: every message currently in the inbox.
    ///
    /// # Errors
    /// Returns transport or API errors.
    pub async fn fetch(&self) -> Result<Vec<RestmailMessage>, FxaError> {
        let resp = self
            .http
            .get(self.mailbox_url.clone())
            .send()
            .await
            .map_err(|e| FxaError::transport(SERVICE, e))?;
        let messages: Option<Vec<RestmailMessage>> = handle_response(SERVICE, resp).await?;
        Ok(messages.unwrap_or_default())
    }

    /// `DELETE /mail/<user>`.
    ///
    /// # Errors
    /// Returns transport or API errors.
    pub async fn clear(&self) -> Result<(), FxaError> {
        let resp = self
            .http
            .delete(self.mailbox_url.clone())
            .send()
            .await
            .map_err(|e| FxaError::transport(SERVICE, e))?;
        let _: Value = handle_response(SERVICE, resp).await?;
        tracing::debug!(user = %self.user, "restmail inbox cleared");
        Ok(())
    }
}

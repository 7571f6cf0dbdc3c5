//! Response handling shared by the FxA, OAuth and restmail clients.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::error::FxaError;

/// Builds the HTTP client every collaborator client uses.
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, FxaError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| FxaError::transport("http-client", e))
}

/// Parses `server_url` and makes sure it ends in `/<version>/` so that
/// relative joins land under the API prefix.
pub(crate) fn versioned_base(server_url: &str, version: &str) -> Result<Url, FxaError> {
    let trimmed = server_url.trim_end_matches('/');
    let with_version = if trimmed.ends_with(&format!("/{version}")) {
        format!("{trimmed}/")
    } else {
        format!("{trimmed}/{version}/")
    };
    Ok(Url::parse(&with_version)?)
}

/// Turns a response into `T`, mapping non-2xx answers to `FxaError::Api`.
///
/// FxA error documents (`{code, errno, error, message}`) have their `errno`
/// and `message` lifted into the error; anything else is reported verbatim.
pub(crate) async fn handle_response<T: DeserializeOwned>(
    service: &'static str,
    resp: reqwest::Response,
) -> Result<T, FxaError> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| FxaError::transport(service, e))?;

    if !status.is_success() {
        let (errno, message) = match serde_json::from_str::<Value>(&body) {
            Ok(json) => (
                json.get("errno").and_then(Value::as_i64),
                json.get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned)
                    .unwrap_or(body),
            ),
            Err(_) => (None, body),
        };
        return Err(FxaError::Api {
            service,
            status,
            errno,
            message,
        });
    }

    let body = if body.trim().is_empty() { "null" } else { body.as_str() };
    serde_json::from_str(body)
        .map_err(|e| FxaError::unexpected(service, format!("failed to parse response JSON: {e}")))
}

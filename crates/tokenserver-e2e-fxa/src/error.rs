//! Errors returned by the identity-provider and inbox clients.

use reqwest::StatusCode;
use tokenserver_e2e_crypto::CryptoError;

/// Errors that can occur while talking to FxA, its OAuth server or restmail.
#[derive(Debug, thiserror::Error)]
pub enum FxaError {
    /// The request never produced a response (DNS, TLS, timeout, ...).
    #[error("Failed to reach {service}: {source}")]
    Transport {
        /// Which collaborator was being called.
        service: &'static str,
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with an error document.
    #[error("{service} returned HTTP {status} (errno {errno:?}): {message}")]
    Api {
        /// Which collaborator was being called.
        service: &'static str,
        /// HTTP status code.
        status: StatusCode,
        /// FxA error number, when the body carried one.
        errno: Option<i64>,
        /// Human-readable message from the body, or the raw body.
        message: String,
    },

    /// The service answered 2xx but the body was not what the protocol promises.
    #[error("Unexpected response from {service}: {message}")]
    UnexpectedResponse {
        /// Which collaborator was being called.
        service: &'static str,
        /// Description of what was wrong.
        message: String,
    },

    /// A configured base URL could not be parsed or joined.
    #[error("Invalid URL: {message}")]
    InvalidUrl {
        /// Description of the URL problem.
        message: String,
    },

    /// Key stretching, token derivation or bundle decryption failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl FxaError {
    /// Creates a new `UnexpectedResponse` error.
    #[must_use]
    pub fn unexpected(service: &'static str, message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            service,
            message: message.into(),
        }
    }

    /// Creates a new `InvalidUrl` error.
    #[must_use]
    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            message: message.into(),
        }
    }

    /// Wraps a transport failure for `service`.
    #[must_use]
    pub fn transport(service: &'static str, source: reqwest::Error) -> Self {
        Self::Transport { service, source }
    }

    /// Returns the FxA errno, if this is an API error that carried one.
    #[must_use]
    pub fn errno(&self) -> Option<i64> {
        match self {
            Self::Api { errno, .. } => *errno,
            _ => None,
        }
    }

    /// Returns the HTTP status, if the service answered.
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<url::ParseError> for FxaError {
    fn from(err: url::ParseError) -> Self {
        Self::invalid_url(err.to_string())
    }
}

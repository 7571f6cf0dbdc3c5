//! Harness error type.

use tokenserver_e2e_crypto::CryptoError;
use tokenserver_e2e_fxa::FxaError;

/// Errors produced while provisioning, probing the tokenserver or checking
/// its answers.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// What is wrong.
        message: String,
    },

    /// FxA, OAuth or restmail call failed.
    #[error(transparent)]
    Fxa(#[from] FxaError),

    /// Local crypto (token decoding, HKDF, key generation) failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The tokenserver could not be reached.
    #[error("Tokenserver request failed: {source}")]
    Transport {
        /// Underlying HTTP client error.
        #[source]
        source: reqwest::Error,
    },

    /// The tokenserver answered with something the checks cannot interpret.
    #[error("Unexpected tokenserver response (HTTP {status}): {message}")]
    UnexpectedResponse {
        /// HTTP status code.
        status: u16,
        /// Description or raw body.
        message: String,
    },

    /// A checked value differs from what was computed independently.
    #[error("{field} mismatch: expected {expected}, got {actual}")]
    Mismatch {
        /// Name of the compared field.
        field: String,
        /// Locally computed value.
        expected: String,
        /// Value the server returned.
        actual: String,
    },

    /// The verification email never arrived.
    #[error("No verification email after {attempts} attempts ({elapsed_ms} ms)")]
    VerificationTimeout {
        /// Number of inbox fetches performed.
        attempts: u32,
        /// Wall-clock time spent polling.
        elapsed_ms: u64,
    },

    /// The tokenserver database could not be queried.
    #[error("User lookup failed: {message}")]
    UserDirectory {
        /// Database error text.
        message: String,
    },

    /// The tokenserver database has no row for a uid it just handed out.
    #[error("User {uid} not found in the tokenserver database")]
    UserNotFound {
        /// Tokenserver user id.
        uid: i64,
    },
}

impl HarnessError {
    /// Creates a new `Config` error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a new `Mismatch` error.
    #[must_use]
    pub fn mismatch(
        field: impl Into<String>,
        expected: impl ToString,
        actual: impl ToString,
    ) -> Self {
        Self::Mismatch {
            field: field.into(),
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Creates a new `UnexpectedResponse` error.
    #[must_use]
    pub fn unexpected(status: u16, message: impl Into<String>) -> Self {
        Self::UnexpectedResponse {
            status,
            message: message.into(),
        }
    }

    /// Creates a new `UserDirectory` error.
    #[must_use]
    pub fn user_directory(message: impl Into<String>) -> Self {
        Self::UserDirectory {
            message: message.into(),
        }
    }

    /// Returns true if this is a check failure rather than an infrastructure problem.
    #[must_use]
    pub fn is_assertion_failure(&self) -> bool {
        matches!(
            self,
            Self::Mismatch { .. } | Self::UnexpectedResponse { .. } | Self::UserNotFound { .. }
        )
    }
}

/// Result alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

//! Error types for token and key-derivation operations.

/// Errors raised while deriving secrets, minting or parsing tokens.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The token is not valid URL-safe base64 or is too short to carry a signature.
    #[error("Malformed token: {message}")]
    MalformedToken {
        /// Description of what is wrong with the token bytes.
        message: String,
    },

    /// The payload signature does not match the expected HMAC.
    #[error("Invalid token signature")]
    InvalidSignature,

    /// The token payload carries an `expires` timestamp in the past.
    #[error("Token expired at {expires}")]
    Expired {
        /// The `expires` value found in the payload (unix seconds).
        expires: f64,
    },

    /// The token payload is not the JSON object the signer produced.
    #[error("Invalid token payload: {message}")]
    InvalidPayload {
        /// Description of why the payload was rejected.
        message: String,
    },

    /// A key derivation was asked for an output the KDF cannot produce.
    #[error("Key derivation failed: {message}")]
    KeyDerivation {
        /// Description of the derivation failure.
        message: String,
    },

    /// Failed to generate or load a signing key.
    #[error("Key generation error: {message}")]
    KeyGeneration {
        /// Description of the key generation error.
        message: String,
    },

    /// Failed to encode a JWT.
    #[error("Failed to encode JWT: {message}")]
    JwtEncoding {
        /// Description of the encoding error.
        message: String,
    },
}

impl CryptoError {
    /// Creates a new `MalformedToken` error.
    #[must_use]
    pub fn malformed_token(message: impl Into<String>) -> Self {
        Self::MalformedToken {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidPayload` error.
    #[must_use]
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }

    /// Creates a new `KeyDerivation` error.
    #[must_use]
    pub fn key_derivation(message: impl Into<String>) -> Self {
        Self::KeyDerivation {
            message: message.into(),
        }
    }

    /// Creates a new `KeyGeneration` error.
    #[must_use]
    pub fn key_generation(message: impl Into<String>) -> Self {
        Self::KeyGeneration {
            message: message.into(),
        }
    }

    /// Creates a new `JwtEncoding` error.
    #[must_use]
    pub fn jwt_encoding(message: impl Into<String>) -> Self {
        Self::JwtEncoding {
            message: message.into(),
        }
    }

    /// Returns `true` if the token itself was rejected (as opposed to a local failure).
    #[must_use]
    pub fn is_token_rejection(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken { .. }
                | Self::InvalidSignature
                | Self::Expired { .. }
                | Self::InvalidPayload { .. }
        )
    }
}

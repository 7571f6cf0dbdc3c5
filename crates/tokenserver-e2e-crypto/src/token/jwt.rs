//! Forged bearer tokens for negative testing.
//!
//! The tokenserver must reject a JWT that is well formed but signed by a key
//! it has never seen. This module produces exactly that: a throwaway RSA-2048
//! key pair and an RS256 JWT carrying fabricated, long-expired claims.
//!
//! ## Example
//!
//! ```ignore
//! use tokenserver_e2e_crypto::token::jwt::forge_bearer_token;
//!
//! let token = forge_bearer_token()?;
//! assert_eq!(token.split('.').count(), 3);
//! ```

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use serde::{Deserialize, Serialize};

use crate::error::CryptoError;

/// RSA modulus size for throwaway keys.
pub const THROWAWAY_KEY_BITS: usize = 2048;

/// Claims carried by a forged token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ForgedClaims {
    /// Subject that no identity provider ever issued.
    pub sub: String,
    /// Issued-at, far in the past.
    pub iat: i64,
    /// Expiration, far in the past.
    pub exp: i64,
}

impl Default for ForgedClaims {
    fn default() -> Self {
        Self {
            sub: "fake sub".to_string(),
            iat: 12345,
            exp: 12345,
        }
    }
}

/// A freshly generated RSA key pair no server trusts.
pub struct ThrowawayKey {
    encoding_key: EncodingKey,
    /// PKCS#1 ("traditional OpenSSL") PEM of the private key.
    pub private_pem: String,
    /// SPKI PEM of the public key, for verifying forged tokens in tests.
    pub public_pem: String,
}

impl ThrowawayKey {
    /// Generates a new RSA-2048 key pair.
    ///
    /// # Errors
    /// Returns `CryptoError::KeyGeneration` if key generation or PEM export fails.
    pub fn generate() -> Result<Self, CryptoError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, THROWAWAY_KEY_BITS)
            .map_err(|e| CryptoError::key_generation(e.to_string()))?;

        let private_pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| CryptoError::key_generation(e.to_string()))?
            .as_str()
            .to_owned();

        let public_pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::key_generation(e.to_string()))?;

        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| CryptoError::key_generation(e.to_string()))?;

        Ok(Self {
            encoding_key,
            private_pem,
            public_pem,
        })
    }

    /// Signs `claims` as an RS256 JWT.
    ///
    /// # Errors
    /// Returns `CryptoError::JwtEncoding` if the claims cannot be encoded.
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, CryptoError> {
        encode(&Header::new(Algorithm::RS256), claims, &self.encoding_key)
            .map_err(|e| CryptoError::jwt_encoding(e.to_string()))
    }
}

/// Generates a throwaway key and signs the default [`ForgedClaims`] with it.
///
/// # Errors
/// Returns an error if key generation or encoding fails.
pub fn forge_bearer_token() -> Result<String, CryptoError> {
    ThrowawayKey::generate()?.sign(&ForgedClaims::default())
}

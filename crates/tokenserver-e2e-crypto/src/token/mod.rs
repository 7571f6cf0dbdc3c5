//! Token minting, parsing and forging.
//!
//! - [`tokenlib`] - signed `id` tokens and their derived secrets
//! - [`json`] - Python-compatible payload serialization
//! - [`jwt`] - forged RS256 bearer tokens for negative tests

pub mod json;
pub mod jwt;
pub mod tokenlib;

pub use jwt::{ForgedClaims, ThrowawayKey, forge_bearer_token};
pub use tokenlib::{
    DEFAULT_TIMEOUT_SECS, DERIVE_INFO_PREFIX, SIGNATURE_LEN, SignedToken, TokenManager,
};

//! # tokenserver-e2e-crypto
//!
//! Cryptographic building blocks for the tokenserver end-to-end suite.
//!
//! The suite never trusts the server's own word that a token is valid: it
//! recomputes every secret and signature independently. This crate holds
//! those computations.
//!
//! ## Modules
//!
//! - [`node_secret`] - HKDF helpers and per-node secret derivation
//! - [`token`] - tokenlib-format tokens and forged JWTs
//! - [`metrics_hash`] - `hashed_fxa_uid` / `hashed_device_id` replicas
//! - [`password`] - random passwords for ephemeral accounts
//! - [`error`] - error type shared by the modules above

pub mod error;
pub mod metrics_hash;
pub mod node_secret;
pub mod password;
pub mod token;

pub use error::CryptoError;
pub use metrics_hash::{fxa_metrics_hash, hashed_device_id, hashed_fxa_uid};
pub use node_secret::{derive_node_secret, hkdf_sha256, master_secret_from_raw};
pub use password::generate_password;
pub use token::{SignedToken, TokenManager, forge_bearer_token};

/// Type alias for results of this crate.
pub type CryptoResult<T> = Result<T, CryptoError>;

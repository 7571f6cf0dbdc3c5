//! Clients for the services the tokenserver suite depends on:
//!
//! - [`account`]: the FxA auth server (account lifecycle, password change)
//! - [`oauth`]: OAuth access tokens for a fixed client id
//! - [`restmail`]: throwaway inboxes that receive verification codes
//!
//! [`onepw`] and [`hawk`] hold the client-side crypto those calls need.

pub mod account;
pub mod error;
mod http;
pub mod hawk;
pub mod oauth;
pub mod onepw;
pub mod restmail;

pub use account::{AccountClient, Session};
pub use error::FxaError;
pub use oauth::{OAuthClient, TokenInfo};
pub use restmail::{RestmailAccount, RestmailMessage, find_verification_code};

/// Result alias for this crate.
pub type FxaResult<T> = Result<T, FxaError>;

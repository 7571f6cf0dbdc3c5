//! End-to-end suite for the Sync tokenserver running against Firefox Accounts.
//!
//! A run provisions a throwaway FxA account (see [`fixture`]), exchanges it
//! for OAuth tokens, calls `GET /1.0/sync/1.5` and checks each answer
//! against values recomputed from the deployment's shared secrets
//! (see [`scenarios`]).

pub mod config;
pub mod error;
pub mod fixture;
pub mod observability;
pub mod poll;
pub mod scenarios;
pub mod tokenserver;
pub mod users;

pub use config::E2eConfig;
pub use error::{HarnessError, HarnessResult};
pub use fixture::{E2eContext, Services, with_context, with_services};
pub use scenarios::{Scenario, ScenarioOutcome, TokenVerifier, Verdict, run_suite};
pub use tokenserver::{TokenResponse, TokenserverClient};
pub use users::{InMemoryUserDirectory, PgUserDirectory, UserDirectory, UserRecord};

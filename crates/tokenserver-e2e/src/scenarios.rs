//! The checks run against a deployment.
//!
//! Each scenario returns `Ok` or the first [`HarnessError`] it hits, so the
//! same code backs the integration tests and the CLI report.

use std::time::{Duration, Instant};

use assert_json_diff::{CompareMode, Config, assert_json_matches_no_panic};
use reqwest::StatusCode;
use serde_json::{Value, json};
use tokenserver_e2e_crypto::{
    SignedToken, TokenManager, derive_node_secret, forge_bearer_token, hashed_fxa_uid,
    master_secret_from_raw,
};

use crate::config::{E2eConfig, TokenserverSettings};
use crate::error::HarnessError;
use crate::fixture::E2eContext;
use crate::tokenserver::{TokenEndpointResponse, TokenResponse};
use crate::users::UserRecord;

/// Authorization header using a scheme the tokenserver does not know.
pub const UNSUPPORTED_AUTHORIZATION: &str = "Unsupported-Auth-Scheme IHACKYOU";

/// Only digest the tokenserver hands out.
pub const EXPECTED_HASHALG: &str = "sha256";

/// 401 body for an unparsable `Authorization` header.
#[must_use]
pub fn unsupported_error_body() -> Value {
    json!({
        "status": "error",
        "errors": [{ "location": "body", "name": "", "description": "Unsupported" }]
    })
}

/// 401 body for a bearer token the tokenserver will not accept.
#[must_use]
pub fn invalid_credentials_body() -> Value {
    json!({
        "status": "invalid-credentials",
        "errors": [{ "location": "body", "name": "", "description": "Unauthorized" }]
    })
}

/// Checks status and exact body of an error answer.
///
/// # Errors
/// Returns `Mismatch` on the first difference.
pub fn expect_error_response(
    resp: &TokenEndpointResponse,
    status: StatusCode,
    body: &Value,
) -> Result<(), HarnessError> {
    if resp.status != status {
        return Err(HarnessError::mismatch("status", status, resp.status));
    }
    assert_json_matches_no_panic(&resp.body, body, Config::new(CompareMode::Strict))
        .map_err(|diff| HarnessError::mismatch("error body", body, diff))
}

/// Recomputes everything a token response should contain from the
/// deployment's shared secrets.
#[derive(Clone)]
pub struct TokenVerifier {
    node_url: String,
    manager: TokenManager,
    metrics_secret: String,
    duration: u64,
    node_type: String,
}

impl std::fmt::Debug for TokenVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("node_url", &self.node_url)
            .field("duration", &self.duration)
            .field("node_type", &self.node_type)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier {
    /// Derives the node secret for `settings.node_url` from the raw signing secret.
    ///
    /// # Errors
    /// Returns a crypto error if the secret is empty.
    pub fn from_settings(settings: &TokenserverSettings) -> Result<Self, HarnessError> {
        let master = master_secret_from_raw(&settings.token_signing_secret);
        let node_secret = derive_node_secret(&master, &settings.node_url)?;
        Ok(Self {
            node_url: settings.node_url.clone(),
            manager: TokenManager::new(node_secret)?.with_timeout(settings.token_duration),
            metrics_secret: settings.fxa_metrics_hash_secret.clone(),
            duration: settings.token_duration,
            node_type: settings.node_type.clone(),
        })
    }

    /// Token manager keyed by the node secret.
    #[must_use]
    pub fn manager(&self) -> &TokenManager {
        &self.manager
    }

    /// Verifies every field of `token` for the account `fxa_uid`.
    ///
    /// The signature is checked over the payload bytes exactly as received,
    /// and `uid` must agree with the one signed into `id`. `user` is the
    /// tokenserver row for `token.uid`, when available.
    ///
    /// # Errors
    /// Returns `Mismatch` for the first field that differs, or a crypto error
    /// if `id` cannot be decoded.
    pub fn verify(
        &self,
        token: &TokenResponse,
        fxa_uid: &str,
        user: Option<&UserRecord>,
    ) -> Result<(), HarnessError> {
        let signed = SignedToken::decode(&token.id)?;
        if self
            .manager
            .verify_signature(&signed.payload, &signed.signature)
            .is_err()
        {
            return Err(HarnessError::mismatch(
                "id signature",
                hex::encode(self.manager.sign(&signed.payload)),
                hex::encode(signed.signature),
            ));
        }

        let payload = signed.payload_json()?;
        let expected_key = self.manager.get_derived_secret(&token.id)?;
        check("key", &expected_key, &token.key)?;

        // The signed payload is authoritative even without the users table.
        match payload.get("uid").and_then(Value::as_i64) {
            Some(signed_uid) => check("uid", &signed_uid, &token.uid)?,
            None => return Err(HarnessError::mismatch("id payload uid", "an integer", "nothing")),
        }
        if let Some(user) = user {
            check("uid", &user.uid, &token.uid)?;
        }
        let expected_endpoint = format!("{}/1.5/{}", self.node_url, token.uid);
        check("api_endpoint", &expected_endpoint, &token.api_endpoint)?;
        check("duration", &self.duration, &token.duration)?;
        check("hashalg", &EXPECTED_HASHALG, &token.hashalg.as_str())?;
        check(
            "hashed_fxa_uid",
            &hashed_fxa_uid(&self.metrics_secret, fxa_uid),
            &token.hashed_fxa_uid,
        )?;
        check("node_type", &self.node_type, &token.node_type)?;
        if let Some(signed_fxa_uid) = payload.get("fxa_uid").and_then(Value::as_str) {
            check("id payload fxa_uid", fxa_uid, signed_fxa_uid)?;
        }
        Ok(())
    }
}

fn check<T: PartialEq + std::fmt::Display + ?Sized>(
    field: &str,
    expected: &T,
    actual: &T,
) -> Result<(), HarnessError> {
    if expected == actual {
        Ok(())
    } else {
        Err(HarnessError::mismatch(field, expected, actual))
    }
}

/// A malformed auth scheme gets the generic `error` body.
///
/// # Errors
/// Returns `Mismatch` if the answer differs.
pub async fn unsupported_auth_scheme(ctx: &E2eContext) -> Result<(), HarnessError> {
    let resp = ctx
        .services()
        .tokenserver
        .get_token_with_authorization(UNSUPPORTED_AUTHORIZATION)
        .await?;
    expect_error_response(&resp, StatusCode::UNAUTHORIZED, &unsupported_error_body())
}

/// A JWT signed by a key nobody trusts is `invalid-credentials`.
///
/// # Errors
/// Returns `Mismatch` if the answer differs.
pub async fn invalid_bearer_token(ctx: &E2eContext) -> Result<(), HarnessError> {
    let forged = forge_bearer_token()?;
    let resp = ctx.services().tokenserver.get_token(&forged).await?;
    expect_error_response(&resp, StatusCode::UNAUTHORIZED, &invalid_credentials_body())
}

/// A genuine token for the wrong scope is `invalid-credentials` too.
///
/// # Errors
/// Returns `Mismatch` if the answer differs.
pub async fn untrusted_scope(ctx: &E2eContext) -> Result<(), HarnessError> {
    let token = ctx.bad_scope_token().await?;
    let resp = ctx.services().tokenserver.get_token(&token).await?;
    expect_error_response(&resp, StatusCode::UNAUTHORIZED, &invalid_credentials_body())
}

/// A good token yields a fully verifiable token response.
///
/// Without a tokenserver database the `uid` is only checked against the
/// signed payload; [`run_suite`] reports that as a skip.
///
/// # Errors
/// Returns `Mismatch`, `UserNotFound` or `UnexpectedResponse` on failure.
pub async fn valid_request(ctx: &E2eContext) -> Result<TokenResponse, HarnessError> {
    let verifier = TokenVerifier::from_settings(&ctx.config().tokenserver)?;
    let token = ctx
        .services()
        .tokenserver
        .get_token(ctx.oauth_token())
        .await?
        .into_token()?;

    let user = match &ctx.services().users {
        Some(users) => Some(
            users
                .get_user(token.uid)
                .await?
                .ok_or(HarnessError::UserNotFound { uid: token.uid })?,
        ),
        None => None,
    };

    verifier.verify(&token, ctx.fxa_uid(), user.as_ref())?;
    tracing::info!(uid = token.uid, "token response verified");
    Ok(token)
}

/// Node-secret derivation is a pure function of its inputs.
///
/// # Errors
/// Returns `Mismatch` if two derivations differ.
pub fn node_secret_is_deterministic(config: &E2eConfig) -> Result<(), HarnessError> {
    let master = master_secret_from_raw(&config.tokenserver.token_signing_secret);
    let first = derive_node_secret(&master, &config.tokenserver.node_url)?;
    let second = derive_node_secret(&master, &config.tokenserver.node_url)?;
    check("node secret", &first, &second)
}

/// After a password change the refreshed credentials still work.
///
/// # Errors
/// Returns FxA failures from the rotation or any `valid_request` failure.
pub async fn password_rotation(ctx: &mut E2eContext) -> Result<TokenResponse, HarnessError> {
    ctx.change_password().await?;
    valid_request(ctx).await
}

/// Why a scenario could not be fully checked.
pub const NO_USER_DIRECTORY: &str =
    "no tokenserver database configured; uid checked against the signed token only";

/// How a scenario that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Skipped { reason: &'static str },
}

/// Outcome of one scenario in a suite run.
#[derive(Debug)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub result: Result<Verdict, HarnessError>,
    pub elapsed: Duration,
}

impl ScenarioOutcome {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.scenario.name()
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self.result, Ok(Verdict::Passed))
    }

    #[must_use]
    pub fn skipped(&self) -> bool {
        matches!(self.result, Ok(Verdict::Skipped { .. }))
    }

    #[must_use]
    pub fn failed(&self) -> bool {
        self.result.is_err()
    }
}

/// The checks [`run_suite`] knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    UnsupportedAuthScheme,
    InvalidBearerToken,
    UntrustedScope,
    ValidRequest,
    NodeSecretIsDeterministic,
    PasswordRotation,
}

impl Scenario {
    /// Every scenario, in execution order. Password rotation goes last
    /// because it replaces the context's credentials.
    pub const ALL: [Scenario; 6] = [
        Scenario::UnsupportedAuthScheme,
        Scenario::InvalidBearerToken,
        Scenario::UntrustedScope,
        Scenario::ValidRequest,
        Scenario::NodeSecretIsDeterministic,
        Scenario::PasswordRotation,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Scenario::UnsupportedAuthScheme => "unsupported_auth_scheme",
            Scenario::InvalidBearerToken => "invalid_bearer_token",
            Scenario::UntrustedScope => "untrusted_scope",
            Scenario::ValidRequest => "valid_request",
            Scenario::NodeSecretIsDeterministic => "node_secret_is_deterministic",
            Scenario::PasswordRotation => "password_rotation",
        }
    }

    /// Runs this scenario against `ctx`.
    ///
    /// # Errors
    /// Returns the scenario's failure.
    pub async fn run(self, ctx: &mut E2eContext) -> Result<Verdict, HarnessError> {
        match self {
            Scenario::UnsupportedAuthScheme => unsupported_auth_scheme(ctx).await?,
            Scenario::InvalidBearerToken => invalid_bearer_token(ctx).await?,
            Scenario::UntrustedScope => untrusted_scope(ctx).await?,
            Scenario::ValidRequest => {
                valid_request(ctx).await?;
                return Ok(user_check_verdict(ctx));
            }
            Scenario::NodeSecretIsDeterministic => node_secret_is_deterministic(ctx.config())?,
            Scenario::PasswordRotation => {
                password_rotation(ctx).await?;
                return Ok(user_check_verdict(ctx));
            }
        }
        Ok(Verdict::Passed)
    }
}

fn user_check_verdict(ctx: &E2eContext) -> Verdict {
    if ctx.services().users.is_some() {
        Verdict::Passed
    } else {
        Verdict::Skipped {
            reason: NO_USER_DIRECTORY,
        }
    }
}

/// Runs every scenario in order against `ctx`, continuing past failures.
pub async fn run_suite(ctx: &mut E2eContext) -> Vec<ScenarioOutcome> {
    let mut outcomes = Vec::with_capacity(Scenario::ALL.len());
    for scenario in Scenario::ALL {
        let name = scenario.name();
        let started = Instant::now();
        let result = scenario.run(ctx).await;
        match &result {
            Ok(Verdict::Passed) => tracing::info!(scenario = name, "passed"),
            Ok(Verdict::Skipped { reason }) => {
                tracing::warn!(scenario = name, reason, "incomplete, reported as skipped");
            }
            Err(err) => tracing::error!(scenario = name, error = %err, "failed"),
        }
        outcomes.push(ScenarioOutcome {
            scenario,
            result,
            elapsed: started.elapsed(),
        });
    }
    outcomes
}

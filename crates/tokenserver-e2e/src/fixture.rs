//! Suite fixture: one verified FxA account with a live session and an OAuth
//! token, created at setup and destroyed at teardown.
//!
//! [`with_context`] is the usual entry point. It runs the body between
//! setup and teardown and tears down on every exit path, including a panic
//! in the body. When setup itself fails part-way, whatever was already
//! created is cleaned up before the error is returned.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokenserver_e2e_crypto::generate_password;
use tokenserver_e2e_fxa::{
    AccountClient, OAuthClient, RestmailAccount, Session, find_verification_code,
};

use crate::config::E2eConfig;
use crate::error::HarnessError;
use crate::poll::poll_until;
use crate::tokenserver::TokenserverClient;
use crate::users::{UserDirectory, connect_from_config};

/// Scope the tokenserver must refuse.
pub const BAD_SCOPE: &str = "bad_scope";

/// Clients for every service the suite talks to.
#[derive(Clone)]
pub struct Services {
    pub accounts: AccountClient,
    pub oauth: OAuthClient,
    pub tokenserver: TokenserverClient,
    pub users: Option<Arc<dyn UserDirectory>>,
}

impl Services {
    /// Builds clients from `config`, connecting to the tokenserver database
    /// when one is configured.
    ///
    /// # Errors
    /// Returns `Config` for bad URLs or `UserDirectory` if the database is unreachable.
    pub async fn from_config(config: &E2eConfig) -> Result<Self, HarnessError> {
        let users = connect_from_config(
            config.tokenserver.database_url.as_deref(),
            config.request_timeout(),
        )
        .await?;
        Self::with_users(config, users)
    }

    /// Builds clients from `config` with an explicit user directory.
    ///
    /// # Errors
    /// Returns `Config` or `Fxa(InvalidUrl)` for bad URLs.
    pub fn with_users(
        config: &E2eConfig,
        users: Option<Arc<dyn UserDirectory>>,
    ) -> Result<Self, HarnessError> {
        let timeout = config.request_timeout();
        let accounts = AccountClient::new(&config.fxa.account_server_url, timeout)?;
        let oauth = OAuthClient::new(
            config.fxa.client_id.clone(),
            &config.fxa.oauth_server_url,
            accounts.clone(),
            timeout,
        )?;
        let tokenserver =
            TokenserverClient::new(&config.tokenserver.url, &config.tokenserver.key_id, timeout)?;
        Ok(Self {
            accounts,
            oauth,
            tokenserver,
            users,
        })
    }
}

/// A provisioned, verified account and the credentials derived from it.
pub struct E2eContext {
    config: E2eConfig,
    services: Services,
    inbox: RestmailAccount,
    password: String,
    session: Session,
    oauth_token: String,
}

impl std::fmt::Debug for E2eContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("E2eContext")
            .field("email", &self.inbox.email())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl E2eContext {
    /// Creates, verifies and authorizes a fresh account.
    ///
    /// # Errors
    /// Any failure is fatal. A half-created account is destroyed before the
    /// error is returned.
    pub async fn setup(config: E2eConfig, services: Services) -> Result<Self, HarnessError> {
        let inbox = RestmailAccount::random(&config.restmail.server_url, config.request_timeout())?;
        let password = generate_password();
        let mut created = false;

        match provision(&config, &services, &inbox, &password, &mut created).await {
            Ok((session, oauth_token)) => Ok(Self {
                config,
                services,
                inbox,
                password,
                session,
                oauth_token,
            }),
            Err(err) => {
                tracing::error!(error = %err, "account setup failed");
                if let Err(cleanup) = release(&services, &inbox, &password, created).await {
                    tracing::error!(error = %cleanup, "cleanup after failed setup also failed");
                }
                Err(err)
            }
        }
    }

    #[must_use]
    pub fn config(&self) -> &E2eConfig {
        &self.config
    }

    #[must_use]
    pub fn services(&self) -> &Services {
        &self.services
    }

    #[must_use]
    pub fn email(&self) -> &str {
        self.inbox.email()
    }

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// FxA uid of the account.
    #[must_use]
    pub fn fxa_uid(&self) -> &str {
        &self.session.uid
    }

    /// Current bearer token for the trusted scope.
    #[must_use]
    pub fn oauth_token(&self) -> &str {
        &self.oauth_token
    }

    /// Logs in afresh and asks for a token scoped to [`BAD_SCOPE`].
    ///
    /// # Errors
    /// Propagates login or authorization failures.
    pub async fn bad_scope_token(&self) -> Result<String, HarnessError> {
        Ok(self
            .services
            .oauth
            .get_bearer_token(self.email(), &self.password, &[BAD_SCOPE])
            .await?)
    }

    /// Rotates the password, then refreshes the session and the OAuth token.
    ///
    /// # Errors
    /// Propagates FxA failures. If the change itself succeeded the new
    /// password is kept even when the refresh fails, so teardown still works.
    pub async fn change_password(&mut self) -> Result<(), HarnessError> {
        let new_password = generate_password();
        self.services
            .accounts
            .change_password(self.inbox.email(), &self.password, &new_password)
            .await?;
        self.password = new_password;

        self.session = self
            .services
            .accounts
            .login(self.inbox.email(), &self.password)
            .await?;
        self.oauth_token = self
            .services
            .oauth
            .authorize_token(&self.session, &self.config.fxa.scope)
            .await?;
        tracing::info!(uid = %self.session.uid, "session and OAuth token refreshed");
        Ok(())
    }

    /// Clears the inbox and destroys the account.
    ///
    /// Both steps are attempted; the first error is returned.
    ///
    /// # Errors
    /// Returns the inbox or account-destruction failure.
    pub async fn teardown(self) -> Result<(), HarnessError> {
        release(&self.services, &self.inbox, &self.password, true).await
    }
}

async fn provision(
    config: &E2eConfig,
    services: &Services,
    inbox: &RestmailAccount,
    password: &str,
    created: &mut bool,
) -> Result<(Session, String), HarnessError> {
    let session = services
        .accounts
        .create_account(inbox.email(), password)
        .await?;
    *created = true;

    let code = poll_until(config.poll_policy(), |attempt| async move {
        let messages = inbox.fetch().await?;
        tracing::debug!(attempt, messages = messages.len(), "polled inbox");
        Ok::<_, HarnessError>(find_verification_code(&messages).map(str::to_owned))
    })
    .await?;
    services.accounts.verify_email_code(&session, &code).await?;

    let oauth_token = services
        .oauth
        .authorize_token(&session, &config.fxa.scope)
        .await?;
    tracing::info!(uid = %session.uid, "test account ready");
    Ok((session, oauth_token))
}

async fn release(
    services: &Services,
    inbox: &RestmailAccount,
    password: &str,
    account_created: bool,
) -> Result<(), HarnessError> {
    let cleared = inbox.clear().await;
    if let Err(err) = &cleared {
        tracing::warn!(error = %err, "failed to clear inbox");
    }
    if account_created {
        services
            .accounts
            .destroy_account(inbox.email(), password)
            .await?;
    }
    cleared.map_err(HarnessError::from)
}

/// Runs `body` against a fresh context and always tears it down.
///
/// A body error wins over a teardown error; the latter is logged. A panic
/// in the body is resumed after teardown.
///
/// # Errors
/// Returns setup, body or teardown errors.
pub async fn with_context<T, F>(config: E2eConfig, body: F) -> Result<T, HarnessError>
where
    F: for<'a> FnOnce(&'a mut E2eContext) -> BoxFuture<'a, Result<T, HarnessError>>,
{
    let services = Services::from_config(&config).await?;
    with_services(config, services, body).await
}

/// Like [`with_context`] with pre-built services.
///
/// # Errors
/// Returns setup, body or teardown errors.
pub async fn with_services<T, F>(
    config: E2eConfig,
    services: Services,
    body: F,
) -> Result<T, HarnessError>
where
    F: for<'a> FnOnce(&'a mut E2eContext) -> BoxFuture<'a, Result<T, HarnessError>>,
{
    let mut ctx = E2eContext::setup(config, services).await?;
    let outcome = AssertUnwindSafe(body(&mut ctx)).catch_unwind().await;
    let teardown = ctx.teardown().await;

    match outcome {
        Ok(Ok(value)) => teardown.map(|()| value),
        Ok(Err(err)) => {
            if let Err(teardown_err) = teardown {
                tracing::error!(error = %teardown_err, "teardown failed after body error");
            }
            Err(err)
        }
        Err(panic) => {
            if let Err(teardown_err) = teardown {
                tracing::error!(error = %teardown_err, "teardown failed after panic");
            }
            std::panic::resume_unwind(panic)
        }
    }
}

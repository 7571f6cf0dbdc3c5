use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::poll::PollPolicy;

/// Client id of Firefox Desktop, which the FxA team sanctions for this suite.
pub const DEFAULT_CLIENT_ID: &str = "5882386c6d801776";
/// Scope the tokenserver trusts.
pub const SYNC_SCOPE: &str = "https://identity.mozilla.com/apps/oldsync";
pub const FXA_ACCOUNT_STAGE_HOST: &str = "https://api-accounts.stage.mozaws.net";
pub const FXA_OAUTH_STAGE_HOST: &str = "https://oauth.stage.mozaws.net";
pub const DEFAULT_TOKEN_DURATION: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct E2eConfig {
    #[serde(default)]
    pub fxa: FxaSettings,
    #[serde(default)]
    pub restmail: RestmailSettings,
    #[serde(default)]
    pub tokenserver: TokenserverSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl E2eConfig {
    pub fn validate(&self) -> Result<(), String> {
        // URLs
        for (key, value) in [
            ("fxa.account_server_url", &self.fxa.account_server_url),
            ("fxa.oauth_server_url", &self.fxa.oauth_server_url),
            ("restmail.server_url", &self.restmail.server_url),
            ("tokenserver.url", &self.tokenserver.url),
            ("tokenserver.node_url", &self.tokenserver.node_url),
        ] {
            if value.is_empty() {
                return Err(format!("{key} must be set"));
            }
            url::Url::parse(value).map_err(|e| format!("{key} is not a valid URL: {e}"))?;
        }
        if self.fxa.client_id.is_empty() || self.fxa.scope.is_empty() {
            return Err("fxa.client_id and fxa.scope must not be empty".into());
        }
        if self.fxa.request_timeout_ms == 0 {
            return Err("fxa.request_timeout_ms must be > 0".into());
        }
        // Polling
        if self.restmail.poll_interval_ms == 0 {
            return Err("restmail.poll_interval_ms must be > 0".into());
        }
        if self.restmail.max_attempts == 0 {
            return Err("restmail.max_attempts must be > 0".into());
        }
        if self.restmail.timeout_ms < self.restmail.poll_interval_ms {
            return Err("restmail.timeout_ms must be >= restmail.poll_interval_ms".into());
        }
        // Secrets shared with the tokenserver deployment
        if self.tokenserver.token_signing_secret.is_empty() {
            return Err("tokenserver.token_signing_secret must be set".into());
        }
        if self.tokenserver.fxa_metrics_hash_secret.is_empty() {
            return Err("tokenserver.fxa_metrics_hash_secret must be set".into());
        }
        if self.tokenserver.key_id.is_empty() {
            return Err("tokenserver.key_id must not be empty".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.fxa.request_timeout_ms)
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.restmail.poll_interval_ms),
            max_attempts: self.restmail.max_attempts,
            timeout: Duration::from_millis(self.restmail.timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FxaSettings {
    #[serde(default = "default_account_server_url")]
    pub account_server_url: String,
    #[serde(default = "default_oauth_server_url")]
    pub oauth_server_url: String,
    #[serde(default = "default_client_id")]
    pub client_id: String,
    #[serde(default = "default_scope")]
    pub scope: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_account_server_url() -> String {
    FXA_ACCOUNT_STAGE_HOST.into()
}
fn default_oauth_server_url() -> String {
    FXA_OAUTH_STAGE_HOST.into()
}
fn default_client_id() -> String {
    DEFAULT_CLIENT_ID.into()
}
fn default_scope() -> String {
    SYNC_SCOPE.into()
}
fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for FxaSettings {
    fn default() -> Self {
        Self {
            account_server_url: default_account_server_url(),
            oauth_server_url: default_oauth_server_url(),
            client_id: default_client_id(),
            scope: default_scope(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestmailSettings {
    #[serde(default = "default_restmail_url")]
    pub server_url: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_poll_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_restmail_url() -> String {
    "https://restmail.net".into()
}
fn default_poll_interval_ms() -> u64 {
    500
}
fn default_max_attempts() -> u32 {
    120
}
fn default_poll_timeout_ms() -> u64 {
    60_000
}

impl Default for RestmailSettings {
    fn default() -> Self {
        Self {
            server_url: default_restmail_url(),
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
            timeout_ms: default_poll_timeout_ms(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TokenserverSettings {
    #[serde(default = "default_tokenserver_url")]
    pub url: String,
    /// Storage node the deployment assigns users to; part of the node-secret info.
    #[serde(default)]
    pub node_url: String,
    /// Raw `TOKEN_SIGNING_SECRET` of the deployment.
    #[serde(default)]
    pub token_signing_secret: String,
    #[serde(default)]
    pub fxa_metrics_hash_secret: String,
    /// Tokenserver database; the user-record check is skipped when unset.
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_key_id")]
    pub key_id: String,
    #[serde(default = "default_token_duration")]
    pub token_duration: u64,
    #[serde(default = "default_node_type")]
    pub node_type: String,
}

fn default_tokenserver_url() -> String {
    "http://localhost:8000".into()
}
fn default_key_id() -> String {
    "1234-YWFh".into()
}
fn default_token_duration() -> u64 {
    DEFAULT_TOKEN_DURATION
}
fn default_node_type() -> String {
    "spanner".into()
}

impl Default for TokenserverSettings {
    fn default() -> Self {
        Self {
            url: default_tokenserver_url(),
            node_url: String::new(),
            token_signing_secret: String::new(),
            fxa_metrics_hash_secret: String::new(),
            database_url: None,
            key_id: default_key_id(),
            token_duration: default_token_duration(),
            node_type: default_node_type(),
        }
    }
}

impl std::fmt::Debug for TokenserverSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenserverSettings")
            .field("url", &self.url)
            .field("node_url", &self.node_url)
            .field("token_signing_secret", &"[redacted]")
            .field("fxa_metrics_hash_secret", &"[redacted]")
            .field("database_url", &self.database_url.as_ref().map(|_| "[redacted]"))
            .field("key_id", &self.key_id)
            .field("token_duration", &self.token_duration)
            .field("node_type", &self.node_type)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::E2eConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default file looked up in the working directory.
    pub const DEFAULT_CONFIG_FILE: &str = "tokenserver-e2e.toml";

    pub fn load_config(path: Option<&str>) -> Result<E2eConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.exists() {
                    return Err(format!("config file not found: {p}"));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., TOKENSERVER_E2E__TOKENSERVER__NODE_URL=...
        builder = builder.add_source(
            Environment::with_prefix("TOKENSERVER_E2E")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: E2eConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tokenserver-e2e")]
#[command(about = "End-to-end checks for a Sync tokenserver backed by Firefox Accounts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to a TOML config file (defaults to ./tokenserver-e2e.toml when present)
    #[arg(short, long, global = true, env = "TOKENSERVER_E2E_CONFIG")]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Provision a throwaway account and run every scenario against the tokenserver
    Run,
    /// Derive the per-node signing secret from the raw token-signing secret
    DeriveSecret(DeriveSecretArgs),
    /// Decode a token id and optionally check its signature
    InspectToken(InspectTokenArgs),
    /// Compute the metrics hashes the tokenserver reports for a user
    HashUid(HashUidArgs),
    /// Print the effective configuration with secrets redacted
    ShowConfig,
}

#[derive(clap::Args)]
pub struct DeriveSecretArgs {
    /// Raw token-signing secret as configured on the tokenserver
    #[arg(long, env = "TOKENSERVER_E2E__TOKENSERVER__TOKEN_SIGNING_SECRET")]
    pub secret: String,
    /// Storage node URL (e.g. https://spanner.example.com)
    #[arg(long, env = "TOKENSERVER_E2E__TOKENSERVER__NODE_URL")]
    pub node_url: String,
    /// Treat --secret as an already hex-encoded master secret
    #[arg(long)]
    pub hex: bool,
}

#[derive(clap::Args)]
pub struct InspectTokenArgs {
    /// Token id as returned in the `id` field
    pub token: String,
    /// Raw token-signing secret; enables signature and derived-key checks
    #[arg(long, requires = "node_url")]
    pub secret: Option<String>,
    /// Storage node URL the token was issued for
    #[arg(long)]
    pub node_url: Option<String>,
}

#[derive(clap::Args)]
pub struct HashUidArgs {
    /// FxA user id (32 hex chars)
    pub fxa_uid: String,
    /// Shared metrics hash secret
    #[arg(long, env = "TOKENSERVER_E2E__TOKENSERVER__FXA_METRICS_HASH_SECRET")]
    pub secret: String,
    /// Device id to hash alongside the uid
    #[arg(long)]
    pub device_id: Option<String>,
}

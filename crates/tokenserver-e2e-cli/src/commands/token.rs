use anyhow::{Context, Result};
use colored::Colorize;
use serde_json::Value;
use tokenserver_e2e_crypto::{
    SignedToken, TokenManager, derive_node_secret, master_secret_from_raw,
};

use crate::cli::{InspectTokenArgs, OutputFormat};
use crate::output::{print_fields, print_json};

/// Result of checking a token against a node secret.
#[derive(Debug, PartialEq, Eq)]
pub struct SignatureCheck {
    pub valid: bool,
    /// Absent when the payload carries no salt.
    pub derived_key: Option<String>,
}

pub fn check_signature(
    signed: &SignedToken,
    token: &str,
    raw_secret: &str,
    node_url: &str,
) -> Result<SignatureCheck> {
    let node_secret = derive_node_secret(&master_secret_from_raw(raw_secret), node_url)?;
    let manager = TokenManager::new(node_secret)?;
    let valid = manager
        .verify_signature(&signed.payload, &signed.signature)
        .is_ok();
    Ok(SignatureCheck {
        valid,
        derived_key: manager.get_derived_secret(token).ok(),
    })
}

pub fn inspect_token(args: &InspectTokenArgs, format: OutputFormat) -> Result<()> {
    let signed = SignedToken::decode(&args.token).context("decoding token id")?;
    let payload = signed.payload_json().context("reading token payload")?;

    let check = match (&args.secret, &args.node_url) {
        (Some(secret), Some(node_url)) => {
            Some(check_signature(&signed, &args.token, secret, node_url)?)
        }
        _ => None,
    };

    match format {
        OutputFormat::Json => {
            let mut out = serde_json::json!({
                "payload": Value::Object(payload),
                "signature": hex::encode(signed.signature),
            });
            if let Some(check) = &check {
                out["signature_valid"] = Value::Bool(check.valid);
                out["derived_key"] = check.derived_key.clone().map_or(Value::Null, Value::String);
            }
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut fields: Vec<(&str, String)> = payload
                .iter()
                .map(|(k, v)| {
                    let shown = v.as_str().map_or_else(|| v.to_string(), str::to_string);
                    (k.as_str(), shown)
                })
                .collect();
            fields.push(("signature", hex::encode(signed.signature)));
            if let Some(check) = &check {
                let verdict = if check.valid {
                    "valid".green().to_string()
                } else {
                    "INVALID".red().to_string()
                };
                fields.push(("signature check", verdict));
                if let Some(key) = &check.derived_key {
                    fields.push(("derived key", key.clone()));
                }
            }
            print_fields(&fields, format);
        }
    }

    if check.as_ref().is_some_and(|c| !c.valid) {
        anyhow::bail!("token signature does not match the node secret");
    }
    Ok(())
}

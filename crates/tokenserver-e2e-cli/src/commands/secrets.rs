use anyhow::{Context, Result};
use tokenserver_e2e_crypto::{
    derive_node_secret, hashed_device_id, hashed_fxa_uid, master_secret_from_raw,
};

use crate::cli::{DeriveSecretArgs, HashUidArgs, OutputFormat};
use crate::output::print_fields;

pub fn derive_secret(args: &DeriveSecretArgs, format: OutputFormat) -> Result<()> {
    let master = if args.hex {
        args.secret.clone()
    } else {
        master_secret_from_raw(&args.secret)
    };
    let secret = derive_node_secret(&master, &args.node_url)
        .with_context(|| format!("deriving node secret for {}", args.node_url))?;
    print_fields(
        &[("node_url", args.node_url.clone()), ("node_secret", secret)],
        format,
    );
    Ok(())
}

pub fn hash_uid(args: &HashUidArgs, format: OutputFormat) -> Result<()> {
    if args.secret.is_empty() {
        anyhow::bail!("metrics hash secret must not be empty");
    }
    let fields = [
        ("fxa_uid", args.fxa_uid.clone()),
        ("hashed_fxa_uid", hashed_fxa_uid(&args.secret, &args.fxa_uid)),
        (
            "hashed_device_id",
            hashed_device_id(&args.secret, &args.fxa_uid, args.device_id.as_deref()),
        ),
    ];
    print_fields(&fields, format);
    Ok(())
}

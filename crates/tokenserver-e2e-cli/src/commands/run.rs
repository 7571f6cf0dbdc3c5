use anyhow::{Context, Result};
use futures_util::FutureExt;
use tokenserver_e2e::{E2eConfig, HarnessError, run_suite, with_context};

use crate::cli::OutputFormat;
use crate::output::print_report;

/// Runs the suite; fails when any scenario failed. Skips do not fail the run.
pub async fn run(config: E2eConfig, format: OutputFormat) -> Result<()> {
    tracing::info!(
        tokenserver = %config.tokenserver.url,
        fxa = %config.fxa.account_server_url,
        "Starting end-to-end run"
    );

    let outcomes = with_context(config, |ctx| {
        async move { Ok::<_, HarnessError>(run_suite(ctx).await) }.boxed()
    })
    .await
    .context("account setup or teardown failed")?;

    print_report(&outcomes, format);

    let failed: Vec<&str> = outcomes
        .iter()
        .filter(|o| o.failed())
        .map(|o| o.name())
        .collect();
    if !failed.is_empty() {
        anyhow::bail!("{} scenario(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}

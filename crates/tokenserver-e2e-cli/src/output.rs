use colored::Colorize;
use serde_json::Value;
use tabled::builder::Builder;
use tabled::settings::Style;
use tokenserver_e2e::ScenarioOutcome;
use tokenserver_e2e::scenarios::Verdict;

use crate::cli::OutputFormat;

const REDACTED: &str = "***";

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Prints `pairs` as a two-column table, or as a flat JSON object.
pub fn print_fields(pairs: &[(&str, String)], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let obj: serde_json::Map<String, Value> = pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), Value::String(v.clone())))
                .collect();
            print_json(&Value::Object(obj));
        }
        OutputFormat::Table => {
            let mut builder = Builder::default();
            for (k, v) in pairs {
                builder.push_record([*k, v.as_str()]);
            }
            println!("{}", builder.build().with(Style::rounded()));
        }
    }
}

pub fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(_) => println!("{value}"),
    }
}

pub fn print_report(outcomes: &[ScenarioOutcome], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&report_json(outcomes)),
        OutputFormat::Table => {
            let mut builder = Builder::default();
            builder.push_record(["Scenario", "Result", "Time", "Detail"]);
            for o in outcomes {
                let (result, detail) = match &o.result {
                    Ok(Verdict::Passed) => ("PASS".green().to_string(), String::new()),
                    Ok(Verdict::Skipped { reason }) => {
                        ("SKIP".yellow().to_string(), (*reason).to_string())
                    }
                    Err(e) => ("FAIL".red().to_string(), e.to_string()),
                };
                builder.push_record([
                    o.name().to_string(),
                    result,
                    format!("{} ms", o.elapsed.as_millis()),
                    detail,
                ]);
            }
            println!("{}", builder.build().with(Style::rounded()));
            let failed = outcomes.iter().filter(|o| o.failed()).count();
            let skipped = outcomes.iter().filter(|o| o.skipped()).count();
            println!(
                "{} passed, {} skipped, {} failed",
                outcomes.len() - failed - skipped,
                skipped,
                failed
            );
        }
    }
}

pub fn report_json(outcomes: &[ScenarioOutcome]) -> Value {
    Value::Array(
        outcomes
            .iter()
            .map(|o| {
                let (status, detail) = match &o.result {
                    Ok(Verdict::Passed) => ("passed", None),
                    Ok(Verdict::Skipped { reason }) => ("skipped", Some((*reason).to_string())),
                    Err(e) => ("failed", Some(e.to_string())),
                };
                serde_json::json!({
                    "scenario": o.name(),
                    "status": status,
                    "elapsed_ms": o.elapsed.as_millis() as u64,
                    "detail": detail,
                })
            })
            .collect(),
    )
}

/// Blanks out secrets and the database password in a serialized config.
pub fn redact_config(mut value: Value) -> Value {
    if let Some(ts) = value.get_mut("tokenserver").and_then(Value::as_object_mut) {
        for key in ["token_signing_secret", "fxa_metrics_hash_secret"] {
            if let Some(v) = ts.get_mut(key)
                && v.as_str().is_some_and(|s| !s.is_empty())
            {
                *v = Value::String(REDACTED.into());
            }
        }
        if let Some(v) = ts.get_mut("database_url")
            && let Some(url) = v.as_str()
        {
            *v = Value::String(redact_url_password(url));
        }
    }
    value
}

fn redact_url_password(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((userinfo, host)) = rest.split_once('@') else {
        return url.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{scheme}://{user}:{REDACTED}@{host}"),
        None => url.to_string(),
    }
}

//! Record store field diagnostics
//!
//! Lists the partner model's fields that look relevant to the registry
//! identity, checks the configured target names and saves a JSON report.
//!
//! **Usage:**
//! ```bash
//! diagnose-fields [--config <file>] [--keyword <kw>]... [--output <file>]
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rues_common::config::{load_dotenv, TomlConfig};
use rues_common::OdooClient;
use rues_resolver::diagnostics::{self, DiagnosticsReport, DEFAULT_KEYWORDS};
use serde_json::Value;
use tracing::info;

/// Record store field diagnostics
#[derive(Parser, Debug)]
#[command(name = "diagnose-fields")]
#[command(about = "Check Odoo partner field names used for registry write-back")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "RUES_CONFIG")]
    config: Option<PathBuf>,

    /// Keyword to search in field names and labels (repeatable)
    #[arg(short, long = "keyword", value_name = "KEYWORD")]
    keywords: Vec<String>,

    /// Where to save the JSON report
    #[arg(short, long, default_value = "odoo_fields_diagnostics.json")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let args = Args::parse();
    let config = TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    let keywords = if args.keywords.is_empty() {
        DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect()
    } else {
        args.keywords
    };

    let client = OdooClient::new(&config.odoo).context("Record store is not configured")?;
    info!(
        "Connecting to {} (db {}, uid {})",
        config.odoo.url.as_deref().unwrap_or("-"),
        config.odoo.db,
        config.odoo.uid
    );

    let report = diagnostics::run(&client, &config.fields, &keywords)
        .await
        .context("Failed to fetch field metadata")?;

    print_report(&report);

    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&args.output, json)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!("\nReport saved to {}", args.output.display());

    Ok(())
}

fn print_report(report: &DiagnosticsReport) {
    let rule = "=".repeat(80);

    println!("{}", rule);
    println!("{} fields on the partner model", report.all_fields_count);
    println!("Keywords: {}", report.keywords.join(", "));
    println!("{}", rule);

    println!("\nMatching fields ({}):", report.matches.len());
    for (name, info) in &report.matches {
        let text = |key: &str| info.get(key).and_then(Value::as_str).unwrap_or("?").to_string();
        let flag = |key: &str, label: &str| {
            if info.get(key).and_then(Value::as_bool).unwrap_or(false) {
                format!(" [{}]", label)
            } else {
                String::new()
            }
        };
        println!("\n  {}", name);
        println!("    label: {}", text("string"));
        println!(
            "    type:  {}{}{}",
            text("type"),
            flag("readonly", "read-only"),
            flag("required", "required")
        );
    }

    println!("\n{}", rule);
    println!("Configured target fields:");
    println!("{}", rule);
    for status in &report.configured_fields {
        let state = if status.exists { "ok" } else { "MISSING" };
        println!("\n  {} -> {} [{}]", status.field, status.target, state);
        for similar in &status.similar {
            println!("    similar: {} ({})", similar.name, similar.label);
        }
    }

    println!("\n{}", rule);
    println!("Suggested overrides:");
    println!("{}", rule);
    let suggest = |var: &str, value: &Option<String>| match value {
        Some(name) => println!("{}={}", var, name),
        None => println!("# {}: no candidate found", var),
    };
    suggest("ODOO_SIGLA_FIELD", &report.suggestions.trade_name);
    suggest("ODOO_FIELD_FECHA_MATRICULA", &report.suggestions.registration_date);
    suggest("ODOO_FIELD_CIIU", &report.suggestions.industry_code);
}

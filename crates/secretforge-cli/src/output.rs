use anyhow::Result;
use colored::Colorize;
use secretforge_core::Secret;
use tabled::builder::Builder;
use tabled::settings::Style;

use crate::cli::OutputFormat;

pub fn print_success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

pub fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "!".yellow(), msg);
}

/// Prints secrets as a YAML stream or a JSON array.
pub fn print_secrets(secrets: &[Secret], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Yaml => {
            for secret in secrets {
                println!("---");
                print!("{}", serde_yaml::to_string(secret)?);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(secrets)?);
        }
    }
    Ok(())
}

/// One row of the reconcile summary.
pub struct StatusRow {
    pub derived_secret: String,
    pub target: String,
    pub error: Option<String>,
}

pub fn print_status_table(rows: &[StatusRow]) {
    if rows.is_empty() {
        println!("No DerivedSecrets found.");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(["DerivedSecret", "Target", "Result"]);
    for row in rows {
        let result = match &row.error {
            None => "synced".to_string(),
            Some(error) => error.clone(),
        };
        builder.push_record([row.derived_secret.as_str(), row.target.as_str(), &result]);
    }
    let table = builder.build().with(Style::rounded()).to_string();
    eprintln!("{table}");

    let failed = rows.iter().filter(|r| r.error.is_some()).count();
    if failed == 0 {
        eprintln!("{} {} synced", "✓".green(), rows.len());
    } else {
        eprintln!(
            "{} {} synced, {} failed",
            "✗".red(),
            rows.len() - failed,
            failed.to_string().red()
        );
    }
}

//! Output formatting for CLI commands: JSON, YAML, or a plain table.

use anyhow::{Context, Result};
use serde::Serialize;
use std::str::FromStr;

use crate::domain::Secret;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Json,
    Yaml,
    #[default]
    Table,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" => Ok(OutputFormat::Yaml),
            "table" => Ok(OutputFormat::Table),
            _ => anyhow::bail!(
                "Unsupported output format: '{}'. Use 'json', 'yaml', or 'table'.",
                s
            ),
        }
    }
}

/// Print secrets in the requested format.
pub fn print_secrets(secrets: &[Secret], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&secrets),
        OutputFormat::Yaml => print_yaml(&secrets),
        OutputFormat::Table => {
            print_secret_table(secrets);
            Ok(())
        }
    }
}

/// Print data as JSON
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

/// Print data as YAML
pub fn print_yaml<T: Serialize>(data: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(data).context("Failed to serialize to YAML")?;
    println!("{}", yaml);
    Ok(())
}

const TABLE_COLUMNS: [(&str, usize); 6] =
    [("NAME", 24), ("TYPE", 7), ("ORG", 16), ("OWNER", 20), ("EVENTS", 30), ("IMAGES", 24)];

fn print_secret_table(secrets: &[Secret]) {
    if secrets.is_empty() {
        println!("No secrets found");
        return;
    }
    print_table_header(&TABLE_COLUMNS);
    for secret in secrets {
        println!("{}", table_row(secret));
    }
    println!();
}

fn table_row(secret: &Secret) -> String {
    let owner = match secret.team() {
        "" => secret.repo(),
        team => team,
    };
    let images = secret.images.as_ref().map(|i| i.join(",")).unwrap_or_default();
    let cells = [
        secret.name().to_string(),
        secret.scope.map(|s| s.to_string()).unwrap_or_default(),
        secret.org().to_string(),
        owner.to_string(),
        secret.events().to_string(),
        images,
    ];

    let mut row = String::new();
    for (cell, (_, width)) in cells.iter().zip(TABLE_COLUMNS.iter()) {
        row.push_str(&format!("{:<width$} ", truncate(cell, *width), width = width));
    }
    row.trim_end().to_string()
}

/// Truncate string to maximum length with ellipsis
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

fn print_table_header(columns: &[(&str, usize)]) {
    println!();
    let mut header = String::new();
    for (name, width) in columns {
        header.push_str(&format!("{:<width$} ", name, width = width));
    }
    println!("{}", header.trim());

    let total_width: usize = columns.iter().map(|(_, w)| w + 1).sum();
    println!("{}", "-".repeat(total_width.saturating_sub(1)));
}

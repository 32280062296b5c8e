//! Environment diagnostics command

use crate::config::loader::{
    GEMINI_API_KEY, NEW_RELIC_ACCOUNT_ID, NEW_RELIC_API_ENDPOINT, NEW_RELIC_USER_API_KEY,
    OPENAI_API_KEY, TYTUX_EXECUTOR, TYTUX_MODEL, TYTUX_PROTOCOL,
};
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::collections::BTreeMap;

/// Variables a default setup cannot run without
pub const REQUIRED_VARS: &[&str] = &[GEMINI_API_KEY, NEW_RELIC_USER_API_KEY, NEW_RELIC_ACCOUNT_ID];

const OPTIONAL_VARS: &[&str] = &[
    OPENAI_API_KEY,
    NEW_RELIC_API_ENDPOINT,
    TYTUX_PROTOCOL,
    TYTUX_MODEL,
    TYTUX_EXECUTOR,
];

/// What is known about one variable without revealing it
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VarStatus {
    pub set: bool,
    pub length: usize,
    pub preview: Option<String>,
}

impl VarStatus {
    pub fn inspect(value: Option<&str>) -> Self {
        match value {
            Some(value) if !value.is_empty() => Self {
                set: true,
                length: value.chars().count(),
                preview: Some(format!("{}...", value.chars().take(3).collect::<String>())),
            },
            _ => Self {
                set: false,
                length: 0,
                preview: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct Report {
    status: &'static str,
    results: BTreeMap<&'static str, VarStatus>,
    missing: Vec<&'static str>,
    npx: Option<String>,
}

/// Report which variables are set
pub async fn check_env_command(json: bool) -> Result<()> {
    let results: BTreeMap<&'static str, VarStatus> = REQUIRED_VARS
        .iter()
        .chain(OPTIONAL_VARS)
        .map(|name| (*name, VarStatus::inspect(std::env::var(name).ok().as_deref())))
        .collect();

    let missing: Vec<&'static str> = REQUIRED_VARS
        .iter()
        .copied()
        .filter(|name| results.get(name).map_or(true, |s| !s.set))
        .collect();

    let npx = which::which("npx").ok().map(|p| p.display().to_string());

    let report = Report {
        status: if missing.is_empty() { "success" } else { "incomplete" },
        results,
        missing,
        npx,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("🔎 Environment\n");
    print_group("Required", REQUIRED_VARS, &report.results);
    print_group("Optional", OPTIONAL_VARS, &report.results);

    match &report.npx {
        Some(path) => println!("{} npx found at {}", "✓".green(), path),
        None => println!(
            "{} npx not found (needed for the subprocess executor)",
            "✗".yellow()
        ),
    }

    if report.missing.is_empty() {
        println!("\n{}", "All required variables are set.".green());
    } else {
        println!(
            "\n{} {}. Please check your .env file.",
            "Missing environment variables:".red().bold(),
            report.missing.join(", ")
        );
    }

    Ok(())
}

fn print_group(title: &str, names: &[&'static str], results: &BTreeMap<&'static str, VarStatus>) {
    println!("{}", title.bold());
    for name in names {
        match results.get(name) {
            Some(VarStatus {
                set: true,
                length,
                preview,
            }) => println!(
                "  {} {} (length {}, starts {})",
                "✓".green(),
                name,
                length,
                preview.as_deref().unwrap_or_default()
            ),
            _ => println!("  {} {} not set", "✗".red(), name),
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_set_value() {
        let status = VarStatus::inspect(Some("NRAK-ABCDEF"));
        assert!(status.set);
        assert_eq!(status.length, 11);
        assert_eq!(status.preview.as_deref(), Some("NRA..."));
    }

    #[test]
    fn test_inspect_missing_or_empty() {
        let unset = VarStatus::inspect(None);
        assert!(!unset.set);
        assert_eq!(unset.length, 0);
        assert!(unset.preview.is_none());

        assert_eq!(VarStatus::inspect(Some("")), unset);
    }

    #[test]
    fn test_short_value_preview() {
        let status = VarStatus::inspect(Some("ab"));
        assert_eq!(status.preview.as_deref(), Some("ab..."));
    }
}

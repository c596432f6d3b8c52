//! Output formatting utilities

use anyhow::Result;
use ark_client::suggestions::SuggestionSink;
use ark_client::BizState;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a rounded table
pub fn print_table<T: Tabled>(rows: &[T], empty_message: &str) {
    if rows.is_empty() {
        println!("{}", empty_message.yellow());
        return;
    }
    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

/// Print any serializable value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print captured subprocess output, one line at a time, to stderr
pub fn print_transcript(lines: &[String]) {
    for line in lines {
        eprintln!("  {}", line.dimmed());
    }
}

/// Print a warning message
pub fn print_warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Writes suggestions to stderr
pub struct ConsoleSink;

impl SuggestionSink for ConsoleSink {
    fn suggest(&mut self, line: &str) {
        eprintln!("{} {}", "Suggestion:".yellow().bold(), line);
    }
}

/// Color a module state
pub fn color_state(state: &BizState) -> String {
    let label = state.as_str();
    match state {
        BizState::Activated => label.green().to_string(),
        BizState::Resolved => label.blue().to_string(),
        BizState::Deactivated | BizState::Unresolved => label.yellow().to_string(),
        BizState::Broken => label.red().to_string(),
        BizState::Other(_) => label.to_string(),
    }
}

/// Format a state change time, `-` when unknown
pub fn format_timestamp(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string(),
        None => "-".to_string(),
    }
}

/// Render a metric value without JSON quoting for strings
pub fn format_metric(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

/// Format a ratio as a percentage, colored by pressure
pub fn color_ratio(ratio: f64) -> String {
    let formatted = format!("{:.1}%", ratio * 100.0);
    if ratio >= 0.9 {
        formatted.red().to_string()
    } else if ratio >= 0.7 {
        formatted.yellow().to_string()
    } else {
        formatted.green().to_string()
    }
}

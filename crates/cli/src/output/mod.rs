//! Output formatting for CLI

use anyhow::Result;
use serde::{Deserialize, Serialize};

mod table;
mod views;

pub use table::TableFormatter;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Tables (default)
    #[default]
    Table,
    /// `key: value` lines
    Plain,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "table" => Some(Self::Table),
            "plain" => Some(Self::Plain),
            _ => None,
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Table => write!(f, "table"),
            Self::Plain => write!(f, "plain"),
        }
    }
}

/// Types with a table rendering; JSON and plain output come from `Serialize`
pub trait Render: Serialize {
    fn render_table(&self) -> Result<String>;
}

/// Format a value in the requested format
pub fn format<T: Render>(value: &T, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(value)?),
        OutputFormat::Table => value.render_table(),
        OutputFormat::Plain => plain(value),
    }
}

/// Flatten a value into `dotted.key: value` lines.
pub fn plain<T: Serialize>(value: &T) -> Result<String> {
    let json = serde_json::to_value(value)?;
    let mut lines = Vec::new();
    flatten("", &json, &mut lines);
    Ok(lines.join("\n"))
}

fn flatten(prefix: &str, value: &serde_json::Value, lines: &mut Vec<String>) {
    let key = |k: &str| {
        if prefix.is_empty() {
            k.to_string()
        } else {
            format!("{}.{}", prefix, k)
        }
    };

    match value {
        serde_json::Value::Object(obj) => {
            for (k, v) in obj {
                flatten(&key(k), v, lines);
            }
        }
        serde_json::Value::Array(arr) => {
            for (i, v) in arr.iter().enumerate() {
                flatten(&key(&i.to_string()), v, lines);
            }
        }
        serde_json::Value::String(s) => lines.push(format!("{}: {}", prefix, s)),
        serde_json::Value::Null => lines.push(format!("{}: -", prefix)),
        other => lines.push(format!("{}: {}", prefix, other)),
    }
}

/// Color helpers
pub mod colors {
    use colored::*;

    pub fn success(s: &str) -> ColoredString {
        s.green()
    }

    pub fn error(s: &str) -> ColoredString {
        s.red()
    }

    pub fn warning(s: &str) -> ColoredString {
        s.yellow()
    }

    pub fn dim(s: &str) -> ColoredString {
        s.dimmed()
    }

    pub fn bold(s: &str) -> ColoredString {
        s.bold()
    }
}

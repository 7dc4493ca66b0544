//! CLI configuration
//!
//! Read from `~/.customer-analytics/config.toml`, then overridden by
//! `CUSTOMER_ANALYTICS_*` environment variables and command-line flags.

use crate::output::OutputFormat;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Base URL of the analytics API
    #[serde(default = "default_api_endpoint")]
    pub api_endpoint: String,

    #[serde(default)]
    pub output_format: OutputFormat,

    #[serde(default = "default_colored")]
    pub colored: bool,

    /// HTTP timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_api_endpoint() -> String {
    "http://localhost:8080".to_string()
}

fn default_colored() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_endpoint: default_api_endpoint(),
            output_format: OutputFormat::default(),
            colored: default_colored(),
            timeout_seconds: default_timeout(),
        }
    }
}

impl Config {
    pub fn config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".customer-analytics"))
    }

    pub fn config_file() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load the config file (defaults when absent) and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?;

        if let Ok(api_url) = std::env::var("CUSTOMER_ANALYTICS_API_URL") {
            config.api_endpoint = api_url;
        }
        if let Ok(format) = std::env::var("CUSTOMER_ANALYTICS_OUTPUT_FORMAT") {
            if let Some(format) = OutputFormat::parse(&format) {
                config.output_format = format;
            }
        }
        if std::env::var("NO_COLOR").is_ok() {
            config.colored = false;
        }

        Ok(config)
    }

    fn load_from_file() -> Result<Self> {
        let config_file = Self::config_file()?;

        if !config_file.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_file).context("Failed to read config file")?;
        toml::from_str(&contents).context("Failed to parse config file")
    }

    pub fn save(&self) -> Result<()> {
        let config_dir = Self::config_dir()?;
        fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(Self::config_file()?, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "api_endpoint" | "api-endpoint" | "api_url" => Some(self.api_endpoint.clone()),
            "output_format" | "output-format" | "format" => Some(self.output_format.to_string()),
            "colored" | "color" => Some(self.colored.to_string()),
            "timeout" | "timeout_seconds" => Some(self.timeout_seconds.to_string()),
            _ => None,
        }
    }

    /// Set a configuration value by key, without saving
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "api_endpoint" | "api-endpoint" | "api_url" => {
                self.api_endpoint = value.to_string();
            }
            "output_format" | "output-format" | "format" => {
                self.output_format = OutputFormat::parse(value).with_context(|| {
                    format!("Invalid output format: {}. Use json, table, or plain", value)
                })?;
            }
            "colored" | "color" => {
                self.colored = value.parse().context("Invalid boolean value")?;
            }
            "timeout" | "timeout_seconds" => {
                self.timeout_seconds = value.parse().context("Invalid timeout value")?;
            }
            _ => anyhow::bail!("Unknown configuration key: {}", key),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_endpoint, "http://localhost:8080");
        assert_eq!(config.output_format, OutputFormat::Table);
        assert!(config.colored);
    }

    #[test]
    fn test_config_toml_round_trip() {
        let mut config = Config::default();
        config.output_format = OutputFormat::Json;
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.output_format, OutputFormat::Json);
        assert_eq!(parsed.api_endpoint, config.api_endpoint);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str("api_endpoint = \"http://analytics:9000\"").unwrap();
        assert_eq!(parsed.api_endpoint, "http://analytics:9000");
        assert_eq!(parsed.timeout_seconds, 30);
    }

    #[test]
    fn test_get_and_set() {
        let mut config = Config::default();
        config.set("format", "plain").unwrap();
        config.set("timeout", "5").unwrap();

        assert_eq!(config.get("output_format"), Some("plain".to_string()));
        assert_eq!(config.get("timeout_seconds"), Some("5".to_string()));
        assert!(config.set("format", "yaml").is_err());
        assert!(config.set("unknown", "x").is_err());
        assert_eq!(config.get("unknown"), None);
    }
}

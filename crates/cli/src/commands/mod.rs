//! CLI commands

pub mod api;
pub mod data;

use crate::client::ApiClient;
use crate::config::Config;
use crate::output::{self, OutputFormat, Render};
use anyhow::Result;

/// Context passed to the API commands
pub struct CommandContext {
    pub config: Config,
    pub client: ApiClient,
}

impl CommandContext {
    pub fn new(config: Config) -> Result<Self> {
        let client = ApiClient::from_config(&config)?;
        Ok(Self { config, client })
    }

    pub fn format(&self) -> OutputFormat {
        self.config.output_format
    }

    /// Print a value in the configured format
    pub fn print<T: Render>(&self, value: &T) -> Result<()> {
        println!("{}", output::format(value, self.format())?);
        Ok(())
    }
}

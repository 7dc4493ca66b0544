//! Customer Analytics CLI

use anyhow::Result;
use clap::{Parser, Subcommand};
use customer_analytics_cli::commands::{api, data, CommandContext};
use customer_analytics_cli::config::Config;
use customer_analytics_cli::generator::SeedOptions;
use customer_analytics_cli::output::OutputFormat;
use customer_analytics_domain::{RiskTier, Segment};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "customer-analytics")]
#[command(author, version, about = "Customer analytics CLI")]
#[command(long_about = "Command-line interface for the customer analytics engine.\n\n\
    Query customer classifications and fleet metrics, trigger aggregation passes, \
    and generate or load event data.")]
#[command(propagate_version = true)]
struct Cli {
    /// Output format (overrides config)
    #[arg(short = 'o', long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// API endpoint URL (overrides config)
    #[arg(long, global = true, env = "CUSTOMER_ANALYTICS_API_URL")]
    api_url: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check API and store health
    Health,

    /// Show the latest fleet metrics
    #[command(alias = "m")]
    Metrics,

    /// Show one customer's summary and classification
    #[command(alias = "c")]
    Customer {
        #[arg(value_name = "CUSTOMER_ID")]
        customer_id: String,
    },

    /// List classified customers
    #[command(alias = "ls")]
    Customers {
        /// Filter by segment (e.g. high_value_active)
        #[arg(short, long)]
        segment: Option<Segment>,

        /// Filter by risk tier (low, medium, high)
        #[arg(short, long)]
        risk_tier: Option<RiskTier>,

        /// Filter by churn flag
        #[arg(long)]
        churned: Option<bool>,

        #[arg(short, long, default_value = "1")]
        page: u32,

        /// Page size (server default when omitted)
        #[arg(long)]
        per_page: Option<u32>,
    },

    /// Start an aggregation pass
    #[command(alias = "t")]
    Trigger {
        /// Wait for the pass to finish
        #[arg(short, long)]
        wait: bool,

        /// Status poll interval in milliseconds when waiting
        #[arg(long, default_value = "500")]
        poll_ms: u64,
    },

    /// Show the processing state
    Status,

    /// Write a CSV of synthetic sessions
    Seed {
        /// Output file
        #[arg(short, long, default_value = "data/sample/events.csv")]
        output: PathBuf,

        /// Number of customers
        #[arg(short, long, default_value = "100")]
        customers: usize,

        /// Spread sessions over the last N days
        #[arg(short, long, default_value = "180")]
        days: i64,

        /// Maximum sessions per customer
        #[arg(long, default_value = "6")]
        max_sessions: usize,

        /// RNG seed for reproducible output
        #[arg(long)]
        seed: Option<u64>,

        /// Overwrite an existing file without asking
        #[arg(short, long)]
        force: bool,
    },

    /// Load a CSV event export into the configured event store
    Ingest {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Parse and report without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Show or change CLI configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Set and save a configuration value
    Set { key: String, value: String },
    /// Get a configuration value
    Get { key: String },
    /// Reset configuration to defaults
    Reset,
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "customer-analytics", &mut std::io::stdout());
}

fn config_command(command: Option<ConfigCommands>, config: &mut Config) -> Result<()> {
    match command {
        Some(ConfigCommands::Show) | None => {
            println!("Current configuration:");
            println!("  API Endpoint: {}", config.api_endpoint);
            println!("  Output Format: {}", config.output_format);
            println!("  Colored: {}", config.colored);
            println!("  Timeout: {}s", config.timeout_seconds);
        }
        Some(ConfigCommands::Set { key, value }) => {
            config.set(&key, &value)?;
            config.save()?;
            println!("{} = {}", key, value);
        }
        Some(ConfigCommands::Get { key }) => match config.get(&key) {
            Some(value) => println!("{}", value),
            None => anyhow::bail!("Unknown configuration key: {}", key),
        },
        Some(ConfigCommands::Reset) => {
            *config = Config::default();
            config.save()?;
            println!("Configuration reset to defaults");
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        generate_completions(shell);
        return Ok(());
    }

    let mut config = Config::load()?;
    if let Commands::Config { command } = cli.command {
        return config_command(command, &mut config);
    }

    if let Some(api_url) = cli.api_url {
        config.api_endpoint = api_url;
    }
    if let Some(format) = cli.format {
        config.output_format = format;
    }
    if !config.colored {
        colored::control::set_override(false);
    }
    let format = config.output_format;

    match cli.command {
        Commands::Seed {
            output,
            customers,
            days,
            max_sessions,
            seed,
            force,
        } => {
            let options = SeedOptions {
                customers,
                days,
                max_sessions,
                ..Default::default()
            };
            data::seed(&output, &options, seed, force, format)
        }
        Commands::Ingest { file, dry_run } => data::ingest(&file, dry_run, format).await,
        command => {
            let ctx = CommandContext::new(config)?;
            match command {
                Commands::Health => api::health(&ctx).await,
                Commands::Metrics => api::metrics(&ctx).await,
                Commands::Customer { customer_id } => api::customer(&ctx, customer_id).await,
                Commands::Customers {
                    segment,
                    risk_tier,
                    churned,
                    page,
                    per_page,
                } => api::customers(&ctx, segment, risk_tier, churned, page, per_page).await,
                Commands::Trigger { wait, poll_ms } => {
                    api::trigger(&ctx, wait, Duration::from_millis(poll_ms)).await
                }
                Commands::Status => api::status(&ctx).await,
                // Handled above
                Commands::Seed { .. }
                | Commands::Ingest { .. }
                | Commands::Config { .. }
                | Commands::Completions { .. } => Ok(()),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    let log_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(log_level.into()),
        )
        .init();

    let verbose = cli.verbose;
    if let Err(e) = run(cli).await {
        use colored::Colorize;
        eprintln!("{} {}", "Error:".red().bold(), e);
        if verbose {
            eprintln!("\n{}", "Details:".dimmed());
            eprintln!("{:?}", e);
        }
        std::process::exit(1);
    }

    Ok(())
}

//! Customer Analytics CLI
//!
//! Queries a running analytics API (health, metrics, customers, processing)
//! and manages event data locally (sample generation, CSV ingestion).

pub mod client;
pub mod commands;
pub mod config;
pub mod generator;
pub mod interactive;
pub mod output;

pub use client::ApiClient;
pub use config::Config;
pub use output::OutputFormat;

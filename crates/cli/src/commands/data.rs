//! Local data commands: generate sample events and load event exports.

use anyhow::{Context, Result};
use chrono::Utc;
use customer_analytics_application::EventStore;
use customer_analytics_common::config::{AppConfig, EventStoreBackend};
use customer_analytics_domain::validate;
use customer_analytics_infrastructure::{
    bootstrap, read_events_csv, write_events_csv, IngestReport,
};
use rand::{rngs::StdRng, SeedableRng};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::generator::{generate, SeedOptions};
use crate::interactive::{confirm, spinner};
use crate::output::{self, colors, OutputFormat, Render, TableFormatter};

/// What `seed` wrote
#[derive(Debug, Serialize)]
pub struct SeedSummary {
    pub path: PathBuf,
    pub customers: usize,
    pub events: usize,
    pub purchases: usize,
    pub revenue: Decimal,
}

impl Render for SeedSummary {
    fn render_table(&self) -> Result<String> {
        Ok(TableFormatter::key_value(vec![
            ("File", self.path.display().to_string()),
            ("Customers", self.customers.to_string()),
            ("Events", self.events.to_string()),
            ("Purchases", self.purchases.to_string()),
            ("Revenue", format!("{:.2}", self.revenue)),
        ]))
    }
}

/// What `ingest` read and stored
#[derive(Debug, Serialize)]
pub struct IngestSummary {
    pub path: PathBuf,
    pub rows: u64,
    pub parsed: u64,
    pub malformed: u64,
    /// Parsed rows the aggregation pass would reject
    pub invalid: u64,
    pub customers: usize,
    /// Records appended; zero on a dry run
    pub appended: u64,
    pub errors: Vec<String>,
}

impl Render for IngestSummary {
    fn render_table(&self) -> Result<String> {
        let mut out = TableFormatter::key_value(vec![
            ("File", self.path.display().to_string()),
            ("Rows", self.rows.to_string()),
            ("Parsed", self.parsed.to_string()),
            ("Malformed", self.malformed.to_string()),
            ("Invalid", self.invalid.to_string()),
            ("Customers", self.customers.to_string()),
            ("Appended", self.appended.to_string()),
        ]);
        for error in &self.errors {
            out.push('\n');
            out.push_str(&colors::warning(error).to_string());
        }
        Ok(out)
    }
}

/// Write a synthetic event export.
pub fn seed(
    output_path: &Path,
    options: &SeedOptions,
    rng_seed: Option<u64>,
    force: bool,
    format: OutputFormat,
) -> Result<()> {
    if output_path.exists()
        && !force
        && !confirm(&format!("{} exists. Overwrite?", output_path.display()))?
    {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            output_path.display()
        );
    }

    let mut rng = match rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let records = generate(options, Utc::now(), &mut rng);

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create {}", output_path.display()))?;
    write_events_csv(&records, BufWriter::new(file))?;

    let purchases: Vec<_> = records
        .iter()
        .filter(|r| r.converted == Some(true))
        .collect();
    let summary = SeedSummary {
        path: output_path.to_path_buf(),
        customers: options.customers,
        events: records.len(),
        purchases: purchases.len(),
        revenue: purchases.iter().map(|r| r.cart_value).sum(),
    };
    info!(events = summary.events, path = %output_path.display(), "Sample events written");

    println!("{}", output::format(&summary, format)?);
    Ok(())
}

/// Counts for an export; rows failing validation are counted, not dropped.
fn summarize(path: &Path, report: &IngestReport) -> IngestSummary {
    let invalid = report
        .records
        .iter()
        .filter(|r| validate((*r).clone()).is_err())
        .count() as u64;
    let customers = report
        .records
        .iter()
        .map(|r| r.customer_id.as_str())
        .collect::<BTreeSet<_>>()
        .len();

    IngestSummary {
        path: path.to_path_buf(),
        rows: report.rows,
        parsed: report.parsed,
        malformed: report.malformed,
        invalid,
        customers,
        appended: 0,
        errors: report.errors.clone(),
    }
}

/// Parse an event export and append it to the configured event store.
pub async fn ingest(path: &Path, dry_run: bool, format: OutputFormat) -> Result<()> {
    let sp = spinner(&format!("Reading {}...", path.display()));
    let report = read_events_csv(path).await;
    sp.finish_and_clear();
    let report = report.with_context(|| format!("Failed to read {}", path.display()))?;

    let mut summary = summarize(path, &report);

    if !dry_run && !report.records.is_empty() {
        let config = AppConfig::load().context("Failed to load configuration")?;
        if config.event_store.backend == EventStoreBackend::Memory {
            eprintln!(
                "{}",
                colors::warning(
                    "The configured event store is in-memory; ingested events are discarded on exit. \
                     Set event_store.backend = \"postgres\" or use event_store.seed_csv instead."
                )
            );
        }

        let store = bootstrap::connect_event_store(&config.event_store).await?;
        let sp = spinner(&format!("Appending {} events...", report.records.len()));
        let appended = store.append(report.records).await;
        sp.finish_and_clear();
        summary.appended = appended?;
        info!(appended = summary.appended, "Events ingested");
    }

    println!("{}", output::format(&summary, format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use customer_analytics_infrastructure::parse_events_csv;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("customer-analytics-cli-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn test_seed_writes_readable_export() {
        let path = temp_path("seed.csv");
        let options = SeedOptions {
            customers: 12,
            ..Default::default()
        };

        seed(&path, &options, Some(5), true, OutputFormat::Json).unwrap();

        let report = parse_events_csv(File::open(&path).unwrap()).unwrap();
        assert_eq!(report.malformed, 0);
        assert!(report.parsed > 0);
        let customers: BTreeSet<_> = report.records.iter().map(|r| r.customer_id.clone()).collect();
        assert_eq!(customers.len(), 12);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_summarize_counts_malformed_and_invalid_rows() {
        let csv = "customer_id,timestamp,event_type,session_id,page_url,cart_value,converted\n\
                   CUST0001,1704067200,page_view,S1,/products,,\n\
                   CUST0001,1704067320,purchase,S1,/checkout,299.99,true\n\
                   CUST0002,-5,page_view,S2,/,,\n\
                   CUST0003,1704067200,refund,S3,/,,\n\
                   CUST0004,later,page_view,S4,/,,\n";
        let report = parse_events_csv(csv.as_bytes()).unwrap();

        let summary = summarize(Path::new("events.csv"), &report);

        assert_eq!(summary.rows, 5);
        assert_eq!(summary.parsed, 4);
        assert_eq!(summary.malformed, 1);
        assert_eq!(summary.invalid, 2);
        assert_eq!(summary.customers, 3);
        assert_eq!(summary.appended, 0);
        assert_eq!(summary.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_dry_run_does_not_need_a_store() {
        let path = temp_path("ingest.csv");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(
            &path,
            "customer_id,timestamp,event_type\nCUST0001,1704067200,page_view\n",
        )
        .unwrap();

        ingest(&path, true, OutputFormat::Plain).await.unwrap();

        std::fs::remove_file(&path).ok();
    }
}

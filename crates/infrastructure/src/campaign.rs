//! Campaign revenue loaded from a `customer_id,campaign_revenue` CSV.

use async_trait::async_trait;
use customer_analytics_application::ports::CampaignRevenueSource;
use customer_analytics_application::ApplicationError;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

use crate::Result;

#[derive(Debug, Deserialize)]
struct CampaignRow {
    customer_id: String,
    campaign_revenue: String,
}

/// Campaign revenue table read once at startup.
///
/// Repeated customer ids are summed. Rows that fail to parse are skipped.
#[derive(Debug, Clone, Default)]
pub struct CsvCampaignRevenue {
    revenue: BTreeMap<String, Decimal>,
}

impl CsvCampaignRevenue {
    pub fn parse<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut revenue: BTreeMap<String, Decimal> = BTreeMap::new();
        let mut skipped = 0u64;
        for row in reader.deserialize::<CampaignRow>() {
            let parsed = row.map_err(|e| e.to_string()).and_then(|row| {
                let value = Decimal::from_str(&row.campaign_revenue)
                    .map_err(|e| format!("invalid campaign_revenue '{}': {}", row.campaign_revenue, e))?;
                Ok((row.customer_id, value))
            });
            match parsed {
                Ok((customer_id, value)) if !customer_id.is_empty() => {
                    *revenue.entry(customer_id).or_default() += value;
                }
                Ok(_) => skipped += 1,
                Err(e) => {
                    skipped += 1;
                    warn!(error = %e, "Skipping campaign revenue row");
                }
            }
        }

        info!(customers = revenue.len(), skipped, "Campaign revenue loaded");
        Ok(Self { revenue })
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        Self::parse(bytes.as_slice())
    }

    pub fn len(&self) -> usize {
        self.revenue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revenue.is_empty()
    }
}

#[async_trait]
impl CampaignRevenueSource for CsvCampaignRevenue {
    async fn campaign_revenue(&self) -> std::result::Result<BTreeMap<String, Decimal>, ApplicationError> {
        Ok(self.revenue.clone())
    }
}

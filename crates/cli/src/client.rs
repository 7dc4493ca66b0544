//! HTTP client for the customer analytics API

use anyhow::{Context, Result};
use customer_analytics_application::{ComponentCheck, CustomerListItem, CustomerView, MetricsView};
use customer_analytics_domain::{RiskTier, RunId, RunStatus, Segment};
use reqwest::{Client, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::Config;

/// `{ success, data, message }` envelope of the versioned API
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default)]
    pub message: Option<String>,
}

/// Pagination block of a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_prev: bool,
}

/// One page of customers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerPage {
    pub items: Vec<CustomerListItem>,
    pub pagination: PageInfo,
}

/// Accepted processing request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Triggered {
    pub message: String,
    pub run_id: RunId,
}

/// Health probe result; the server answers 503 with the same body when degraded
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthInfo {
    pub status: String,
    pub version: String,
    pub uptime: u64,
    pub checks: BTreeMap<String, ComponentCheck>,
}

/// Error body returned by the API
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
    #[serde(default)]
    request_id: Option<String>,
}

/// Customer listing filters
#[derive(Debug, Clone, Default, Serialize)]
pub struct ListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment: Option<Segment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_tier: Option<RiskTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub churned: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
}

/// API client for the customer analytics service
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api_endpoint.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    pub fn new(base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<HealthInfo> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .context("Failed to reach the API")?;

        // A degraded service still reports its checks
        if response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return response
                .json::<HealthInfo>()
                .await
                .context("Failed to deserialize response");
        }
        handle_response(response).await
    }

    pub async fn metrics(&self) -> Result<MetricsView> {
        self.get::<Envelope<MetricsView>>("/api/v1/metrics")
            .await
            .map(|e| e.data)
    }

    pub async fn customer(&self, customer_id: &str) -> Result<CustomerView> {
        let response = self
            .client
            .get(self.url("/customer"))
            .query(&[("customer_id", customer_id)])
            .send()
            .await
            .context("Failed to send GET request")?;
        handle_response(response).await
    }

    pub async fn list_customers(&self, params: &ListParams) -> Result<CustomerPage> {
        let response = self
            .client
            .get(self.url("/api/v1/customers"))
            .query(params)
            .send()
            .await
            .context("Failed to send GET request")?;
        handle_response(response).await
    }

    pub async fn trigger(&self) -> Result<Triggered> {
        let response = self
            .client
            .post(self.url("/api/v1/processing"))
            .send()
            .await
            .context("Failed to send POST request")?;
        handle_response::<Envelope<Triggered>>(response)
            .await
            .map(|e| e.data)
    }

    pub async fn status(&self) -> Result<RunStatus> {
        self.get::<Envelope<RunStatus>>("/api/v1/processing/status")
            .await
            .map(|e| e.data)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .context("Failed to send GET request")?;
        handle_response(response).await
    }
}

/// Deserialize a success body, or turn an API error body into a readable error
async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();

    if status.is_success() {
        return response
            .json::<T>()
            .await
            .context("Failed to deserialize response");
    }

    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => match body.request_id {
            Some(request_id) => anyhow::bail!(
                "{} ({}): {} [request {}]",
                status,
                body.error,
                body.message,
                request_id
            ),
            None => anyhow::bail!("{} ({}): {}", status, body.error, body.message),
        },
        Err(_) => anyhow::bail!("Request failed with status {}: {}", status, text),
    }
}

//! Commands that talk to a running API server.

use anyhow::Result;
use colored::Colorize;
use customer_analytics_domain::{AggregationState, RiskTier, Segment};
use std::time::Duration;

use crate::client::ListParams;
use crate::commands::CommandContext;
use crate::interactive::spinner;
use crate::output::{colors, OutputFormat};

pub async fn health(ctx: &CommandContext) -> Result<()> {
    let sp = spinner("Checking service health...");
    let health = ctx.client.health().await;
    sp.finish_and_clear();

    let health = health?;
    ctx.print(&health)?;

    if health.status != "healthy" {
        anyhow::bail!("Service is {}", health.status);
    }
    Ok(())
}

pub async fn metrics(ctx: &CommandContext) -> Result<()> {
    let sp = spinner("Fetching metrics...");
    let metrics = ctx.client.metrics().await;
    sp.finish_and_clear();

    ctx.print(&metrics?)
}

pub async fn customer(ctx: &CommandContext, customer_id: String) -> Result<()> {
    let sp = spinner(&format!("Fetching {}...", customer_id));
    let view = ctx.client.customer(&customer_id).await;
    sp.finish_and_clear();

    ctx.print(&view?)
}

pub async fn customers(
    ctx: &CommandContext,
    segment: Option<Segment>,
    risk_tier: Option<RiskTier>,
    churned: Option<bool>,
    page: u32,
    per_page: Option<u32>,
) -> Result<()> {
    let params = ListParams {
        segment,
        risk_tier,
        churned,
        page: Some(page),
        per_page,
    };

    let sp = spinner("Fetching customers...");
    let customers = ctx.client.list_customers(&params).await;
    sp.finish_and_clear();

    ctx.print(&customers?)
}

/// Request a pass; with `wait`, poll until it finishes and fail if it failed.
pub async fn trigger(ctx: &CommandContext, wait: bool, poll_interval: Duration) -> Result<()> {
    let triggered = ctx.client.trigger().await?;
    ctx.print(&triggered)?;

    if !wait {
        return Ok(());
    }

    let sp = spinner("Waiting for the pass to finish...");
    let status = loop {
        tokio::time::sleep(poll_interval).await;
        let status = ctx.client.status().await?;
        if status.state != AggregationState::Running {
            break status;
        }
    };
    sp.finish_and_clear();

    if ctx.format() == OutputFormat::Table {
        let line = format!("Run {} {}", triggered.run_id, status.state);
        match status.state {
            AggregationState::Succeeded => println!("{}", colors::success(&line)),
            _ => println!("{}", colors::error(&line)),
        }
    }
    ctx.print(&status)?;

    if status.state == AggregationState::Failed {
        anyhow::bail!(
            "Aggregation failed: {}",
            status.last_error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

pub async fn status(ctx: &CommandContext) -> Result<()> {
    let status = ctx.client.status().await?;
    if ctx.format() == OutputFormat::Table && status.state == AggregationState::Running {
        println!("{}", "A pass is running".yellow());
    }
    ctx.print(&status)
}

//! Table renderings of API responses.

use super::{Render, TableFormatter};
use crate::client::{CustomerPage, HealthInfo, Triggered};
use anyhow::Result;
use customer_analytics_application::{CustomerView, MetricsView};
use customer_analytics_domain::RunStatus;
use rust_decimal::Decimal;

fn money(value: Decimal) -> String {
    format!("{:.2}", value.round_dp(2))
}

fn days(value: Option<i64>) -> String {
    value.map_or_else(|| "never".to_string(), |d| d.to_string())
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

impl Render for HealthInfo {
    fn render_table(&self) -> Result<String> {
        let mut rows = vec![vec![
            "service".to_string(),
            self.status.clone(),
            format!("v{}, up {}s", self.version, self.uptime),
        ]];
        for (name, check) in &self.checks {
            rows.push(vec![
                name.clone(),
                if check.healthy { "healthy" } else { "unhealthy" }.to_string(),
                check.message.clone().unwrap_or_default(),
            ]);
        }
        Ok(TableFormatter::simple(vec!["Component", "Status", "Detail"], rows))
    }
}

impl Render for MetricsView {
    fn render_table(&self) -> Result<String> {
        if !self.computed {
            return Ok("No aggregation pass has completed yet.".to_string());
        }

        let m = &self.metrics;
        let mut items: Vec<(String, String)> = vec![
            ("Run", opt(self.run_id)),
            ("Version", opt(self.sequence)),
            ("As of", m.timestamp.to_rfc3339()),
            ("Customers", m.total_customers.to_string()),
            ("Sessions", m.total_sessions.to_string()),
            ("Conversions", m.conversions.to_string()),
            ("Conversion rate", format!("{:.2}%", m.conversion_rate)),
            ("Total revenue", money(m.total_revenue)),
            ("Avg cart value", money(m.avg_cart_value)),
            ("Churned", m.churned_customers.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        for (segment, count) in &m.segment_counts {
            items.push((segment.to_string(), count.to_string()));
        }
        for (tier, count) in &m.risk_counts {
            items.push((format!("risk: {}", tier), count.to_string()));
        }
        Ok(TableFormatter::key_value(items))
    }
}

impl Render for CustomerView {
    fn render_table(&self) -> Result<String> {
        let s = &self.summary;
        let c = &self.classification;
        Ok(TableFormatter::key_value(vec![
            ("Customer", self.customer_id.clone()),
            ("Source", format!("{:?}", self.source).to_lowercase()),
            ("As of", self.as_of.to_rfc3339()),
            ("Run", opt(self.run_id)),
            ("Events", s.total_sessions.to_string()),
            ("Sessions", s.distinct_sessions.to_string()),
            ("Conversions", s.converted_count.to_string()),
            ("Days since purchase", days(s.days_since_last_transaction)),
            ("Revenue", money(s.actual_revenue)),
            ("Campaign revenue", money(s.campaign_revenue)),
            ("CLV", money(c.clv)),
            ("Churned", c.churned.to_string()),
            ("Risk", c.risk_tier.to_string()),
            ("Segment", c.segment.to_string()),
        ]))
    }
}

impl Render for CustomerPage {
    fn render_table(&self) -> Result<String> {
        if self.items.is_empty() {
            return Ok("No customers match.".to_string());
        }

        let rows = self
            .items
            .iter()
            .map(|item| {
                vec![
                    item.customer_id.clone(),
                    item.segment.to_string(),
                    item.risk_tier.to_string(),
                    if item.churned { "yes" } else { "no" }.to_string(),
                    money(item.clv),
                    item.total_sessions.to_string(),
                    days(item.days_since_last_transaction),
                ]
            })
            .collect();

        let table = TableFormatter::simple(
            vec!["Customer", "Segment", "Risk", "Churned", "CLV", "Events", "Days"],
            rows,
        );
        let p = &self.pagination;
        Ok(format!(
            "{}\nPage {} of {} ({} customers)",
            table,
            p.page,
            p.total_pages.max(1),
            p.total
        ))
    }
}

impl Render for Triggered {
    fn render_table(&self) -> Result<String> {
        Ok(format!("{}: run {}", self.message, self.run_id))
    }
}

impl Render for RunStatus {
    fn render_table(&self) -> Result<String> {
        let mut items = vec![
            ("State", self.state.to_string()),
            ("Current run", opt(self.current_run_id)),
            ("Last run", opt(self.last_run_id)),
            ("Started", opt(self.started_at.map(|t| t.to_rfc3339()))),
            ("Finished", opt(self.finished_at.map(|t| t.to_rfc3339()))),
            ("Snapshot version", opt(self.last_sequence)),
        ];
        if let Some(error) = &self.last_error {
            items.push(("Last error", error.clone()));
        }
        if let Some(report) = &self.last_report {
            items.push(("Records", report.total_records.to_string()));
            items.push(("Skipped", report.skipped_records.to_string()));
            items.push(("Future events", report.future_events.to_string()));
            items.push(("Customers", report.customers.to_string()));
            if report.overflowed_customers > 0 {
                items.push(("Revenue overflow", report.overflowed_customers.to_string()));
            }
        }
        Ok(TableFormatter::key_value(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use customer_analytics_domain::MetricsSnapshot;

    #[test]
    fn test_uncomputed_metrics_message() {
        let view = MetricsView {
            computed: false,
            run_id: None,
            sequence: None,
            metrics: MetricsSnapshot::zero(chrono::Utc::now()),
        };
        assert_eq!(
            view.render_table().unwrap(),
            "No aggregation pass has completed yet."
        );
    }

    #[test]
    fn test_money_rounds_to_cents() {
        assert_eq!(money(Decimal::new(15166666, 5)), "151.67");
        assert_eq!(money(Decimal::ZERO), "0.00");
        assert_eq!(days(None), "never");
    }
}

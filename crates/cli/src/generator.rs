//! Synthetic session data.
//!
//! Customers `CUST0001`.. each get a handful of sessions spread over the last
//! `days` days. Every session opens with a page view; some continue to a cart
//! add, and some of those end in a purchase of the same cart.

use chrono::{DateTime, Utc};
use customer_analytics_domain::{EventRecord, EventType};
use rand::Rng;
use rust_decimal::Decimal;

const PRODUCTS: u32 = 20;

/// Shape of the generated data
#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub customers: usize,
    /// Sessions are placed within this many days before `now`
    pub days: i64,
    pub max_sessions: usize,
    /// Probability a session adds to cart
    pub cart_rate: f64,
    /// Probability a cart add ends in a purchase
    pub purchase_rate: f64,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            customers: 100,
            days: 180,
            max_sessions: 6,
            cart_rate: 0.45,
            purchase_rate: 0.5,
        }
    }
}

/// Generate funnels for every customer, ordered by customer then time.
pub fn generate<R: Rng>(options: &SeedOptions, now: DateTime<Utc>, rng: &mut R) -> Vec<EventRecord> {
    let now = now.timestamp();
    let window = options.days.max(1) * 86_400;
    let mut records = Vec::new();

    for n in 1..=options.customers {
        let customer_id = format!("CUST{:04}", n);
        let sessions = rng.gen_range(1..=options.max_sessions.max(1));

        let mut customer_records = Vec::new();
        for s in 0..sessions {
            // Leave room for the cart and purchase steps before `now`
            let start = now - rng.gen_range(180..window.max(181));
            let session_id = format!("S{:04}-{:02}", n, s + 1);
            let product = rng.gen_range(1..=PRODUCTS);

            customer_records.push(event(
                &customer_id,
                start,
                EventType::PageView,
                &session_id,
                format!("/products/PROD{:03}", product),
                Decimal::ZERO,
            ));

            if !rng.gen_bool(options.cart_rate.clamp(0.0, 1.0)) {
                continue;
            }

            let cart_value = Decimal::new(rng.gen_range(1_000..=20_000), 2);
            customer_records.push(event(
                &customer_id,
                start + 60,
                EventType::CartAdd,
                &session_id,
                "/cart".to_string(),
                cart_value,
            ));

            if rng.gen_bool(options.purchase_rate.clamp(0.0, 1.0)) {
                customer_records.push(event(
                    &customer_id,
                    start + 120,
                    EventType::Purchase,
                    &session_id,
                    "/checkout".to_string(),
                    cart_value,
                ));
            }
        }

        customer_records.sort_by_key(|r| r.timestamp);
        records.extend(customer_records);
    }

    records
}

fn event(
    customer_id: &str,
    timestamp: i64,
    event_type: EventType,
    session_id: &str,
    page_url: String,
    cart_value: Decimal,
) -> EventRecord {
    EventRecord {
        customer_id: customer_id.to_string(),
        timestamp,
        event_type: event_type.as_str().to_string(),
        session_id: session_id.to_string(),
        page_url,
        cart_value,
        converted: Some(event_type == EventType::Purchase),
        sequence: 0,
    }
}

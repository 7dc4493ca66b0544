//! Event store adapters.
//!
//! Both adapters keep raw [`EventRecord`](customer_analytics_domain::EventRecord)s
//! exactly as appended; validation happens in the engine.

mod memory;
mod postgres;

pub use memory::InMemoryEventStore;
pub use postgres::PgEventStore;

//! Durable tier adapters.
//!
//! - `in_memory`: process-lifetime history, for tests and dry runs
//! - `journal`: append-only JSON-lines file with an in-memory price index

pub mod in_memory;
pub mod journal;

pub use in_memory::InMemoryDurableStore;
pub use journal::JournalDurableStore;

/// Last `period` values, oldest first.
fn tail(prices: &[f64], period: usize) -> Vec<f64> {
    prices[prices.len().saturating_sub(period)..].to_vec()
}

//! Inbound rate gate.

use std::time::Duration;

use tokio::time::{self, Interval, MissedTickBehavior};

/// Spaces inbound deliveries to at most `per_second` messages per second.
///
/// A rate of 0 disables the gate.
#[derive(Debug)]
pub struct RateGate {
    interval: Option<Interval>,
}

impl RateGate {
    /// Create a gate.
    #[must_use]
    pub fn new(per_second: u32) -> Self {
        let interval = (per_second > 0).then(|| {
            let period = (Duration::from_secs(1) / per_second).max(Duration::from_nanos(1));
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        Self { interval }
    }

    /// Wait for the next delivery slot.
    pub async fn acquire(&mut self) {
        if let Some(interval) = self.interval.as_mut() {
            interval.tick().await;
        }
    }
}

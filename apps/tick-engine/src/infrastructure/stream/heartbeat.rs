//! Connection Liveness
//!
//! Tracks when the peer was last heard from. The keepalive loop pings on a
//! fixed interval and replaces the connection once nothing (pong or data)
//! has arrived for longer than the pong timeout.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

/// Keepalive timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Interval between pings.
    pub ping_interval: Duration,
    /// Silence after which the connection is considered dead.
    pub pong_timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(180),
            pong_timeout: Duration::from_secs(600),
        }
    }
}

/// What the keepalive loop should do on its next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatCheck {
    /// Peer is alive; send the next ping.
    SendPing,
    /// Peer has been silent too long.
    TimedOut(Duration),
}

/// Liveness shared by the read and keepalive loops.
#[derive(Debug)]
pub struct HeartbeatState {
    last_seen: RwLock<Instant>,
    awaiting_pong: AtomicBool,
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self::new()
    }
}

impl HeartbeatState {
    /// Create state that counts from now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_seen: RwLock::new(Instant::now()),
            awaiting_pong: AtomicBool::new(false),
        }
    }

    /// Any inbound frame.
    pub fn record_activity(&self) {
        *self.last_seen.write() = Instant::now();
        self.awaiting_pong.store(false, Ordering::SeqCst);
    }

    /// A ping went out.
    pub fn mark_ping_sent(&self) {
        self.awaiting_pong.store(true, Ordering::SeqCst);
    }

    /// Whether a ping is outstanding.
    #[must_use]
    pub fn is_awaiting_pong(&self) -> bool {
        self.awaiting_pong.load(Ordering::SeqCst)
    }

    /// Time since the peer was last heard from.
    #[must_use]
    pub fn silence(&self) -> Duration {
        self.last_seen.read().elapsed()
    }

    /// Start counting from a fresh connection.
    pub fn reset(&self) {
        self.record_activity();
    }

    /// Decide the next keepalive action.
    #[must_use]
    pub fn check(&self, config: &HeartbeatConfig) -> HeartbeatCheck {
        let silence = self.silence();
        if self.is_awaiting_pong() && silence > config.pong_timeout {
            HeartbeatCheck::TimedOut(silence)
        } else {
            HeartbeatCheck::SendPing
        }
    }

    #[cfg(test)]
    fn backdate(&self, by: Duration) {
        if let Some(earlier) = Instant::now().checked_sub(by) {
            *self.last_seen.write() = earlier;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> HeartbeatConfig {
        HeartbeatConfig {
            ping_interval: Duration::from_millis(50),
            pong_timeout: Duration::from_millis(100),
        }
    }

    #[test]
    fn fresh_state_pings() {
        let state = HeartbeatState::new();
        assert!(!state.is_awaiting_pong());
        assert_eq!(state.check(&config()), HeartbeatCheck::SendPing);
    }

    #[test]
    fn silent_peer_with_outstanding_ping_times_out() {
        let state = HeartbeatState::new();
        state.mark_ping_sent();
        state.backdate(Duration::from_millis(200));
        assert!(matches!(state.check(&config()), HeartbeatCheck::TimedOut(_)));
    }

    #[test]
    fn silence_without_ping_is_not_a_timeout() {
        let state = HeartbeatState::new();
        state.backdate(Duration::from_millis(200));
        assert_eq!(state.check(&config()), HeartbeatCheck::SendPing);
    }

    #[test]
    fn activity_clears_outstanding_ping() {
        let state = HeartbeatState::new();
        state.mark_ping_sent();
        state.backdate(Duration::from_millis(200));

        state.record_activity();

        assert!(!state.is_awaiting_pong());
        assert_eq!(state.check(&config()), HeartbeatCheck::SendPing);
    }

    #[test]
    fn default_matches_venue_keepalive() {
        let config = HeartbeatConfig::default();
        assert_eq!(config.ping_interval, Duration::from_secs(180));
        assert_eq!(config.pong_timeout, Duration::from_secs(600));
    }
}

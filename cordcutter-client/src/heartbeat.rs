//! Heartbeat timer
//!
//! One timer per connection, created when Hello arrives and dropped whenever
//! the transport goes away. The first beat is due one full period after Hello.

use std::future;
use std::time::Duration;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

/// Heartbeat cadence and acknowledgement tracking for one connection
#[derive(Debug)]
pub(crate) struct Heartbeat {
    interval: Interval,
    awaiting_ack: bool,
    last_sent: Option<Instant>,
}

impl Heartbeat {
    pub(crate) fn new(period: Duration) -> Self {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            interval,
            awaiting_ack: false,
            last_sent: None,
        }
    }

    /// Wait for the next beat. Cancel safe.
    pub(crate) async fn tick(&mut self) {
        self.interval.tick().await;
    }

    /// Record that a heartbeat went out
    pub(crate) fn sent(&mut self) {
        self.awaiting_ack = true;
        self.last_sent = Some(Instant::now());
    }

    /// Record an acknowledgement, returning the round trip if a beat was outstanding
    pub(crate) fn acked(&mut self) -> Option<Duration> {
        let was_waiting = std::mem::replace(&mut self.awaiting_ack, false);
        self.last_sent
            .filter(|_| was_waiting)
            .map(|sent| sent.elapsed())
    }

    pub(crate) fn awaiting_ack(&self) -> bool {
        self.awaiting_ack
    }
}

/// Next beat of the current timer; pending forever without one
pub(crate) async fn next_tick(heartbeat: &mut Option<Heartbeat>) {
    match heartbeat {
        Some(heartbeat) => heartbeat.tick().await,
        None => future::pending().await,
    }
}

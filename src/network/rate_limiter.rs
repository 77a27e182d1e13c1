//! Per-peer, per-message-type rate limiting (spec §4.5). Each message family
//! gets a fixed token budget per window; `Config::network`'s
//! `inbound_rate_limit_percent` / `outbound_rate_limit_percent` scale the
//! budget actually granted to a given traffic direction.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// The closed set of message families a budget is tracked for. Distinct from
/// the wire `MessageType` tag — several wire messages can share one budget.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageClass {
    NewTransaction,
    RequestPuzzleSolution,
    Subscribe,
    NewUnfinishedBlock,
    RequestBlocks,
    RequestPeers,
    NewPeak,
    Ping,
    General,
}

impl MessageClass {
    fn base_budget(self) -> (Duration, u32) {
        match self {
            MessageClass::NewTransaction => (Duration::from_secs(1), 50),
            MessageClass::RequestPuzzleSolution => (Duration::from_secs(1), 100),
            MessageClass::Subscribe => (Duration::from_secs(60), 10),
            MessageClass::NewUnfinishedBlock => (Duration::from_secs(1), 10),
            MessageClass::RequestBlocks => (Duration::from_secs(10), 5),
            MessageClass::RequestPeers => (Duration::from_secs(60), 5),
            MessageClass::NewPeak => (Duration::from_secs(1), 10),
            MessageClass::Ping => (Duration::from_secs(10), 2),
            MessageClass::General => (Duration::from_secs(1), 100),
        }
    }
}

pub struct RateLimiter {
    percent: u8,
    counters: HashMap<(MessageClass, String), (Instant, u32)>,
    last_cleanup: Instant,
}

impl RateLimiter {
    /// `percent` is the fraction (0-100) of each class's base budget granted
    /// to this limiter's direction (inbound or outbound).
    pub fn new(percent: u8) -> Self {
        Self {
            percent: percent.min(100),
            counters: HashMap::new(),
            last_cleanup: Instant::now(),
        }
    }

    fn scaled_budget(&self, class: MessageClass) -> (Duration, u32) {
        let (window, max) = class.base_budget();
        let scaled = ((max as u64 * self.percent as u64) / 100).max(1) as u32;
        (window, scaled)
    }

    /// Returns `true` if `peer_id` may send one more message of `class` now.
    pub fn check(&mut self, class: MessageClass, peer_id: &str) -> bool {
        let (window, max) = self.scaled_budget(class);
        let now = Instant::now();

        if now.duration_since(self.last_cleanup) > Duration::from_secs(10) {
            let max_age = window * 10;
            self.counters
                .retain(|_, (last_reset, _)| now.duration_since(*last_reset) < max_age);
            self.last_cleanup = now;
        }

        let key = (class, peer_id.to_string());
        let (last_reset, count) = self.counters.entry(key).or_insert((now, 0));

        if now.duration_since(*last_reset) > window {
            *last_reset = now;
            *count = 0;
        }

        if *count >= max {
            false
        } else {
            *count += 1;
            true
        }
    }
}

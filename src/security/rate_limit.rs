//! Sliding-window rate limiting of failed authentication attempts.

use std::collections::VecDeque;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use dashmap::DashMap;

const WINDOW: Duration = Duration::from_secs(15 * 60);

/// Tracks failed credential checks per source address over a 15 minute
/// sliding window. Once a source reaches the configured limit, further
/// requests from it are refused until enough old failures age out.
pub struct RateLimiter {
    max_fails: u32,
    failures: DashMap<IpAddr, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_fails: u32) -> Self {
        Self {
            max_fails,
            failures: DashMap::new(),
        }
    }

    /// Record one failed authentication attempt from `source`.
    pub fn record_failure(&self, source: IpAddr) {
        self.record_failure_at(source, Instant::now());
    }

    /// Whether `source` has reached the failure limit within the window.
    pub fn is_limited(&self, source: IpAddr) -> bool {
        self.is_limited_at(source, Instant::now())
    }

    fn record_failure_at(&self, source: IpAddr, now: Instant) {
        let mut entry = self.failures.entry(source).or_default();
        prune(&mut entry, now);
        entry.push_back(now);
    }

    fn is_limited_at(&self, source: IpAddr, now: Instant) -> bool {
        match self.failures.get_mut(&source) {
            Some(mut entry) => {
                prune(&mut entry, now);
                entry.len() as u32 >= self.max_fails
            }
            None => false,
        }
    }
}

fn prune(window: &mut VecDeque<Instant>, now: Instant) {
    while let Some(oldest) = window.front() {
        if now.duration_since(*oldest) >= WINDOW {
            window.pop_front();
        } else {
            break;
        }
    }
}

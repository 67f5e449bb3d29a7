use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

const WINDOW: Duration = Duration::from_secs(60);

/// Sliding one-minute request limiter keyed by caller
#[derive(Debug)]
pub struct RateLimiter {
    limit_per_minute: u32,
    windows: DashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a limiter; a limit of 0 disables limiting
    pub fn new(limit_per_minute: u32) -> Self {
        Self {
            limit_per_minute,
            windows: DashMap::new(),
        }
    }

    /// Record a request for `key`, rejecting it when the window is full
    pub fn check(&self, key: &str) -> Result<()> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<()> {
        if self.limit_per_minute == 0 {
            return Ok(());
        }

        let mut window = self.windows.entry(key.to_string()).or_default();
        while let Some(&oldest) = window.front() {
            if now.duration_since(oldest) >= WINDOW {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= self.limit_per_minute as usize {
            let oldest = window.front().copied().unwrap_or(now);
            let remaining = WINDOW.saturating_sub(now.duration_since(oldest));
            let retry_after_secs = remaining.as_secs().max(1);
            return Err(Error::RateLimited { retry_after_secs });
        }

        window.push_back(now);
        Ok(())
    }

    /// Configured limit
    pub fn limit_per_minute(&self) -> u32 {
        self.limit_per_minute
    }
}

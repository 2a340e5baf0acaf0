//! Rate limiting
//!
//! Per-client fixed-window request counting. Each client identifier owns one
//! counter entry in a concurrent registry; entries are locked individually so
//! unrelated clients never contend.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::ConfigError;
use crate::utils::Clock;

/// Longest accepted window, one day
pub const MAX_WINDOW_SECS: u64 = 86_400;

/// Most windows an idle client is kept for
pub const MAX_IDLE_WINDOWS: u32 = 10_000;

/// Rate limiter configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Disable to admit everything (the counters are not touched)
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Maximum requests per client per window
    #[serde(default = "default_request_limit")]
    pub request_limit: u32,
    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    /// How often the eviction sweep runs
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
    /// Entries whose window started more than this many windows ago are evicted
    #[serde(default = "default_idle_windows")]
    pub idle_windows: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_request_limit() -> u32 {
    100
}

fn default_window_secs() -> u64 {
    60
}

fn default_cleanup_interval() -> u64 {
    300
}

fn default_idle_windows() -> u32 {
    10
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            request_limit: default_request_limit(),
            window_secs: default_window_secs(),
            cleanup_interval_secs: default_cleanup_interval(),
            idle_windows: default_idle_windows(),
        }
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_limit == 0 {
            return Err(ConfigError::invalid("Rate limit must be greater than zero"));
        }
        if self.window_secs == 0 {
            return Err(ConfigError::invalid(
                "Rate limit window must be greater than zero",
            ));
        }
        if self.window_secs > MAX_WINDOW_SECS {
            return Err(ConfigError::invalid(format!(
                "Rate limit window cannot exceed {} seconds",
                MAX_WINDOW_SECS
            )));
        }
        if self.cleanup_interval_secs == 0 || self.idle_windows == 0 {
            return Err(ConfigError::invalid(
                "Rate limit cleanup interval and idle windows must be greater than zero",
            ));
        }
        if self.idle_windows > MAX_IDLE_WINDOWS {
            return Err(ConfigError::invalid(format!(
                "Rate limit idle windows cannot exceed {}",
                MAX_IDLE_WINDOWS
            )));
        }
        if self.cleanup_interval_secs > MAX_WINDOW_SECS * u64::from(MAX_IDLE_WINDOWS) {
            return Err(ConfigError::invalid("Rate limit cleanup interval is too long"));
        }
        Ok(())
    }

    /// Window length, clamped to [`MAX_WINDOW_SECS`]
    pub fn window(&self) -> TimeDelta {
        TimeDelta::seconds(self.window_secs.min(MAX_WINDOW_SECS) as i64)
    }

    /// Age after which an idle client is evicted
    pub fn idle_period(&self) -> TimeDelta {
        self.window() * self.idle_windows.min(MAX_IDLE_WINDOWS) as i32
    }
}

/// Counter state for one client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientWindowCounter {
    pub window_start: DateTime<Utc>,
    pub count: u32,
}

#[derive(Debug)]
struct CounterSlot {
    counter: ClientWindowCounter,
    /// Set by the sweep when the slot leaves the registry
    evicted: bool,
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Rejected { retry_after_secs: u64 },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }
}

/// Registry of per-client window counters
///
/// Cloning shares the registry. Each server (or test) builds its own.
#[derive(Clone)]
pub struct RateLimiter {
    entries: Arc<DashMap<String, Arc<Mutex<CounterSlot>>>>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            config,
            clock,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count one request for `client_id` and decide whether to admit it
    ///
    /// An empty identifier is admitted without being counted.
    pub fn admit(&self, client_id: &str) -> Admission {
        if !self.config.enabled {
            return Admission::Admitted;
        }
        if client_id.is_empty() {
            debug!("No client identifier, skipping rate limit");
            return Admission::Admitted;
        }

        let window = self.config.window();

        loop {
            // The shard guard is released before the slot is locked
            let slot = self
                .entries
                .entry(client_id.to_string())
                .or_insert_with(|| {
                    Arc::new(Mutex::new(CounterSlot {
                        counter: ClientWindowCounter {
                            window_start: self.clock.now(),
                            count: 0,
                        },
                        evicted: false,
                    }))
                })
                .clone();

            let mut slot = slot.lock().unwrap_or_else(|e| e.into_inner());
            if slot.evicted {
                continue;
            }

            let now = self.clock.now();
            let counter = &mut slot.counter;

            if now - counter.window_start > window {
                counter.window_start = now;
                counter.count = 0;
            }

            counter.count = counter.count.saturating_add(1);

            if counter.count > self.config.request_limit {
                let resets_at = counter.window_start + window;
                let retry_after_secs = (resets_at - now).num_seconds().max(1) as u64;
                return Admission::Rejected { retry_after_secs };
            }

            return Admission::Admitted;
        }
    }

    /// Current counter for a client, if one exists
    pub fn snapshot(&self, client_id: &str) -> Option<ClientWindowCounter> {
        let slot = self.entries.get(client_id)?.clone();
        let slot = slot.lock().unwrap_or_else(|e| e.into_inner());
        Some(slot.counter)
    }

    /// Number of tracked clients
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Evict clients whose window started more than `idle_windows` windows ago
    ///
    /// Returns the number of evicted entries. Slots that are locked by an
    /// in-flight request are left alone.
    pub fn sweep(&self) -> usize {
        let idle = self.config.idle_period();
        let now = self.clock.now();
        let before = self.entries.len();

        self.entries.retain(|_, slot| match slot.try_lock() {
            Ok(mut slot) => {
                if now - slot.counter.window_start > idle {
                    slot.evicted = true;
                    false
                } else {
                    true
                }
            }
            Err(_) => true,
        });

        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "Rate limiter cleanup");
        }
        evicted
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .field("clients", &self.entries.len())
            .finish()
    }
}

/// Spawn a background task to periodically evict idle clients
pub fn spawn_rate_limit_cleanup(limiter: RateLimiter) -> JoinHandle<()> {
    let period = Duration::from_secs(limiter.config.cleanup_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick completes immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            limiter.sweep();
        }
    })
}

/// Rate limit exceeded response
#[derive(Debug, Clone, Copy)]
pub struct RateLimitExceeded {
    pub retry_after_secs: u64,
    pub limit: u32,
}

impl IntoResponse for RateLimitExceeded {
    fn into_response(self) -> Response {
        warn!(retry_after = self.retry_after_secs, "Rate limit exceeded");

        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            "Too many requests. Please try again later.",
        )
            .into_response();

        let headers = response.headers_mut();
        headers.insert(header::RETRY_AFTER, HeaderValue::from(self.retry_after_secs));
        headers.insert("X-RateLimit-Limit", HeaderValue::from(self.limit));
        headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
        response
    }
}

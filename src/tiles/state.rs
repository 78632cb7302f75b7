//! Per-tile lifecycle state and the retry back-off policy.

use crate::core::config::RetryConfig;
use crate::render::backend::TextureHandle;
use std::sync::Arc;

/// Failure bookkeeping carried by the `Failed`, `Retrying` and `Exhausted`
/// states. Times are frames of the monotonic frame counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    pub retry_count: u32,
    pub last_fail_time: u64,
    pub error: String,
}

impl RetryState {
    /// State after a first failure at frame `now`.
    pub fn initial_failure(now: u64, error: impl Into<String>) -> Self {
        Self {
            retry_count: 0,
            last_fail_time: now,
            error: error.into(),
        }
    }

    /// State after one more recorded failure at frame `now`.
    pub fn advanced(&self, now: u64, error: impl Into<String>) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            last_fail_time: now,
            error: error.into(),
        }
    }
}

impl RetryConfig {
    /// Back-off delay in frames: doubles with every recorded failure.
    pub fn backoff_delay(&self, rs: &RetryState) -> u64 {
        self.base_delay_frames.saturating_mul(1u64 << rs.retry_count.min(63))
    }

    /// Earliest frame at which the tile may be retried.
    pub fn next_retry_time(&self, rs: &RetryState) -> u64 {
        rs.last_fail_time.saturating_add(self.backoff_delay(rs))
    }

    pub fn is_exhausted(&self, rs: &RetryState) -> bool {
        rs.retry_count >= self.max_retries
    }

    /// Whether the tile is due for a retry at frame `now`. Monotonic in
    /// `now` until exhaustion; exhaustion is sticky.
    pub fn should_retry(&self, rs: &RetryState, now: u64) -> bool {
        !self.is_exhausted(rs) && now >= self.next_retry_time(rs)
    }
}

/// Lifecycle state of one tile coordinate in the cache. Exactly one variant
/// holds at any time; `Loaded` and `Cached` are mutually exclusive.
#[derive(Debug, Clone)]
pub enum TileState {
    /// An initial fetch (or a re-decode of cached bytes) is in flight.
    Pending,
    /// GPU texture present; the encoded bytes are retained so the texture
    /// can be rebuilt after GPU eviction.
    Loaded {
        texture: TextureHandle,
        bytes: Arc<Vec<u8>>,
    },
    /// Texture released; encoded bytes remain in RAM with an LRU stamp.
    Cached {
        bytes: Arc<Vec<u8>>,
        last_access: u64,
    },
    /// Not in flight; eligible for retry once the back-off elapses.
    Failed(RetryState),
    /// A retry fetch is in flight.
    Retrying(RetryState),
    /// Maximum attempts reached; never retried automatically.
    Exhausted(RetryState),
}

impl TileState {
    pub fn is_loaded(&self) -> bool {
        matches!(self, TileState::Loaded { .. })
    }

    /// Whether a fetch or decode task is currently in flight for this tile.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, TileState::Pending | TileState::Retrying(_))
    }
}

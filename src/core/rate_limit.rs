//! Outbound send admission control.
//!
//! Fixed-window counter per campaign: the first call for a key (or the
//! first call after the window elapsed) opens a fresh window with count 1;
//! further calls inside the window increment the count and are rejected
//! once the limit is reached.
//!
//! Counters are process-local. A horizontally scaled deployment must swap
//! this component for one backed by a shared atomic store, which is why it
//! is constructed explicitly and handed to `AppState` instead of living in
//! a module-level global.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

pub const DEFAULT_SEND_LIMIT: u32 = 10;
pub const DEFAULT_SEND_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

pub struct SendRateLimiter {
    limit: u32,
    window: Duration,
    windows: RwLock<HashMap<Uuid, Window>>,
}

impl SendRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: RwLock::new(HashMap::new()),
        }
    }

    /// Returns true when a send for `key` is admitted in the current window.
    pub async fn allow(&self, key: Uuid) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.write().await;
        match windows.get_mut(&key) {
            Some(w) if now.duration_since(w.started) < self.window => {
                if w.count >= self.limit {
                    return false;
                }
                w.count += 1;
                true
            }
            _ => {
                windows.insert(
                    key,
                    Window {
                        started: now,
                        count: 1,
                    },
                );
                true
            }
        }
    }
}

impl Default for SendRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_LIMIT, DEFAULT_SEND_WINDOW)
    }
}

impl std::fmt::Debug for SendRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendRateLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

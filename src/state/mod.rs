//! Lightweight runtime counters exposed by the status endpoint.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Shared application state.
///
/// There is no persistent job state in burnsight; the only shared mutable
/// resource is the imagery cache directory. This tracks simple counters for
/// observability.
pub struct AppState {
    started_at: DateTime<Utc>,
    fetches: AtomicU64,
    analyses: AtomicU64,
    videos_analyzed: AtomicU64,
}

/// Point-in-time snapshot of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub uptime_secs: i64,
    pub fetches: u64,
    pub analyses: u64,
    pub videos_analyzed: u64,
}

impl AppState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            started_at: Utc::now(),
            fetches: AtomicU64::new(0),
            analyses: AtomicU64::new(0),
            videos_analyzed: AtomicU64::new(0),
        })
    }

    pub fn record_fetch(&self) {
        self.fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_analysis(&self) {
        self.analyses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_video_analysis(&self) {
        self.videos_analyzed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Stats {
        Stats {
            uptime_secs: (Utc::now() - self.started_at).num_seconds(),
            fetches: self.fetches.load(Ordering::Relaxed),
            analyses: self.analyses.load(Ordering::Relaxed),
            videos_analyzed: self.videos_analyzed.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let state = AppState::new();
        let stats = state.snapshot();
        assert_eq!(stats.fetches, 0);
        assert_eq!(stats.analyses, 0);
        assert_eq!(stats.videos_analyzed, 0);
    }

    #[test]
    fn counters_increment() {
        let state = AppState::new();
        state.record_fetch();
        state.record_fetch();
        state.record_analysis();
        state.record_video_analysis();

        let stats = state.snapshot();
        assert_eq!(stats.fetches, 2);
        assert_eq!(stats.analyses, 1);
        assert_eq!(stats.videos_analyzed, 1);
    }
}

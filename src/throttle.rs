//! Outbound call pacing.
//!
//! The pipeline asks the pacer for permission between consecutive calls of a
//! phase; the pacer owns the admission policy. `FixedDelay` spaces admissions
//! by a constant interval, which keeps the job under Notion's average request
//! rate at the volumes it handles.

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::debug;

#[async_trait]
pub trait CallPacer: Send + Sync {
    /// Whether a call could go out right now without waiting.
    fn may_call_now(&self) -> bool;

    /// Suspend until the next call is admitted.
    async fn wait_until_allowed(&self);
}

/// Admits a call once `interval` has passed since the previous admission.
///
/// The pipeline only asks after a call already went out, so the first wait
/// of a pacer is a full interval.
#[derive(Debug)]
pub struct FixedDelay {
    interval: Duration,
    last_admitted: Mutex<Option<Instant>>,
}

impl FixedDelay {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_admitted: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn last_admitted(&self) -> Option<Instant> {
        *self.last_admitted.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn admit(&self) {
        *self.last_admitted.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
    }
}

impl Default for FixedDelay {
    fn default() -> Self {
        Self::new(Self::DEFAULT_INTERVAL)
    }
}

#[async_trait]
impl CallPacer for FixedDelay {
    fn may_call_now(&self) -> bool {
        match self.last_admitted() {
            Some(at) => at.elapsed() >= self.interval,
            None => true,
        }
    }

    async fn wait_until_allowed(&self) {
        let remaining = match self.last_admitted() {
            Some(at) => self.interval.saturating_sub(at.elapsed()),
            None => self.interval,
        };
        if !remaining.is_zero() {
            debug!(wait_ms = remaining.as_millis() as u64, "pacing next call");
            tokio::time::sleep(remaining).await;
        }
        self.admit();
    }
}

//! Wall-clock budget shared by every external call of one attempt.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::services::ServiceError;

pub(crate) fn overall_timeout_duration(timeout_secs: u64) -> Option<Duration> {
    if timeout_secs == 0 {
        None
    } else {
        Some(Duration::from_secs(timeout_secs))
    }
}

/// Remaining time for one attempt; `None` is unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
    remaining: Option<Duration>,
}

impl Budget {
    pub fn unlimited() -> Self {
        Self { remaining: None }
    }

    pub fn new(limit: Duration) -> Self {
        Self {
            remaining: Some(limit),
        }
    }

    /// `0` means unlimited.
    pub fn from_timeout_secs(timeout_secs: u64) -> Self {
        Self {
            remaining: overall_timeout_duration(timeout_secs),
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        self.remaining
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(Duration::ZERO)
    }

    /// Deduct `elapsed`, saturating at zero.
    pub fn charge(&mut self, elapsed: Duration) {
        if let Some(remaining) = self.remaining.as_mut() {
            *remaining = remaining.saturating_sub(elapsed);
        }
    }

    /// Run one external call with the remaining budget as its deadline and
    /// charge the time it took. A call issued on an exhausted budget fails
    /// with [`ServiceError::Timeout`] without being started.
    pub fn invoke<T>(
        &mut self,
        context: &str,
        call: impl FnOnce(Option<Duration>) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        if self.is_exhausted() {
            return Err(ServiceError::Timeout {
                context: context.to_string(),
            });
        }
        let started = Instant::now();
        let result = call(self.remaining);
        let elapsed = started.elapsed();
        self.charge(elapsed);
        debug!(
            context,
            elapsed_ms = elapsed.as_millis() as u64,
            remaining_ms = self.remaining.map(|r| r.as_millis() as u64),
            "external call finished"
        );
        result
    }
}

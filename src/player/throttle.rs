use std::time::Duration;
use tokio::time::Instant;

/// Timestamp gate for property-driven progress reports.
#[derive(Debug, Clone)]
pub struct ReportThrottle {
    window: Duration,
    last_emit: Option<Instant>,
}

impl ReportThrottle {
    pub fn new(window: Duration) -> Self {
        ReportThrottle { window, last_emit: None }
    }

    /// Returns true and records `now` if the window since the last emit has elapsed.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) if now.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last_emit = Some(now);
                true
            }
        }
    }

    /// Records an emit that bypassed the gate.
    pub fn record(&mut self, now: Instant) {
        self.last_emit = Some(now);
    }
}

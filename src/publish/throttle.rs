/// Gates image publication to at most one send per interval.
#[derive(Debug, Clone)]
pub struct ImageThrottle {
    interval_ms: i64,
    last_sent_ms: i64,
}

impl ImageThrottle {
    /// `started_ms` counts as the last send, so the first image waits a full interval.
    pub fn new(interval_ms: u64, started_ms: i64) -> Self {
        Self {
            interval_ms: i64::try_from(interval_ms).unwrap_or(i64::MAX),
            last_sent_ms: started_ms,
        }
    }

    /// Claims the slot and resets the clock when the interval has elapsed.
    pub fn try_acquire(&mut self, now_ms: i64) -> bool {
        if now_ms.saturating_sub(self.last_sent_ms) >= self.interval_ms {
            self.last_sent_ms = now_ms;
            true
        } else {
            false
        }
    }

    pub fn last_sent_ms(&self) -> i64 {
        self.last_sent_ms
    }
}

use std::time::Duration;

/// Fixed-delay retry bound for series downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero means never try.
    pub max_attempts: u32,
    /// Pause between consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Initial state for a fresh download.
    pub fn start(&self) -> FetchState {
        if self.max_attempts == 0 {
            FetchState::Abandoned { attempts: 0 }
        } else {
            FetchState::Pending
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(5))
    }
}

/// `Pending → Retrying(k) → Succeeded | Abandoned`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    Pending,
    /// `k` attempts have failed so far.
    Retrying(u32),
    Succeeded { attempts: u32 },
    Abandoned { attempts: u32 },
}

impl FetchState {
    /// Number of the attempt about to be made, if any.
    pub fn next_attempt(&self) -> Option<u32> {
        match self {
            FetchState::Pending => Some(1),
            FetchState::Retrying(k) => Some(k + 1),
            FetchState::Succeeded { .. } | FetchState::Abandoned { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.next_attempt().is_none()
    }

    pub fn on_success(self) -> Self {
        match self.next_attempt() {
            Some(attempts) => FetchState::Succeeded { attempts },
            None => self,
        }
    }

    pub fn on_failure(self, policy: &RetryPolicy) -> Self {
        match self.next_attempt() {
            Some(attempts) if attempts >= policy.max_attempts => FetchState::Abandoned { attempts },
            Some(attempts) => FetchState::Retrying(attempts),
            None => self,
        }
    }
}

use crate::config::PageConfig;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryError {
    #[error("condition not met after {attempts} attempts")]
    NotFound { attempts: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    pub fn from_config(page: &PageConfig) -> Self {
        Self::new(
            page.retry_attempts,
            Duration::from_millis(page.retry_interval_ms),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&PageConfig::default())
    }
}

/// Polls `check` until it yields a value. The first poll is immediate; each
/// further one waits `interval`, yielding to other tasks in between.
pub async fn await_condition<T, F>(mut check: F, policy: RetryPolicy) -> Result<T, RetryError>
where
    F: FnMut() -> Option<T>,
{
    for attempt in 1..=policy.max_attempts {
        if let Some(found) = check() {
            return Ok(found);
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    Err(RetryError::NotFound {
        attempts: policy.max_attempts,
    })
}

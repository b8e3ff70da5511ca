//! Bounded polling.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// How long and how often to poll a readiness check.
#[derive(Debug, Clone)]
pub struct WaitPolicy {
    pub name: &'static str,
    pub interval: Duration,
    pub timeout: Duration,
}

impl WaitPolicy {
    pub const POLL_INTERVAL: Duration = Duration::from_secs(5);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            interval: Self::POLL_INTERVAL,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug)]
pub enum WaitError<E> {
    TimedOut { elapsed: Duration },
    /// The check itself failed; polling stops at once.
    Check(E),
}

/// Poll `check` every `policy.interval` until it returns `true` or
/// `policy.timeout` has elapsed.
///
/// The first check runs immediately. The last sleep is clipped so the
/// final check lands on the deadline, never past it.
pub async fn wait_until<F, Fut, E>(policy: &WaitPolicy, mut check: F) -> Result<Duration, WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
{
    let start = Instant::now();
    let deadline = start + policy.timeout;
    let mut polls = 0u32;

    loop {
        polls += 1;
        if check().await.map_err(WaitError::Check)? {
            let elapsed = start.elapsed();
            debug!(wait = policy.name, polls, ?elapsed, "condition met");
            return Ok(elapsed);
        }

        let now = Instant::now();
        if now >= deadline {
            let elapsed = now - start;
            debug!(wait = policy.name, polls, ?elapsed, "timed out");
            return Err(WaitError::TimedOut { elapsed });
        }
        tokio::time::sleep(policy.interval.min(deadline - now)).await;
    }
}

use std::thread;
use std::time::Duration;

use rand::Rng;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::traits::NodeStore;

/// Bounded retry for transactions that lose a lock race.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Unit of the randomized back-off: attempt `n` sleeps `random(0..n) * base_delay`.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Same bound, no sleeping. For tests and in-memory stores.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
        }
    }

    fn backoff(&self, retry_count: u32) -> Duration {
        if retry_count == 0 || self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let slots = rand::rng().random_range(0..retry_count);
        self.base_delay * slots
    }
}

/// Run `work` in a store transaction, re-running it from scratch on transient conflicts.
///
/// `work` must reload whatever it reads: every attempt starts from committed state.
pub fn in_tenacious_transaction<S, T, F>(store: &mut S, policy: &RetryPolicy, mut work: F) -> Result<T>
where
    S: NodeStore,
    F: FnMut(&mut S) -> Result<T>,
{
    let mut retry_count = 0u32;
    loop {
        match store.transaction(|s| work(s)) {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                if retry_count >= policy.max_retries {
                    warn!(attempts = retry_count + 1, error = %err, "giving up on transaction");
                    return Err(Error::RetriesExhausted {
                        attempts: retry_count + 1,
                        message: err.to_string(),
                    });
                }
                retry_count += 1;
                info!(retry = retry_count, error = %err, "deadlock detected, retrying");
                let pause = policy.backoff(retry_count);
                if !pause.is_zero() {
                    thread::sleep(pause);
                }
            }
            Err(err) => return Err(err),
        }
    }
}

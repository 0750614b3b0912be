//! Bounded retry policy
//!
//! A transaction is retried a fixed number of times. Each attempt reuses the
//! same request (and packet id); the policy only decides how many attempts are
//! made and how long to wait before each one. The default sends the next
//! attempt immediately after a failure.

use std::{num::NonZeroU32, time::Duration};

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Resend immediately
    #[default]
    None,
    /// Same delay before every retry
    Fixed(Duration),
    /// `step * n` before retry `n`
    Linear {
        /// Increment per retry
        step: Duration,
    },
    /// `base * 2^(n-1)` before retry `n`, capped at `max`
    Exponential {
        /// Delay before the first retry
        base: Duration,
        /// Upper bound
        max: Duration,
    },
}

/// How one attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError<E> {
    /// Try again if attempts remain
    Retryable(E),
    /// Stop immediately
    Fatal(E),
}

/// Why a retried operation gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// All attempts failed with retryable errors
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Error from the final attempt
        last: E,
    },
    /// An attempt failed with a fatal error
    Fatal(E),
}

/// Attempt bound plus backoff schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: NonZeroU32,
    /// Delay schedule
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: NonZeroU32::MIN.saturating_add(2), backoff: Backoff::None }
    }
}

impl RetryPolicy {
    /// Policy with `max_attempts` attempts and no backoff.
    pub fn attempts(max_attempts: NonZeroU32) -> Self {
        Self { max_attempts, backoff: Backoff::None }
    }

    /// Delay before attempt number `attempt` (1-based). Zero for the first.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }
        let retry = attempt - 1;

        match self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed(delay) => delay,
            Backoff::Linear { step } => step.saturating_mul(retry),
            Backoff::Exponential { base, max } => {
                let factor = 1u32.checked_shl(retry - 1).unwrap_or(u32::MAX);
                base.saturating_mul(factor).min(max)
            },
        }
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out.
    ///
    /// `op` receives the 1-based attempt number. `sleep` is called with every
    /// non-zero backoff delay; pass `std::thread::sleep` in production.
    pub fn run<T, E>(
        &self,
        mut op: impl FnMut(u32) -> Result<T, AttemptError<E>>,
        mut sleep: impl FnMut(Duration),
    ) -> Result<T, RetryError<E>> {
        let max = self.max_attempts.get();
        let mut attempt = 1;

        loop {
            let delay = self.delay_before(attempt);
            if !delay.is_zero() {
                sleep(delay);
            }

            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(AttemptError::Fatal(err)) => return Err(RetryError::Fatal(err)),
                Err(AttemptError::Retryable(err)) if attempt >= max => {
                    return Err(RetryError::Exhausted { attempts: attempt, last: err });
                },
                Err(AttemptError::Retryable(_)) => attempt += 1,
            }
        }
    }
}

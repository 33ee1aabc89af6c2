use std::time::Duration;

/// Strategy for computing delay between retry attempts.
///
/// Each variant defines a different backoff curve. Variants with a `max`
/// clamp the computed delay so it never exceeds it.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryStrategy {
    /// Linear backoff: `delay * (attempt + 1)`, clamped to `max`.
    Linear {
        /// Per-attempt increment.
        delay: Duration,
        /// Upper bound on the computed delay.
        max: Duration,
    },
    /// Exponential backoff: `base * multiplier^attempt`, clamped to `max`.
    Exponential {
        /// Initial delay before the first retry.
        base: Duration,
        /// Upper bound on the computed delay.
        max: Duration,
        /// Factor applied on each successive attempt.
        multiplier: f64,
    },
    /// Constant delay between every retry attempt.
    Constant {
        /// Fixed delay duration.
        delay: Duration,
    },
}

impl RetryStrategy {
    /// Compute the delay after the given zero-based failed `attempt`.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use vellum_executor::RetryStrategy;
    ///
    /// let strategy = RetryStrategy::default();
    /// assert_eq!(strategy.delay_for(0), Duration::from_secs(1));
    /// assert_eq!(strategy.delay_for(1), Duration::from_secs(2));
    /// ```
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self {
            Self::Linear { delay, max } => delay.saturating_mul(attempt.saturating_add(1)).min(*max),
            Self::Exponential {
                base,
                max,
                multiplier,
            } => {
                // Retry counts are small, so the cast cannot wrap in practice.
                #[allow(clippy::cast_possible_wrap)]
                let raw = base.as_secs_f64() * multiplier.powi(attempt as i32);
                Duration::from_secs_f64(raw.min(max.as_secs_f64()))
            }
            Self::Constant { delay } => *delay,
        }
    }
}

impl Default for RetryStrategy {
    /// One second per failed attempt: 1s before the second attempt, 2s
    /// before the third.
    fn default() -> Self {
        Self::Linear {
            delay: Duration::from_secs(1),
            max: Duration::from_secs(30),
        }
    }
}

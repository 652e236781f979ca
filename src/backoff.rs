//! Backoff strategies for the retry loop.
//!
//! Two strategies are supported: a fixed delay and a doubling (exponential) delay. The retry
//! loop asks for the [`initial`](Backoff::initial) delay before the first retry and then
//! [`advance`](Backoff::advance)s it after each retry. An optional cap clamps growth.
//!
//! Example
//! ```rust
//! use std::time::Duration;
//! use lexifetch::Backoff;
//!
//! let backoff = Backoff::exponential(Duration::from_millis(300));
//! let first = backoff.initial();
//! let second = backoff.advance(first);
//! assert_eq!(first, Duration::from_millis(300));
//! assert_eq!(second, Duration::from_millis(600));
//! assert_eq!(backoff.advance(second), Duration::from_millis(1200));
//! ```
//!
//! Overflow behavior: doubling saturates at `MAX_BACKOFF` (1 day) so an uncapped exponential
//! sequence never panics.

use std::fmt;
use std::time::Duration;

/// Maximum delay used when calculations overflow (1 day).
pub const MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors returned by backoff configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffError {
    ConstantDoesNotSupportMax,
    MaxMustBePositive,
    MaxLessThanBase { base: Duration, max: Duration },
}

impl fmt::Display for BackoffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackoffError::ConstantDoesNotSupportMax => {
                write!(f, "a delay cap only applies to exponential backoff")
            }
            BackoffError::MaxMustBePositive => write!(f, "max must be greater than zero"),
            BackoffError::MaxLessThanBase { base, max } => {
                write!(f, "max ({:?}) must be >= base ({:?})", max, base)
            }
        }
    }
}

impl std::error::Error for BackoffError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackoffKind {
    Constant { delay: Duration },
    Exponential { base: Duration, max: Option<Duration> },
}

/// Delay progression between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    kind: BackoffKind,
}

impl Backoff {
    /// Same delay before every retry.
    pub fn constant(delay: Duration) -> Self {
        Self { kind: BackoffKind::Constant { delay } }
    }

    /// Delay doubles after every retry, starting at `base`.
    pub fn exponential(base: Duration) -> Self {
        Self { kind: BackoffKind::Exponential { base, max: None } }
    }

    /// Pick exponential or constant progression from a flag, as the config surface does.
    pub fn from_flag(base: Duration, exponential: bool) -> Self {
        if exponential {
            Self::exponential(base)
        } else {
            Self::constant(base)
        }
    }

    /// Cap the delay of an exponential backoff.
    /// Returns an error if called on `Constant`, if `max` is zero, or if `max < base`.
    pub fn with_max(mut self, max: Duration) -> Result<Self, BackoffError> {
        if max.is_zero() {
            return Err(BackoffError::MaxMustBePositive);
        }
        match &mut self.kind {
            BackoffKind::Exponential { base, max: existing } => {
                if max < *base {
                    return Err(BackoffError::MaxLessThanBase { base: *base, max });
                }
                *existing = Some(max);
                Ok(self)
            }
            BackoffKind::Constant { .. } => Err(BackoffError::ConstantDoesNotSupportMax),
        }
    }

    pub fn is_exponential(&self) -> bool {
        matches!(self.kind, BackoffKind::Exponential { .. })
    }

    pub fn max(&self) -> Option<Duration> {
        match self.kind {
            BackoffKind::Exponential { max, .. } => max,
            BackoffKind::Constant { .. } => None,
        }
    }

    /// Delay before the first retry.
    pub fn initial(&self) -> Duration {
        match self.kind {
            BackoffKind::Constant { delay } => delay,
            BackoffKind::Exponential { base, max } => clamp(base, max),
        }
    }

    /// Delay that follows `current` in the progression.
    pub fn advance(&self, current: Duration) -> Duration {
        match self.kind {
            BackoffKind::Constant { delay } => delay,
            BackoffKind::Exponential { max, .. } => {
                let doubled = current.checked_mul(2).unwrap_or(MAX_BACKOFF);
                clamp(doubled, max)
            }
        }
    }
}

fn clamp(delay: Duration, max: Option<Duration>) -> Duration {
    let capped = max.map(|m| delay.min(m)).unwrap_or(delay);
    capped.min(MAX_BACKOFF)
}

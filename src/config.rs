//! Explicit configuration values for the reconciler and its scheduler.
//!
//! The host builds these from CLI arguments and environment; the core only
//! ever sees the values passed in.

use std::time::Duration;

use crate::error::{Error, Result};

/// Tag applied to vault entries found in a reference catalog
pub const DEFAULT_DUPLICATE_TAG: &str = "duplicate";

/// Fallback when the configured interval is negative or not a number
pub const DEFAULT_INTERVAL_MINUTES: u64 = 60;

pub const DEFAULT_STARTUP_DELAY_SECS: u64 = 10;

/// Longest accepted period between scheduled runs (one year)
pub const MAX_INTERVAL_MINUTES: u64 = 365 * 24 * 60;

/// Longest accepted delay before the startup run (one day)
pub const MAX_STARTUP_DELAY_SECS: u64 = 24 * 60 * 60;

/// Settings injected into [`Reconciler`](crate::run::Reconciler).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    pub duplicate_tag: String,
    /// Plan and report writes without submitting them.
    pub dry_run: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            duplicate_tag: DEFAULT_DUPLICATE_TAG.to_string(),
            dry_run: false,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.duplicate_tag.trim().is_empty() {
            return Err(Error::config("duplicate tag must not be empty"));
        }
        Ok(())
    }
}

/// Parse the run interval in minutes.
/// `0` disables scheduled runs; negative or non-numeric input falls back to the default.
pub fn parse_interval_minutes(raw: &str) -> u64 {
    match raw.trim().parse::<i64>() {
        Ok(minutes) if minutes >= 0 => minutes as u64,
        _ => DEFAULT_INTERVAL_MINUTES,
    }
}

/// When the scheduler should invoke runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule {
    /// Period between runs; None disables periodic runs.
    pub interval: Option<Duration>,
    /// Delay before a one-off run after process start; None skips it.
    pub startup_delay: Option<Duration>,
}

impl Schedule {
    /// Intervals and startup delays beyond the maxima are clamped to them.
    pub fn from_settings(interval_raw: &str, run_on_start: bool, startup_delay_secs: u64) -> Self {
        let minutes = parse_interval_minutes(interval_raw).min(MAX_INTERVAL_MINUTES);
        let delay_secs = startup_delay_secs.min(MAX_STARTUP_DELAY_SECS);
        Self {
            interval: (minutes > 0).then(|| Duration::from_secs(minutes * 60)),
            startup_delay: run_on_start.then(|| Duration::from_secs(delay_secs)),
        }
    }

    /// Nothing would ever run.
    pub fn is_idle(&self) -> bool {
        self.interval.is_none() && self.startup_delay.is_none()
    }
}

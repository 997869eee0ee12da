//! Duration rounding for submitted work-logs.
//!
//! Tracked time is rounded to the nearest multiple of a per-client
//! granularity ("stachursky mode"). Ties round up, and a result of zero is
//! bumped to one full unit so a work-log never reports zero time spent.

use std::fmt;
use std::num::NonZeroU32;

use thiserror::Error;

/// A granularity that is not a positive number of minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("rounding granularity must be a positive number of minutes, got {0}")]
pub struct InvalidGranularity(pub i64);

/// Rounding unit, in whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Granularity(NonZeroU32);

impl Granularity {
    /// One minute, the default when nothing else is configured.
    pub const ONE_MINUTE: Self = Self(NonZeroU32::MIN);

    /// Creates a granularity from a minute count read from configuration.
    pub fn from_minutes(minutes: i64) -> Result<Self, InvalidGranularity> {
        u32::try_from(minutes)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or(InvalidGranularity(minutes))
    }

    pub const fn minutes(self) -> u32 {
        self.0.get()
    }

    pub fn seconds(self) -> u64 {
        u64::from(self.0.get()) * 60
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.minutes())
    }
}

/// Rounds elapsed seconds to the nearest multiple of `granularity`.
///
/// Half a unit rounds up. Anything that would round to zero is reported as
/// one full unit instead.
pub fn round_duration(elapsed_secs: u64, granularity: Granularity) -> u64 {
    let unit = granularity.seconds();
    let rounded = elapsed_secs.saturating_add(unit / 2) / unit * unit;
    if rounded == 0 { unit } else { rounded }
}

/// Renders a second count as `1h 05m 10s`, omitting leading zero parts.
pub fn humanize_seconds(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 || (hours > 0 && seconds > 0) {
        if parts.is_empty() {
            parts.push(format!("{minutes}m"));
        } else {
            parts.push(format!("{minutes:02}m"));
        }
    }
    if seconds > 0 || parts.is_empty() {
        if parts.is_empty() {
            parts.push(format!("{seconds}s"));
        } else {
            parts.push(format!("{seconds:02}s"));
        }
    }
    parts.join(" ")
}

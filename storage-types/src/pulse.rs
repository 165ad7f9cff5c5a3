// SPDX-License-Identifier: GPL-3.0-only

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Monotonic timestamp attached to every broadcast pulse (milliseconds)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PulseTimestamp(pub u64);

impl PulseTimestamp {
    pub const ZERO: Self = Self(0);

    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Wall-clock reading, when the backend stamps pulses with epoch millis
    pub fn as_datetime(self) -> Option<DateTime<Utc>> {
        i64::try_from(self.0)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
    }

    /// Strictly-newer comparison used for pulse acceptance and latch release
    pub fn is_newer_than(self, other: PulseTimestamp) -> bool {
        self.0 > other.0
    }
}

impl std::fmt::Display for PulseTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A value delivered on one key of the broadcast feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pulse<T> {
    pub timestamp: PulseTimestamp,
    pub data: T,
}

impl<T> Pulse<T> {
    pub fn new(timestamp: u64, data: T) -> Self {
        Self {
            timestamp: PulseTimestamp(timestamp),
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_is_strict() {
        let a = PulseTimestamp(10);
        assert!(!a.is_newer_than(PulseTimestamp(10)));
        assert!(PulseTimestamp(11).is_newer_than(a));
        assert!(!PulseTimestamp(9).is_newer_than(a));
    }

    #[test]
    fn epoch_millis_convert_to_datetime() {
        let ts = PulseTimestamp(1_700_000_000_000);
        assert_eq!(ts.as_datetime().unwrap().timestamp(), 1_700_000_000);
    }
}

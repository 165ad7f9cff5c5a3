// SPDX-License-Identifier: GPL-3.0-only

//! Pending-confirmation latch
//!
//! A lifecycle-changing success sets the latch and records the last pulse
//! seen. The latch only releases on a pulse with a strictly newer timestamp,
//! so the next snapshot reflects the change before anything else is issued.

use storage_types::PulseTimestamp;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PendingConfirmation {
    #[default]
    Idle,
    AwaitingPulse {
        since: PulseTimestamp,
    },
}

impl PendingConfirmation {
    /// Returns false if the latch was already set; the original mark is kept
    pub fn arm(&mut self, since: PulseTimestamp) -> bool {
        match self {
            Self::Idle => {
                *self = Self::AwaitingPulse { since };
                true
            }
            Self::AwaitingPulse { .. } => false,
        }
    }

    /// Feed a pulse timestamp; returns true if this released the latch
    pub fn observe(&mut self, pulse: PulseTimestamp) -> bool {
        match *self {
            Self::AwaitingPulse { since } if pulse.is_newer_than(since) => {
                *self = Self::Idle;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::AwaitingPulse { .. })
    }

    pub fn since(&self) -> Option<PulseTimestamp> {
        match self {
            Self::Idle => None,
            Self::AwaitingPulse { since } => Some(*since),
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Simulated time in whole nanoseconds since the start of the run.
///
/// Integer ticks keep ordering and arithmetic exact, so two runs with the same
/// inputs land on identical timestamps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);
    pub const MAX: SimTime = SimTime(u64::MAX);

    pub const fn from_nanos(ns: u64) -> Self {
        Self(ns)
    }

    pub const fn from_micros(us: u64) -> Self {
        Self(us.saturating_mul(1_000))
    }

    pub const fn from_millis(ms: u64) -> Self {
        Self(ms.saturating_mul(1_000_000))
    }

    pub const fn from_secs(s: u64) -> Self {
        Self(s.saturating_mul(NANOS_PER_SEC))
    }

    /// Rounds to the nearest nanosecond. Negative and NaN inputs clamp to zero.
    pub fn from_secs_f64(s: f64) -> Self {
        if s.is_nan() || s <= 0.0 {
            return Self::ZERO;
        }
        Self((s * NANOS_PER_SEC as f64).round() as u64)
    }

    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    pub fn saturating_add(self, rhs: SimTime) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    pub fn saturating_sub(self, rhs: SimTime) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    pub fn checked_add(self, rhs: SimTime) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        self.saturating_add(rhs)
    }
}

impl AddAssign for SimTime {
    fn add_assign(&mut self, rhs: SimTime) {
        *self = *self + rhs;
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        self.saturating_sub(rhs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}s", self.0 / NANOS_PER_SEC, self.0 % NANOS_PER_SEC)
    }
}

/// Serialization delay of `bytes` on a `bandwidth_bps` link.
///
/// Rounded up to the next nanosecond and never shorter than one tick, so a
/// saturating sender always makes progress.
pub fn transmission_time(bytes: u32, bandwidth_bps: u64) -> SimTime {
    debug_assert!(bandwidth_bps > 0);
    let bits = u128::from(bytes) * 8 * u128::from(NANOS_PER_SEC);
    let bps = u128::from(bandwidth_bps.max(1));
    let ns = bits.div_ceil(bps).max(1);
    SimTime(u64::try_from(ns).unwrap_or(u64::MAX))
}

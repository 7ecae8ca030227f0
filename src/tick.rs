use std::{
    fmt::{self, Display},
    num::ParseIntError,
    ops::{Add, AddAssign, Div, Mul, Sub, SubAssign},
    str::FromStr,
};

use datasize::DataSize;
use derive_more::From;
use serde::{Deserialize, Serialize};

/// An integer time coordinate, counted in the configured protocol unit since
/// the Unix epoch. All time arithmetic inside the runtime happens in ticks;
/// wall-clock values appear only at the [`crate::HighwayConf`] boundary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, DataSize,
)]
pub struct Tick(i64);

/// A difference between two ticks.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    From,
    Serialize,
    Deserialize,
    DataSize,
)]
pub struct TickDiff(i64);

impl Tick {
    /// Returns the tick with the given value.
    pub const fn new(value: i64) -> Self {
        Tick(value)
    }

    /// Returns the zero tick, i.e. the epoch itself.
    pub const fn zero() -> Self {
        Tick(0)
    }

    /// Returns the number of units since the epoch.
    pub fn value(self) -> i64 {
        self.0
    }

    /// Returns the maximum of `self` and `other`.
    pub fn max(self, other: Tick) -> Tick {
        Tick(self.0.max(other.0))
    }
}

impl TickDiff {
    /// Returns the difference with the given value.
    pub const fn new(value: i64) -> Self {
        TickDiff(value)
    }

    /// Returns the number of units.
    pub fn value(self) -> i64 {
        self.0
    }
}

impl Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for TickDiff {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Tick {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        i64::from_str(s).map(Tick)
    }
}

impl Sub<Tick> for Tick {
    type Output = TickDiff;

    fn sub(self, other: Tick) -> TickDiff {
        TickDiff(self.0 - other.0)
    }
}

impl Add<TickDiff> for Tick {
    type Output = Tick;

    fn add(self, diff: TickDiff) -> Tick {
        Tick(self.0 + diff.0)
    }
}

impl Sub<TickDiff> for Tick {
    type Output = Tick;

    fn sub(self, diff: TickDiff) -> Tick {
        Tick(self.0 - diff.0)
    }
}

impl Add<TickDiff> for TickDiff {
    type Output = TickDiff;

    fn add(self, rhs: TickDiff) -> TickDiff {
        TickDiff(self.0 + rhs.0)
    }
}

impl AddAssign<TickDiff> for TickDiff {
    fn add_assign(&mut self, rhs: TickDiff) {
        self.0 += rhs.0;
    }
}

impl Sub<TickDiff> for TickDiff {
    type Output = TickDiff;

    fn sub(self, rhs: TickDiff) -> TickDiff {
        TickDiff(self.0 - rhs.0)
    }
}

impl SubAssign<TickDiff> for TickDiff {
    fn sub_assign(&mut self, rhs: TickDiff) {
        self.0 -= rhs.0;
    }
}

impl Mul<i64> for TickDiff {
    type Output = TickDiff;

    fn mul(self, rhs: i64) -> TickDiff {
        TickDiff(self.0 * rhs)
    }
}

impl Div<i64> for TickDiff {
    type Output = TickDiff;

    fn div(self, rhs: i64) -> TickDiff {
        TickDiff(self.0 / rhs)
    }
}

#[cfg(test)]
impl From<i64> for Tick {
    fn from(value: i64) -> Tick {
        Tick(value)
    }
}

/// Returns the round length, given the round exponent.
pub fn round_length(round_exp: u8) -> TickDiff {
    debug_assert!(round_exp < 63, "round exponent out of range");
    TickDiff(1 << round_exp)
}

/// Returns the id of the round containing `at`, on the lattice
/// `base + k * 2^round_exp`: the greatest lattice tick less or equal to `at`.
pub fn round_id(base: Tick, round_exp: u8, at: Tick) -> Tick {
    let len = 1i64 << round_exp;
    Tick(base.0 + (at.0 - base.0).div_euclid(len) * len)
}

/// Returns the smallest lattice tick `base + k * 2^round_exp` that is strictly
/// greater than `after`.
pub fn next_round(base: Tick, round_exp: u8, after: Tick) -> Tick {
    let len = 1i64 << round_exp;
    Tick(base.0 + ((after.0 - base.0).div_euclid(len) + 1) * len)
}

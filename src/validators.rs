use std::{
    fmt::{self, Debug, Display},
    iter::Sum,
};

use datasize::DataSize;
use derive_more::{Add, AddAssign, From, Sub, SubAssign};
use hex_fmt::HexFmt;
use serde::{Deserialize, Serialize};

/// Identifies a bonded validator. The derived ordering over the raw bytes is
/// the canonical order in which stakes are enumerated, so that all nodes agree
/// on cumulative stake intervals.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, DataSize,
)]
pub struct ValidatorId([u8; ValidatorId::LENGTH]);

impl ValidatorId {
    /// The number of bytes in a validator id.
    pub const LENGTH: usize = 32;

    /// Returns the validator id with the given bytes.
    pub const fn new(bytes: [u8; ValidatorId::LENGTH]) -> Self {
        ValidatorId(bytes)
    }

    /// Returns the raw bytes of the id.
    pub fn as_bytes(&self) -> &[u8; ValidatorId::LENGTH] {
        &self.0
    }
}

impl Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:10}", HexFmt(&self.0))
    }
}

impl Debug for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ValidatorId({:10})", HexFmt(&self.0))
    }
}

/// A validator's voting weight.
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
    Add,
    AddAssign,
    Sub,
    SubAssign,
    From,
    Serialize,
    Deserialize,
    DataSize,
)]
pub struct Weight(pub u64);

impl Weight {
    /// Checked addition; `None` if the sum would overflow.
    pub fn checked_add(self, rhs: Weight) -> Option<Weight> {
        self.0.checked_add(rhs.0).map(Weight)
    }

    /// Returns whether the weight is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl Display for Weight {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Sum for Weight {
    fn sum<I: Iterator<Item = Weight>>(iter: I) -> Weight {
        iter.fold(Weight(0), |sum, w| Weight(sum.0 + w.0))
    }
}

//! The ability monoid: the opaque score type members contribute to blocks.
//!
//! The engine never looks inside an ability value. It only needs a
//! commutative addition with a zero, a total order for tie-breaking,
//! a scalar projection for the forced-merge inequality, and a validity
//! predicate for input checking. Anything satisfying [`Ability`] works.

use std::ops::Add;

/// Requirements on the per-member score type.
///
/// Addition must be commutative and associative with [`Ability::zero`] as
/// identity; the engine accumulates sums in merge order and compares them
/// with the `Ord` impl.
pub trait Ability: Copy + Ord + Add<Output = Self> {
    /// The identity element of the monoid.
    fn zero() -> Self;

    /// Scalar projection used in the forced-merge strength comparison.
    fn effective(&self) -> i64;

    /// Whether this value is acceptable as input to `add_member`.
    fn is_valid(&self) -> bool;
}

/// The shipped scalar ability: a plain non-negative strength value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Power(pub i64);

impl Add for Power {
    type Output = Power;

    fn add(self, other: Power) -> Power {
        Power(self.0 + other.0)
    }
}

impl Ability for Power {
    fn zero() -> Power {
        Power(0)
    }

    fn effective(&self) -> i64 {
        self.0
    }

    fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

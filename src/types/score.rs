use std::fmt;
use std::iter::Sum;
use std::ops::Add;

/// An additive risk contribution.
///
/// Scores form a commutative monoid: [`Score::zero()`] is the identity and
/// [`Score::add()`] is associative and commutative, so a batch total is the
/// same no matter in which order rule results arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[must_use]
pub struct Score(i64);

impl Score {
    /// The identity element.
    pub const fn zero() -> Self {
        Score(0)
    }

    pub const fn of(value: i64) -> Self {
        Score(value)
    }

    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    pub const fn add(self, other: Score) -> Score {
        Score(self.0 + other.0)
    }
}

impl Add for Score {
    type Output = Score;

    fn add(self, other: Score) -> Score {
        Score::add(self, other)
    }
}

impl Sum for Score {
    fn sum<I: Iterator<Item = Score>>(iter: I) -> Score {
        iter.fold(Score::zero(), Score::add)
    }
}

impl From<i64> for Score {
    fn from(value: i64) -> Self {
        Score(value)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

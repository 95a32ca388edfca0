//! `IntervalSpace` definition
use super::Space;
use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A closed interval of floating-point numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntervalSpace<T = f64> {
    pub low: T,
    pub high: T,
}

impl<T: PartialOrd> IntervalSpace<T> {
    /// Returns `None` unless `low <= high`.
    pub fn new(low: T, high: T) -> Option<Self> {
        if low <= high {
            Some(Self { low, high })
        } else {
            None
        }
    }
}

impl<T: Float> IntervalSpace<T> {
    /// Nearest point of the interval. NaN is mapped to `low`.
    pub fn clamp(&self, value: T) -> T {
        if value.is_nan() || value < self.low {
            self.low
        } else if value > self.high {
            self.high
        } else {
            value
        }
    }
}

/// The default interval is the full real number line.
impl<T: Float> Default for IntervalSpace<T> {
    fn default() -> Self {
        Self {
            low: T::neg_infinity(),
            high: T::infinity(),
        }
    }
}

impl<T: fmt::Display> fmt::Display for IntervalSpace<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "IntervalSpace({}, {})", self.low, self.high)
    }
}

impl<T: Float + fmt::Debug> Space for IntervalSpace<T> {
    type Element = T;

    fn contains(&self, value: &T) -> bool {
        &self.low <= value && value <= &self.high && value.is_finite()
    }
}

/// Ordered by inclusion.
impl<T: PartialOrd> PartialOrd for IntervalSpace<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.low == other.low && self.high == other.high {
            Some(Ordering::Equal)
        } else if self.low >= other.low && self.high <= other.high {
            Some(Ordering::Less)
        } else if self.low <= other.low && self.high >= other.high {
            Some(Ordering::Greater)
        } else {
            None
        }
    }
}

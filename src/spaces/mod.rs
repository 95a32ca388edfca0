//! Observation and action spaces
mod interval;
mod product;

pub use interval::IntervalSpace;
pub use product::BoxSpace;

use std::fmt::Debug;

/// A mathematical space
pub trait Space: Debug {
    type Element: ?Sized;

    /// Check if the space contains a particular value
    fn contains(&self, value: &Self::Element) -> bool;
}

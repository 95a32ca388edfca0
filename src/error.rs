//! Error types
use crate::buffers::StoreError;
use crate::checkpoint::CheckpointError;
use crate::simulation::{LearnerError, ProducerError};
use thiserror::Error;

/// Invalid configuration, detected before any thread starts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} must be nonzero")]
    Zero { name: &'static str },
    #[error("{name} must lie in (0, 1], got {value}")]
    InvalidRate { name: &'static str, value: f64 },
    #[error("{name} must lie in [0, 1], got {value}")]
    OutsideUnitInterval { name: &'static str, value: f64 },
    #[error("{name} must be finite and non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("{what} dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("invalid action bounds for dimension {dim}")]
    ActionBounds { dim: usize },
}

impl ConfigError {
    /// Check that `value` is nonzero.
    pub fn check_nonzero<T: Default + PartialEq>(
        name: &'static str,
        value: T,
    ) -> Result<(), Self> {
        if value == T::default() {
            Err(Self::Zero { name })
        } else {
            Ok(())
        }
    }

    /// Check that `value` lies in `(0, 1]`.
    pub fn check_rate(name: &'static str, value: f64) -> Result<(), Self> {
        if value > 0.0 && value <= 1.0 {
            Ok(())
        } else {
            Err(Self::InvalidRate { name, value })
        }
    }

    /// Check that `value` lies in `[0, 1]`.
    pub fn check_unit_interval(name: &'static str, value: f64) -> Result<(), Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(())
        } else {
            Err(Self::OutsideUnitInterval { name, value })
        }
    }

    /// Check that `value` is finite and `>= 0`.
    pub fn check_non_negative(name: &'static str, value: f64) -> Result<(), Self> {
        if value.is_finite() && value >= 0.0 {
            Ok(())
        } else {
            Err(Self::Negative { name, value })
        }
    }

    pub fn check_dim(what: &'static str, expected: usize, actual: usize) -> Result<(), Self> {
        if expected == actual {
            Ok(())
        } else {
            Err(Self::DimensionMismatch {
                what,
                expected,
                actual,
            })
        }
    }
}

/// Error from a training run.
#[derive(Error, Debug)]
pub enum TrainError {
    #[error("invalid configuration")]
    Config(#[from] ConfigError),
    #[error("transition store error")]
    Store(#[from] StoreError),
    #[error("producer failed")]
    Producer(#[from] ProducerError),
    #[error("learner failed")]
    Learner(#[from] LearnerError),
    #[error("checkpoint error")]
    Checkpoint(#[from] CheckpointError),
    #[error("{0} thread panicked")]
    Panic(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0.01, true)]
    #[case(1.0, true)]
    #[case(0.0, false)]
    #[case(1.5, false)]
    #[case(f64::NAN, false)]
    fn rate_check(#[case] value: f64, #[case] ok: bool) {
        assert_eq!(ConfigError::check_rate("tau", value).is_ok(), ok);
    }

    #[rstest]
    #[case(0.0, true)]
    #[case(0.9, true)]
    #[case(1.0, true)]
    #[case(-0.1, false)]
    #[case(1.01, false)]
    #[case(f64::NAN, false)]
    fn unit_interval_check(#[case] value: f64, #[case] ok: bool) {
        assert_eq!(ConfigError::check_unit_interval("gamma", value).is_ok(), ok);
    }

    #[test]
    fn unit_interval_message_includes_zero() {
        let err = ConfigError::check_unit_interval("gamma", 1.5).unwrap_err();
        assert_eq!(err.to_string(), "gamma must lie in [0, 1], got 1.5");
    }

    #[test]
    fn nonzero_check() {
        assert_eq!(
            ConfigError::check_nonzero("capacity", 0usize),
            Err(ConfigError::Zero { name: "capacity" })
        );
        assert!(ConfigError::check_nonzero("capacity", 4usize).is_ok());
    }
}

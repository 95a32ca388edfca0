//! Exponential smoothing of target parameters toward online parameters.
//!
//! Each smoothing step sets `target ← (1 - rate) · target + rate · online`.
//! With fixed online parameters the distance to the target shrinks by `(1 - rate)` per step.
use crate::error::ConfigError;
use ndarray::Array1;
use thiserror::Error;

/// A set of parameters that can be copied and smoothed toward another set of the same
/// structure.
pub trait ParameterSet {
    /// Overwrite these parameters with `source`.
    fn copy_from(&mut self, source: &Self) -> Result<(), SmoothingError>;

    /// Move these parameters toward `online` by a fraction `rate`.
    fn smooth_toward(&mut self, online: &Self, rate: f64) -> Result<(), SmoothingError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmoothingError {
    #[error("target has no parameter named {0:?}")]
    MissingParameter(String),
    #[error("parameter shape mismatch: online {online:?} target {target:?}")]
    ShapeMismatch { online: Vec<i64>, target: Vec<i64> },
}

/// Online parameters paired with a smoothed (target) copy.
#[derive(Debug, Clone, PartialEq)]
pub struct Smoothed<P> {
    online: P,
    target: P,
    rate: f64,
}

impl<P: ParameterSet + Clone> Smoothed<P> {
    /// Pair `online` with a target initialized to a copy of it.
    pub fn new(online: P, rate: f64) -> Result<Self, ConfigError> {
        ConfigError::check_rate("smoothing rate", rate)?;
        let target = online.clone();
        Ok(Self {
            online,
            target,
            rate,
        })
    }
}

impl<P: ParameterSet> Smoothed<P> {
    /// Pair `online` with a separately constructed target of the same structure.
    ///
    /// The target is overwritten with a copy of the online parameters.
    pub fn from_pair(online: P, mut target: P, rate: f64) -> Result<Self, SmoothedPairError> {
        ConfigError::check_rate("smoothing rate", rate)?;
        target.copy_from(&online)?;
        Ok(Self {
            online,
            target,
            rate,
        })
    }

    /// Move the target one step toward the online parameters.
    pub fn smooth(&mut self) -> Result<(), SmoothingError> {
        self.target.smooth_toward(&self.online, self.rate)
    }

    pub const fn rate(&self) -> f64 {
        self.rate
    }

    pub const fn online(&self) -> &P {
        &self.online
    }

    pub fn online_mut(&mut self) -> &mut P {
        &mut self.online
    }

    pub const fn target(&self) -> &P {
        &self.target
    }

    /// Mutable access to both sets, `(online, target)`.
    pub fn pair_mut(&mut self) -> (&mut P, &mut P) {
        (&mut self.online, &mut self.target)
    }
}

/// Error constructing a [`Smoothed`] pair.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SmoothedPairError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Smoothing(#[from] SmoothingError),
}

impl ParameterSet for Array1<f64> {
    fn copy_from(&mut self, source: &Self) -> Result<(), SmoothingError> {
        check_len(source, self)?;
        self.assign(source);
        Ok(())
    }

    fn smooth_toward(&mut self, online: &Self, rate: f64) -> Result<(), SmoothingError> {
        check_len(online, self)?;
        self.zip_mut_with(online, |t, &o| *t = rate.mul_add(o - *t, *t));
        Ok(())
    }
}

#[allow(clippy::cast_possible_wrap)]
fn check_len(online: &Array1<f64>, target: &Array1<f64>) -> Result<(), SmoothingError> {
    if online.len() == target.len() {
        Ok(())
    } else {
        Err(SmoothingError::ShapeMismatch {
            online: vec![online.len() as i64],
            target: vec![target.len() as i64],
        })
    }
}

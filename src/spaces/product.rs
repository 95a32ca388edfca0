use super::{IntervalSpace, Space};
use serde::{Deserialize, Serialize};

/// Cartesian product of per-dimension intervals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxSpace {
    pub dims: Vec<IntervalSpace<f32>>,
}

impl BoxSpace {
    /// Every dimension shares the same interval.
    pub fn uniform(interval: IntervalSpace<f32>, num_dims: usize) -> Self {
        Self {
            dims: vec![interval; num_dims],
        }
    }

    pub fn num_dims(&self) -> usize {
        self.dims.len()
    }

    /// Clamp each coordinate into its interval in place.
    ///
    /// Coordinates beyond the number of dimensions are left unchanged.
    pub fn clamp_in_place(&self, values: &mut [f32]) {
        for (value, interval) in values.iter_mut().zip(&self.dims) {
            *value = interval.clamp(*value);
        }
    }
}

impl Space for BoxSpace {
    type Element = [f32];

    fn contains(&self, value: &[f32]) -> bool {
        value.len() == self.dims.len()
            && value.iter().zip(&self.dims).all(|(v, i)| i.contains(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_each_dim() {
        let space = BoxSpace {
            dims: vec![
                IntervalSpace::new(-1.0, 1.0).unwrap(),
                IntervalSpace::new(0.0, 10.0).unwrap(),
            ],
        };
        let mut values = [3.0, -4.0];
        space.clamp_in_place(&mut values);
        assert_eq!(values, [1.0, 0.0]);
        assert!(space.contains(&values));
        assert!(!space.contains(&[0.0]));
    }
}

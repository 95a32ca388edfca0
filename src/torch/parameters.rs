//! Smoothing of torch variable stores
use crate::smoothing::{ParameterSet, SmoothingError};
use tch::nn::VarStore;

/// Variables are matched by name.
/// Both stores must hold exactly the same names with the same shapes.
impl ParameterSet for VarStore {
    fn copy_from(&mut self, source: &Self) -> Result<(), SmoothingError> {
        self.smooth_toward(source, 1.0)
    }

    fn smooth_toward(&mut self, online: &Self, rate: f64) -> Result<(), SmoothingError> {
        let online_vars = online.variables();
        let target_vars = self.variables();
        if let Some(name) = online_vars.keys().find(|name| !target_vars.contains_key(*name)) {
            return Err(SmoothingError::MissingParameter(name.clone()));
        }

        let _no_grad = tch::no_grad_guard();
        for (name, mut target) in target_vars {
            let source = online_vars
                .get(&name)
                .ok_or_else(|| SmoothingError::MissingParameter(name.clone()))?;
            if source.size() != target.size() {
                return Err(SmoothingError::ShapeMismatch {
                    online: source.size(),
                    target: target.size(),
                });
            }
            if rate >= 1.0 {
                target.copy_(source);
            } else {
                let smoothed = source * rate + &target * (1.0 - rate);
                target.copy_(&smoothed);
            }
        }
        Ok(())
    }
}

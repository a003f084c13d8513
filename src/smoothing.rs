// src/smoothing.rs - Exponential moving average over feature vectors
use crate::error::{MonitorError, Result};

pub const DEFAULT_SMOOTHING_ALPHA: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct FeatureSmoother {
    alpha: f64,
    state: Option<Vec<f64>>,
}

impl FeatureSmoother {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(0.0, 1.0),
            state: None,
        }
    }

    /// Blends `raw` into the running average and returns the smoothed vector.
    /// The first observation initializes the average as-is.
    pub fn update(&mut self, raw: &[f64]) -> Result<&[f64]> {
        let alpha = self.alpha;

        match self.state.as_mut() {
            None => {
                self.state = Some(raw.to_vec());
            }
            Some(smoothed) => {
                if smoothed.len() != raw.len() {
                    return Err(MonitorError::DimensionMismatch {
                        expected: smoothed.len(),
                        found: raw.len(),
                    });
                }
                for (s, r) in smoothed.iter_mut().zip(raw) {
                    *s = *s * (1.0 - alpha) + r * alpha;
                }
            }
        }

        Ok(self.state.as_deref().unwrap_or_default())
    }

    pub fn current(&self) -> Option<&[f64]> {
        self.state.as_deref()
    }

    /// Drops the running average; the next `update` starts fresh.
    pub fn reset(&mut self) {
        self.state = None;
    }

    pub fn is_initialized(&self) -> bool {
        self.state.is_some()
    }
}

impl Default for FeatureSmoother {
    fn default() -> Self {
        Self::new(DEFAULT_SMOOTHING_ALPHA)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_update_initializes_to_raw() {
        let mut smoother = FeatureSmoother::default();
        assert!(smoother.current().is_none());
        let out = smoother.update(&[1.0, 2.0, 3.0, 4.0]).unwrap().to_vec();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn blends_with_alpha() {
        let mut smoother = FeatureSmoother::new(0.3);
        smoother.update(&[0.0, 10.0]).unwrap();
        let out = smoother.update(&[10.0, 0.0]).unwrap().to_vec();
        assert!((out[0] - 3.0).abs() < 1e-12);
        assert!((out[1] - 7.0).abs() < 1e-12);
    }

    #[test]
    fn dimension_change_is_an_error_until_reset() {
        let mut smoother = FeatureSmoother::default();
        smoother.update(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert!(matches!(
            smoother.update(&[1.0, 2.0]),
            Err(MonitorError::DimensionMismatch { expected: 4, found: 2 })
        ));

        smoother.reset();
        assert!(!smoother.is_initialized());
        assert_eq!(smoother.update(&[1.0, 2.0]).unwrap(), &[1.0, 2.0]);
    }
}

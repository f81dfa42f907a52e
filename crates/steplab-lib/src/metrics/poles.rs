use crate::metrics::transient::TransientMetrics;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Closed-loop pole pair of the canonical second-order system
/// `s² + 2ζω_n s + ω_n²`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolePair {
    /// Pole with the non-negative imaginary part.
    pub upper: Complex64,
    pub lower: Complex64,
}

impl PolePair {
    /// `real = -ζω_n`, `imag = ω_n√(1-ζ²)` for `ζ < 1` and `0` otherwise.
    /// `NaN` inputs propagate into the parts.
    pub fn new(natural_frequency: f64, damping_ratio: f64) -> Self {
        let real = -damping_ratio * natural_frequency;
        let imag = if damping_ratio < 1.0 {
            natural_frequency * (1.0 - damping_ratio * damping_ratio).sqrt()
        } else {
            0.0
        };
        Self {
            upper: Complex64::new(real, imag),
            lower: Complex64::new(real, -imag),
        }
    }

    /// Poles for a metrics record, or `None` when either `ω_n` or `ζ` is
    /// undefined.
    pub fn from_metrics(metrics: &TransientMetrics) -> Option<Self> {
        let (wn, zeta) = (metrics.natural_frequency, metrics.damping_ratio);
        if wn.is_nan() || zeta.is_nan() {
            return None;
        }
        Some(Self::new(wn, zeta))
    }

    /// `|p|`, which equals `ω_n` in the underdamped case.
    pub fn natural_frequency(&self) -> f64 {
        self.upper.norm()
    }

    /// `-Re(p) / |p|`, which equals `ζ` in the underdamped case.
    pub fn damping_ratio(&self) -> f64 {
        -self.upper.re / self.upper.norm()
    }

    pub fn as_array(&self) -> [Complex64; 2] {
        [self.upper, self.lower]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn underdamped_pair_is_conjugate() {
        let pair = PolePair::new(5.0, 0.6);
        assert_relative_eq!(pair.upper.re, -3.0, epsilon = 1e-12);
        assert_relative_eq!(pair.upper.im, 4.0, epsilon = 1e-12);
        assert_eq!(pair.lower, pair.upper.conj());
    }

    #[test]
    fn round_trip_recovers_inputs() {
        for &(wn, zeta) in &[(1.0, 0.0), (3.7, 0.15), (12.0, 0.5), (0.4, 0.93)] {
            let pair = PolePair::new(wn, zeta);
            assert_relative_eq!(pair.natural_frequency(), wn, max_relative = 1e-12);
            assert_relative_eq!(pair.damping_ratio(), zeta, epsilon = 1e-12);
            assert!(pair.upper.re <= 0.0);
            assert_eq!(pair.upper.re, pair.lower.re);
            assert_eq!(pair.upper.im, -pair.lower.im);
        }
    }

    #[test]
    fn overdamped_pair_sits_on_real_axis() {
        let pair = PolePair::new(2.0, 1.5);
        assert_eq!(pair.upper, Complex64::new(-3.0, 0.0));
        assert_eq!(pair.lower.im, 0.0);
    }

    #[test]
    fn nan_inputs_propagate() {
        let pair = PolePair::new(f64::NAN, 0.2);
        assert!(pair.upper.re.is_nan());
        assert!(pair.upper.im.is_nan());
    }

    #[test]
    fn undefined_metrics_give_no_poles() {
        let mut metrics = TransientMetrics::undefined();
        assert!(PolePair::from_metrics(&metrics).is_none());
        metrics.natural_frequency = 4.0;
        assert!(PolePair::from_metrics(&metrics).is_none());
        metrics.damping_ratio = 0.2;
        let pair = PolePair::from_metrics(&metrics).unwrap();
        assert_relative_eq!(pair.upper.re, -0.8, epsilon = 1e-12);
    }
}

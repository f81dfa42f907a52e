use crate::signal::SampleSeries;
use anyhow::{bail, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Synthetic step response of `gain * ω_n² / (s² + 2ζω_n s + ω_n²)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecondOrderSpec {
    /// Undamped natural frequency (rad/s).
    pub natural_frequency: f64,
    pub damping_ratio: f64,
    /// Final value of the response.
    pub gain: f64,
    /// Sample spacing (seconds).
    pub dt: f64,
    /// Last sample time (seconds).
    pub duration: f64,
    /// Half-width of uniform measurement noise; zero disables it.
    pub noise: f64,
    pub seed: u64,
}

impl Default for SecondOrderSpec {
    fn default() -> Self {
        Self {
            natural_frequency: 1.0,
            damping_ratio: 0.5,
            gain: 1.0,
            dt: 0.01,
            duration: 10.0,
            noise: 0.0,
            seed: 0,
        }
    }
}

/// Sample the step response on `t = 0, dt, 2dt, ..` up to `duration`.
pub fn second_order_step(spec: &SecondOrderSpec) -> Result<SampleSeries> {
    let SecondOrderSpec {
        natural_frequency: wn,
        damping_ratio: zeta,
        gain,
        dt,
        duration,
        noise,
        seed,
    } = *spec;
    if !(wn > 0.0) {
        bail!("natural frequency must be positive, got {}", wn);
    }
    if !(zeta >= 0.0) {
        bail!("damping ratio must be non-negative, got {}", zeta);
    }
    if !(dt > 0.0) || !(duration >= 0.0) {
        bail!("need dt > 0 and duration >= 0 (dt={}, duration={})", dt, duration);
    }

    let n = (duration / dt + 1e-9).floor() as usize + 1;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut time = Vec::with_capacity(n);
    let mut value = Vec::with_capacity(n);
    for i in 0..n {
        let t = i as f64 * dt;
        let mut y = gain * unit_step_response(wn, zeta, t);
        if noise > 0.0 {
            y += rng.gen_range(-noise..=noise);
        }
        time.push(t);
        value.push(y);
    }
    Ok(SampleSeries::new(time, value)?)
}

fn unit_step_response(wn: f64, zeta: f64, t: f64) -> f64 {
    if zeta < 1.0 {
        let root = (1.0 - zeta * zeta).sqrt();
        let wd = wn * root;
        1.0 - (-zeta * wn * t).exp() * ((wd * t).cos() + zeta / root * (wd * t).sin())
    } else if zeta == 1.0 {
        1.0 - (-wn * t).exp() * (1.0 + wn * t)
    } else {
        let root = (zeta * zeta - 1.0).sqrt();
        let s1 = -wn * (zeta - root);
        let s2 = -wn * (zeta + root);
        1.0 + (s2 * (s1 * t).exp() - s1 * (s2 * t).exp()) / (s1 - s2)
    }
}

use crate::{
    detectors::peaks::{find_peaks, PeakPolicy},
    error::{TransientError, TransientResult},
    signal::{Peak, SampleSeries},
};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use std::f64::consts::PI;

/// How the time of a threshold crossing is read off the series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThresholdPolicy {
    /// Time of the first sample whose value is at or above the target.
    #[default]
    Sample,
    /// Linear interpolation inside the first segment that crosses the target
    /// from below. Prefer `Sample` for strongly oscillatory signals.
    Interpolate,
}

/// Which entry into the settling band counts as "settled".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SettlingPolicy {
    /// First time after which every sample stays inside the band.
    #[default]
    Permanent,
    /// First sample inside the band, even if the signal leaves it later.
    FirstEntry,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DampingMethod {
    /// Closed form from percent overshoot.
    #[default]
    Overshoot,
    /// Logarithmic decrement of the first two detected peaks.
    LogDecrement,
}

kebab_names!(ThresholdPolicy { Sample => "sample", Interpolate => "interpolate" });
kebab_names!(SettlingPolicy { Permanent => "permanent", FirstEntry => "first-entry" });
kebab_names!(DampingMethod { Overshoot => "overshoot", LogDecrement => "log-decrement" });

/// Method selection for [`analyze`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransientConfig {
    /// Share of trailing samples averaged for the steady-state value.
    pub tail_fraction: f64,
    /// Lower rise-time fraction of steady-state.
    pub rise_low: f64,
    /// Upper rise-time fraction of steady-state.
    pub rise_high: f64,
    pub threshold_policy: ThresholdPolicy,
    /// Half-width of the settling band as a fraction of steady-state.
    pub settling_tolerance: f64,
    pub settling_policy: SettlingPolicy,
    pub damping_method: DampingMethod,
    pub peak_policy: PeakPolicy,
}

impl Default for TransientConfig {
    fn default() -> Self {
        Self {
            tail_fraction: 0.1,
            rise_low: 0.1,
            rise_high: 0.9,
            threshold_policy: ThresholdPolicy::Sample,
            settling_tolerance: 0.02,
            settling_policy: SettlingPolicy::Permanent,
            damping_method: DampingMethod::Overshoot,
            peak_policy: PeakPolicy::Strict,
        }
    }
}

/// Transient characteristics of one series. Any field may be `NaN` when the
/// quantity is undefined for the input; `NaN` serializes as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransientMetrics {
    #[serde(deserialize_with = "nan_from_null")]
    pub rise_time: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub rise_time_start: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub rise_time_end: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub threshold_low: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub threshold_high: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub settling_time: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub overshoot_pct: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub steady_state: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub natural_frequency: f64,
    #[serde(deserialize_with = "nan_from_null")]
    pub damping_ratio: f64,
}

impl TransientMetrics {
    /// A record with every field undefined.
    pub fn undefined() -> Self {
        Self {
            rise_time: f64::NAN,
            rise_time_start: f64::NAN,
            rise_time_end: f64::NAN,
            threshold_low: f64::NAN,
            threshold_high: f64::NAN,
            settling_time: f64::NAN,
            overshoot_pct: f64::NAN,
            steady_state: f64::NAN,
            natural_frequency: f64::NAN,
            damping_ratio: f64::NAN,
        }
    }
}

fn nan_from_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

/// One numeric column of a metrics table, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricColumn {
    RiseTime,
    RiseTimeStart,
    RiseTimeEnd,
    ThresholdLow,
    ThresholdHigh,
    SettlingTime,
    Overshoot,
    SteadyState,
    NaturalFrequency,
    DampingRatio,
}

impl MetricColumn {
    pub const ALL: [MetricColumn; 10] = [
        MetricColumn::RiseTime,
        MetricColumn::RiseTimeStart,
        MetricColumn::RiseTimeEnd,
        MetricColumn::ThresholdLow,
        MetricColumn::ThresholdHigh,
        MetricColumn::SettlingTime,
        MetricColumn::Overshoot,
        MetricColumn::SteadyState,
        MetricColumn::NaturalFrequency,
        MetricColumn::DampingRatio,
    ];

    /// Column header used in exported tables. The spelling of the threshold
    /// headers matches existing comparison sheets.
    pub fn header(&self) -> &'static str {
        match self {
            MetricColumn::RiseTime => "Rise Time (s)",
            MetricColumn::RiseTimeStart => "Rise Time start (s)",
            MetricColumn::RiseTimeEnd => "Rise Time end (s)",
            MetricColumn::ThresholdLow => "Threshhold 10 %",
            MetricColumn::ThresholdHigh => "Threshhold 90 %",
            MetricColumn::SettlingTime => "Settling Time (s)",
            MetricColumn::Overshoot => "Overshoot (%)",
            MetricColumn::SteadyState => "Steady-State Value",
            MetricColumn::NaturalFrequency => "Undamped Natural Freq (rad/s)",
            MetricColumn::DampingRatio => "Damping Ratio",
        }
    }

    pub fn get(&self, m: &TransientMetrics) -> f64 {
        match self {
            MetricColumn::RiseTime => m.rise_time,
            MetricColumn::RiseTimeStart => m.rise_time_start,
            MetricColumn::RiseTimeEnd => m.rise_time_end,
            MetricColumn::ThresholdLow => m.threshold_low,
            MetricColumn::ThresholdHigh => m.threshold_high,
            MetricColumn::SettlingTime => m.settling_time,
            MetricColumn::Overshoot => m.overshoot_pct,
            MetricColumn::SteadyState => m.steady_state,
            MetricColumn::NaturalFrequency => m.natural_frequency,
            MetricColumn::DampingRatio => m.damping_ratio,
        }
    }

    pub fn set(&self, m: &mut TransientMetrics, value: f64) {
        let slot = match self {
            MetricColumn::RiseTime => &mut m.rise_time,
            MetricColumn::RiseTimeStart => &mut m.rise_time_start,
            MetricColumn::RiseTimeEnd => &mut m.rise_time_end,
            MetricColumn::ThresholdLow => &mut m.threshold_low,
            MetricColumn::ThresholdHigh => &mut m.threshold_high,
            MetricColumn::SettlingTime => &mut m.settling_time,
            MetricColumn::Overshoot => &mut m.overshoot_pct,
            MetricColumn::SteadyState => &mut m.steady_state,
            MetricColumn::NaturalFrequency => &mut m.natural_frequency,
            MetricColumn::DampingRatio => &mut m.damping_ratio,
        };
        *slot = value;
    }
}

/// Number of trailing samples averaged for the steady-state value:
/// `ceil(n * fraction)`, at least one and at most `n`.
pub fn tail_len(n: usize, fraction: f64) -> usize {
    if n == 0 {
        return 0;
    }
    // 30 * 0.1 is 3.0000000000000004 in f64; keep it at 3.
    let raw = (n as f64 * fraction - 1e-9).ceil();
    if raw.is_nan() || raw < 1.0 {
        1
    } else {
        (raw as usize).min(n)
    }
}

/// Mean value over the trailing `tail_fraction` of samples. `NaN` when empty.
pub fn steady_state(series: &SampleSeries, tail_fraction: f64) -> f64 {
    let values = series.value();
    let k = tail_len(values.len(), tail_fraction);
    if k == 0 {
        return f64::NAN;
    }
    values[values.len() - k..].iter().sum::<f64>() / k as f64
}

/// Time at which the signal first reaches `fraction * steady`.
pub fn threshold_crossing(
    series: &SampleSeries,
    fraction: f64,
    steady: f64,
    policy: ThresholdPolicy,
) -> f64 {
    let target = fraction * steady;
    if target.is_nan() {
        return f64::NAN;
    }
    let time = series.time();
    let value = series.value();
    match policy {
        ThresholdPolicy::Sample => value
            .iter()
            .position(|v| *v >= target)
            .map(|i| time[i])
            .unwrap_or(f64::NAN),
        ThresholdPolicy::Interpolate => {
            let Some(i) = value.iter().position(|v| *v >= target) else {
                return f64::NAN;
            };
            if i == 0 {
                return time[0];
            }
            // value[i - 1] < target <= value[i]
            let frac = (target - value[i - 1]) / (value[i] - value[i - 1]);
            time[i - 1] + frac * (time[i] - time[i - 1])
        }
    }
}

/// Rise-time window between two fractions of steady-state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiseWindow {
    pub threshold_low: f64,
    pub threshold_high: f64,
    pub start: f64,
    pub end: f64,
}

impl RiseWindow {
    pub fn rise_time(&self) -> f64 {
        self.end - self.start
    }
}

/// Crossing times of `low * steady` and `high * steady`. Both crossings are
/// `NaN` unless `steady` is strictly positive.
pub fn rise_window(
    series: &SampleSeries,
    steady: f64,
    low: f64,
    high: f64,
    policy: ThresholdPolicy,
) -> RiseWindow {
    let (start, end) = if steady > 0.0 {
        (
            threshold_crossing(series, low, steady, policy),
            threshold_crossing(series, high, steady, policy),
        )
    } else {
        (f64::NAN, f64::NAN)
    };
    RiseWindow {
        threshold_low: low * steady,
        threshold_high: high * steady,
        start,
        end,
    }
}

/// Settling time for a band of `±tolerance * steady`.
///
/// Band membership is strict: a sample exactly on the edge is outside. An
/// inclusive `≤` test would settle the reference step (`0, 5, 9, 10, 9.5,
/// 10.05, 10`) at `t = 3`, because `9.5` sits on the ±0.5 edge, instead of
/// the expected `t = 5`. Every sample from the returned time on still lies
/// within `≤ tolerance * steady` of the steady state.
pub fn settling_time(
    series: &SampleSeries,
    steady: f64,
    tolerance: f64,
    policy: SettlingPolicy,
) -> f64 {
    let half_width = tolerance * steady;
    let inside = |v: f64| (v - steady).abs() < half_width;
    let time = series.time();
    let value = series.value();
    match policy {
        SettlingPolicy::FirstEntry => value
            .iter()
            .position(|v| inside(*v))
            .map(|i| time[i])
            .unwrap_or(f64::NAN),
        SettlingPolicy::Permanent => match value.iter().rposition(|v| !inside(*v)) {
            None => time.first().copied().unwrap_or(f64::NAN),
            Some(last_out) if last_out + 1 < value.len() => time[last_out + 1],
            Some(_) => f64::NAN,
        },
    }
}

/// Peak overshoot as a percentage of `steady`. Zero or negative means no
/// overshoot; `NaN` when `steady` is zero or the series is empty.
pub fn overshoot_percent(series: &SampleSeries, steady: f64) -> f64 {
    if steady == 0.0 || series.is_empty() {
        return f64::NAN;
    }
    let max = series
        .value()
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    (max - steady) / steady * 100.0
}

/// Damping ratio solving `OS = exp(-ζπ/√(1-ζ²))` for the given percent
/// overshoot. `NaN` unless the overshoot is strictly positive.
pub fn damping_from_overshoot(overshoot_pct: f64) -> f64 {
    if !(overshoot_pct > 0.0) {
        return f64::NAN;
    }
    let ln_os = (overshoot_pct / 100.0).ln();
    -ln_os / (PI * PI + ln_os * ln_os).sqrt()
}

/// Damping ratio `1/√(1 + (2π/δ)²)` from the logarithmic decrement of the
/// first two peaks, with amplitudes measured above `baseline`. Pass the
/// steady-state value for a step response, or `0.0` to use raw peak values.
///
/// If either peak sits at or below `baseline` the raw peak values are used
/// instead. The ratio is never negative; `NaN` when the raw values do not
/// give a positive ratio either.
pub fn damping_from_log_decrement(peaks: &[Peak], baseline: f64) -> TransientResult<f64> {
    let [first, second, ..] = peaks else {
        return Err(TransientError::InsufficientPeaks { found: peaks.len() });
    };
    let (a1, a2) = if first.value > baseline && second.value > baseline {
        (first.value - baseline, second.value - baseline)
    } else {
        (first.value, second.value)
    };
    let delta = (a1 / a2).ln();
    Ok(1.0 / (1.0 + (2.0 * PI / delta).powi(2)).sqrt())
}

/// Mean time between consecutive peaks. `NaN` with fewer than two peaks.
pub fn damped_period(peaks: &[Peak]) -> f64 {
    if peaks.len() < 2 {
        return f64::NAN;
    }
    let span: f64 = peaks.windows(2).map(|w| w[1].time - w[0].time).sum();
    span / (peaks.len() - 1) as f64
}

/// Undamped natural frequency (rad/s) from the damped period and `zeta`.
/// `NaN` when the period is undefined or `zeta` is `NaN` or at least 1.
pub fn natural_frequency(peaks: &[Peak], zeta: f64) -> f64 {
    let period = damped_period(peaks);
    if period.is_nan() || zeta.is_nan() || zeta >= 1.0 {
        return f64::NAN;
    }
    let omega_d = 2.0 * PI / period;
    omega_d / (1.0 - zeta * zeta).sqrt()
}

/// Extract every transient characteristic of `series`.
///
/// The only error is a log-decrement precondition failure: overshoot is
/// present but fewer than two peaks were detected. Every other undefined
/// quantity is reported as `NaN` in the record.
pub fn analyze(series: &SampleSeries, cfg: &TransientConfig) -> TransientResult<TransientMetrics> {
    let peaks = find_peaks(series, cfg.peak_policy);
    let steady = steady_state(series, cfg.tail_fraction);

    let rise = rise_window(
        series,
        steady,
        cfg.rise_low,
        cfg.rise_high,
        cfg.threshold_policy,
    );
    let settling = settling_time(series, steady, cfg.settling_tolerance, cfg.settling_policy);
    let overshoot = overshoot_percent(series, steady);

    let zeta = match cfg.damping_method {
        DampingMethod::Overshoot => damping_from_overshoot(overshoot),
        DampingMethod::LogDecrement if overshoot > 0.0 => {
            damping_from_log_decrement(&peaks, steady)?
        }
        DampingMethod::LogDecrement => f64::NAN,
    };
    let omega_n = natural_frequency(&peaks, zeta);

    debug!(
        "analyzed {} samples: {} peak(s), steady={:.4}, overshoot={:.3}%, zeta={:.4} ({})",
        series.len(),
        peaks.len(),
        steady,
        overshoot,
        zeta,
        cfg.damping_method
    );

    Ok(TransientMetrics {
        rise_time: rise.rise_time(),
        rise_time_start: rise.start,
        rise_time_end: rise.end,
        threshold_low: rise.threshold_low,
        threshold_high: rise.threshold_high,
        settling_time: settling,
        overshoot_pct: overshoot,
        steady_state: steady,
        natural_frequency: omega_n,
        damping_ratio: zeta,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate::{second_order_step, SecondOrderSpec};
    use crate::metrics::poles::PolePair;

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        let diff = (actual - expected).abs();
        assert!(
            diff <= tol,
            "expected {expected}, got {actual} (diff {diff} > tol {tol})"
        );
    }

    fn assert_rel(actual: f64, expected: f64, rel_tol: f64) {
        assert_close(actual, expected, expected.abs() * rel_tol);
    }

    fn series(pairs: &[(f64, f64)]) -> SampleSeries {
        SampleSeries::from_pairs(pairs.iter().copied()).expect("valid series")
    }

    fn reference_series() -> SampleSeries {
        series(&[
            (0.0, 0.0),
            (1.0, 5.0),
            (2.0, 9.0),
            (3.0, 10.0),
            (4.0, 9.5),
            (5.0, 10.05),
            (6.0, 10.0),
        ])
    }

    fn peak(time: f64, value: f64) -> Peak {
        Peak {
            index: 0,
            time,
            value,
        }
    }

    fn underdamped(omega_n: f64, zeta: f64) -> SampleSeries {
        second_order_step(&SecondOrderSpec {
            natural_frequency: omega_n,
            damping_ratio: zeta,
            dt: 0.001,
            duration: 12.0,
            ..SecondOrderSpec::default()
        })
        .expect("valid parameters")
    }

    #[test]
    fn reference_scenario_end_to_end() {
        let ts = reference_series();
        let cfg = TransientConfig {
            settling_tolerance: 0.05,
            ..TransientConfig::default()
        };
        let m = analyze(&ts, &cfg).unwrap();
        assert_eq!(m.steady_state, 10.0);
        assert_eq!(m.threshold_low, 1.0);
        assert_eq!(m.threshold_high, 9.0);
        assert_eq!(m.rise_time_start, 1.0);
        assert_eq!(m.rise_time_end, 2.0);
        assert_eq!(m.rise_time, 1.0);
        assert_close(m.overshoot_pct, 0.5, 1e-9);
        assert_eq!(m.settling_time, 5.0);
        assert!(m.damping_ratio > 0.0 && m.damping_ratio < 1.0);
        assert!(m.natural_frequency.is_finite());
    }

    #[test]
    fn tail_length_rounds_up() {
        assert_eq!(tail_len(0, 0.1), 0);
        assert_eq!(tail_len(1, 0.1), 1);
        assert_eq!(tail_len(7, 0.1), 1);
        assert_eq!(tail_len(10, 0.1), 1);
        assert_eq!(tail_len(11, 0.1), 2);
        assert_eq!(tail_len(30, 0.1), 3);
        assert_eq!(tail_len(5, 0.0), 1);
        assert_eq!(tail_len(5, 2.0), 5);
    }

    #[test]
    fn steady_state_of_pure_step_is_exact() {
        let pairs: Vec<(f64, f64)> = (0..50)
            .map(|i| (i as f64 * 0.1, if i < 5 { 0.0 } else { 3.7 }))
            .collect();
        assert_eq!(steady_state(&series(&pairs), 0.1), 3.7);
    }

    #[test]
    fn steady_state_of_empty_series_is_nan() {
        assert!(steady_state(&SampleSeries::default(), 0.1).is_nan());
    }

    #[test]
    fn interpolated_crossing_lands_inside_segment() {
        let ts = reference_series();
        let start = threshold_crossing(&ts, 0.1, 10.0, ThresholdPolicy::Interpolate);
        let end = threshold_crossing(&ts, 0.9, 10.0, ThresholdPolicy::Interpolate);
        assert_close(start, 0.2, 1e-12);
        assert_close(end, 2.0, 1e-12);
    }

    #[test]
    fn crossing_is_nan_when_target_never_reached() {
        let ts = series(&[(0.0, 0.0), (1.0, 0.5), (2.0, 0.8)]);
        for policy in [ThresholdPolicy::Sample, ThresholdPolicy::Interpolate] {
            assert!(threshold_crossing(&ts, 0.9, 1.0, policy).is_nan());
        }
    }

    #[test]
    fn interpolated_crossing_uses_first_rise_on_oscillation() {
        let ts = series(&[(0.0, 0.0), (1.0, 2.0), (2.0, 0.0), (3.0, 2.0)]);
        let t = threshold_crossing(&ts, 0.5, 2.0, ThresholdPolicy::Interpolate);
        assert_close(t, 0.5, 1e-12);
    }

    #[test]
    fn rise_time_is_nan_without_positive_steady_state() {
        let ts = series(&[(0.0, 0.0), (1.0, -1.0), (2.0, -2.0)]);
        let w = rise_window(&ts, -2.0, 0.1, 0.9, ThresholdPolicy::Sample);
        assert!(w.rise_time().is_nan());
        assert_eq!(w.threshold_high, -1.8);
        let w = rise_window(&ts, 0.0, 0.1, 0.9, ThresholdPolicy::Sample);
        assert!(w.rise_time().is_nan());
    }

    #[test]
    fn rise_time_is_non_negative() {
        let ts = underdamped(3.0, 0.4);
        for policy in [ThresholdPolicy::Sample, ThresholdPolicy::Interpolate] {
            let w = rise_window(&ts, steady_state(&ts, 0.1), 0.1, 0.9, policy);
            assert!(w.rise_time() >= 0.0);
        }
    }

    #[test]
    fn settling_ignores_early_band_entry() {
        // enters the ±2% band at t=2, leaves at t=3, re-enters for good at t=5
        let ts = series(&[
            (0.0, 0.0),
            (1.0, 0.7),
            (2.0, 0.99),
            (3.0, 1.08),
            (4.0, 1.03),
            (5.0, 1.01),
            (6.0, 0.995),
            (7.0, 1.0),
            (8.0, 1.0),
        ]);
        let permanent = settling_time(&ts, 1.0, 0.02, SettlingPolicy::Permanent);
        assert_eq!(permanent, 5.0);
        assert_eq!(settling_time(&ts, 1.0, 0.02, SettlingPolicy::FirstEntry), 2.0);
        for (t, v) in ts.iter() {
            if t >= permanent {
                assert!((v - 1.0).abs() <= 0.02);
            }
        }
    }

    #[test]
    fn band_edge_counts_as_outside() {
        let ts = reference_series();
        assert_eq!(settling_time(&ts, 10.0, 0.05, SettlingPolicy::Permanent), 5.0);
        assert_eq!(settling_time(&ts, 10.0, 0.05, SettlingPolicy::FirstEntry), 3.0);
    }

    #[test]
    fn settling_is_nan_when_tail_leaves_band() {
        let ts = series(&[(0.0, 1.0), (1.0, 1.0), (2.0, 2.0)]);
        assert!(settling_time(&ts, 1.0, 0.02, SettlingPolicy::Permanent).is_nan());
        assert!(settling_time(&SampleSeries::default(), 1.0, 0.02, SettlingPolicy::Permanent)
            .is_nan());
    }

    #[test]
    fn settled_from_the_start_reports_first_time() {
        let ts = series(&[(0.5, 1.0), (1.0, 1.001), (2.0, 0.999)]);
        assert_eq!(settling_time(&ts, 1.0, 0.02, SettlingPolicy::Permanent), 0.5);
    }

    #[test]
    fn overshoot_zero_for_monotone_response() {
        let ts = series(&[
            (0.0, 0.0),
            (1.0, 0.6),
            (2.0, 0.9),
            (3.0, 1.0),
            (4.0, 1.0),
            (5.0, 1.0),
        ]);
        assert_eq!(overshoot_percent(&ts, steady_state(&ts, 0.1)), 0.0);
    }

    #[test]
    fn overshoot_nan_for_zero_steady_state() {
        let ts = series(&[(0.0, 1.0), (1.0, 0.0)]);
        assert!(overshoot_percent(&ts, 0.0).is_nan());
    }

    #[test]
    fn overshoot_formula_inverts_known_ratio() {
        let zeta: f64 = 0.3;
        let os = 100.0 * (-zeta * PI / (1.0 - zeta * zeta).sqrt()).exp();
        assert_close(damping_from_overshoot(os), zeta, 1e-12);
        assert!(damping_from_overshoot(0.0).is_nan());
        assert!(damping_from_overshoot(-3.0).is_nan());
        assert!(damping_from_overshoot(f64::NAN).is_nan());
    }

    #[test]
    fn log_decrement_requires_two_peaks() {
        assert_eq!(
            damping_from_log_decrement(&[], 0.0),
            Err(TransientError::InsufficientPeaks { found: 0 })
        );
        assert_eq!(
            damping_from_log_decrement(&[peak(1.0, 1.3)], 1.0),
            Err(TransientError::InsufficientPeaks { found: 1 })
        );
    }

    #[test]
    fn log_decrement_matches_raw_peak_formula() {
        let peaks = [peak(1.0, 2.0), peak(2.0, 1.0)];
        let delta = 2f64.ln();
        let expected = 1.0 / (1.0 + (2.0 * PI / delta).powi(2)).sqrt();
        assert_close(damping_from_log_decrement(&peaks, 0.0).unwrap(), expected, 1e-12);
    }

    #[test]
    fn log_decrement_is_never_negative() {
        let growing = [peak(1.0, 1.0), peak(2.0, 2.0)];
        let decaying = [peak(1.0, 2.0), peak(2.0, 1.0)];
        let up = damping_from_log_decrement(&growing, 0.0).unwrap();
        let down = damping_from_log_decrement(&decaying, 0.0).unwrap();
        assert!(up > 0.0);
        assert_close(up, down, 1e-12);
        assert_close(up, 0.10965, 1e-5);
    }

    #[test]
    fn log_decrement_falls_back_to_raw_peaks_at_baseline() {
        // first peak sits exactly on the baseline
        let peaks = [peak(3.0, 10.0), peak(5.0, 10.05)];
        let delta = (10.0f64 / 10.05).ln();
        let expected = 1.0 / (1.0 + (2.0 * PI / delta).powi(2)).sqrt();
        let zeta = damping_from_log_decrement(&peaks, 10.0).unwrap();
        assert_close(zeta, expected, 1e-12);
        assert_close(zeta, 0.000794, 1e-5);
        assert!(damping_from_log_decrement(&[peak(1.0, -1.0), peak(2.0, 1.0)], 0.0)
            .unwrap()
            .is_nan());
    }

    #[test]
    fn reference_scenario_with_log_decrement() {
        let cfg = TransientConfig {
            settling_tolerance: 0.05,
            damping_method: DampingMethod::LogDecrement,
            ..TransientConfig::default()
        };
        let m = analyze(&reference_series(), &cfg).unwrap();
        assert!(m.damping_ratio > 0.0 && m.damping_ratio < 0.001);
        assert!(m.natural_frequency.is_finite());
        let poles = PolePair::new(m.natural_frequency, m.damping_ratio);
        assert!(poles.as_array().iter().all(|p| p.re < 0.0));
    }

    #[test]
    fn log_decrement_error_surfaces_from_analyze() {
        // one overshooting peak, then flat
        let ts = series(&[
            (0.0, 0.0),
            (1.0, 1.2),
            (2.0, 1.0),
            (3.0, 1.0),
            (4.0, 1.0),
        ]);
        let cfg = TransientConfig {
            damping_method: DampingMethod::LogDecrement,
            ..TransientConfig::default()
        };
        assert_eq!(
            analyze(&ts, &cfg),
            Err(TransientError::InsufficientPeaks { found: 1 })
        );
        let m = analyze(&ts, &TransientConfig::default()).unwrap();
        assert!(m.damping_ratio > 0.0);
        assert!(m.natural_frequency.is_nan());
    }

    #[test]
    fn log_decrement_skipped_without_overshoot() {
        let ts = series(&[(0.0, 0.0), (1.0, 0.5), (2.0, 1.0), (3.0, 1.0)]);
        let cfg = TransientConfig {
            damping_method: DampingMethod::LogDecrement,
            ..TransientConfig::default()
        };
        let m = analyze(&ts, &cfg).unwrap();
        assert!(m.damping_ratio.is_nan());
    }

    #[test]
    fn recovers_second_order_parameters() {
        for &(omega_n, zeta) in &[(4.0, 0.2), (2.5, 0.35), (6.0, 0.1)] {
            let ts = underdamped(omega_n, zeta);
            let peaks = find_peaks(&ts, PeakPolicy::Strict);
            let steady = steady_state(&ts, 0.1);

            let by_overshoot = damping_from_overshoot(overshoot_percent(&ts, steady));
            let by_decrement = damping_from_log_decrement(&peaks, steady).unwrap();
            assert_rel(by_overshoot, zeta, 0.05);
            assert_rel(by_decrement, zeta, 0.05);

            assert_rel(natural_frequency(&peaks, by_overshoot), omega_n, 0.05);
            assert_rel(natural_frequency(&peaks, by_decrement), omega_n, 0.05);
        }
    }

    #[test]
    fn analyze_methods_agree_on_clean_response() {
        let ts = underdamped(4.0, 0.25);
        let by_overshoot = analyze(&ts, &TransientConfig::default()).unwrap();
        let by_decrement = analyze(
            &ts,
            &TransientConfig {
                damping_method: DampingMethod::LogDecrement,
                peak_policy: PeakPolicy::Plateau,
                threshold_policy: ThresholdPolicy::Interpolate,
                ..TransientConfig::default()
            },
        )
        .unwrap();
        assert_rel(by_overshoot.damping_ratio, 0.25, 0.05);
        assert_rel(by_decrement.damping_ratio, 0.25, 0.05);
        assert_rel(by_decrement.natural_frequency, 4.0, 0.05);
        assert_close(by_decrement.rise_time, by_overshoot.rise_time, 0.002);
    }

    #[test]
    fn overdamped_response_has_no_natural_frequency() {
        let ts = second_order_step(&SecondOrderSpec {
            natural_frequency: 3.0,
            damping_ratio: 1.6,
            dt: 0.01,
            duration: 10.0,
            ..SecondOrderSpec::default()
        })
        .unwrap();
        let m = analyze(&ts, &TransientConfig::default()).unwrap();
        assert!(m.natural_frequency.is_nan());
        assert!(m.rise_time > 0.0);
        assert!(natural_frequency(&[peak(0.0, 1.0), peak(1.0, 1.0)], 1.0).is_nan());
        assert!(natural_frequency(&[peak(0.0, 1.0), peak(1.0, 1.0)], f64::NAN).is_nan());
    }

    #[test]
    fn empty_series_yields_undefined_record() {
        let m = analyze(&SampleSeries::default(), &TransientConfig::default()).unwrap();
        for column in MetricColumn::ALL {
            assert!(column.get(&m).is_nan(), "{:?}", column);
        }
    }

    #[test]
    fn policies_parse_from_names() {
        assert_eq!("interpolate".parse(), Ok(ThresholdPolicy::Interpolate));
        assert_eq!("First-Entry".parse(), Ok(SettlingPolicy::FirstEntry));
        assert_eq!("log-decrement".parse(), Ok(DampingMethod::LogDecrement));
        assert_eq!("plateau".parse(), Ok(PeakPolicy::Plateau));
        assert!("median".parse::<DampingMethod>().is_err());
    }

    #[test]
    fn nan_fields_round_trip_through_json() {
        let m = analyze(&reference_series(), &TransientConfig::default()).unwrap();
        let mut m = m;
        m.natural_frequency = f64::NAN;
        let js = serde_json::to_string(&m).unwrap();
        assert!(js.contains("\"natural_frequency\":null"));
        let back: TransientMetrics = serde_json::from_str(&js).unwrap();
        assert!(back.natural_frequency.is_nan());
        assert_eq!(back.steady_state, 10.0);
    }
}

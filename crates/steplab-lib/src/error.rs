use thiserror::Error;

pub type TransientResult<T> = Result<T, TransientError>;

/// Failures that are not "undefined numeric result".
///
/// Undefined quantities (zero steady-state, no threshold crossing, overdamped
/// natural frequency) are reported as `NaN` in the affected field instead.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransientError {
    /// Log-decrement damping needs two detected peaks.
    #[error("at least two peaks are needed for log-decrement damping, found {found}")]
    InsufficientPeaks { found: usize },

    #[error("time and value columns differ in length ({time} vs {value})")]
    LengthMismatch { time: usize, value: usize },

    #[error("sample {index} is not finite")]
    NonFiniteSample { index: usize },

    #[error("time must be strictly increasing (sample {index})")]
    NonIncreasingTime { index: usize },
}

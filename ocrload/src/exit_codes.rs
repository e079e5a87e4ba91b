#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// One or more thresholds failed.
    ThresholdsFailed = 11,

    /// Invalid CLI/env/config input (bad flags, invalid durations, unknown threshold metrics, etc.).
    InvalidInput = 30,

    /// Internal/runtime error (IO errors, virtual user tasks that panicked).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub fn from_thresholds(thresholds_passed: bool) -> Self {
        if thresholds_passed {
            Self::Success
        } else {
            Self::ThresholdsFailed
        }
    }
}

/// Result alias that carries the custom [`MonitorError`] type.
pub type Result<T> = std::result::Result<T, MonitorError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Free-form failure, used for poisoned locks and similar runtime faults.
    #[error("{0}")]
    Message(String),
    /// A caller handed the pipeline a value it cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration files that fail to parse.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// Capture collaborator failures.
    #[error(transparent)]
    Capture(#[from] CaptureError),
    /// Spectrum transform failures.
    #[error("fft failed: {0}")]
    Fft(#[from] realfft::FftError),
}

impl MonitorError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for MonitorError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MonitorError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

/// Failures raised while acquiring an audio input.
///
/// None of these are fatal: the monitor records them as events and keeps
/// running without a source until the user starts capture again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    /// The host audio subsystem could not be initialised.
    #[error("audio subsystem unavailable: {0}")]
    InitFailed(String),
    /// The user declined access to the input device.
    #[error("permission to use the input device was denied")]
    PermissionDenied,
    /// No compatible input device is present.
    #[error("no compatible input device available")]
    DeviceUnavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_errors_convert_into_monitor_errors() {
        let err: MonitorError = CaptureError::DeviceUnavailable.into();
        assert!(matches!(
            err,
            MonitorError::Capture(CaptureError::DeviceUnavailable)
        ));
        assert_eq!(err.to_string(), "no compatible input device available");
    }

    #[test]
    fn string_messages_become_message_variant() {
        let err: MonitorError = "analyser has been poisoned".into();
        assert_eq!(err.to_string(), "analyser has been poisoned");
    }
}

// Capture engine errors

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Numeric codes reported by [`AudioError`]
///
/// Range: 1001-1006
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// `start` called while a session is active
    pub const ALREADY_RUNNING: i32 = 1001;

    /// `stop` called without an active session
    pub const NOT_RUNNING: i32 = 1002;

    /// No usable input device or stream configuration
    pub const STREAM_OPEN_FAILED: i32 = 1003;

    /// The input stream was built but refused to play
    pub const PLAY_FAILED: i32 = 1004;

    /// The backend reported an error on a running input stream
    pub const STREAM_FAILURE: i32 = 1005;

    /// The detection thread panicked before handing back its detector
    pub const WORKER_PANICKED: i32 = 1006;
}

/// Log a capture error at error level
///
/// `context` names the engine operation (`start`, `stop`, `input_stream`).
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "[AudioEngine] {} failed: code={} {}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by the live capture engine
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    AlreadyRunning,

    NotRunning,

    /// Device lookup, configuration query or stream construction failed
    StreamOpenFailed { reason: String },

    PlayFailed { reason: String },

    /// Reported by the backend through the stream error callback
    StreamFailure { reason: String },

    WorkerPanicked,
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::AlreadyRunning => AudioErrorCodes::ALREADY_RUNNING,
            AudioError::NotRunning => AudioErrorCodes::NOT_RUNNING,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::PlayFailed { .. } => AudioErrorCodes::PLAY_FAILED,
            AudioError::StreamFailure { .. } => AudioErrorCodes::STREAM_FAILURE,
            AudioError::WorkerPanicked => AudioErrorCodes::WORKER_PANICKED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::AlreadyRunning => "Capture session already active".to_string(),
            AudioError::NotRunning => "No capture session to stop".to_string(),
            AudioError::StreamOpenFailed { reason } => {
                format!("Cannot open input stream: {}", reason)
            }
            AudioError::PlayFailed { reason } => {
                format!("Input stream refused to start: {}", reason)
            }
            AudioError::StreamFailure { reason } => {
                format!("Input stream error: {}", reason)
            }
            AudioError::WorkerPanicked => "Detection thread panicked".to_string(),
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code(), self.message())
    }
}

impl std::error::Error for AudioError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_variant_has_distinct_code() {
        let errors = [
            AudioError::AlreadyRunning,
            AudioError::NotRunning,
            AudioError::StreamOpenFailed {
                reason: "no device".to_string(),
            },
            AudioError::PlayFailed {
                reason: "busy".to_string(),
            },
            AudioError::StreamFailure {
                reason: "unplugged".to_string(),
            },
            AudioError::WorkerPanicked,
        ];

        let mut codes: Vec<i32> = errors.iter().map(|err| err.code()).collect();
        assert_eq!(codes, (1001..=1006).collect::<Vec<_>>());
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_messages_carry_reason() {
        let err = AudioError::StreamFailure {
            reason: "device unplugged".to_string(),
        };
        assert_eq!(err.message(), "Input stream error: device unplugged");

        let err = AudioError::PlayFailed {
            reason: "exclusive mode".to_string(),
        };
        assert!(err.message().ends_with("exclusive mode"));
    }

    #[test]
    fn test_display_prefixes_code() {
        let err = AudioError::WorkerPanicked;
        assert_eq!(err.to_string(), "[1006] Detection thread panicked");
    }
}

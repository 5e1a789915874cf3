// Error types for the beat detector
//
// This module defines custom error types for the detection kernel and the
// audio capture layer, providing structured error handling with numeric codes
// that hosts can match on without parsing messages.

mod audio;
mod detector;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use detector::{log_detector_error, DetectorError, DetectorErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the host boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

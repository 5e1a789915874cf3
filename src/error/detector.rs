// Detector error types and constants
//
// Contract violations at the kernel boundary: frames of the wrong shape,
// magnitudes the energy model cannot accept, configurations that would index
// outside the frame, and frame-port backpressure.

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Detector error code constants
///
/// Error code range: 3001-3005
pub struct DetectorErrorCodes {}

impl DetectorErrorCodes {
    /// Frame length differs from the configured sub-band count
    pub const FRAME_LENGTH_MISMATCH: i32 = 3001;

    /// Frame contains a negative, non-finite or overflowing magnitude
    pub const INVALID_MAGNITUDE: i32 = 3002;

    /// Configuration rejected at construction
    pub const INVALID_CONFIG: i32 = 3003;

    /// Frame port has no free buffer (consumer is lagging)
    pub const PORT_FULL: i32 = 3004;

    /// Other side of the frame port was dropped
    pub const PORT_CLOSED: i32 = 3005;
}

/// Log a detector error with structured context
pub fn log_detector_error(err: &DetectorError, context: &str) {
    error!(
        "Detector error in {}: code={}, component=BeatDetector, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors surfaced by the detection kernel and its input port
#[derive(Debug, Clone, PartialEq)]
pub enum DetectorError {
    /// Frame length does not match the configured sub-band count
    FrameLengthMismatch { expected: usize, actual: usize },

    /// Magnitude at `band` is negative, NaN, infinite, or its energy overflows `f32`
    InvalidMagnitude { band: usize, value: f32 },

    /// Configuration failed validation
    InvalidConfig { reason: String },

    /// No free frame buffer in the port
    PortFull,

    /// Port peer dropped
    PortClosed,
}

impl ErrorCode for DetectorError {
    fn code(&self) -> i32 {
        match self {
            DetectorError::FrameLengthMismatch { .. } => DetectorErrorCodes::FRAME_LENGTH_MISMATCH,
            DetectorError::InvalidMagnitude { .. } => DetectorErrorCodes::INVALID_MAGNITUDE,
            DetectorError::InvalidConfig { .. } => DetectorErrorCodes::INVALID_CONFIG,
            DetectorError::PortFull => DetectorErrorCodes::PORT_FULL,
            DetectorError::PortClosed => DetectorErrorCodes::PORT_CLOSED,
        }
    }

    fn message(&self) -> String {
        match self {
            DetectorError::FrameLengthMismatch { expected, actual } => {
                format!(
                    "Frame length mismatch: expected {} bands, got {}",
                    expected, actual
                )
            }
            DetectorError::InvalidMagnitude { band, value } => {
                format!("Invalid magnitude {} in band {}", value, band)
            }
            DetectorError::InvalidConfig { reason } => {
                format!("Invalid detector configuration: {}", reason)
            }
            DetectorError::PortFull => "Frame port full, consumer is lagging".to_string(),
            DetectorError::PortClosed => "Frame port closed".to_string(),
        }
    }
}

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DetectorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for DetectorError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_error_codes() {
        assert_eq!(
            DetectorError::FrameLengthMismatch {
                expected: 128,
                actual: 64
            }
            .code(),
            3001
        );
        assert_eq!(
            DetectorError::InvalidMagnitude {
                band: 0,
                value: f32::NAN
            }
            .code(),
            3002
        );
        assert_eq!(
            DetectorError::InvalidConfig {
                reason: "test".to_string()
            }
            .code(),
            3003
        );
        assert_eq!(DetectorError::PortFull.code(), 3004);
        assert_eq!(DetectorError::PortClosed.code(), 3005);
    }

    #[test]
    fn test_detector_error_messages() {
        let err = DetectorError::FrameLengthMismatch {
            expected: 128,
            actual: 64,
        };
        assert!(err.message().contains("expected 128"));
        assert!(err.message().contains("got 64"));

        let err = DetectorError::InvalidMagnitude {
            band: 7,
            value: -1.0,
        };
        assert!(err.message().contains("band 7"));
    }

    #[test]
    fn test_error_propagation() {
        fn may_fail() -> Result<(), DetectorError> {
            Err(DetectorError::PortFull)
        }

        fn caller() -> Result<(), DetectorError> {
            may_fail()?;
            Ok(())
        }

        assert_eq!(caller(), Err(DetectorError::PortFull));
    }
}

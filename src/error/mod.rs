// Error types for the tinnitus pitch matcher
//
// This module defines custom error types for tone playback and pitch-matching
// operations, providing structured error handling with stable error codes
// that callers (UI layers, the CLI) can match on.

mod audio;
mod calibration;
mod session;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use session::SessionError;

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the library boundary.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

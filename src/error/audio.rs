// Audio error types and constants

use crate::error::ErrorCode;
use std::fmt;
use tracing::error;

/// Audio error code constants
///
/// Error code range: 1001-1004
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// The output could not produce or schedule a tone
    pub const AUDIO_UNAVAILABLE: i32 = 1001;

    /// No output device is present on the host
    pub const NO_OUTPUT_DEVICE: i32 = 1002;

    /// Failed to open an output stream for a tone
    pub const STREAM_OPEN_FAILED: i32 = 1003;

    /// Mutex/RwLock was poisoned
    pub const LOCK_POISONED: i32 = 1004;
}

/// Log an audio error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=ToneOutput, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// Every variant is recoverable from the matcher's point of view: a failed
/// playback never touches calibration state, so the caller may replay the
/// same trial or fall back to manual frequency entry.
///
/// Error code ranges: 1001-1004
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Output busy, context suspended or tone scheduling failed
    AudioUnavailable { reason: String },

    /// No default output device found
    NoOutputDevice,

    /// Failed to open an output stream
    StreamOpenFailed { reason: String },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::AudioUnavailable { .. } => AudioErrorCodes::AUDIO_UNAVAILABLE,
            AudioError::NoOutputDevice => AudioErrorCodes::NO_OUTPUT_DEVICE,
            AudioError::StreamOpenFailed { .. } => AudioErrorCodes::STREAM_OPEN_FAILED,
            AudioError::LockPoisoned { .. } => AudioErrorCodes::LOCK_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::AudioUnavailable { reason } => {
                format!("Audio unavailable: {}", reason)
            }
            AudioError::NoOutputDevice => "No default output device found".to_string(),
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
            AudioError::LockPoisoned { component } => {
                format!("Lock poisoned for component: {}", component)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_error_codes() {
        assert_eq!(
            AudioError::AudioUnavailable {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::AUDIO_UNAVAILABLE
        );
        assert_eq!(
            AudioError::NoOutputDevice.code(),
            AudioErrorCodes::NO_OUTPUT_DEVICE
        );
        assert_eq!(
            AudioError::StreamOpenFailed {
                reason: "test".to_string()
            }
            .code(),
            AudioErrorCodes::STREAM_OPEN_FAILED
        );
        assert_eq!(
            AudioError::LockPoisoned {
                component: "test".to_string()
            }
            .code(),
            AudioErrorCodes::LOCK_POISONED
        );
    }

    #[test]
    fn test_audio_error_messages() {
        let err = AudioError::AudioUnavailable {
            reason: "context suspended".to_string(),
        };
        assert_eq!(err.message(), "Audio unavailable: context suspended");

        let err = AudioError::LockPoisoned {
            component: "RecordingToneOutput".to_string(),
        };
        assert!(err.message().contains("RecordingToneOutput"));
    }

    #[test]
    fn test_audio_error_display() {
        let err = AudioError::NoOutputDevice;
        let display = format!("{}", err);
        assert!(display.contains("AudioError"));
        assert!(display.contains("1002"));
    }
}

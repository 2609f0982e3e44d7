// Matching session errors
//
// A session call can fail on the controller side or on the audio side;
// SessionError carries either without losing its code.

use crate::error::{AudioError, CalibrationError, ErrorCode};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    Calibration(CalibrationError),
    Audio(AudioError),
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::Calibration(err) => err.code(),
            SessionError::Audio(err) => err.code(),
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::Calibration(err) => err.message(),
            SessionError::Audio(err) => err.message(),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Calibration(err) => fmt::Display::fmt(err, f),
            SessionError::Audio(err) => fmt::Display::fmt(err, f),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SessionError::Calibration(err) => Some(err),
            SessionError::Audio(err) => Some(err),
        }
    }
}

impl From<CalibrationError> for SessionError {
    fn from(err: CalibrationError) -> Self {
        SessionError::Calibration(err)
    }
}

impl From<AudioError> for SessionError {
    fn from(err: AudioError) -> Self {
        SessionError::Audio(err)
    }
}

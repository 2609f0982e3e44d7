// Calibration error types and constants

use crate::error::ErrorCode;
use std::fmt;
use tracing::error;

/// Calibration error code constants
///
/// Error code range: 2001-2006
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// Operation invoked out of sequence
    pub const INVALID_STATE: i32 = 2001;

    /// Argument outside its accepted domain (e.g. selection index)
    pub const INVALID_ARGUMENT: i32 = 2002;

    /// Result requested before the test reached a terminal state
    pub const NOT_COMPLETE: i32 = 2003;

    /// A test is already running on this controller
    pub const ALREADY_IN_PROGRESS: i32 = 2004;

    /// Configuration values are inconsistent
    pub const INVALID_CONFIG: i32 = 2005;

    /// Controller state lock was poisoned
    pub const STATE_POISONED: i32 = 2006;
}

/// Log a calibration error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=StaircaseController, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// These are programming errors on the caller's side (wrong call order,
/// out-of-range selection) or configuration mistakes. They are surfaced
/// synchronously and never retried automatically.
///
/// Error code ranges: 2001-2006
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Operation invoked out of sequence
    InvalidState { reason: String },

    /// Argument outside its accepted domain
    InvalidArgument { reason: String },

    /// Test has not reached Converged or MaxIterationsReached
    NotComplete,

    /// Test already running
    AlreadyInProgress,

    /// Configuration rejected by validation
    InvalidConfig { reason: String },

    /// Controller state lock was poisoned
    StatePoisoned,
}

impl CalibrationError {
    pub(crate) fn invalid_state(reason: impl Into<String>) -> Self {
        CalibrationError::InvalidState {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        CalibrationError::InvalidArgument {
            reason: reason.into(),
        }
    }
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::InvalidState { .. } => CalibrationErrorCodes::INVALID_STATE,
            CalibrationError::InvalidArgument { .. } => CalibrationErrorCodes::INVALID_ARGUMENT,
            CalibrationError::NotComplete => CalibrationErrorCodes::NOT_COMPLETE,
            CalibrationError::AlreadyInProgress => CalibrationErrorCodes::ALREADY_IN_PROGRESS,
            CalibrationError::InvalidConfig { .. } => CalibrationErrorCodes::INVALID_CONFIG,
            CalibrationError::StatePoisoned => CalibrationErrorCodes::STATE_POISONED,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::InvalidState { reason } => format!("Invalid state: {}", reason),
            CalibrationError::InvalidArgument { reason } => {
                format!("Invalid argument: {}", reason)
            }
            CalibrationError::NotComplete => "Pitch matching not complete".to_string(),
            CalibrationError::AlreadyInProgress => "Pitch matching already in progress".to_string(),
            CalibrationError::InvalidConfig { reason } => {
                format!("Invalid configuration: {}", reason)
            }
            CalibrationError::StatePoisoned => "Calibration state lock poisoned".to_string(),
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}

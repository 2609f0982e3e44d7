// Tinnitus Matcher Core - adaptive pitch matching
// 3AFC staircase with octave-confusion guard, bisection matching and tone playback

// Module declarations
pub mod audio;
pub mod calibration;
pub mod config;
pub mod error;
pub mod managers;

// Re-exports for convenience
pub use calibration::{
    BisectionAnswer, BisectionMatcher, Ear, MatchOutcome, StaircaseController, TestResult,
    TestSet, TrialRecord, TrialStep,
};
pub use config::AppConfig;
pub use error::{AudioError, CalibrationError, ErrorCode, SessionError};
pub use managers::MatchingSession;

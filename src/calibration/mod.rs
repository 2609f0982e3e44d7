// Calibration module - tinnitus pitch matching
//
// Two matchers share the value types in `state`:
// 1. StaircaseController: adaptive 3AFC staircase with an octave guard
// 2. BisectionMatcher: quick higher/lower/match search
//
// The staircase workflow:
// 1. start() for an ear
// 2. next_trial() -> play the TestSet -> submit_response() until finished
// 3. get_result() computes the recency-weighted estimate and confidence

pub mod bisection;
pub mod cancel;
pub mod listener;
pub mod octave_guard;
pub mod presenter;
pub mod procedure;
pub mod progress;
pub mod scoring;
pub mod shuffle;
pub mod state;

pub use bisection::{BisectionAnswer, BisectionMatcher};
pub use cancel::CancelToken;
pub use listener::SimulatedListener;
pub use octave_guard::OctaveGuard;
pub use presenter::{PlaybackOutcome, TrialPresenter};
pub use procedure::{ResponseSummary, StaircaseController, TrialStep};
pub use progress::{CalibrationProgress, MatchPhase};
pub use shuffle::{FisherYatesShuffler, IdentityShuffler, Shuffler};
pub use state::{CalibrationState, Ear, MatchOutcome, TestResult, TestSet, TrialRecord};

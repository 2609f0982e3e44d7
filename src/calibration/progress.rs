// Progress tracking for the pitch-matching workflow
//
// Snapshots of controller state sent to subscribers (UI, CLI) after every
// transition.

use serde::{Deserialize, Serialize};

use crate::calibration::state::Ear;

/// Controller phase
///
/// `Idle -> AwaitingTrial -> AwaitingSelection -> AwaitingTrial ... ->
/// Converged | MaxIterationsReached`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchPhase {
    /// No test running
    Idle,
    /// Running, ready for the next trial
    AwaitingTrial,
    /// A TestSet is out and awaiting the listener's choice
    AwaitingSelection,
    Converged,
    MaxIterationsReached,
}

impl MatchPhase {
    pub fn is_running(&self) -> bool {
        matches!(self, MatchPhase::AwaitingTrial | MatchPhase::AwaitingSelection)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MatchPhase::Converged | MatchPhase::MaxIterationsReached)
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            MatchPhase::Idle => "IDLE",
            MatchPhase::AwaitingTrial => "READY",
            MatchPhase::AwaitingSelection => "LISTENING",
            MatchPhase::Converged => "CONVERGED",
            MatchPhase::MaxIterationsReached => "MAX ITERATIONS",
        }
    }
}

/// Progress information for the current test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationProgress {
    pub phase: MatchPhase,
    pub ear: Option<Ear>,
    pub iteration: u32,
    pub max_iterations: u32,
    pub current_frequency_hz: Option<f64>,
    pub step_size_octaves: Option<f64>,
    /// Trailing run of confirmed trials
    pub consecutive_correct: usize,
}

impl CalibrationProgress {
    /// Progress for a controller with no test running
    pub fn idle(max_iterations: u32) -> Self {
        Self {
            phase: MatchPhase::Idle,
            ear: None,
            iteration: 0,
            max_iterations,
            current_frequency_hz: None,
            step_size_octaves: None,
            consecutive_correct: 0,
        }
    }

    /// Trials used so far as a percentage of the iteration budget (0-100)
    pub fn percentage(&self) -> u8 {
        if self.phase.is_terminal() {
            return 100;
        }
        if self.max_iterations == 0 {
            return 0;
        }
        let used = self.iteration.min(self.max_iterations) as f32;
        ((used / self.max_iterations as f32) * 100.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn progress(phase: MatchPhase, iteration: u32) -> CalibrationProgress {
        CalibrationProgress {
            phase,
            ear: Some(Ear::Both),
            iteration,
            max_iterations: 15,
            current_frequency_hz: Some(4000.0),
            step_size_octaves: Some(2.0),
            consecutive_correct: 0,
        }
    }

    #[test]
    fn test_phase_predicates() {
        assert!(!MatchPhase::Idle.is_running());
        assert!(MatchPhase::AwaitingTrial.is_running());
        assert!(MatchPhase::AwaitingSelection.is_running());
        assert!(MatchPhase::Converged.is_terminal());
        assert!(MatchPhase::MaxIterationsReached.is_terminal());
        assert!(!MatchPhase::AwaitingSelection.is_terminal());
    }

    #[test]
    fn test_percentage() {
        assert_eq!(progress(MatchPhase::AwaitingTrial, 0).percentage(), 0);
        assert_eq!(progress(MatchPhase::AwaitingSelection, 3).percentage(), 20);
        assert_eq!(progress(MatchPhase::Converged, 9).percentage(), 100);
        assert_eq!(CalibrationProgress::idle(0).percentage(), 0);
    }

    #[test]
    fn test_idle_progress() {
        let idle = CalibrationProgress::idle(15);
        assert_eq!(idle.phase, MatchPhase::Idle);
        assert!(idle.ear.is_none());
        assert!(idle.current_frequency_hz.is_none());
    }
}

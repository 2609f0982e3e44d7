// StaircaseController - adaptive 3AFC pitch-matching workflow
//
// The controller owns CalibrationState for one run and is its only writer.
// Each trial offers three tones (lower, center, upper) spaced by the current
// step in octaves. Picking the center tone confirms the estimate and halves
// the step; picking another tone moves the center there and shrinks the step
// more gently. The run ends when a confirmation run at fine precision is
// observed, or when the iteration budget is spent.

use crate::calibration::octave_guard::OctaveGuard;
use crate::calibration::progress::{CalibrationProgress, MatchPhase};
use crate::calibration::scoring;
use crate::calibration::shuffle::Shuffler;
use crate::calibration::state::{
    now_ms, CalibrationState, Ear, MatchOutcome, TestResult, TestSet, TrialRecord,
};
use crate::config::MatchingConfig;
use crate::error::{log_calibration_error, CalibrationError};

#[path = "procedure_factory.rs"]
mod factory;

#[cfg(test)]
#[path = "procedure_tests.rs"]
mod tests;

/// Index of the center tone before shuffling: [lower, center, upper]
const CENTER_SLOT: usize = 1;

/// What `next_trial` produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrialStep {
    /// Present this set and collect a selection
    Trial(TestSet),
    /// Iteration budget exhausted; call `get_result`
    Finished,
}

/// What `submit_response` concluded
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseSummary {
    pub record: TrialRecord,
    pub phase: MatchPhase,
}

impl ResponseSummary {
    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }
}

/// Adaptive staircase over frequency
pub struct StaircaseController {
    config: MatchingConfig,
    guard: OctaveGuard,
    shuffler: Box<dyn Shuffler>,
    phase: MatchPhase,
    ear: Ear,
    state: Option<CalibrationState>,
    active_set: Option<TestSet>,
    result: Option<TestResult>,
}

impl StaircaseController {
    /// Begin a fresh test
    ///
    /// # Arguments
    /// * `ear` - Ear the tones are routed to
    /// * `initial_frequency_hz` - Starting estimate, clamped into bounds;
    ///   `None` uses the configured default
    ///
    /// # Errors
    /// `AlreadyInProgress` if a test is running on this controller. A
    /// terminal or idle controller may be restarted.
    pub fn start(
        &mut self,
        ear: Ear,
        initial_frequency_hz: Option<f64>,
    ) -> Result<(), CalibrationError> {
        if self.phase.is_running() {
            let err = CalibrationError::AlreadyInProgress;
            log_calibration_error(&err, "start");
            return Err(err);
        }

        let requested = initial_frequency_hz.unwrap_or(self.config.initial_frequency_hz);
        let start_hz = self.config.clamp_frequency(requested);

        self.ear = ear;
        self.state = Some(CalibrationState::new(
            start_hz,
            self.config.initial_step_octaves,
        ));
        self.active_set = None;
        self.result = None;
        self.phase = MatchPhase::AwaitingTrial;

        tracing::info!(
            "[StaircaseController] Started {} ear at {:.1} Hz (requested {:.1} Hz), step {:.2} oct",
            ear.display_name(),
            start_hz,
            requested,
            self.config.initial_step_octaves
        );
        Ok(())
    }

    /// Produce the next candidate triplet
    ///
    /// Increments the iteration counter. Once it passes `max_iterations` the
    /// run is marked `MaxIterationsReached` and `TrialStep::Finished` is
    /// returned instead of a set.
    ///
    /// # Errors
    /// `InvalidState` when no test is running or when the previous set has
    /// not been answered yet.
    pub fn next_trial(&mut self) -> Result<TrialStep, CalibrationError> {
        match self.phase {
            MatchPhase::AwaitingTrial => {}
            MatchPhase::AwaitingSelection => {
                return Err(CalibrationError::invalid_state(
                    "previous trial has not been answered",
                ))
            }
            phase => {
                return Err(CalibrationError::invalid_state(format!(
                    "next_trial called while {}",
                    phase.display_name()
                )))
            }
        }

        let state = self.running_state_mut()?;
        state.iteration += 1;
        let iteration = state.iteration;
        let center = state.current_frequency_hz;
        let step = state.step_size_octaves;

        if iteration > self.config.max_iterations {
            self.finish(MatchPhase::MaxIterationsReached);
            return Ok(TrialStep::Finished);
        }

        let test_set = self.build_test_set(center, step, iteration);
        tracing::debug!(
            "[StaircaseController] Trial {}: {:?} (target index {})",
            iteration,
            test_set.frequencies,
            test_set.target_index
        );

        self.active_set = Some(test_set);
        self.phase = MatchPhase::AwaitingSelection;
        Ok(TrialStep::Trial(test_set))
    }

    /// Score the listener's choice for the active set
    ///
    /// # Arguments
    /// * `selection` - Index into the active set's `frequencies` (0, 1 or 2)
    ///
    /// # Errors
    /// * `InvalidArgument` for a selection outside 0..=2; the set stays
    ///   active and nothing is recorded
    /// * `InvalidState` when no set is awaiting a selection
    pub fn submit_response(&mut self, selection: usize) -> Result<ResponseSummary, CalibrationError> {
        let test_set = match (self.phase, self.active_set) {
            (MatchPhase::AwaitingSelection, Some(set)) => set,
            _ => {
                let err = CalibrationError::invalid_state("no trial is awaiting a selection");
                log_calibration_error(&err, "submit_response");
                return Err(err);
            }
        };

        if selection >= test_set.frequencies.len() {
            return Err(CalibrationError::invalid_argument(format!(
                "selection {} outside 0..={}",
                selection,
                test_set.frequencies.len() - 1
            )));
        }

        let config = self.config.clone();
        let state = self.running_state_mut()?;

        let selected = test_set.frequencies[selection];
        let was_correct = selection == test_set.target_index;
        let record = TrialRecord {
            iteration: test_set.iteration,
            selected_frequency_hz: selected,
            target_frequency_hz: test_set.target_frequency_hz,
            was_correct,
            step_size_octaves: test_set.step_size_octaves,
        };
        state.history.push(record);

        if was_correct {
            state.step_size_octaves =
                (state.step_size_octaves * config.confirm_shrink_factor).max(config.min_step_octaves);
        } else {
            state.current_frequency_hz = config.clamp_frequency(selected);
            state.step_size_octaves =
                (state.step_size_octaves * config.redirect_shrink_factor).max(config.min_step_octaves);
        }

        let converged = scoring::has_converged(&state.history, state.step_size_octaves, &config);
        let exhausted = state.iteration >= config.max_iterations;

        tracing::debug!(
            "[StaircaseController] Trial {} answered {} ({:.1} Hz): center {:.1} Hz, step {:.3} oct",
            record.iteration,
            if was_correct { "center" } else { "redirect" },
            selected,
            state.current_frequency_hz,
            state.step_size_octaves
        );

        self.active_set = None;
        if converged {
            self.finish(MatchPhase::Converged);
        } else if exhausted {
            self.finish(MatchPhase::MaxIterationsReached);
        } else {
            self.phase = MatchPhase::AwaitingTrial;
        }

        Ok(ResponseSummary {
            record,
            phase: self.phase,
        })
    }

    /// Final estimate for a finished test
    ///
    /// The result is computed once and cached, so repeated calls return
    /// identical values including the timestamp.
    ///
    /// # Errors
    /// `NotComplete` unless the phase is `Converged` or `MaxIterationsReached`.
    pub fn get_result(&mut self) -> Result<TestResult, CalibrationError> {
        if !self.phase.is_terminal() {
            return Err(CalibrationError::NotComplete);
        }
        if let Some(result) = &self.result {
            return Ok(result.clone());
        }

        let outcome = match self.phase {
            MatchPhase::Converged => MatchOutcome::Converged,
            _ => MatchOutcome::MaxIterationsReached,
        };
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| CalibrationError::invalid_state("terminal phase without state"))?;
        let score = scoring::score(&state.history, &self.config);

        let result = TestResult {
            frequency_hz: score.frequency_hz,
            confidence_percent: score.confidence_percent,
            iterations: state.history.len() as u32,
            history: state.history.clone(),
            ear: self.ear,
            timestamp_ms: now_ms(),
            outcome,
        };

        tracing::info!(
            "[StaircaseController] Result {:?}: {:.1} Hz, confidence {}%, {} trials",
            outcome,
            result.frequency_hz,
            result.confidence_percent,
            result.iterations
        );

        self.result = Some(result.clone());
        Ok(result)
    }

    /// Abort the current run and discard its state
    pub fn cancel(&mut self) {
        if self.phase.is_running() {
            tracing::info!("[StaircaseController] Test cancelled");
        }
        self.state = None;
        self.active_set = None;
        self.result = None;
        self.phase = MatchPhase::Idle;
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn ear(&self) -> Ear {
        self.ear
    }

    pub fn state(&self) -> Option<&CalibrationState> {
        self.state.as_ref()
    }

    /// Set awaiting the listener's choice, if any
    pub fn active_set(&self) -> Option<&TestSet> {
        self.active_set.as_ref()
    }

    pub fn config(&self) -> &MatchingConfig {
        &self.config
    }

    pub fn progress(&self) -> CalibrationProgress {
        match &self.state {
            Some(state) => CalibrationProgress {
                phase: self.phase,
                ear: Some(self.ear),
                iteration: state.iteration.min(self.config.max_iterations),
                max_iterations: self.config.max_iterations,
                current_frequency_hz: Some(state.current_frequency_hz),
                step_size_octaves: Some(state.step_size_octaves),
                consecutive_correct: state.consecutive_correct(),
            },
            None => CalibrationProgress::idle(self.config.max_iterations),
        }
    }

    fn build_test_set(&mut self, center: f64, step: f64, iteration: u32) -> TestSet {
        let ratio = 2f64.powf(step);
        let lower = self.config.clamp_frequency(center / ratio);
        let upper = self.config.clamp_frequency(center * ratio);
        let (lower, upper) = self.guard.apply(lower, center, upper);

        let slots = [lower, center, upper];
        let mut order = [0usize, 1, 2];
        self.shuffler.shuffle(&mut order);

        let frequencies = order.map(|slot| slots[slot]);
        let target_index = order
            .iter()
            .position(|&slot| slot == CENTER_SLOT)
            .unwrap_or(CENTER_SLOT);

        TestSet {
            frequencies,
            target_frequency_hz: center,
            target_index,
            iteration,
            step_size_octaves: step,
        }
    }

    fn running_state_mut(&mut self) -> Result<&mut CalibrationState, CalibrationError> {
        self.state
            .as_mut()
            .ok_or_else(|| CalibrationError::invalid_state("no test running"))
    }

    fn finish(&mut self, phase: MatchPhase) {
        self.active_set = None;
        self.phase = phase;
        tracing::info!(
            "[StaircaseController] Test finished: {}",
            phase.display_name()
        );
    }
}

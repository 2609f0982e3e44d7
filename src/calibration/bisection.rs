// BisectionMatcher - quick pitch match by halving a frequency bracket
//
// The bracket starts at the configured bounds. Each probe sits at the
// bracket's geometric mean (its midpoint in octaves); the listener says
// whether their tinnitus is higher, lower, or a match. The run ends on a
// match, once the bracket is narrower than the target precision, or when
// the probe budget is spent.

use serde::{Deserialize, Serialize};

use crate::calibration::progress::MatchPhase;
use crate::calibration::scoring::MAX_CONFIDENCE_PERCENT;
use crate::calibration::state::{now_ms, Ear, MatchOutcome, TestResult, TrialRecord};
use crate::config::{AppConfig, MatchingConfig};
use crate::error::{log_calibration_error, CalibrationError};

/// Listener's answer to a single probe tone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BisectionAnswer {
    /// Tinnitus is higher than the probe
    Higher,
    /// Tinnitus is lower than the probe
    Lower,
    Match,
}

impl std::str::FromStr for BisectionAnswer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "higher" | "h" | "+" => Ok(BisectionAnswer::Higher),
            "lower" | "l" | "-" => Ok(BisectionAnswer::Lower),
            "match" | "m" | "=" => Ok(BisectionAnswer::Match),
            other => Err(format!("unknown answer '{}', expected higher|lower|match", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bracket {
    low_hz: f64,
    high_hz: f64,
}

impl Bracket {
    fn probe(&self) -> f64 {
        (self.low_hz * self.high_hz).sqrt()
    }

    fn width_octaves(&self) -> f64 {
        (self.high_hz / self.low_hz).log2()
    }
}

pub struct BisectionMatcher {
    config: MatchingConfig,
    phase: MatchPhase,
    ear: Ear,
    bracket: Bracket,
    probe_hz: Option<f64>,
    history: Vec<TrialRecord>,
    final_hz: Option<f64>,
    result: Option<TestResult>,
}

impl BisectionMatcher {
    /// # Errors
    /// `InvalidConfig` if the configuration fails validation
    pub fn new(config: &AppConfig) -> Result<Self, CalibrationError> {
        config.validate()?;
        let matching = config.matching.clone();
        let bracket = Bracket {
            low_hz: matching.min_frequency_hz,
            high_hz: matching.max_frequency_hz,
        };
        Ok(Self {
            config: matching,
            phase: MatchPhase::Idle,
            ear: Ear::Both,
            bracket,
            probe_hz: None,
            history: Vec::new(),
            final_hz: None,
            result: None,
        })
    }

    /// Begin a run and return the first probe frequency
    pub fn start(&mut self, ear: Ear) -> Result<f64, CalibrationError> {
        if self.phase.is_running() {
            let err = CalibrationError::AlreadyInProgress;
            log_calibration_error(&err, "bisection_start");
            return Err(err);
        }

        self.ear = ear;
        self.bracket = Bracket {
            low_hz: self.config.min_frequency_hz,
            high_hz: self.config.max_frequency_hz,
        };
        self.history.clear();
        self.final_hz = None;
        self.result = None;

        let probe = self.bracket.probe();
        self.probe_hz = Some(probe);
        self.phase = MatchPhase::AwaitingSelection;

        tracing::info!(
            "[BisectionMatcher] Started {} ear, bracket [{:.0}, {:.0}] Hz, first probe {:.1} Hz",
            ear.display_name(),
            self.bracket.low_hz,
            self.bracket.high_hz,
            probe
        );
        Ok(probe)
    }

    /// Probe awaiting an answer, if any
    pub fn current_probe(&self) -> Option<f64> {
        self.probe_hz
    }

    /// Narrow the bracket with the listener's answer
    ///
    /// # Returns
    /// The next probe frequency, or `None` once the run has finished.
    ///
    /// # Errors
    /// `InvalidState` when no probe is awaiting an answer.
    pub fn submit(&mut self, answer: BisectionAnswer) -> Result<Option<f64>, CalibrationError> {
        let probe = match (self.phase, self.probe_hz) {
            (MatchPhase::AwaitingSelection, Some(probe)) => probe,
            _ => {
                let err = CalibrationError::invalid_state("no probe is awaiting an answer");
                log_calibration_error(&err, "bisection_submit");
                return Err(err);
            }
        };

        self.history.push(TrialRecord {
            iteration: self.history.len() as u32 + 1,
            selected_frequency_hz: probe,
            target_frequency_hz: probe,
            was_correct: answer == BisectionAnswer::Match,
            step_size_octaves: self.bracket.width_octaves(),
        });

        match answer {
            BisectionAnswer::Higher => self.bracket.low_hz = probe,
            BisectionAnswer::Lower => self.bracket.high_hz = probe,
            BisectionAnswer::Match => {
                self.finish(MatchPhase::Converged, probe);
                return Ok(None);
            }
        }

        if self.bracket.width_octaves() <= self.config.target_precision_octaves {
            self.finish(MatchPhase::Converged, self.bracket.probe());
            return Ok(None);
        }
        if self.history.len() as u32 >= self.config.max_iterations {
            self.finish(MatchPhase::MaxIterationsReached, self.bracket.probe());
            return Ok(None);
        }

        let next = self.bracket.probe();
        self.probe_hz = Some(next);
        tracing::debug!(
            "[BisectionMatcher] {:?} at {:.1} Hz, bracket [{:.1}, {:.1}] Hz, next {:.1} Hz",
            answer,
            probe,
            self.bracket.low_hz,
            self.bracket.high_hz,
            next
        );
        Ok(Some(next))
    }

    /// Final estimate; cached so repeated calls are identical
    ///
    /// An explicit match scores the confidence ceiling. Otherwise confidence
    /// falls with the bracket's half-width relative to its center.
    pub fn get_result(&mut self) -> Result<TestResult, CalibrationError> {
        if !self.phase.is_terminal() {
            return Err(CalibrationError::NotComplete);
        }
        if let Some(result) = &self.result {
            return Ok(result.clone());
        }

        let frequency_hz = self
            .final_hz
            .ok_or_else(|| CalibrationError::invalid_state("terminal phase without estimate"))?;
        let matched = self.history.last().is_some_and(|record| record.was_correct);
        let confidence_percent = if matched {
            MAX_CONFIDENCE_PERCENT
        } else {
            bracket_confidence(self.bracket.width_octaves())
        };

        let result = TestResult {
            frequency_hz,
            confidence_percent,
            iterations: self.history.len() as u32,
            history: self.history.clone(),
            ear: self.ear,
            timestamp_ms: now_ms(),
            outcome: match self.phase {
                MatchPhase::Converged => MatchOutcome::Converged,
                _ => MatchOutcome::MaxIterationsReached,
            },
        };

        tracing::info!(
            "[BisectionMatcher] Result: {:.1} Hz, confidence {}%, {} probes",
            result.frequency_hz,
            result.confidence_percent,
            result.iterations
        );
        self.result = Some(result.clone());
        Ok(result)
    }

    pub fn cancel(&mut self) {
        if self.phase.is_running() {
            tracing::info!("[BisectionMatcher] Run cancelled");
        }
        self.phase = MatchPhase::Idle;
        self.probe_hz = None;
        self.history.clear();
        self.final_hz = None;
        self.result = None;
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    /// Current bracket as `(low_hz, high_hz)`
    pub fn bracket(&self) -> (f64, f64) {
        (self.bracket.low_hz, self.bracket.high_hz)
    }

    fn finish(&mut self, phase: MatchPhase, frequency_hz: f64) {
        self.phase = phase;
        self.probe_hz = None;
        self.final_hz = Some(frequency_hz);
        tracing::info!(
            "[BisectionMatcher] Finished {} at {:.1} Hz",
            phase.display_name(),
            frequency_hz
        );
    }
}

/// Same shape as the staircase confidence: the bracket's relative half-width
/// plays the role of the coefficient of variation
fn bracket_confidence(width_octaves: f64) -> u8 {
    let relative_half_width = 2f64.powf(width_octaves / 2.0) - 1.0;
    let raw = (100.0 * (1.0 - 2.0 * relative_half_width)).round();
    raw.clamp(0.0, MAX_CONFIDENCE_PERCENT as f64) as u8
}

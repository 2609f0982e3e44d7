use super::{MatchPhase, OctaveGuard, Shuffler, StaircaseController};
use crate::calibration::shuffle::FisherYatesShuffler;
use crate::calibration::state::Ear;
use crate::config::AppConfig;
use crate::error::CalibrationError;

impl StaircaseController {
    /// Create a controller with a validated configuration
    ///
    /// # Arguments
    /// * `config` - Matching and guard parameters (playback is ignored here)
    /// * `shuffler` - Presentation-order source
    ///
    /// # Errors
    /// `InvalidConfig` if the configuration fails validation
    pub fn new(config: &AppConfig, shuffler: Box<dyn Shuffler>) -> Result<Self, CalibrationError> {
        config.validate()?;
        Ok(Self::build(config, shuffler))
    }

    /// Create with default configuration and an entropy-seeded shuffle
    pub fn new_default() -> Self {
        Self::build(
            &AppConfig::default(),
            Box::new(FisherYatesShuffler::from_entropy()),
        )
    }

    /// Create with a reproducible shuffle sequence
    pub fn seeded(config: &AppConfig, seed: u64) -> Result<Self, CalibrationError> {
        Self::new(config, Box::new(FisherYatesShuffler::seeded(seed)))
    }

    /// Replace the shuffler; only allowed between runs
    pub fn set_shuffler(&mut self, shuffler: Box<dyn Shuffler>) -> Result<(), CalibrationError> {
        if self.phase.is_running() {
            return Err(CalibrationError::AlreadyInProgress);
        }
        self.shuffler = shuffler;
        Ok(())
    }

    fn build(config: &AppConfig, shuffler: Box<dyn Shuffler>) -> Self {
        Self {
            config: config.matching.clone(),
            guard: OctaveGuard::new(config.octave_guard.clone(), &config.matching),
            shuffler,
            phase: MatchPhase::Idle,
            ear: Ear::Both,
            state: None,
            active_set: None,
            result: None,
        }
    }
}

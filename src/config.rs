//! Configuration management for the pitch matcher
//!
//! All values are fixed for the lifetime of one test: the controller and
//! presenter take a snapshot at construction and never re-read it. Values
//! can be loaded from a JSON file for tuning without recompilation; any
//! missing field falls back to its default.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::CalibrationError;

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub matching: MatchingConfig,
    pub playback: PlaybackConfig,
    pub octave_guard: OctaveGuardConfig,
}

/// Staircase search parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Starting center frequency when the caller does not supply one
    pub initial_frequency_hz: f64,
    /// Lower frequency bound for every candidate tone
    pub min_frequency_hz: f64,
    /// Upper frequency bound for every candidate tone
    pub max_frequency_hz: f64,
    /// Search half-width at the start of a test
    pub initial_step_octaves: f64,
    /// Step size floor (0.05 octave is roughly a 3.5% frequency change)
    pub min_step_octaves: f64,
    /// Step size at or below which a confirmation run counts as converged
    pub target_precision_octaves: f64,
    /// Trials presented before the test gives up on converging
    pub max_iterations: u32,
    /// Step multiplier after the listener confirms the center tone
    pub confirm_shrink_factor: f64,
    /// Step multiplier after the listener redirects to another tone
    pub redirect_shrink_factor: f64,
    /// Consecutive confirmations needed for convergence
    pub confirmation_run: usize,
    /// Number of most recent trials used for the final estimate
    pub scoring_window: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            initial_frequency_hz: 4000.0,
            min_frequency_hz: 250.0,
            max_frequency_hz: 16000.0,
            initial_step_octaves: 2.0,
            min_step_octaves: 0.05,
            target_precision_octaves: 0.1,
            max_iterations: 15,
            confirm_shrink_factor: 0.5,
            redirect_shrink_factor: 0.7,
            confirmation_run: 3,
            scoring_window: 5,
        }
    }
}

impl MatchingConfig {
    /// Clamp a frequency into the configured bounds
    pub fn clamp_frequency(&self, frequency_hz: f64) -> f64 {
        frequency_hz.clamp(self.min_frequency_hz, self.max_frequency_hz)
    }
}

/// Tone presentation timing and level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub tone_duration_ms: u64,
    pub pause_between_tones_ms: u64,
    pub pause_after_set_ms: u64,
    /// Test tone level in dBFS
    pub test_volume_db: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            tone_duration_ms: 800,
            pause_between_tones_ms: 300,
            pause_after_set_ms: 1000,
            test_volume_db: -10.0,
        }
    }
}

impl PlaybackConfig {
    pub fn tone_duration(&self) -> Duration {
        Duration::from_millis(self.tone_duration_ms)
    }

    pub fn pause_between_tones(&self) -> Duration {
        Duration::from_millis(self.pause_between_tones_ms)
    }

    pub fn pause_after_set(&self) -> Duration {
        Duration::from_millis(self.pause_after_set_ms)
    }

    /// Wall-clock length of one full trial presentation
    pub fn trial_duration(&self) -> Duration {
        self.tone_duration() * 3 + self.pause_between_tones() * 2 + self.pause_after_set()
    }
}

/// Octave-confusion guard tuning
///
/// The defaults are empirical values; they are exposed so the guard can be
/// retuned without touching the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctaveGuardConfig {
    pub enabled: bool,
    /// Distance from a 2:1 ratio that counts as an octave
    pub ratio_threshold: f64,
    /// Multiplier applied to a lower bound sitting an octave below center
    pub lower_push_factor: f64,
    /// Multiplier applied to an upper bound sitting an octave above center
    pub upper_pull_factor: f64,
}

impl Default for OctaveGuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ratio_threshold: 0.15,
            lower_push_factor: 1.12,
            upper_pull_factor: 0.89,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults if the file is missing or
    /// the JSON is invalid.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the bundled assets directory
    pub fn load() -> Self {
        Self::load_from_file("assets/matcher_config.json")
    }

    /// Check that the values describe a usable search
    pub fn validate(&self) -> Result<(), CalibrationError> {
        let m = &self.matching;
        let invalid = |reason: String| Err(CalibrationError::InvalidConfig { reason });

        if !(m.min_frequency_hz > 0.0 && m.min_frequency_hz < m.max_frequency_hz) {
            return invalid(format!(
                "frequency bounds [{}, {}] must be positive and ordered",
                m.min_frequency_hz, m.max_frequency_hz
            ));
        }
        if !(m.min_step_octaves > 0.0 && m.min_step_octaves <= m.initial_step_octaves) {
            return invalid(format!(
                "step sizes must satisfy 0 < min ({}) <= initial ({})",
                m.min_step_octaves, m.initial_step_octaves
            ));
        }
        if m.target_precision_octaves < m.min_step_octaves {
            return invalid(format!(
                "target precision {} is below the step floor {} and can never be reached",
                m.target_precision_octaves, m.min_step_octaves
            ));
        }
        if m.max_iterations == 0 {
            return invalid("max_iterations must be at least 1".to_string());
        }
        for (name, factor) in [
            ("confirm_shrink_factor", m.confirm_shrink_factor),
            ("redirect_shrink_factor", m.redirect_shrink_factor),
        ] {
            if !(factor > 0.0 && factor <= 1.0) {
                return invalid(format!("{} {} must be in (0, 1]", name, factor));
            }
        }
        if m.confirmation_run == 0 || m.scoring_window == 0 {
            return invalid("confirmation_run and scoring_window must be non-zero".to_string());
        }

        let g = &self.octave_guard;
        if g.enabled && !(g.lower_push_factor > 1.0 && g.upper_pull_factor < 1.0) {
            return invalid(format!(
                "octave guard must push lower up (> 1, got {}) and pull upper down (< 1, got {})",
                g.lower_push_factor, g.upper_pull_factor
            ));
        }

        if self.playback.tone_duration_ms == 0 {
            return invalid("tone_duration_ms must be non-zero".to_string());
        }

        Ok(())
    }
}

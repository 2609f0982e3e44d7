// CalibrationState and value types for the pitch-matching staircase
//
// CalibrationState is owned by the StaircaseController and lives for one
// test run. TrialRecord, TestSet and TestResult are plain values that can
// be handed to the caller and serialized for persistence.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Ear the test tones are routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ear {
    Left,
    Right,
    Both,
}

impl Ear {
    /// Stereo pan position in [-1.0, 1.0]
    pub fn pan(&self) -> f32 {
        match self {
            Ear::Left => -1.0,
            Ear::Right => 1.0,
            Ear::Both => 0.0,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Ear::Left => "LEFT",
            Ear::Right => "RIGHT",
            Ear::Both => "BOTH",
        }
    }
}

impl std::str::FromStr for Ear {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "left" | "l" => Ok(Ear::Left),
            "right" | "r" => Ok(Ear::Right),
            "both" | "b" => Ok(Ear::Both),
            other => Err(format!("unknown ear '{}', expected left|right|both", other)),
        }
    }
}

/// One completed trial. Immutable once appended to the history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialRecord {
    pub iteration: u32,
    /// Frequency of the tone the listener picked
    pub selected_frequency_hz: f64,
    /// Center estimate presented during this trial
    pub target_frequency_hz: f64,
    /// True iff the listener picked the center tone
    pub was_correct: bool,
    pub step_size_octaves: f64,
}

/// Candidate triplet for a single trial
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSet {
    /// Presentation order
    pub frequencies: [f64; 3],
    pub target_frequency_hz: f64,
    /// Position of the center estimate within `frequencies`
    pub target_index: usize,
    pub iteration: u32,
    pub step_size_octaves: f64,
}

/// How a test run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchOutcome {
    Converged,
    MaxIterationsReached,
}

/// Terminal output of a pitch-matching run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub frequency_hz: f64,
    /// In [0, 95]
    pub confidence_percent: u8,
    pub iterations: u32,
    pub history: Vec<TrialRecord>,
    pub ear: Ear,
    pub timestamp_ms: i64,
    pub outcome: MatchOutcome,
}

impl TestResult {
    /// Load a result snapshot from a JSON file
    pub fn load(path: &std::path::Path) -> std::io::Result<Self> {
        let data = std::fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(std::io::Error::other)
    }

    /// Persist a result snapshot as pretty JSON
    pub fn save(&self, path: &std::path::Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
        tracing::info!("[TestResult] Saved pitch match result to {:?}", path);
        Ok(())
    }
}

/// Milliseconds since the Unix epoch, for result timestamps
pub(crate) fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Mutable search state for one run
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationState {
    pub current_frequency_hz: f64,
    pub step_size_octaves: f64,
    pub iteration: u32,
    pub history: Vec<TrialRecord>,
}

impl CalibrationState {
    pub fn new(current_frequency_hz: f64, step_size_octaves: f64) -> Self {
        Self {
            current_frequency_hz,
            step_size_octaves,
            iteration: 0,
            history: Vec::new(),
        }
    }

    /// Number of most recent records that confirmed the center tone
    pub fn consecutive_correct(&self) -> usize {
        self.history
            .iter()
            .rev()
            .take_while(|record| record.was_correct)
            .count()
    }
}

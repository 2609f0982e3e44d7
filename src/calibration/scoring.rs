// Convergence detection and final scoring
//
// Convergence needs both a run of confirmations and a fine step: either on
// its own is not enough. The final estimate is a recency-weighted mean of
// the last few selections, and confidence falls with their spread.

use crate::calibration::state::TrialRecord;
use crate::config::MatchingConfig;

/// Confidence ceiling; no psychoacoustic measurement is fully reliable
pub const MAX_CONFIDENCE_PERCENT: u8 = 95;

/// Final estimate derived from a trial history
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    pub frequency_hz: f64,
    pub confidence_percent: u8,
}

/// True when the last `confirmation_run` trials all confirmed the center
/// tone and the step has reached the target precision.
pub fn has_converged(
    history: &[TrialRecord],
    step_size_octaves: f64,
    config: &MatchingConfig,
) -> bool {
    let run = config.confirmation_run;
    if history.len() < run {
        return false;
    }

    let confirmed = history[history.len() - run..]
        .iter()
        .all(|record| record.was_correct);

    confirmed && step_size_octaves <= config.target_precision_octaves
}

/// Recency-weighted mean of the window's selections
///
/// Record `i` (oldest first) carries weight `(i + 1) / window`.
pub fn weighted_frequency(window: &[TrialRecord]) -> f64 {
    assert!(!window.is_empty(), "weighted_frequency on empty window");

    let size = window.len() as f64;
    let (weighted_sum, weight_total) = window.iter().enumerate().fold(
        (0.0, 0.0),
        |(sum, total), (i, record)| {
            let weight = (i as f64 + 1.0) / size;
            (sum + record.selected_frequency_hz * weight, total + weight)
        },
    );

    weighted_sum / weight_total
}

/// Confidence from the coefficient of variation of the window's selections
pub fn confidence_percent(window: &[TrialRecord], final_frequency_hz: f64) -> u8 {
    assert!(!window.is_empty(), "confidence_percent on empty window");

    let n = window.len() as f64;
    let mean = window.iter().map(|r| r.selected_frequency_hz).sum::<f64>() / n;
    let variance = window
        .iter()
        .map(|r| (r.selected_frequency_hz - mean).powi(2))
        .sum::<f64>()
        / n;
    let coefficient_of_variation = variance.sqrt() / final_frequency_hz;

    let raw = (100.0 * (1.0 - coefficient_of_variation * 2.0)).round();
    raw.clamp(0.0, MAX_CONFIDENCE_PERCENT as f64) as u8
}

/// Score a completed history
///
/// # Panics
/// Panics on an empty history; reaching scoring without a single trial is a
/// controller bug.
pub fn score(history: &[TrialRecord], config: &MatchingConfig) -> Score {
    assert!(
        !history.is_empty(),
        "scoring requires at least one completed trial"
    );

    let window_len = config.scoring_window.min(history.len());
    let window = &history[history.len() - window_len..];
    let frequency_hz = weighted_frequency(window);

    Score {
        frequency_hz,
        confidence_percent: confidence_percent(window, frequency_hz),
    }
}

// Octave-confusion guard
//
// Listeners often confuse tones an octave apart. The guard nudges the lower
// and upper candidates of a trial so that no pair sits within the configured
// distance of a 2:1 ratio. It is a pure function of its inputs.

use crate::config::{MatchingConfig, OctaveGuardConfig};

/// Upper bound on nudges per bound, so a mistuned config cannot loop
const MAX_NUDGES: usize = 3;

/// Stateless perturbation of candidate bounds
#[derive(Debug, Clone)]
pub struct OctaveGuard {
    config: OctaveGuardConfig,
    min_frequency_hz: f64,
    max_frequency_hz: f64,
}

impl OctaveGuard {
    pub fn new(config: OctaveGuardConfig, matching: &MatchingConfig) -> Self {
        Self {
            config,
            min_frequency_hz: matching.min_frequency_hz,
            max_frequency_hz: matching.max_frequency_hz,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// True if `a` and `b` are within the threshold of an exact octave
    pub fn is_near_octave(&self, a: f64, b: f64) -> bool {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        if lo <= 0.0 {
            return false;
        }
        ((hi / lo) - 2.0).abs() < self.config.ratio_threshold
    }

    /// Adjust `(lower, upper)` around `center`
    ///
    /// A bound an octave from center is nudged by its factor until it
    /// leaves the window; a ratio just above 2.0 can need a second nudge.
    /// Bounds are re-clamped after every nudge. Returns the inputs unchanged
    /// when the guard is disabled.
    pub fn apply(&self, lower: f64, center: f64, upper: f64) -> (f64, f64) {
        if !self.config.enabled {
            return (lower, upper);
        }

        let mut lower = lower;
        let mut upper = upper;

        for _ in 0..MAX_NUDGES {
            if !self.is_near_octave(lower, center) {
                break;
            }
            lower = self.clamp(lower * self.config.lower_push_factor);
        }
        for _ in 0..MAX_NUDGES {
            if !self.is_near_octave(center, upper) {
                break;
            }
            upper = self.clamp(upper * self.config.upper_pull_factor);
        }

        // At a half-octave step the outer pair lands on 2:1 even though
        // neither bound is an octave from center. Move whichever bound ends
        // up farther from center; neither may reach or cross it.
        for _ in 0..MAX_NUDGES * 2 {
            if !self.is_near_octave(lower, upper) {
                break;
            }
            let pulled = self.clamp(upper * self.config.upper_pull_factor);
            let pushed = self.clamp(lower * self.config.lower_push_factor);
            let upper_gap = (pulled / center).log2();
            let lower_gap = (center / pushed).log2();
            if upper_gap <= 0.0 && lower_gap <= 0.0 {
                break;
            }
            if upper_gap >= lower_gap {
                upper = pulled;
            } else {
                lower = pushed;
            }
        }

        (lower, upper)
    }

    fn clamp(&self, frequency_hz: f64) -> f64 {
        frequency_hz.clamp(self.min_frequency_hz, self.max_frequency_hz)
    }
}

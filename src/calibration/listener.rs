// SimulatedListener - deterministic virtual subject
//
// Stands in for a human when driving the staircase or the bisection matcher
// without audio: the CLI's simulate command and the integration tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::calibration::bisection::BisectionAnswer;
use crate::calibration::state::TestSet;

/// Distance below which a bisection probe counts as a match
const MATCH_TOLERANCE_OCTAVES: f64 = 1.0 / 24.0;

#[derive(Debug, Clone)]
pub struct SimulatedListener {
    true_pitch_hz: f64,
    /// Probability of answering at random instead of truthfully
    error_rate: f64,
    rng: StdRng,
}

impl SimulatedListener {
    pub fn new(true_pitch_hz: f64, error_rate: f64, seed: u64) -> Self {
        Self {
            true_pitch_hz,
            error_rate: error_rate.clamp(0.0, 1.0),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// A listener that never errs
    pub fn perfect(true_pitch_hz: f64) -> Self {
        Self::new(true_pitch_hz, 0.0, 0)
    }

    pub fn true_pitch_hz(&self) -> f64 {
        self.true_pitch_hz
    }

    /// Pick the candidate closest in octaves to the true pitch; on a lapse,
    /// pick one of the other two
    pub fn choose(&mut self, test_set: &TestSet) -> usize {
        let closest = test_set
            .frequencies
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                self.distance_octaves(**a)
                    .total_cmp(&self.distance_octaves(**b))
            })
            .map(|(index, _)| index)
            .unwrap_or(0);

        if self.lapses() {
            let offset = self.rng.gen_range(1..test_set.frequencies.len());
            (closest + offset) % test_set.frequencies.len()
        } else {
            closest
        }
    }

    /// Compare a single probe tone against the true pitch
    pub fn compare(&mut self, probe_hz: f64) -> BisectionAnswer {
        let truthful = if self.distance_octaves(probe_hz) <= MATCH_TOLERANCE_OCTAVES {
            BisectionAnswer::Match
        } else if self.true_pitch_hz > probe_hz {
            BisectionAnswer::Higher
        } else {
            BisectionAnswer::Lower
        };

        if self.lapses() {
            match truthful {
                BisectionAnswer::Higher => BisectionAnswer::Lower,
                _ => BisectionAnswer::Higher,
            }
        } else {
            truthful
        }
    }

    fn distance_octaves(&self, frequency_hz: f64) -> f64 {
        (frequency_hz / self.true_pitch_hz).log2().abs()
    }

    fn lapses(&mut self) -> bool {
        self.error_rate > 0.0 && self.rng.gen_bool(self.error_rate)
    }
}

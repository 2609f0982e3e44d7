// Presentation-order shuffling
//
// The controller never calls an RNG directly; it asks an injected Shuffler
// to permute candidate indices. Production uses an unbiased Fisher-Yates
// shuffle, tests inject a seeded generator or a fixed permutation.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Permutation source for candidate presentation order
pub trait Shuffler: Send {
    /// Permute `order` in place
    fn shuffle(&mut self, order: &mut [usize]);
}

impl<F> Shuffler for F
where
    F: FnMut(&mut [usize]) + Send,
{
    fn shuffle(&mut self, order: &mut [usize]) {
        self(order)
    }
}

/// Fisher-Yates shuffle over a `StdRng`
pub struct FisherYatesShuffler {
    rng: StdRng,
}

impl FisherYatesShuffler {
    /// Seeded from OS entropy
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Reproducible sequence for a given seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for FisherYatesShuffler {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl Shuffler for FisherYatesShuffler {
    fn shuffle(&mut self, order: &mut [usize]) {
        SliceRandom::shuffle(order, &mut self.rng);
    }
}

/// Leaves the order untouched: lower, center, upper
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityShuffler;

impl Shuffler for IdentityShuffler {
    fn shuffle(&mut self, _order: &mut [usize]) {}
}

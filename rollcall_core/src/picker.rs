//! Uniform winner selection.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::roster::{Roster, StudentId};

/// Anything that can choose one student out of a roster.
///
/// The machine calls [`pick`](WinnerPicker::pick) exactly once per
/// Spinning → Selecting transition.
pub trait WinnerPicker {
    fn pick(&mut self, roster: &Roster) -> StudentId;
}

/// Uniform over `[0, N)` using any `rand` generator.
#[derive(Clone, Debug)]
pub struct RandomPicker<R = StdRng> {
    rng: R,
}

impl RandomPicker<StdRng> {
    /// Seeded from OS entropy.
    pub fn from_entropy() -> Self {
        RandomPicker { rng: StdRng::from_entropy() }
    }

    /// Deterministic sequence, for tests and reproducible demos.
    pub fn seeded(seed: u64) -> Self {
        RandomPicker { rng: StdRng::seed_from_u64(seed) }
    }
}

impl<R: Rng> RandomPicker<R> {
    pub fn with_rng(rng: R) -> Self {
        RandomPicker { rng }
    }
}

impl<R: Rng> WinnerPicker for RandomPicker<R> {
    fn pick(&mut self, roster: &Roster) -> StudentId {
        let index = self.rng.gen_range(0..roster.len());
        roster.students()[index].id
    }
}

impl<P: WinnerPicker + ?Sized> WinnerPicker for Box<P> {
    fn pick(&mut self, roster: &Roster) -> StudentId {
        (**self).pick(roster)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════

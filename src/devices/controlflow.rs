//! Control flow integrity tracker.
//!
//! A random seed drawn at boot keys a one-way accumulator. Each transition
//! folds its target state into `currentflow`; before acting, the handler
//! replays the canonical boot sequence from the seed up to the same
//! transition and demands equality. A skipped, repeated or reordered
//! handler desynchronises the two values, which turns a glitched branch
//! into a detectable mismatch.
use nb::block;
use sha2::{Digest, Sha256};

use crate::{
    devices::automaton::State,
    error::{Convertible, Error},
    hal::rng::Rng,
    utilities::secbool::SecBool,
};

/// States a successful boot visits, in order.
pub static CANONICAL_FLOW: [State; 14] = [
    State::START,
    State::INIT,
    State::RDPCHECK,
    State::DFUWAIT,
    State::RDPCHECK,
    State::SELECTBANK,
    State::RDPCHECK,
    State::HDRCRC,
    State::RDPCHECK,
    State::FWINTEGRITY,
    State::RDPCHECK,
    State::FLASHLOCK,
    State::RDPCHECK,
    State::BOOTFW,
];

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct ControlFlow {
    controlflow: u64,
    currentflow: u64,
}

/// Keyed one-way step: the first 64 bits of SHA-256 over the seed, the
/// running value and the state pattern. Wrapping is irrelevant, only
/// equality of two independently derived values is ever checked.
fn fold(seed: u64, accumulator: u64, state: State) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(accumulator.to_le_bytes());
    hasher.update(state.bits().to_le_bytes());
    let digest = hasher.finalize();
    let mut word = [0u8; 8];
    word.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(word)
}

impl ControlFlow {
    /// Seeds the tracker from two hardware random draws.
    pub fn init_controlflow<R>(rng: &mut R) -> Result<Self, Error>
    where
        R: Rng,
        R::Error: Convertible,
    {
        let high = block!(rng.random_word())?;
        let low = block!(rng.random_word())?;
        Ok(Self::with_seed(((high as u64) << 32) | low as u64))
    }

    pub fn with_seed(seed: u64) -> Self { Self { controlflow: seed, currentflow: seed } }

    /// Folds the state the automaton is about to enter.
    pub fn update_flowstate(&mut self, next: State) {
        self.currentflow = fold(self.controlflow, self.currentflow, next);
    }

    /// Replays the canonical sequence up to the `previous -> next`
    /// transition and compares the result with the running accumulator.
    /// Pairs that never occur in a successful boot never match.
    #[inline(never)]
    pub fn calculate_flowstate(&self, previous: State, next: State) -> SecBool {
        let mut expected = self.controlflow;
        for pair in CANONICAL_FLOW.windows(2) {
            expected = fold(self.controlflow, expected, pair[1]);
            if pair[0] == previous && pair[1] == next {
                return SecBool::from(core::hint::black_box(expected) == self.currentflow);
            }
        }
        SecBool::FALSE
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hal::doubles::rng::FakeRng;

    const SEED: u64 = 0x1234_5678_9ABC_DEF0;

    /// Walks `sequence` the way the loader does and returns the verdict of
    /// every transition.
    fn walk(sequence: &[State]) -> Vec<bool> {
        let mut flow = ControlFlow::with_seed(SEED);
        sequence
            .windows(2)
            .map(|pair| {
                flow.update_flowstate(pair[1]);
                flow.calculate_flowstate(pair[0], pair[1]).is_true()
            })
            .collect()
    }

    #[test]
    fn canonical_pairs_are_unique() {
        let pairs: Vec<_> = CANONICAL_FLOW.windows(2).map(|pair| (pair[0], pair[1])).collect();
        for (index, pair) in pairs.iter().enumerate() {
            assert!(!pairs[index + 1..].contains(pair));
        }
    }

    #[test]
    fn canonical_sequence_passes_at_every_step() {
        assert!(walk(&CANONICAL_FLOW).into_iter().all(|verdict| verdict));
    }

    #[test]
    fn omitting_any_state_is_detected_right_after_the_gap() {
        for omitted in 1..CANONICAL_FLOW.len() - 1 {
            // Given
            let mut sequence = CANONICAL_FLOW.to_vec();
            sequence.remove(omitted);

            // When
            let verdicts = walk(&sequence);

            // Then
            assert!(verdicts[..omitted - 1].iter().all(|v| *v));
            assert!(!verdicts[omitted - 1], "omitting step {} went unnoticed", omitted);
        }
    }

    #[test]
    fn omitting_the_final_fold_is_detected() {
        let mut flow = ControlFlow::with_seed(SEED);
        for pair in CANONICAL_FLOW[..CANONICAL_FLOW.len() - 1].windows(2) {
            flow.update_flowstate(pair[1]);
        }
        assert!(!flow.calculate_flowstate(State::RDPCHECK, State::BOOTFW).is_true());
    }

    #[test]
    fn swapping_adjacent_states_is_detected() {
        for first in 1..CANONICAL_FLOW.len() - 1 {
            // Given
            let mut sequence = CANONICAL_FLOW.to_vec();
            sequence.swap(first, first + 1);

            // When
            let verdicts = walk(&sequence);

            // Then
            assert!(!verdicts[first - 1], "swapping step {} went unnoticed", first);
        }
    }

    #[test]
    fn accumulator_depends_on_the_seed() {
        let mut one = ControlFlow::with_seed(SEED);
        let mut other = ControlFlow::with_seed(SEED + 1);
        one.update_flowstate(State::INIT);
        other.update_flowstate(State::INIT);
        assert_ne!(one.currentflow, other.currentflow);
        assert!(other.calculate_flowstate(State::START, State::INIT).is_true());
    }

    #[test]
    fn seeding_concatenates_two_draws() {
        let mut rng = FakeRng::new(&[0xDEAD_BEEF, 0x0BAD_F00D]);
        let flow = ControlFlow::init_controlflow(&mut rng).unwrap();
        assert_eq!(flow, ControlFlow::with_seed(0xDEAD_BEEF_0BAD_F00D));
    }

    #[test]
    fn seeding_fails_when_the_generator_does() {
        let mut rng = FakeRng::new(&[0xDEAD_BEEF]);
        assert!(ControlFlow::init_controlflow(&mut rng).is_err());
    }
}

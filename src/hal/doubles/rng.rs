use super::error::FakeError;
use crate::hal::rng::Rng;
use std::collections::VecDeque;

/// Hands out a fixed sequence of words, then fails.
#[derive(Clone, Debug, Default)]
pub struct FakeRng {
    words: VecDeque<u32>,
}

impl FakeRng {
    pub fn new(words: &[u32]) -> Self { Self { words: words.iter().copied().collect() } }
}

impl Rng for FakeRng {
    type Error = FakeError;
    fn random_word(&mut self) -> nb::Result<u32, Self::Error> {
        self.words.pop_front().ok_or(nb::Error::Other(FakeError))
    }
}

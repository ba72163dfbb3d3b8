use rand::{
    RngCore,
    distr::{Distribution, Uniform},
};

use crate::shortid::{ALPHABET, GenerateShortId, SHORT_ID_LEN, ShortId};

/// Draws every symbol independently from the thread-local CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomShortId;

impl RandomShortId {
    /// Call at startup so any OS entropy blocking happens before serving.
    /// Only seeds the calling thread; other threads seed on first use.
    pub fn warm_up() {
        let mut rng = rand::rng();
        std::hint::black_box(rng.next_u32());
    }
}

impl GenerateShortId for RandomShortId {
    fn generate(&self) -> ShortId {
        let mut rng = rand::rng();
        // 64 symbols; a power of two, so sampling is unbiased.
        let dist = Uniform::new(0, ALPHABET.len()).expect("alphabet is non-empty");

        let raw = (0..SHORT_ID_LEN)
            .map(|_| ALPHABET[dist.sample(&mut rng)] as char)
            .collect();
        ShortId::from_generated(raw)
    }
}

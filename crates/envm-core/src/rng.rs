//! Seeded randomness for the sampling estimators.

use std::hash::Hasher;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use siphasher::sip::SipHasher13;

/// `StdRng` bound to one sampling batch of a master seed.
///
/// Batch streams are keyed by `(master_seed, batch)` through
/// [`derive_substream_seed`], which keeps an estimate reproducible on every
/// platform and for any thread count.
#[derive(Debug, Clone)]
pub struct RngHandle {
    rng: StdRng,
}

impl RngHandle {
    /// Stream seeded directly from `seed`, outside any batch schedule.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Stream of batch `batch` under `master_seed`.
    pub fn for_batch(master_seed: u64, batch: u64) -> Self {
        Self::from_seed(derive_substream_seed(master_seed, batch))
    }
}

impl RngCore for RngHandle {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.rng.fill_bytes(dest)
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.rng.try_fill_bytes(dest)
    }
}

/// Seed of batch `batch`: SipHash-1-3 under zero keys over both words.
pub fn derive_substream_seed(master_seed: u64, batch: u64) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0, 0);
    hasher.write_u64(master_seed);
    hasher.write_u64(batch);
    hasher.finish()
}

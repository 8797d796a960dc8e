//! Deterministic seeded randomness for HMM initialization.
//!
//! Training draws its initial parameters from a linear-congruential
//! generator (`state = state * 1664525 + 1013904223 mod 2^32`, output
//! `state / 2^32`). There is no process-wide seed: every training attempt
//! constructs its own `Lcg`, so parallel attempts never race on shared state
//! and a given `(base_seed, instrument_id, run)` always yields the same model.

use rand::{Error, RngCore, SeedableRng};

const MULTIPLIER: u32 = 1_664_525;
const INCREMENT: u32 = 1_013_904_223;
const TWO_POW_32: f64 = 4_294_967_296.0;

/// Seed for one training attempt: `base + instrument_id * 1000 + run`.
pub fn training_seed(base_seed: u64, instrument_id: u32, run: u32) -> u64 {
    base_seed
        .wrapping_add(u64::from(instrument_id).wrapping_mul(1000))
        .wrapping_add(u64::from(run))
}

/// Draw a value in `[0, 1)` from the next 32 bits of `rng`.
///
/// For [`Lcg`] this is exactly `state / 2^32` after one step.
pub fn unit_interval<R: RngCore + ?Sized>(rng: &mut R) -> f64 {
    f64::from(rng.next_u32()) / TWO_POW_32
}

/// 32-bit linear-congruential generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lcg {
    state: u32,
}

impl Lcg {
    /// Seeds are reduced modulo 2^32, which leaves the generated sequence
    /// unchanged since every step is itself taken modulo 2^32.
    pub fn new(seed: u64) -> Self {
        Self {
            state: (seed & 0xFFFF_FFFF) as u32,
        }
    }

    pub fn state(&self) -> u32 {
        self.state
    }

    /// Advance and return the next value in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        unit_interval(self)
    }
}

impl RngCore for Lcg {
    fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
        self.state
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.next_u32());
        let lo = u64::from(self.next_u32());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl SeedableRng for Lcg {
    type Seed = [u8; 4];

    fn from_seed(seed: Self::Seed) -> Self {
        Self {
            state: u32::from_le_bytes(seed),
        }
    }

    /// Use the integer seed directly instead of expanding it, so
    /// `Lcg::seed_from_u64(s)` and `Lcg::new(s)` agree.
    fn seed_from_u64(state: u64) -> Self {
        Self::new(state)
    }
}

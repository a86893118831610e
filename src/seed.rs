//! Seed resolution.

use rand::Rng;

/// The largest seed accepted by the demo, `2^31 - 1`.
pub const MAX_SEED: u32 = i32::MAX as u32;

/// Resolves the seed for a request. If `randomize` is set, a new seed is drawn uniformly from `0..=MAX_SEED` and
/// `seed` is ignored; otherwise `seed` is returned unchanged.
pub fn resolve_seed(seed: u32, randomize: bool) -> u32 {
	resolve_seed_using(seed, randomize, &mut rand::thread_rng())
}

/// Same as [`resolve_seed`], drawing from the given random number generator.
pub fn resolve_seed_using<R: Rng + ?Sized>(seed: u32, randomize: bool, rng: &mut R) -> u32 {
	if randomize { rng.gen_range(0..=MAX_SEED) } else { seed }
}

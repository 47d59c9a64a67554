//! Random sources for noise-based obfuscation.
//!
//! Every transform that draws noise takes an explicit `&mut impl Rng`. Nothing in the crate reads
//! a thread-local or global generator, so a seeded [`ChaCha8Rng`] makes a whole run reproducible.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp1};

/// Deterministic generator for a given seed.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Generator seeded from operating-system entropy.
pub fn entropy_rng() -> ChaCha8Rng {
    ChaCha8Rng::from_entropy()
}

/// Draw `u ~ Uniform[-half_width, +half_width]`.
pub fn sample_symmetric_uniform<R: Rng + ?Sized>(rng: &mut R, half_width: f64) -> f64 {
    let h = half_width.abs();
    if h == 0.0 || !h.is_finite() {
        return 0.0;
    }
    rng.gen_range(-h..=h)
}

/// Draw from a Laplace distribution centred on zero with scale `b`.
///
/// Sampled as an exponential magnitude with a fair random sign.
pub fn sample_laplace<R: Rng + ?Sized>(rng: &mut R, scale: f64) -> f64 {
    if scale <= 0.0 || !scale.is_finite() {
        return 0.0;
    }
    let magnitude: f64 = Exp1.sample(rng);
    if rng.gen_bool(0.5) {
        scale * magnitude
    } else {
        -scale * magnitude
    }
}

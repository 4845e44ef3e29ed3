//! Deterministic per-chunk seeding.
//!
//! Every random decision a layer makes is drawn from an RNG derived from
//! `(world seed, layer name, chunk coordinate, salt)`, so re-running a layer on
//! the same chunk reproduces the same result regardless of call order or which
//! other chunks are processed alongside it.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// ---------------------------------------------------------------------------
// Seed derivation
// ---------------------------------------------------------------------------

/// Combine the world seed, layer name, chunk coordinate and a salt into a u64.
///
/// Uses SipHash (via std's `DefaultHasher`, fixed keys) so the value is stable
/// across runs and threads.
pub fn derive_layer_seed<S: Hash>(world_seed: u64, layer: &str, x: i64, y: i64, salt: S) -> u64 {
    let mut hasher = DefaultHasher::new();
    world_seed.hash(&mut hasher);
    layer.hash(&mut hasher);
    x.hash(&mut hasher);
    y.hash(&mut hasher);
    salt.hash(&mut hasher);
    hasher.finish()
}

/// Deterministic RNG for one decision site of one layer on one chunk.
pub fn layer_rng<S: Hash>(world_seed: u64, layer: &str, x: i64, y: i64, salt: S) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(derive_layer_seed(world_seed, layer, x, y, salt))
}

/// Uniform value in `[0, 1)` hashed from the inputs, without building an RNG.
pub fn hashed_unit<S: Hash>(world_seed: u64, layer: &str, x: i64, y: i64, salt: S) -> f64 {
    let bits = derive_layer_seed(world_seed, layer, x, y, salt) >> 11;
    bits as f64 / (1u64 << 53) as f64
}

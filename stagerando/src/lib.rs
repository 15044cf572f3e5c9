pub mod generate;
pub mod randomize;
pub mod search;
pub mod settings;
pub mod validate;

use rand::{rngs::StdRng, SeedableRng};

/// RNG for one attempt. The seed fills the first 8 bytes of the 32-byte StdRng seed.
pub fn make_rng(seed: u64) -> StdRng {
    let mut rng_seed = [0u8; 32];
    rng_seed[..8].copy_from_slice(&seed.to_le_bytes());
    StdRng::from_seed(rng_seed)
}

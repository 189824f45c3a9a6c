//! Deterministic randomness for reproducible training runs

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::cell::RefCell;

thread_local! {
    static RNG: RefCell<StdRng> = RefCell::new(StdRng::seed_from_u64(0));
}

/// Re-seed the crate-global random number generator.
///
/// Layer initialization and batch shuffling both draw from this generator,
/// so calling `set_seed` before model construction makes a full training
/// run reproducible on a single thread.
pub fn set_seed(seed: u64) {
    RNG.with(|rng| *rng.borrow_mut() = StdRng::seed_from_u64(seed));
}

/// Run a closure with mutable access to the crate-global generator.
pub fn with_rng<T>(f: impl FnOnce(&mut StdRng) -> T) -> T {
    RNG.with(|rng| f(&mut rng.borrow_mut()))
}

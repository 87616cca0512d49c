//! Identifier generation.
//!
//! Both model identifiers (`mod_<hex>`) and record identifiers
//! (`<idPrefix>_<hex>`) are sixteen lower-case hex characters, matching the
//! `lower(substr(hex(randomblob(12)), 1, 16))` expression SQLite computes
//! for the `id` column default (§3). Randomness is an injected capability
//! (§9) rather than a global, so a compile can be made fully deterministic
//! for tests by supplying a [`SeededSource`].

use rand::rngs::ThreadRng;
use rand::{Rng, RngCore, SeedableRng};
use rand::rngs::StdRng;

/// A source of random bytes, injected into anything that needs a fresh id.
pub trait RandomSource {
    fn next_bytes(&mut self, out: &mut [u8]);
}

/// The default source, backed by the platform's thread-local CSPRNG.
#[derive(Debug, Default)]
pub struct ThreadRngSource {
    rng: Option<ThreadRng>,
}

impl RandomSource for ThreadRngSource {
    fn next_bytes(&mut self, out: &mut [u8]) {
        self.rng.get_or_insert_with(rand::thread_rng).fill_bytes(out);
    }
}

/// A deterministic source for tests: a seeded PRNG, not suitable for
/// production id generation.
pub struct SeededSource {
    rng: StdRng,
}

impl SeededSource {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededSource {
    fn next_bytes(&mut self, out: &mut [u8]) {
        self.rng.fill(out);
    }
}

const ID_HEX_LEN: usize = 16;

fn random_hex(source: &mut dyn RandomSource) -> String {
    // 16 hex chars = 8 bytes; mirrors `substr(hex(randomblob(12)), 1, 16)`,
    // which only ever consumes the first 8 of the 12 random bytes.
    let mut bytes = [0u8; ID_HEX_LEN / 2];
    source.next_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Generate a fresh model identifier: `mod_<16 hex chars>`.
pub fn generate_model_id(source: &mut dyn RandomSource) -> String {
    format!("mod_{}", random_hex(source))
}

/// Generate a fresh record identifier: `<idPrefix>_<16 hex chars>`.
pub fn generate_record_id(id_prefix: &str, source: &mut dyn RandomSource) -> String {
    format!("{id_prefix}_{}", random_hex(source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_source_is_deterministic() {
        let mut a = SeededSource::new(42);
        let mut b = SeededSource::new(42);
        assert_eq!(generate_model_id(&mut a), generate_model_id(&mut b));
    }

    #[test]
    fn record_id_has_prefix_and_length() {
        let mut source = SeededSource::new(1);
        let id = generate_record_id("acc", &mut source);
        assert!(id.starts_with("acc_"));
        assert_eq!(id.len(), "acc_".len() + ID_HEX_LEN);
    }

    #[test]
    fn model_id_has_mod_prefix() {
        let mut source = SeededSource::new(7);
        let id = generate_model_id(&mut source);
        assert!(id.starts_with("mod_"));
        assert_eq!(id.len(), "mod_".len() + ID_HEX_LEN);
    }
}

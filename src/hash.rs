use std::hash::{BuildHasherDefault, Hasher};

/// The default hash builder: deterministic MurmurHash64A.
pub type DefaultHashBuilder = BuildHasherDefault<MurmurHasher>;

/// Seed for the default hasher. Fixed so that dumps are reproducible across
/// runs and processes.
const SEED: u64 = 0x818c_4070;

/// A [`Hasher`] backed by MurmurHash64A.
///
/// Counting tables do not face adversarial keys, so a fixed-seed, well-mixed
/// hash is preferred over a randomized one: the same input stream always
/// lands in the same slots, which keeps dumps and probe behavior
/// reproducible. Any replacement hasher must be 64-bit and well avalanched,
/// or reprobe chains degrade sharply.
#[derive(Default, Clone, Copy)]
pub struct MurmurHasher {
    hash: u64,
}

impl Hasher for MurmurHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.hash
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        // Each write folds the buffer with the running state as seed, so
        // multi-part keys still hash deterministically.
        self.hash = murmur64a(bytes, SEED ^ self.hash);
    }

    #[inline]
    fn write_u64(&mut self, n: u64) {
        self.write(&n.to_le_bytes());
    }
}

/// Reference MurmurHash64A over `key` with the given seed.
pub fn murmur64a(key: &[u8], seed: u64) -> u64 {
    const M: u64 = 0xc6a4_a793_5bd1_e995;
    const R: u32 = 47;

    let mut h = seed ^ (key.len() as u64).wrapping_mul(M);

    let mut chunks = key.chunks_exact(8);
    for chunk in &mut chunks {
        let mut k = u64::from_le_bytes(chunk.try_into().unwrap());

        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);

        h ^= k;
        h = h.wrapping_mul(M);
    }

    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k = 0u64;
        for (i, &b) in tail.iter().enumerate() {
            k |= (b as u64) << (8 * i);
        }
        h ^= k;
        h = h.wrapping_mul(M);
    }

    h ^= h >> R;
    h = h.wrapping_mul(M);
    h ^= h >> R;

    h
}

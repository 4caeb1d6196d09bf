//! Hash functions offered to [`DictType`](crate::DictType) implementors.

use std::sync::OnceLock;

use crate::DictError;

pub const DEFAULT_HASH_SEED: u32 = 5381;

static HASH_SEED: OnceLock<u32> = OnceLock::new();

/// Sets the process wide seed used by [`gen_hash`] and [`gen_case_hash`].
///
/// Must happen once, at startup: changing the seed under a live
/// dictionary would make every stored key unreachable, so this fails
/// if the seed was already set or already read.
pub fn set_hash_seed(seed: u32) -> Result<(), DictError> {
    HASH_SEED.set(seed).map_err(|_| DictError::SeedAlreadySet)
}

/// Returns the process wide seed, fixing it to [`DEFAULT_HASH_SEED`]
/// if nobody set it yet
pub fn hash_seed() -> u32 {
    *HASH_SEED.get_or_init(|| DEFAULT_HASH_SEED)
}

/// Thomas Wang's 32 bit mix function
pub fn int_hash(mut key: u32) -> u32 {
    key = key.wrapping_add(!(key << 15));
    key ^= key >> 10;
    key = key.wrapping_add(key << 3);
    key ^= key >> 6;
    key = key.wrapping_add(!(key << 11));
    key ^= key >> 16;
    key
}

pub fn identity_hash(key: u32) -> u32 {
    key
}

/// MurmurHash2 of `key`, seeded with [`hash_seed`]
pub fn gen_hash(key: &[u8]) -> u32 {
    gen_hash_with_seed(key, hash_seed())
}

/// MurmurHash2, by Austin Appleby
///
/// # Note
///
/// - It does not work incrementally.
/// - Blocks are read in native byte order, so little-endian and
///   big-endian machines produce different hashes for the same input.
///   Hashes are only meant to live as long as the process.
pub fn gen_hash_with_seed(key: &[u8], seed: u32) -> u32 {
    // mixing constants, they just happen to work well
    const M: u32 = 0x5bd1_e995;
    const R: u32 = 24;

    // the length is folded in as a 32 bit value, like the reference does
    let mut h = seed ^ key.len() as u32;

    let mut blocks = key.chunks_exact(4);
    for block in &mut blocks {
        let mut k = u32::from_ne_bytes([block[0], block[1], block[2], block[3]]);

        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);

        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = blocks.remainder();
    if tail.len() >= 3 {
        h ^= u32::from(tail[2]) << 16;
    }
    if tail.len() >= 2 {
        h ^= u32::from(tail[1]) << 8;
    }
    if let Some(&first) = tail.first() {
        h ^= u32::from(first);
        h = h.wrapping_mul(M);
    }

    // final avalanche so the last few bytes are well-incorporated
    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;
    h
}

/// Case insensitive hash of `buf`, seeded with [`hash_seed`]
pub fn gen_case_hash(buf: &[u8]) -> u32 {
    gen_case_hash_with_seed(buf, hash_seed())
}

/// djb hash (`hash * 33 + c`) over the ASCII-lowercased bytes of `buf`
pub fn gen_case_hash_with_seed(buf: &[u8], seed: u32) -> u32 {
    buf.iter().fold(seed, |hash, b| {
        (hash << 5)
            .wrapping_add(hash)
            .wrapping_add(u32::from(b.to_ascii_lowercase()))
    })
}

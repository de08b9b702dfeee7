//! Content hashing for the string and value indexes.
//!
//! The hash is part of the on-disk format: the builder and the reader must
//! produce identical 32-bit hashes for identical content, so the algorithm is
//! frozen as FNV-1a and versioned with the store format.

/// FNV-1a offset basis
const FNV_OFFSET: u32 = 0x811c_9dc5;

/// FNV-1a prime
const FNV_PRIME: u32 = 0x0100_0193;

/// Hash a byte slice, continuing from a previous state.
pub fn hash_bytes_with(state: u32, bytes: &[u8]) -> u32 {
    let mut h = state;
    for &b in bytes {
        h ^= b as u32;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

/// Hash a byte slice from the initial state.
pub fn hash_bytes(bytes: &[u8]) -> u32 {
    hash_bytes_with(FNV_OFFSET, bytes)
}

/// Fresh hash state, for incremental hashing with [`hash_bytes_with`].
pub fn hash_init() -> u32 {
    FNV_OFFSET
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vectors() {
        // standard FNV-1a test vectors
        assert_eq!(hash_bytes(b""), 0x811c9dc5);
        assert_eq!(hash_bytes(b"a"), 0xe40c292c);
        assert_eq!(hash_bytes(b"foobar"), 0xbf9cf968);
    }

    #[test]
    fn incremental_matches_oneshot() {
        let h1 = hash_bytes(b"hello world");
        let h2 = hash_bytes_with(hash_bytes(b"hello "), b"world");
        assert_eq!(h1, h2);
    }
}

//! Hashing utilities

use xxhash_rust::xxh3::xxh3_64;

/// Deterministic 64-bit hash of a symbolic file path.
///
/// Stable across processes and runs, so operation state files written by
/// one process can be resumed by another against a rebuilt index.
pub fn hash_symbolic_path(path: &str) -> u64 {
    xxh3_64(path.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        let a = hash_symbolic_path("Main/Artist/Album/track_vocals.mp3");
        let b = hash_symbolic_path("Main/Artist/Album/track_vocals.mp3");
        assert_eq!(a, b);
    }

    #[test]
    fn test_distinct_paths_hash_differently() {
        let a = hash_symbolic_path("Main/Artist/Album/track_vocals.mp3");
        let b = hash_symbolic_path("SSD/Artist/Album/track_vocals.mp3");
        assert_ne!(a, b);
    }
}

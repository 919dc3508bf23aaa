use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// First `n` hex characters of the SHA-256 digest of `data`. Used for
/// content-addressed cache keys where the full 64-character digest would be
/// needlessly long.
pub fn sha256_hex_prefix(data: &[u8], n: usize) -> String {
    let full = sha256_hex(data);
    full.chars().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn prefix_is_stable() {
        let full = sha256_hex(b"hello");
        let prefix = sha256_hex_prefix(b"hello", 32);
        assert_eq!(&full[..32], prefix);
    }
}

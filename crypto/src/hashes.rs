use sha2::Sha256;
use sha3::digest::Digest;
use sha3::{Keccak256, Sha3_256};

/// Output length of every hash exposed here.
pub const HASH_LEN: usize = 32;

/// Keccak-256 (the transcript hash of the transport protocol).
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn sha3_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak256_known_vector() {
        // Keccak-256 of the empty string (the Ethereum constant)
        let digest = keccak256(b"");
        assert_eq!(
            hex::encode(digest),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn keccak256_differs_from_sha3_256() {
        assert_ne!(keccak256(b"pqwire"), sha3_256(b"pqwire"));
    }

    #[test]
    fn hashes_are_deterministic() {
        assert_eq!(keccak256(b"abc"), keccak256(b"abc"));
        assert_eq!(sha256(b"abc"), sha256(b"abc"));
    }
}

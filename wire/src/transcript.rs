//! Running transcript hash for the handshake

use sha3::digest::Digest;
use sha3::Keccak256;

use crate::types::PROTOCOL_ID;

/// Append-only Keccak-256 hash over every handshake message exchanged so
/// far, in deterministic (zero-padding) encoding. Both sides must feed it
/// byte-identical input or every derived secret silently diverges.
pub struct Transcript {
    hasher: Keccak256,
}

impl Transcript {
    /// Create a new transcript, seeded with the protocol ID
    pub fn new() -> Self {
        let mut hasher = Keccak256::new();
        hasher.update(PROTOCOL_ID.as_bytes());
        Self { hasher }
    }

    /// Add data to the transcript
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Get the current transcript hash
    pub fn hash(&self) -> [u8; 32] {
        let hasher = self.hasher.clone();
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        hash
    }
}

impl Default for Transcript {
    fn default() -> Self {
        Self::new()
    }
}

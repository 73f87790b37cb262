use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    #[error("invalid length: expected {expected} bytes, found {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("verification failed")]
    VerificationFailed,

    #[error("decapsulation failed")]
    DecapsulationFailed,

    #[error("invalid key")]
    InvalidKey,

    #[error("invalid signature")]
    InvalidSignature,
}

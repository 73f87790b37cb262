//! Error types for the pqwire transport

use thiserror::Error;

/// Errors that can occur during transport operations
#[derive(Debug, Error)]
pub enum Error {
    /// Cryptographic primitive failure
    #[error("crypto error: {0}")]
    Crypto(#[from] crypto::CryptoError),

    /// Handshake protocol error
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Record layer or framing error
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// I/O error during communication
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Handshake deadline expired
    #[error("operation timed out")]
    Timeout,
}

/// Errors specific to the handshake state machines.
///
/// Every cryptographic failure here is fatal to the session: the caller
/// must close the connection and construct a new session to retry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HandshakeError {
    /// Handshake already completed or in progress on this session
    #[error("handshake already performed on this session")]
    AlreadyHandshaking,

    /// Read/Write attempted before the handshake finished
    #[error("handshake not complete")]
    HandshakeNotComplete,

    /// KEM decapsulation failed
    #[error("decapsulation failed")]
    DecapsulationFailed,

    /// Peer's transcript signature did not verify
    #[error("signature verification failed")]
    SignatureVerificationFailed,

    /// Recovered signer key does not match the pinned peer key
    #[error("recovered public key does not match pinned key")]
    PublicKeyMismatch,

    /// Unexpected message or record type received
    #[error("unexpected message: expected {expected}, got {got}")]
    UnexpectedMessage {
        expected: &'static str,
        got: &'static str,
    },

    /// Connection closed mid-handshake
    #[error("connection closed during handshake")]
    ConnectionClosed,

    /// Operation not valid in the current handshake state
    #[error("invalid handshake state")]
    InvalidState,

    /// Key schedule derivation failed
    #[error("key derivation failed")]
    KeyDerivation,
}

/// Framing and record-protection errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    /// AEAD tag did not verify
    #[error("record authentication failed")]
    AuthenticationFailed,

    /// AEAD sealing failed
    #[error("record encryption failed")]
    EncryptionFailed,

    /// Ciphertext shorter than the AEAD overhead
    #[error("ciphertext shorter than AEAD overhead")]
    ShortBuffer,

    /// Stream ended before the declared length was available
    #[error("short read: expected {expected} bytes")]
    ShortRead { expected: usize },

    /// Declared record length exceeds the configured maximum
    #[error("record of {len} bytes exceeds maximum {max}")]
    PayloadTooLarge { len: usize, max: usize },

    /// Record header failed to decode
    #[error("invalid record header")]
    InvalidHeader,

    /// Decrypted record carried no or an unknown inner content type
    #[error("bad inner content type: {0}")]
    BadContentType(u8),

    /// Sequence counter exhausted for this direction
    #[error("sequence counter exhausted")]
    SequenceExhausted,

    /// Message too large for the 2-byte length prefix
    #[error("message of {0} bytes exceeds framing limit")]
    MessageTooLarge(usize),

    /// RLP decoding failed
    #[error("rlp decoding failed: {0:?}")]
    Rlp(rlp::DecoderError),
}

impl From<rlp::DecoderError> for RecordError {
    fn from(e: rlp::DecoderError) -> Self {
        RecordError::Rlp(e)
    }
}

/// Result type for transport operations
pub type Result<T> = std::result::Result<T, Error>;

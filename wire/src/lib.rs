//! Post-Quantum Authenticated Transport
//!
//! This crate implements the secure channel a node uses to talk to its
//! peers: a 4-message KEM handshake with post-quantum signature
//! authentication, a transcript-hash-driven key schedule, and an AEAD
//! record layer for everything after the Hellos.
//!
//! # Protocol Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Handshake                             │
//! ├──────────────────────────────────────────────────────────────┤
//! │  -> ClientHello    │  ephemeral ML-KEM-768 key + nonce       │
//! │  <- ServerHello    │  KEM ciphertext + nonce                 │
//! │  <- ServerVerify   │  ML-DSA-65 over TH(hello₁‖hello₂)       │
//! │  -> ClientVerify   │  ML-DSA-65 over TH(…‖server-verify)     │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Key schedule: HKDF ladder (early → handshake → master),     │
//! │  per-direction AES-256-GCM keys for handshake and            │
//! │  application phases, nonce = IV xor sequence counter.        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both Verify messages carry sealed self-certifying signatures: the
//! signer's verification key is recovered from the signature itself, and
//! the initiator compares it against the key it pinned when dialing.
//!
//! # Example
//!
//! ```rust,ignore
//! use pqwire::{ChannelConfig, Initiator};
//!
//! let config = ChannelConfig::production(seed).with_expected_peer(server_key);
//! let mut session = Initiator::new(config, stream);
//! let peer_id = session.perform_handshake().await?;
//! session.write(b"hello, quantum world", 1).await?;
//! ```

pub mod buffer;
pub mod codec;
pub mod config;
pub mod error;
pub mod initiator;
pub mod record;
pub mod responder;
pub mod secrets;
pub mod transcript;
pub mod types;

pub use config::{ChannelConfig, ChannelConfigBuilder};
pub use error::{Error, HandshakeError, RecordError, Result};
pub use initiator::Initiator;
pub use record::{DataPacket, Header, PacketType};
pub use responder::Responder;
pub use secrets::SessionSecret;
pub use transcript::Transcript;
pub use types::{
    ClientHello, LocalIdentity, PeerId, RemotePeer, ServerHello, VerifyMessage, PROTOCOL_VERSION,
};

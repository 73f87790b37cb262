//! Post-quantum primitive wrappers for the pqwire transport.
//!
//! The transport core consumes these primitives through the narrow
//! capability traits in [`traits`]: a KEM provider (ML-KEM-768, FIPS 203),
//! a signature provider (ML-DSA-65, FIPS 204) and a hash provider
//! (Keccak-256). There is no process-wide algorithm selection; every
//! session carries its own keys.

pub mod deterministic;
pub mod error;
pub mod hashes;
pub mod ml_dsa;
pub mod ml_kem;
pub mod traits;

pub use error::CryptoError;

//! ML-KEM-768 (FIPS 203) - Post-Quantum Key Encapsulation
//!
//! Wrapper around the `ml-kem` crate. Key generation and encapsulation go
//! through the deterministic APIs: callers supply seed material (fresh
//! randomness for a live handshake, fixed bytes in tests) and this module
//! stretches it into the seed sizes FIPS 203 expects. Decapsulation keys
//! are kept as their 64-byte seed and re-expanded on use; seeds are
//! zeroized on drop.

use ml_kem::kem::{Decapsulate, KeyExport};
use ml_kem::{MlKem768, Seed, B32};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::deterministic::expand_to_length;
use crate::error::CryptoError;
use crate::traits::{KemKeyPair, KemPublicKey};

/// ML-KEM-768 parameter sizes (FIPS 203)
pub const ML_KEM_PUBLIC_KEY_LEN: usize = 1184;
pub const ML_KEM_SEED_LEN: usize = 64;
pub const ML_KEM_CIPHERTEXT_LEN: usize = 1088;
pub const ML_KEM_SHARED_SECRET_LEN: usize = 32;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MlKemCiphertext {
    bytes: [u8; ML_KEM_CIPHERTEXT_LEN],
}

impl MlKemCiphertext {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != ML_KEM_CIPHERTEXT_LEN {
            return Err(CryptoError::InvalidLength {
                expected: ML_KEM_CIPHERTEXT_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; ML_KEM_CIPHERTEXT_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    pub fn to_bytes(&self) -> [u8; ML_KEM_CIPHERTEXT_LEN] {
        self.bytes
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// A 32-byte KEM shared secret, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MlKemSharedSecret {
    bytes: [u8; ML_KEM_SHARED_SECRET_LEN],
}

impl MlKemSharedSecret {
    pub fn as_bytes(&self) -> &[u8; ML_KEM_SHARED_SECRET_LEN] {
        &self.bytes
    }
}

impl core::fmt::Debug for MlKemSharedSecret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MlKemSharedSecret").finish_non_exhaustive()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MlKemPublicKey {
    bytes: [u8; ML_KEM_PUBLIC_KEY_LEN],
}

impl MlKemPublicKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl KemPublicKey for MlKemPublicKey {
    type Ciphertext = MlKemCiphertext;
    type SharedSecret = MlKemSharedSecret;

    fn encapsulate(
        &self,
        seed: &[u8],
    ) -> Result<(Self::Ciphertext, Self::SharedSecret), CryptoError> {
        let ek_bytes: &[u8; ML_KEM_PUBLIC_KEY_LEN] = &self.bytes;
        let ek = ml_kem::EncapsulationKey::<MlKem768>::new(ek_bytes.into())
            .map_err(|_| CryptoError::InvalidKey)?;

        // Stretch the caller's seed into the 32-byte encapsulation message m.
        let mut m_bytes = Zeroizing::new([0u8; 32]);
        let expanded = Zeroizing::new(expand_to_length(b"ml-kem-encap", seed, 32));
        m_bytes.copy_from_slice(&expanded);
        let m: &B32 = (&*m_bytes).into();

        let (ct, ss) = ek.encapsulate_deterministic(m);

        let mut ct_bytes = [0u8; ML_KEM_CIPHERTEXT_LEN];
        ct_bytes.copy_from_slice(ct.as_slice());

        let mut ss_bytes = [0u8; ML_KEM_SHARED_SECRET_LEN];
        ss_bytes.copy_from_slice(ss.as_slice());
        let shared = MlKemSharedSecret { bytes: ss_bytes };
        ss_bytes.zeroize();

        Ok((MlKemCiphertext { bytes: ct_bytes }, shared))
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != ML_KEM_PUBLIC_KEY_LEN {
            return Err(CryptoError::InvalidLength {
                expected: ML_KEM_PUBLIC_KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; ML_KEM_PUBLIC_KEY_LEN];
        arr.copy_from_slice(bytes);
        // Validate the encoding up front so later encapsulation cannot
        // fail on a key that was accepted here.
        let ek_bytes: &[u8; ML_KEM_PUBLIC_KEY_LEN] = &arr;
        ml_kem::EncapsulationKey::<MlKem768>::new(ek_bytes.into())
            .map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self { bytes: arr })
    }
}

/// An ML-KEM-768 keypair held as its 64-byte decapsulation seed.
pub struct MlKemKeyPair {
    seed: Zeroizing<[u8; ML_KEM_SEED_LEN]>,
    public: MlKemPublicKey,
}

impl MlKemKeyPair {
    fn from_seed_bytes(seed_bytes: Zeroizing<[u8; ML_KEM_SEED_LEN]>) -> Self {
        let seed: Seed = (*seed_bytes).into();
        let dk = ml_kem::DecapsulationKey::<MlKem768>::from_seed(seed);
        let ek = dk.encapsulation_key();
        let ek_exported = ek.to_bytes();
        let mut ek_bytes = [0u8; ML_KEM_PUBLIC_KEY_LEN];
        ek_bytes.copy_from_slice(ek_exported.as_slice());
        Self {
            seed: seed_bytes,
            public: MlKemPublicKey { bytes: ek_bytes },
        }
    }
}

impl KemKeyPair for MlKemKeyPair {
    type PublicKey = MlKemPublicKey;
    type Ciphertext = MlKemCiphertext;
    type SharedSecret = MlKemSharedSecret;

    fn generate_deterministic(seed: &[u8]) -> Self {
        // Stretch arbitrary seed material into the (d || z) seed of FIPS 203 §7.1.
        let mut seed_bytes = Zeroizing::new([0u8; ML_KEM_SEED_LEN]);
        let expanded = Zeroizing::new(expand_to_length(b"ml-kem-keygen", seed, ML_KEM_SEED_LEN));
        seed_bytes.copy_from_slice(&expanded);
        Self::from_seed_bytes(seed_bytes)
    }

    fn decapsulate(
        &self,
        ciphertext: &Self::Ciphertext,
    ) -> Result<Self::SharedSecret, CryptoError> {
        let seed: Seed = (*self.seed).into();
        let dk = ml_kem::DecapsulationKey::<MlKem768>::from_seed(seed);
        let ct = ml_kem::kem::Ciphertext::<MlKem768>::try_from(ciphertext.as_bytes())
            .map_err(|_| CryptoError::DecapsulationFailed)?;
        // ML-KEM uses implicit rejection: invalid ciphertexts produce a
        // pseudorandom shared secret rather than an error.
        let ss = dk.decapsulate(&ct);

        let mut ss_bytes = [0u8; ML_KEM_SHARED_SECRET_LEN];
        ss_bytes.copy_from_slice(ss.as_slice());
        let shared = MlKemSharedSecret { bytes: ss_bytes };
        ss_bytes.zeroize();
        Ok(shared)
    }

    fn public_key(&self) -> Self::PublicKey {
        self.public.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encapsulate_decapsulate_round_trip() {
        let kp = MlKemKeyPair::generate_deterministic(b"round-trip-seed");
        let (ct, ss_enc) = kp.public_key().encapsulate(b"encap-seed").unwrap();
        let ss_dec = kp.decapsulate(&ct).unwrap();
        assert_eq!(ss_enc.as_bytes(), ss_dec.as_bytes());
    }

    #[test]
    fn wrong_keypair_produces_different_secret() {
        // Implicit rejection: the wrong key yields a pseudorandom secret
        let kp1 = MlKemKeyPair::generate_deterministic(b"keypair-one");
        let kp2 = MlKemKeyPair::generate_deterministic(b"keypair-two");

        let (ct, ss_enc) = kp1.public_key().encapsulate(b"encap").unwrap();
        let ss_wrong = kp2.decapsulate(&ct).unwrap();
        assert_ne!(ss_enc.as_bytes(), ss_wrong.as_bytes());
    }

    #[test]
    fn deterministic_keygen_is_stable() {
        let kp1 = MlKemKeyPair::generate_deterministic(b"same-seed");
        let kp2 = MlKemKeyPair::generate_deterministic(b"same-seed");
        assert_eq!(kp1.public_key().to_bytes(), kp2.public_key().to_bytes());
    }

    #[test]
    fn parameter_sizes() {
        let kp = MlKemKeyPair::generate_deterministic(b"size-check");
        let (ct, ss) = kp.public_key().encapsulate(b"encap").unwrap();
        assert_eq!(kp.public_key().to_bytes().len(), ML_KEM_PUBLIC_KEY_LEN);
        assert_eq!(ct.as_bytes().len(), ML_KEM_CIPHERTEXT_LEN);
        assert_eq!(ss.as_bytes().len(), ML_KEM_SHARED_SECRET_LEN);
    }

    #[test]
    fn public_key_rejects_bad_length() {
        let err = MlKemPublicKey::from_bytes(&[0u8; 17]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidLength { .. }));
    }

    #[test]
    fn ciphertext_rejects_bad_length() {
        let err = MlKemCiphertext::from_bytes(&[0u8; ML_KEM_CIPHERTEXT_LEN - 1]).unwrap_err();
        assert!(matches!(err, CryptoError::InvalidLength { .. }));
    }
}

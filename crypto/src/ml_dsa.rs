//! ML-DSA-65 (FIPS 204) - Post-Quantum Digital Signatures
//!
//! Wrapper around the `ml-dsa` crate, plus the self-certifying signature
//! envelope the transport authenticates with: a sealed signature is the
//! raw ML-DSA signature followed by the signer's encoded verification key,
//! so the verifier can recover the purported signer without a certificate
//! exchange. Recovery verifies the signature before returning the key;
//! whether the recovered key is *acceptable* (pinned match, open-peer) is
//! the caller's decision, not this module's.

use crate::error::CryptoError;
use crate::traits::{Signature as SigTrait, SigningKey as SigningKeyTrait, VerifyKey};

use ml_dsa::signature::{Signer, Verifier};
use ml_dsa::{MlDsa65, B32};

/// ML-DSA-65 parameter sizes (FIPS 204)
pub const ML_DSA_PUBLIC_KEY_LEN: usize = 1952;
pub const ML_DSA_SECRET_KEY_LEN: usize = 4032;
pub const ML_DSA_SIGNATURE_LEN: usize = 3309;

/// Length of a sealed (self-certifying) signature: signature ‖ public key.
pub const SEALED_SIGNATURE_LEN: usize = ML_DSA_SIGNATURE_LEN + ML_DSA_PUBLIC_KEY_LEN;

/// ML-DSA-65 Signature
#[derive(Clone, Debug)]
pub struct MlDsaSignature {
    bytes: Vec<u8>,
}

impl MlDsaSignature {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != ML_DSA_SIGNATURE_LEN {
            return Err(CryptoError::InvalidLength {
                expected: ML_DSA_SIGNATURE_LEN,
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

impl PartialEq for MlDsaSignature {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for MlDsaSignature {}

impl SigTrait for MlDsaSignature {
    fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// ML-DSA-65 Public Key (verification key)
#[derive(Clone, Debug)]
pub struct MlDsaPublicKey {
    bytes: [u8; ML_DSA_PUBLIC_KEY_LEN],
}

impl MlDsaPublicKey {
    fn to_inner(&self) -> ml_dsa::VerifyingKey<MlDsa65> {
        ml_dsa::VerifyingKey::<MlDsa65>::decode(&self.bytes.into())
    }
}

impl PartialEq for MlDsaPublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for MlDsaPublicKey {}

impl VerifyKey for MlDsaPublicKey {
    type Signature = MlDsaSignature;

    fn verify(&self, message: &[u8], signature: &Self::Signature) -> Result<(), CryptoError> {
        let vk = self.to_inner();

        let sig_bytes: [u8; ML_DSA_SIGNATURE_LEN] = signature
            .bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature)?;
        let sig = ml_dsa::Signature::<MlDsa65>::decode(&sig_bytes.into())
            .ok_or(CryptoError::InvalidSignature)?;

        vk.verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != ML_DSA_PUBLIC_KEY_LEN {
            return Err(CryptoError::InvalidLength {
                expected: ML_DSA_PUBLIC_KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; ML_DSA_PUBLIC_KEY_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }
}

/// ML-DSA-65 Secret Key (signing key)
#[derive(Clone)]
pub struct MlDsaSecretKey {
    bytes: [u8; ML_DSA_SECRET_KEY_LEN],
}

impl MlDsaSecretKey {
    fn to_inner(&self) -> ml_dsa::ExpandedSigningKey<MlDsa65> {
        ml_dsa::ExpandedSigningKey::<MlDsa65>::from_expanded(&self.bytes.into())
    }

    /// Produce a sealed, self-certifying signature over `digest`:
    /// `signature(3309) ‖ verify_key(1952)`.
    pub fn sign_recoverable(&self, digest: &[u8]) -> Vec<u8> {
        let signature = self.sign(digest);
        let mut sealed = Vec::with_capacity(SEALED_SIGNATURE_LEN);
        sealed.extend_from_slice(signature.as_bytes());
        sealed.extend_from_slice(&self.verify_key().to_bytes());
        sealed
    }
}

impl core::fmt::Debug for MlDsaSecretKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MlDsaSecretKey").finish_non_exhaustive()
    }
}

impl SigningKeyTrait for MlDsaSecretKey {
    type VerifyKey = MlDsaPublicKey;
    type Signature = MlDsaSignature;

    fn generate_deterministic(seed: &[u8]) -> Self {
        use sha2::{Digest, Sha256};
        let mut xi = [0u8; 32];
        let mut hasher = Sha256::new();
        hasher.update(b"ml-dsa-65-xi");
        hasher.update(seed);
        xi.copy_from_slice(&hasher.finalize());

        let seed_b32: B32 = xi.into();

        let sk = ml_dsa::SigningKey::<MlDsa65>::from_seed(&seed_b32);
        let sk_bytes = sk.expanded_key().to_expanded();

        let mut bytes = [0u8; ML_DSA_SECRET_KEY_LEN];
        bytes.copy_from_slice(sk_bytes.as_ref());

        Self { bytes }
    }

    fn sign(&self, message: &[u8]) -> Self::Signature {
        let sk = self.to_inner();
        let sig = sk.sign(message);
        let sig_bytes = sig.encode();
        MlDsaSignature {
            bytes: sig_bytes.to_vec(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != ML_DSA_SECRET_KEY_LEN {
            return Err(CryptoError::InvalidLength {
                expected: ML_DSA_SECRET_KEY_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; ML_DSA_SECRET_KEY_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self { bytes: arr })
    }

    fn verify_key(&self) -> Self::VerifyKey {
        let sk = self.to_inner();
        let vk = sk.verifying_key();
        let vk_bytes = vk.encode();

        let mut bytes = [0u8; ML_DSA_PUBLIC_KEY_LEN];
        bytes.copy_from_slice(vk_bytes.as_ref());

        MlDsaPublicKey { bytes }
    }
}

/// Recover the signer's verification key from a sealed signature.
///
/// Parses the embedded key, verifies the embedded signature over
/// `digest`, and returns the key only if verification succeeds. Recovery
/// does not guarantee uniqueness of the recovered key for a digest;
/// callers comparing against a pinned key must do so explicitly.
pub fn recover_verify_key(digest: &[u8], sealed: &[u8]) -> Result<MlDsaPublicKey, CryptoError> {
    if sealed.len() != SEALED_SIGNATURE_LEN {
        return Err(CryptoError::InvalidLength {
            expected: SEALED_SIGNATURE_LEN,
            actual: sealed.len(),
        });
    }
    let (sig_bytes, vk_bytes) = sealed.split_at(ML_DSA_SIGNATURE_LEN);
    let verify_key = MlDsaPublicKey::from_bytes(vk_bytes)?;
    let signature = MlDsaSignature::from_bytes(sig_bytes)?;
    verify_key.verify(digest, &signature)?;
    Ok(verify_key)
}

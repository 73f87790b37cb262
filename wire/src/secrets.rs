//! Transcript-driven key schedule
//!
//! A TLS-1.3-shaped derivation ladder adapted to a single KEM phase:
//!
//! ```text
//! earlySecret      = Extract(salt = 0, ikm = transcriptHash)
//! derivedSecret    = ExpandLabel(earlySecret, "derived", H(""))
//! handshakeSecret  = Extract(salt = kemSharedSecret, ikm = derivedSecret)
//!   c/s hs traffic = ExpandLabel(handshakeSecret, ..., transcriptHash)
//! derivedSecret'   = ExpandLabel(handshakeSecret, "derived", H(""))
//! masterSecret     = Extract(salt = 0, ikm = derivedSecret')
//!   c/s ap traffic = ExpandLabel(masterSecret, ..., finalTranscriptHash)
//! key = ExpandLabel(traffic, "key", -, 32)   iv = ExpandLabel(traffic, "iv", -, 12)
//! ```
//!
//! Every Expand-Label info string is namespaced with `"pqkem "` so two
//! derivations sharing a secret can never collide across phases or
//! protocols.

use hkdf::Hkdf;
use sha3::Keccak256;
use zeroize::Zeroizing;

use crypto::hashes::keccak256;

use crate::error::HandshakeError;

/// Transcript/derivation hash output length
pub const HASH_LEN: usize = 32;

/// AES-256-GCM key length
pub const AEAD_KEY_LEN: usize = 32;

/// AES-256-GCM IV length
pub const AEAD_IV_LEN: usize = 12;

const LABEL_PREFIX: &[u8] = b"pqkem ";

fn hkdf_extract(salt: &[u8], ikm: &[u8]) -> Zeroizing<[u8; HASH_LEN]> {
    let (prk, _) = Hkdf::<Keccak256>::extract(Some(salt), ikm);
    let mut out = Zeroizing::new([0u8; HASH_LEN]);
    out.copy_from_slice(&prk);
    out
}

/// HKDF-Expand with a length-prefixed, namespaced, context-bound info
/// string: `u16 out_len ‖ u8 label_len ‖ "pqkem " + label ‖ u8 ctx_len ‖ ctx`.
pub(crate) fn hkdf_expand_label(
    secret: &[u8; HASH_LEN],
    label: &str,
    context: &[u8],
    out: &mut [u8],
) -> Result<(), HandshakeError> {
    let mut info = Vec::with_capacity(4 + LABEL_PREFIX.len() + label.len() + context.len());
    info.extend_from_slice(&(out.len() as u16).to_be_bytes());
    info.push((LABEL_PREFIX.len() + label.len()) as u8);
    info.extend_from_slice(LABEL_PREFIX);
    info.extend_from_slice(label.as_bytes());
    info.push(context.len() as u8);
    info.extend_from_slice(context);

    let hk =
        Hkdf::<Keccak256>::from_prk(secret).map_err(|_| HandshakeError::KeyDerivation)?;
    hk.expand(&info, out)
        .map_err(|_| HandshakeError::KeyDerivation)
}

/// One direction's traffic material: traffic secret plus the AEAD key/IV
/// expanded from it.
pub struct DirectionSecret {
    traffic_secret: Zeroizing<[u8; HASH_LEN]>,
    key: Zeroizing<[u8; AEAD_KEY_LEN]>,
    iv: [u8; AEAD_IV_LEN],
}

impl DirectionSecret {
    fn derive(
        parent: &[u8; HASH_LEN],
        label: &str,
        transcript_hash: &[u8; HASH_LEN],
    ) -> Result<Self, HandshakeError> {
        let mut traffic_secret = Zeroizing::new([0u8; HASH_LEN]);
        hkdf_expand_label(parent, label, transcript_hash, &mut *traffic_secret)?;

        let mut key = Zeroizing::new([0u8; AEAD_KEY_LEN]);
        hkdf_expand_label(&traffic_secret, "key", &[], &mut *key)?;

        let mut iv = [0u8; AEAD_IV_LEN];
        hkdf_expand_label(&traffic_secret, "iv", &[], &mut iv)?;

        Ok(Self {
            traffic_secret,
            key,
            iv,
        })
    }

    pub(crate) fn key(&self) -> &[u8; AEAD_KEY_LEN] {
        &self.key
    }

    pub(crate) fn iv(&self) -> &[u8; AEAD_IV_LEN] {
        &self.iv
    }

    #[cfg(test)]
    fn traffic_secret(&self) -> &[u8; HASH_LEN] {
        &self.traffic_secret
    }
}

/// All secret material derived for one handshake session.
///
/// Produced exactly once per session: handshake-phase secrets after both
/// Hellos are in the transcript, application-phase secrets after both
/// Verify messages. Immutable once both tiers are populated; zeroized on
/// drop via the `Zeroizing` wrappers.
pub struct SessionSecret {
    handshake_secret: Zeroizing<[u8; HASH_LEN]>,
    master_secret: Option<Zeroizing<[u8; HASH_LEN]>>,
    transcript_hash: Option<[u8; HASH_LEN]>,
    pub(crate) client_handshake: DirectionSecret,
    pub(crate) server_handshake: DirectionSecret,
    pub(crate) client_application: Option<DirectionSecret>,
    pub(crate) server_application: Option<DirectionSecret>,
}

impl SessionSecret {
    /// Derive handshake-phase secrets from the transcript over both Hello
    /// messages and the KEM shared secret.
    pub(crate) fn derive_handshake(
        transcript_hash: &[u8; HASH_LEN],
        kem_shared: &[u8; HASH_LEN],
    ) -> Result<Self, HandshakeError> {
        let zero = [0u8; HASH_LEN];
        let early = hkdf_extract(&zero, transcript_hash);

        let empty_hash = keccak256(&[]);
        let mut derived = Zeroizing::new([0u8; HASH_LEN]);
        hkdf_expand_label(&early, "derived", &empty_hash, &mut *derived)?;

        let handshake_secret = hkdf_extract(kem_shared, &*derived);

        let client_handshake =
            DirectionSecret::derive(&handshake_secret, "c hs traffic", transcript_hash)?;
        let server_handshake =
            DirectionSecret::derive(&handshake_secret, "s hs traffic", transcript_hash)?;

        Ok(Self {
            handshake_secret,
            master_secret: None,
            transcript_hash: None,
            client_handshake,
            server_handshake,
            client_application: None,
            server_application: None,
        })
    }

    /// Derive application-phase secrets from the final transcript hash
    /// (both Verify messages included).
    pub(crate) fn derive_application(
        &mut self,
        transcript_hash: &[u8; HASH_LEN],
    ) -> Result<(), HandshakeError> {
        if self.master_secret.is_some() {
            return Err(HandshakeError::InvalidState);
        }

        let zero = [0u8; HASH_LEN];
        let empty_hash = keccak256(&[]);
        let mut derived = Zeroizing::new([0u8; HASH_LEN]);
        hkdf_expand_label(&self.handshake_secret, "derived", &empty_hash, &mut *derived)?;

        let master = hkdf_extract(&zero, &*derived);

        self.client_application = Some(DirectionSecret::derive(
            &master,
            "c ap traffic",
            transcript_hash,
        )?);
        self.server_application = Some(DirectionSecret::derive(
            &master,
            "s ap traffic",
            transcript_hash,
        )?);
        self.master_secret = Some(master);
        self.transcript_hash = Some(*transcript_hash);
        Ok(())
    }

    /// The transcript hash frozen at application-secret derivation — a
    /// channel-binding value both sides share after a successful
    /// handshake.
    pub fn transcript_hash(&self) -> Option<[u8; HASH_LEN]> {
        self.transcript_hash
    }
}

//! Handshake message and identity types

use crypto::hashes::keccak256;
use crypto::ml_dsa::{MlDsaPublicKey, MlDsaSecretKey, SEALED_SIGNATURE_LEN};
use crypto::traits::{SigningKey, VerifyKey};
use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

/// Peer identifier derived from the ML-DSA-65 verification key
pub type PeerId = [u8; 32];

/// Protocol version exchanged in both Hello messages.
///
/// Currently unchecked beyond presence; reserved for future negotiation.
pub const PROTOCOL_VERSION: u32 = 1;

/// Protocol identifier string, mixed into every transcript
pub const PROTOCOL_ID: &str = "/pqwire/1.0.0";

/// Length of the random nonce carried by each Hello message
pub const HELLO_NONCE_LEN: usize = 32;

/// Initiator's opening message: ephemeral KEM public key, random nonce,
/// protocol version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientHello {
    /// Ephemeral ML-KEM-768 encapsulation key (1184 bytes)
    pub kem_public_key: Vec<u8>,
    /// Random nonce
    pub nonce: [u8; HELLO_NONCE_LEN],
    /// Protocol version
    pub version: u32,
}

impl Encodable for ClientHello {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.kem_public_key);
        s.append(&self.nonce.to_vec());
        s.append(&self.version);
    }
}

impl Decodable for ClientHello {
    fn decode(rlp: &Rlp) -> std::result::Result<Self, DecoderError> {
        if !rlp.is_list() {
            return Err(DecoderError::RlpExpectedToBeList);
        }
        if rlp.item_count()? != 3 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let kem_public_key: Vec<u8> = rlp.val_at(0)?;
        let nonce_bytes: Vec<u8> = rlp.val_at(1)?;
        let nonce: [u8; HELLO_NONCE_LEN] = nonce_bytes
            .as_slice()
            .try_into()
            .map_err(|_| DecoderError::Custom("hello nonce must be 32 bytes"))?;
        let version: u32 = rlp.val_at(2)?;
        Ok(Self {
            kem_public_key,
            nonce,
            version,
        })
    }
}

/// Responder's reply: KEM ciphertext encapsulated to the initiator's
/// ephemeral key, random nonce, protocol version.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerHello {
    /// ML-KEM-768 ciphertext (1088 bytes)
    pub kem_ciphertext: Vec<u8>,
    /// Random nonce
    pub nonce: [u8; HELLO_NONCE_LEN],
    /// Protocol version
    pub version: u32,
}

impl Encodable for ServerHello {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(3);
        s.append(&self.kem_ciphertext);
        s.append(&self.nonce.to_vec());
        s.append(&self.version);
    }
}

impl Decodable for ServerHello {
    fn decode(rlp: &Rlp) -> std::result::Result<Self, DecoderError> {
        if !rlp.is_list() {
            return Err(DecoderError::RlpExpectedToBeList);
        }
        if rlp.item_count()? != 3 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let kem_ciphertext: Vec<u8> = rlp.val_at(0)?;
        let nonce_bytes: Vec<u8> = rlp.val_at(1)?;
        let nonce: [u8; HELLO_NONCE_LEN] = nonce_bytes
            .as_slice()
            .try_into()
            .map_err(|_| DecoderError::Custom("hello nonce must be 32 bytes"))?;
        let version: u32 = rlp.val_at(2)?;
        Ok(Self {
            kem_ciphertext,
            nonce,
            version,
        })
    }
}

/// ServerVerify / ClientVerify: a sealed self-certifying signature over
/// the running transcript hash, carried in a fixed-size buffer with an
/// explicit meaningful length.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyMessage {
    /// Sealed signature buffer, always `SEALED_SIGNATURE_LEN` bytes
    pub signature: Vec<u8>,
    /// Meaningful prefix of `signature`
    pub signature_len: u32,
}

impl VerifyMessage {
    /// Wrap a sealed signature, padding the buffer to its fixed size.
    pub fn new(sealed: Vec<u8>) -> Self {
        let signature_len = sealed.len() as u32;
        let mut signature = sealed;
        signature.resize(SEALED_SIGNATURE_LEN, 0);
        Self {
            signature,
            signature_len,
        }
    }

    /// The meaningful signature bytes.
    pub fn signature_bytes(&self) -> Option<&[u8]> {
        self.signature.get(..self.signature_len as usize)
    }
}

impl Encodable for VerifyMessage {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.signature);
        s.append(&self.signature_len);
    }
}

impl Decodable for VerifyMessage {
    fn decode(rlp: &Rlp) -> std::result::Result<Self, DecoderError> {
        if !rlp.is_list() {
            return Err(DecoderError::RlpExpectedToBeList);
        }
        if rlp.item_count()? != 2 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        let signature: Vec<u8> = rlp.val_at(0)?;
        if signature.len() != SEALED_SIGNATURE_LEN {
            return Err(DecoderError::Custom("verify signature buffer has fixed size"));
        }
        let signature_len: u32 = rlp.val_at(1)?;
        if signature_len as usize > SEALED_SIGNATURE_LEN {
            return Err(DecoderError::Custom("signature length exceeds buffer"));
        }
        Ok(Self {
            signature,
            signature_len,
        })
    }
}

/// Local identity for a node participating in the transport
#[derive(Clone)]
pub struct LocalIdentity {
    /// ML-DSA-65 signing key
    pub signing_key: MlDsaSecretKey,
    /// ML-DSA-65 verification key
    pub verify_key: MlDsaPublicKey,
}

impl LocalIdentity {
    /// Derive an identity from a seed
    pub fn generate(seed: &[u8]) -> Self {
        let signing_key = MlDsaSecretKey::generate_deterministic(seed);
        let verify_key = signing_key.verify_key();
        Self {
            signing_key,
            verify_key,
        }
    }

    /// Get the peer ID for this identity
    pub fn peer_id(&self) -> PeerId {
        keccak256(&self.verify_key.to_bytes())
    }
}

/// Remote peer information learned during the handshake
#[derive(Clone, Debug)]
pub struct RemotePeer {
    /// Peer's verification key, recovered from its Verify signature
    pub verify_key: MlDsaPublicKey,
    /// Derived peer ID
    pub peer_id: PeerId,
}

impl RemotePeer {
    pub(crate) fn from_verify_key(verify_key: MlDsaPublicKey) -> Self {
        let peer_id = keccak256(&verify_key.to_bytes());
        Self {
            verify_key,
            peer_id,
        }
    }
}

/// Handshake session state machine.
///
/// Any step failure transitions to the terminal `Failed`; a failed
/// session is unusable and the caller must construct a new one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HandshakeState {
    Idle,
    HelloSent,
    HelloReceived,
    SecretsDerived,
    VerifyExchanged,
    Complete,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peer_id_deterministic() {
        let id1 = LocalIdentity::generate(b"peer-id-seed");
        let id2 = LocalIdentity::generate(b"peer-id-seed");
        assert_eq!(id1.peer_id(), id2.peer_id());

        let id3 = LocalIdentity::generate(b"other-seed");
        assert_ne!(id1.peer_id(), id3.peer_id());
    }

    #[test]
    fn verify_message_pads_to_fixed_size() {
        let msg = VerifyMessage::new(vec![0xAB; 100]);
        assert_eq!(msg.signature.len(), SEALED_SIGNATURE_LEN);
        assert_eq!(msg.signature_len, 100);
        assert_eq!(msg.signature_bytes().unwrap(), &[0xAB; 100][..]);
    }

    #[test]
    fn client_hello_rlp_round_trip() {
        let hello = ClientHello {
            kem_public_key: vec![0x11; 1184],
            nonce: [0x22; HELLO_NONCE_LEN],
            version: PROTOCOL_VERSION,
        };
        let encoded = rlp::encode(&hello);
        let decoded: ClientHello = rlp::decode(&encoded).unwrap();
        assert_eq!(decoded, hello);
    }

    #[test]
    fn server_hello_rlp_round_trip() {
        let hello = ServerHello {
            kem_ciphertext: vec![0x33; 1088],
            nonce: [0x44; HELLO_NONCE_LEN],
            version: PROTOCOL_VERSION,
        };
        let encoded = rlp::encode(&hello);
        let decoded: ServerHello = rlp::decode(&encoded).unwrap();
        assert_eq!(decoded, hello);
    }

    #[test]
    fn verify_message_rlp_round_trip() {
        let msg = VerifyMessage::new(vec![0x55; SEALED_SIGNATURE_LEN]);
        let encoded = rlp::encode(&msg);
        let decoded: VerifyMessage = rlp::decode(&encoded).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn verify_message_rejects_oversized_length() {
        let mut msg = VerifyMessage::new(vec![0x55; 64]);
        msg.signature_len = SEALED_SIGNATURE_LEN as u32 + 1;
        let encoded = rlp::encode(&msg);
        assert!(rlp::decode::<VerifyMessage>(&encoded).is_err());
    }

    #[test]
    fn client_hello_rejects_bad_nonce_length() {
        let mut s = RlpStream::new();
        s.begin_list(3);
        s.append(&vec![0x11u8; 1184]);
        s.append(&vec![0x22u8; 16]); // wrong nonce length
        s.append(&PROTOCOL_VERSION);
        assert!(rlp::decode::<ClientHello>(&s.out()).is_err());
    }
}

//! AEAD record layer
//!
//! Every record on the wire is a fixed 47-byte header followed by an
//! AES-256-GCM-sealed payload of exactly `record_len` bytes. The header's
//! 32 random `additional_data` bytes are authenticated (bound into the
//! AEAD call) but never encrypted, tying each header to its ciphertext
//! without exposing plaintext. The nonce is the direction's IV XORed with
//! a strictly increasing sequence counter; uniqueness rests entirely on
//! the caller incrementing that counter exactly once per seal/open, which
//! [`RecordCipher`] enforces by owning it.

use aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::RngCore;
use tokio::io::AsyncRead;

use crate::buffer::ReadBuffer;
use crate::error::{Error, RecordError, Result};
use crate::secrets::{DirectionSecret, AEAD_IV_LEN};

/// Record protocol major version
pub const RECORD_MAJOR: u8 = 1;
/// Record protocol minor version
pub const RECORD_MINOR: u8 = 0;

/// Serialized header size:
/// `type(1) ‖ major(1) ‖ minor(1) ‖ record_len(4) ‖ context(8) ‖ additional_data(32)`
pub const HEADER_LEN: usize = 47;

/// AES-256-GCM tag length
pub const AEAD_TAG_LEN: usize = 16;

/// Length of the per-record authenticated additional data
pub const ADDITIONAL_DATA_LEN: usize = 32;

/// Record content types
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    /// Handshake-phase payload (the Verify messages)
    Handshake = 22,
    /// Post-handshake application payload
    ApplicationData = 23,
}

impl PacketType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            22 => Some(PacketType::Handshake),
            23 => Some(PacketType::ApplicationData),
            _ => None,
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            PacketType::Handshake => "Handshake",
            PacketType::ApplicationData => "ApplicationData",
        }
    }
}

/// Per-record metadata preceding every sealed payload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub packet_type: PacketType,
    pub major: u8,
    pub minor: u8,
    pub record_len: u32,
    pub context: u64,
    pub additional_data: [u8; ADDITIONAL_DATA_LEN],
}

impl Header {
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0] = self.packet_type as u8;
        out[1] = self.major;
        out[2] = self.minor;
        out[3..7].copy_from_slice(&self.record_len.to_be_bytes());
        out[7..15].copy_from_slice(&self.context.to_be_bytes());
        out[15..47].copy_from_slice(&self.additional_data);
        out
    }

    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, RecordError> {
        if bytes.len() != HEADER_LEN {
            return Err(RecordError::InvalidHeader);
        }
        let packet_type = PacketType::from_u8(bytes[0]).ok_or(RecordError::InvalidHeader)?;
        let record_len = u32::from_be_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]);
        let mut context_bytes = [0u8; 8];
        context_bytes.copy_from_slice(&bytes[7..15]);
        let mut additional_data = [0u8; ADDITIONAL_DATA_LEN];
        additional_data.copy_from_slice(&bytes[15..47]);
        Ok(Self {
            packet_type,
            major: bytes[1],
            minor: bytes[2],
            record_len,
            context: u64::from_be_bytes(context_bytes),
            additional_data,
        })
    }
}

/// The decrypted result of one record
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataPacket {
    pub packet_type: PacketType,
    pub sequence_number: u64,
    pub fragment: Vec<u8>,
    pub context: u64,
}

/// Build the 12-byte nonce: sequence counter right-aligned big-endian,
/// XORed into the low-order bytes of the direction IV.
fn nonce_for(iv: &[u8; AEAD_IV_LEN], seq: u64) -> [u8; AEAD_IV_LEN] {
    let mut nonce = *iv;
    for (slot, byte) in nonce[AEAD_IV_LEN - 8..].iter_mut().zip(seq.to_be_bytes()) {
        *slot ^= byte;
    }
    nonce
}

/// Seal a plaintext into a record payload.
///
/// Appends the inner content-type byte (plus zero padding; current policy
/// is none) and encrypts under `iv XOR seq` with `additional_data` bound
/// as AEAD associated data.
pub fn encrypt(
    cipher: &Aes256Gcm,
    plaintext: &[u8],
    additional_data: &[u8],
    packet_type: PacketType,
    iv: &[u8; AEAD_IV_LEN],
    seq: u64,
) -> std::result::Result<Vec<u8>, RecordError> {
    let mut inner = Vec::with_capacity(plaintext.len() + 1);
    inner.extend_from_slice(plaintext);
    inner.push(packet_type as u8);

    let nonce_bytes = nonce_for(iv, seq);
    let payload = Payload {
        msg: &inner,
        aad: additional_data,
    };
    cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), payload)
        .map_err(|_| RecordError::EncryptionFailed)
}

/// Open a record payload: verify the tag, strip trailing zero padding,
/// recover the inner content type and the true fragment.
pub fn decrypt(
    cipher: &Aes256Gcm,
    ciphertext: &[u8],
    additional_data: &[u8],
    iv: &[u8; AEAD_IV_LEN],
    seq: u64,
) -> std::result::Result<(PacketType, Vec<u8>), RecordError> {
    if ciphertext.len() < AEAD_TAG_LEN {
        return Err(RecordError::ShortBuffer);
    }

    let nonce_bytes = nonce_for(iv, seq);
    let payload = Payload {
        msg: ciphertext,
        aad: additional_data,
    };
    let inner = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), payload)
        .map_err(|_| RecordError::AuthenticationFailed)?;

    let mut end = inner.len();
    while end > 0 && inner[end - 1] == 0 {
        end -= 1;
    }
    if end == 0 {
        return Err(RecordError::BadContentType(0));
    }
    let type_byte = inner[end - 1];
    let packet_type = PacketType::from_u8(type_byte).ok_or(RecordError::BadContentType(type_byte))?;
    Ok((packet_type, inner[..end - 1].to_vec()))
}

/// One direction's record protection: AEAD cipher, IV, and the sequence
/// counter whose monotonic increment is the sole guarantor of nonce
/// uniqueness. Counters start at 1 and are scoped per direction and per
/// phase; a fresh `RecordCipher` is built when the phase changes.
pub struct RecordCipher {
    cipher: Aes256Gcm,
    iv: [u8; AEAD_IV_LEN],
    seq: u64,
}

impl RecordCipher {
    pub(crate) fn new(secret: &DirectionSecret) -> std::result::Result<Self, RecordError> {
        let cipher = Aes256Gcm::new_from_slice(secret.key())
            .map_err(|_| RecordError::EncryptionFailed)?;
        Ok(Self {
            cipher,
            iv: *secret.iv(),
            seq: 1,
        })
    }

    /// The sequence number the next seal/open will use.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Seal a plaintext into a full record (header ‖ ciphertext) and
    /// advance the sequence counter.
    pub(crate) fn seal(
        &mut self,
        packet_type: PacketType,
        context: u64,
        plaintext: &[u8],
    ) -> std::result::Result<Vec<u8>, RecordError> {
        if self.seq == u64::MAX {
            return Err(RecordError::SequenceExhausted);
        }

        let mut additional_data = [0u8; ADDITIONAL_DATA_LEN];
        rand::thread_rng().fill_bytes(&mut additional_data);

        let ciphertext = encrypt(
            &self.cipher,
            plaintext,
            &additional_data,
            packet_type,
            &self.iv,
            self.seq,
        )?;
        let header = Header {
            packet_type,
            major: RECORD_MAJOR,
            minor: RECORD_MINOR,
            record_len: ciphertext.len() as u32,
            context,
            additional_data,
        };

        let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&ciphertext);
        self.seq += 1;
        Ok(out)
    }

    /// Open a received record and advance the sequence counter.
    pub(crate) fn open(
        &mut self,
        header: &Header,
        ciphertext: &[u8],
    ) -> std::result::Result<DataPacket, RecordError> {
        if self.seq == u64::MAX {
            return Err(RecordError::SequenceExhausted);
        }

        let (packet_type, fragment) = decrypt(
            &self.cipher,
            ciphertext,
            &header.additional_data,
            &self.iv,
            self.seq,
        )?;
        let sequence_number = self.seq;
        self.seq += 1;
        Ok(DataPacket {
            packet_type,
            sequence_number,
            fragment,
            context: header.context,
        })
    }
}

/// Read one record (header plus exactly `record_len` payload bytes) from
/// the stream.
pub(crate) async fn read_record<S>(
    stream: &mut S,
    buf: &mut ReadBuffer,
    max_len: usize,
) -> Result<(Header, Vec<u8>)>
where
    S: AsyncRead + Unpin,
{
    let header_bytes = buf.fill_exact(stream, HEADER_LEN).await?;
    let header = Header::decode(header_bytes).map_err(Error::Record)?;

    let len = header.record_len as usize;
    if len > max_len {
        return Err(Error::Record(RecordError::PayloadTooLarge { len, max: max_len }));
    }
    if len < AEAD_TAG_LEN {
        return Err(Error::Record(RecordError::ShortBuffer));
    }
    let ciphertext = buf.fill_exact(stream, len).await?.to_vec();
    Ok((header, ciphertext))
}

//! Handshake message serialization
//!
//! Wire format per message: `[2-byte big-endian length][RLP fields][padding]`.
//! Outbound messages get a random padding tail to blunt passive
//! length-fingerprinting of the handshake. The transcript never sees the
//! wire bytes: both sides hash [`serialize_deterministic`] output (zero
//! padding) of the messages they sent and decoded, so random padding can
//! never perturb the derived secrets.

use rand::{Rng, RngCore};
use rlp::{Decodable, Encodable, Rlp};
use tokio::io::AsyncRead;

use crate::buffer::ReadBuffer;
use crate::error::{Error, RecordError, Result};

/// Length-prefix size for handshake messages
pub const LENGTH_PREFIX_LEN: usize = 2;

/// Minimum random padding appended to an outbound handshake message
pub const MIN_PADDING: usize = 100;

/// Maximum random padding appended to an outbound handshake message
pub const MAX_PADDING: usize = 200;

fn encode_framed<M: Encodable>(msg: &M, padding: &[u8]) -> Result<Vec<u8>> {
    let body = rlp::encode(msg);
    let total = body.len() + padding.len();
    if total > u16::MAX as usize {
        return Err(RecordError::MessageTooLarge(total).into());
    }
    let mut out = Vec::with_capacity(LENGTH_PREFIX_LEN + total);
    out.extend_from_slice(&(total as u16).to_be_bytes());
    out.extend_from_slice(&body);
    out.extend_from_slice(padding);
    Ok(out)
}

/// Serialize a message for the wire, with a random padding tail.
pub fn serialize<M: Encodable>(msg: &M) -> Result<Vec<u8>> {
    let mut rng = rand::thread_rng();
    let pad_len = rng.gen_range(MIN_PADDING..=MAX_PADDING);
    let mut padding = vec![0u8; pad_len];
    rng.fill_bytes(&mut padding);
    encode_framed(msg, &padding)
}

/// Serialize a message with caller-controlled zero padding.
///
/// This is the transcript encoding: both sides must produce identical
/// bytes for the same message, so padding defaults to none and is never
/// random here.
pub fn serialize_deterministic<M: Encodable>(msg: &M, pad_len: usize) -> Result<Vec<u8>> {
    encode_framed(msg, &vec![0u8; pad_len])
}

fn decode_rlp<M: Decodable>(body: &[u8]) -> std::result::Result<M, RecordError> {
    let outer = Rlp::new(body);
    let info = outer.payload_info()?;
    let total = info.header_len + info.value_len;
    if total > body.len() {
        return Err(RecordError::ShortRead { expected: total });
    }
    // Everything past the RLP item is padding; decode from the front only.
    let rlp = Rlp::new(&body[..total]);
    Ok(M::decode(&rlp)?)
}

/// Decode a framed message from an in-memory buffer (a decrypted record
/// fragment).
pub fn decode_framed<M: Decodable>(frame: &[u8]) -> std::result::Result<M, RecordError> {
    if frame.len() < LENGTH_PREFIX_LEN {
        return Err(RecordError::ShortRead {
            expected: LENGTH_PREFIX_LEN,
        });
    }
    let declared = u16::from_be_bytes([frame[0], frame[1]]) as usize;
    let body = &frame[LENGTH_PREFIX_LEN..];
    if body.len() < declared {
        return Err(RecordError::ShortRead { expected: declared });
    }
    decode_rlp(&body[..declared])
}

/// Read one length-prefixed message from the stream.
pub async fn read_message<M, S>(stream: &mut S, buf: &mut ReadBuffer, max_len: usize) -> Result<M>
where
    M: Decodable,
    S: AsyncRead + Unpin,
{
    let prefix = buf.fill_exact(stream, LENGTH_PREFIX_LEN).await?;
    let declared = u16::from_be_bytes([prefix[0], prefix[1]]) as usize;
    if declared > max_len {
        return Err(Error::Record(RecordError::PayloadTooLarge {
            len: declared,
            max: max_len,
        }));
    }
    let body = buf.fill_exact(stream, declared).await?;
    Ok(decode_rlp(body)?)
}

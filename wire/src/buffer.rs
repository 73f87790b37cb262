//! Growable byte buffers over a stream

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Error, RecordError, Result};

const INITIAL_CAPACITY: usize = 4 * 1024;

/// Read-side buffer: owns the scratch space for exact-length reads so the
/// per-record allocations stay off the hot path.
pub struct ReadBuffer {
    buf: BytesMut,
}

impl ReadBuffer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Read exactly `len` bytes from the stream, returning them as a slice
    /// into the internal buffer. A stream that ends early surfaces as
    /// `ShortRead`.
    pub async fn fill_exact<S>(&mut self, stream: &mut S, len: usize) -> Result<&[u8]>
    where
        S: AsyncRead + Unpin,
    {
        self.buf.clear();
        self.buf.resize(len, 0);
        stream.read_exact(&mut self.buf[..]).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::Record(RecordError::ShortRead { expected: len })
            } else {
                Error::Io(e)
            }
        })?;
        Ok(&self.buf[..])
    }
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Write-side buffer: staging area flushed to the stream in one write.
pub struct WriteBuffer {
    buf: BytesMut,
}

impl WriteBuffer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Append bytes to the staging buffer.
    pub fn put(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write everything staged to the stream and clear the buffer.
    pub async fn flush_to<S>(&mut self, stream: &mut S) -> Result<()>
    where
        S: AsyncWrite + Unpin,
    {
        stream.write_all(&self.buf).await?;
        stream.flush().await?;
        self.buf.clear();
        Ok(())
    }
}

impl Default for WriteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_exact() {
        let (mut a, mut b) = tokio::io::duplex(256);

        let mut wbuf = WriteBuffer::new();
        wbuf.put(b"hello ");
        wbuf.put(b"world");
        wbuf.flush_to(&mut a).await.unwrap();

        let mut rbuf = ReadBuffer::new();
        let got = rbuf.fill_exact(&mut b, 11).await.unwrap();
        assert_eq!(got, b"hello world");
    }

    #[tokio::test]
    async fn short_stream_is_short_read() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(b"abc").await.unwrap();
        drop(a);

        let mut rbuf = ReadBuffer::new();
        let err = rbuf.fill_exact(&mut b, 10).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Record(RecordError::ShortRead { expected: 10 })
        ));
    }

    #[tokio::test]
    async fn buffer_is_reusable() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(b"firstsecond").await.unwrap();

        let mut rbuf = ReadBuffer::new();
        let first = rbuf.fill_exact(&mut b, 5).await.unwrap().to_vec();
        let second = rbuf.fill_exact(&mut b, 6).await.unwrap().to_vec();
        assert_eq!(first, b"first");
        assert_eq!(second, b"second");
    }
}

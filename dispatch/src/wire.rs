//! The token wire format: a four-ASCII-byte tag, an eight-hex-digit
//! big-endian-rendered length (or bare numeric value for count-style
//! tokens), followed by a binary payload of that length when one applies.
//!
//! This is a small, from-scratch codec - the dispatch protocol's framing is
//! simple enough that pulling in a general-purpose codec crate would add
//! more surface than it saves. `tokio::io::{AsyncWrite, AsyncRead}` remain
//! the plumbing layer underneath it.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::DispatchError;

pub mod tag {
    pub const DIST: &[u8; 4] = b"DIST";
    pub const ARGC: &[u8; 4] = b"ARGC";
    pub const ARGV: &[u8; 4] = b"ARGV";
    pub const CWD: &[u8; 4] = b"CWD ";
    pub const DOTI: &[u8; 4] = b"DOTI";
    pub const GCDA: &[u8; 4] = b"GCDA";
    pub const NFIL: &[u8; 4] = b"NFIL";
    pub const FNAM: &[u8; 4] = b"FNAM";
    pub const OBJF: &[u8; 4] = b"OBJF";
    pub const ERRS: &[u8; 4] = b"ERRS";
    pub const DEPS: &[u8; 4] = b"DEPS";
    pub const HDEP: &[u8; 4] = b"HDEP";
    pub const WSTA: &[u8; 4] = b"WSTA";
}

/// Writes tokens to an [`AsyncWrite`] sink.
pub struct TokenWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> TokenWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    async fn write_tag(&mut self, tag: &[u8; 4]) -> Result<(), DispatchError> {
        self.inner
            .write_all(tag)
            .await
            .map_err(DispatchError::Transport)
    }

    async fn write_len(&mut self, len: u32) -> Result<(), DispatchError> {
        self.inner
            .write_all(format!("{len:08x}").as_bytes())
            .await
            .map_err(DispatchError::Transport)
    }

    /// A bare numeric token: tag followed by an eight-hex-digit value, no
    /// payload (`ARGC`, `GCDA`).
    pub async fn write_number(&mut self, tag: &[u8; 4], value: u32) -> Result<(), DispatchError> {
        self.write_tag(tag).await?;
        self.write_len(value).await
    }

    /// A length-prefixed binary token: tag, eight-hex-digit byte length,
    /// payload (`ARGV`, `CWD`, `DOTI`, `FNAM`).
    pub async fn write_bytes(&mut self, tag: &[u8; 4], payload: &[u8]) -> Result<(), DispatchError> {
        self.write_tag(tag).await?;
        self.write_len(
            payload
                .len()
                .try_into()
                .map_err(|_| DispatchError::Logic("payload exceeds 4 GiB token limit".into()))?,
        )
        .await?;
        self.inner
            .write_all(payload)
            .await
            .map_err(DispatchError::Transport)
    }

    /// Like [`write_bytes`](Self::write_bytes) but the payload comes from a
    /// file on disk, optionally gzip-compressed first. Returns the number of
    /// bytes actually written on the wire (the payload length), for
    /// throughput accounting.
    pub async fn write_file(
        &mut self,
        tag: &[u8; 4],
        path: &std::path::Path,
        compress: bool,
    ) -> Result<u64, DispatchError> {
        let raw = tokio::fs::read(path).await.map_err(DispatchError::Io)?;
        let payload = if compress {
            tokio::task::spawn_blocking(move || gzip_compress(&raw))
                .await
                .map_err(|e| DispatchError::Logic(format!("compression task panicked: {e}")))??
        } else {
            raw
        };
        let len = payload.len() as u64;
        self.write_bytes(tag, &payload).await?;
        Ok(len)
    }

    pub async fn flush(&mut self) -> Result<(), DispatchError> {
        self.inner.flush().await.map_err(DispatchError::Transport)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn gzip_compress(raw: &[u8]) -> Result<Vec<u8>, DispatchError> {
    use std::io::Write as _;
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(raw).map_err(DispatchError::Io)?;
    encoder.finish().map_err(DispatchError::Io)
}

/// A decoded token, for reading back what a [`TokenWriter`] produced - used
/// by the result receiver and by tests asserting on the literal byte
/// sequence emitted for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Number { tag: [u8; 4], value: u32 },
    Bytes { tag: [u8; 4], payload: Vec<u8> },
}

impl Token {
    pub fn tag(&self) -> &[u8; 4] {
        match self {
            Token::Number { tag, .. } => tag,
            Token::Bytes { tag, .. } => tag,
        }
    }
}

/// Reads tokens from an [`AsyncRead`] source. The reader has no way to know
/// whether a given tag carries a bare numeric value or a length-prefixed
/// payload - callers that need to distinguish (e.g. `ARGC` vs `ARGV`) read
/// with [`TokenReader::read_number`]/[`TokenReader::read_bytes`] directly
/// rather than through [`Token`].
pub struct TokenReader<R> {
    inner: R,
}

impl<R: AsyncRead + Unpin> TokenReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    async fn read_tag(&mut self) -> Result<[u8; 4], DispatchError> {
        let mut tag = [0u8; 4];
        self.inner
            .read_exact(&mut tag)
            .await
            .map_err(DispatchError::Transport)?;
        Ok(tag)
    }

    async fn read_len(&mut self) -> Result<u32, DispatchError> {
        let mut hex = [0u8; 8];
        self.inner
            .read_exact(&mut hex)
            .await
            .map_err(DispatchError::Transport)?;
        let text = std::str::from_utf8(&hex)
            .map_err(|e| DispatchError::Protocol(format!("non-ASCII length field: {e}")))?;
        u32::from_str_radix(text, 16)
            .map_err(|e| DispatchError::Protocol(format!("malformed length field: {e}")))
    }

    /// Read a tag expected to carry a bare numeric value.
    pub async fn read_number(&mut self, expect: &[u8; 4]) -> Result<u32, DispatchError> {
        let tag = self.read_tag().await?;
        if &tag != expect {
            return Err(DispatchError::Protocol(format!(
                "expected tag {:?}, got {:?}",
                std::str::from_utf8(expect),
                std::str::from_utf8(&tag)
            )));
        }
        self.read_len().await
    }

    /// Read a tag expected to carry a length-prefixed payload.
    pub async fn read_bytes(&mut self, expect: &[u8; 4]) -> Result<Vec<u8>, DispatchError> {
        let tag = self.read_tag().await?;
        if &tag != expect {
            return Err(DispatchError::Protocol(format!(
                "expected tag {:?}, got {:?}",
                std::str::from_utf8(expect),
                std::str::from_utf8(&tag)
            )));
        }
        let len = self.read_len().await? as usize;
        let mut payload = vec![0u8; len];
        self.inner
            .read_exact(&mut payload)
            .await
            .map_err(DispatchError::Transport)?;
        Ok(payload)
    }
}

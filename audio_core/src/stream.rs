//! Streaming assembled audio back to a caller.
//!
//! Assembly produces one in-memory buffer. Callers either stream it straight
//! from memory or spool it to a named temp file first; a spooled file is
//! removed as soon as its stream finishes or is dropped.

use anyhow::Context;
use futures_core::Stream;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tokio::io::AsyncReadExt;
use tracing::debug;

pub const DEFAULT_CHUNK_SIZE: usize = 4096;

pub type AudioChunk = std::io::Result<Vec<u8>>;

/// A finished WAV file, or nothing when no segment could be synthesized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledAudio {
    bytes: Vec<u8>,
    chunk_size: usize,
}

impl AssembledAudio {
    pub fn new(bytes: Vec<u8>, chunk_size: usize) -> Self {
        Self {
            bytes,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn empty(chunk_size: usize) -> Self {
        Self::new(Vec::new(), chunk_size)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Consume the buffer as a stream of `chunk_size` chunks. The stream is
    /// finite and cannot be restarted.
    pub fn into_stream(self) -> impl Stream<Item = AudioChunk> + Send + 'static {
        let Self { bytes, chunk_size } = self;
        async_stream::stream! {
            for chunk in bytes.chunks(chunk_size) {
                yield Ok(chunk.to_vec());
            }
        }
    }

    /// Write the buffer to a named temp file inside `dir`.
    pub async fn spool_to(self, dir: &Path) -> anyhow::Result<SpooledAudio> {
        let dir = dir.to_path_buf();
        let Self { bytes, chunk_size } = self;
        let len = bytes.len() as u64;

        let file = tokio::task::spawn_blocking(move || -> anyhow::Result<NamedTempFile> {
            let mut file = tempfile::Builder::new()
                .prefix("exam-audio-")
                .suffix(".wav")
                .tempfile_in(&dir)
                .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
            file.write_all(&bytes)?;
            file.flush()?;
            Ok(file)
        })
        .await
        .context("spool task failed")??;

        debug!(path = %file.path().display(), bytes = len, "spooled assembled audio");
        Ok(SpooledAudio {
            file,
            chunk_size,
            len,
        })
    }
}

/// Assembled audio held in a temp file that lives exactly as long as its
/// stream.
#[derive(Debug)]
pub struct SpooledAudio {
    file: NamedTempFile,
    chunk_size: usize,
    len: u64,
}

impl SpooledAudio {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stream the file in chunks. The file is deleted after the last chunk
    /// is read, or when the stream is dropped early.
    pub fn into_stream(self) -> impl Stream<Item = AudioChunk> + Send + 'static {
        let Self {
            file, chunk_size, ..
        } = self;
        async_stream::try_stream! {
            let mut reader = tokio::fs::File::from_std(file.reopen()?);
            let mut buf = vec![0u8; chunk_size];
            loop {
                let n = reader.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield buf[..n].to_vec();
            }
            drop(reader);
            let path = file.path().display().to_string();
            file.close()?;
            debug!(path = %path, "removed spooled audio");
        }
    }
}

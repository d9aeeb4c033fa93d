//! Line-safe chunked reading
//!
//! Each chunk is `chunk_size` bytes extended through the next `\n`, so no
//! record is split across chunks. A line longer than the chunk size grows
//! the buffer until its terminator (or end of input) is seen.

use bytes::BytesMut;
use encoding_rs::Encoding;
use futures::StreamExt;

use super::encoding;
use super::strategy::HandlerError;
use super::types::SubUnit;
use crate::storage::{ByteStream, StorageError};

pub(crate) struct ChunkedReader {
    location: String,
    stream: Option<ByteStream>,
    buffer: BytesMut,
    /// Bytes of `buffer` past the chunk boundary already searched for `\n`
    scanned: usize,
    chunk_size: usize,
    encoding: &'static Encoding,
}

impl ChunkedReader {
    pub(crate) fn new(
        location: &str,
        stream: ByteStream,
        chunk_size: usize,
        encoding: &'static Encoding,
    ) -> Self {
        Self {
            location: location.to_string(),
            stream: Some(stream),
            buffer: BytesMut::new(),
            scanned: 0,
            chunk_size,
            encoding,
        }
    }

    pub(crate) async fn next(&mut self) -> Option<Result<SubUnit, HandlerError>> {
        let cut = match self.fill().await {
            Ok(cut) => cut,
            Err(e) => {
                self.stream = None;
                self.buffer.clear();
                return Some(Err(e));
            }
        };

        if cut == 0 {
            return None;
        }

        let chunk = self.buffer.split_to(cut).freeze();
        self.scanned = 0;

        Some(
            encoding::decode_strict(&chunk, self.encoding, &self.location).map(SubUnit::text),
        )
    }

    /// Read until a cut point is known; returns the chunk length
    async fn fill(&mut self) -> Result<usize, HandlerError> {
        loop {
            if let Some(cut) = self.find_cut() {
                return Ok(cut);
            }

            let Some(stream) = self.stream.as_mut() else {
                // Input exhausted: whatever is left is the final chunk
                return Ok(self.buffer.len());
            };

            match stream.next().await {
                Some(Ok(block)) => self.buffer.extend_from_slice(&block),
                Some(Err(e)) => {
                    return Err(StorageError::Access {
                        location: self.location.clone(),
                        source: e,
                    }
                    .into());
                }
                None => {
                    // Release the underlying handle as soon as it is drained
                    self.stream = None;
                }
            }
        }
    }

    fn find_cut(&mut self) -> Option<usize> {
        if self.buffer.len() < self.chunk_size {
            return None;
        }

        let start = self.chunk_size + self.scanned;
        match self.buffer[start..].iter().position(|&b| b == b'\n') {
            Some(offset) => Some(start + offset + 1),
            None => {
                self.scanned = self.buffer.len() - self.chunk_size;
                None
            }
        }
    }
}

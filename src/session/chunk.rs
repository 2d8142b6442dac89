use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{RecorderError, Result};

/// A single captured fragment
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Chunk number (0-indexed, contiguous)
    pub sequence: u64,
    /// Encoded bytes
    pub data: Vec<u8>,
    /// When the chunk was appended
    pub received_at: DateTime<Utc>,
}

/// Append-only, ordered chunk store for one session
///
/// Chunks must arrive with sequence numbers 0, 1, 2, ... without gaps.
/// The buffer hands its bytes out exactly once via [`ChunkBuffer::assemble`].
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    chunks: Vec<Chunk>,
    byte_len: usize,
    assembled: bool,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next chunk
    ///
    /// Fails with `OutOfOrderChunk` (buffer untouched) unless `sequence` is
    /// exactly one past the last appended chunk.
    pub fn append(&mut self, data: Vec<u8>, sequence: u64) -> Result<()> {
        if self.assembled {
            return Err(RecorderError::AlreadyAssembled);
        }

        let expected = self.next_sequence();
        if sequence != expected {
            return Err(RecorderError::OutOfOrderChunk {
                expected,
                got: sequence,
            });
        }

        debug!("Buffered chunk {} ({} bytes)", sequence, data.len());
        self.byte_len += data.len();
        self.chunks.push(Chunk {
            sequence,
            data,
            received_at: Utc::now(),
        });

        Ok(())
    }

    /// Concatenate all chunks in sequence order, transferring ownership out
    ///
    /// Succeeds at most once; an empty buffer yields `EmptyRecording`.
    pub fn assemble(&mut self) -> Result<Vec<u8>> {
        if self.assembled {
            return Err(RecorderError::AlreadyAssembled);
        }
        self.assembled = true;

        if self.chunks.is_empty() {
            return Err(RecorderError::EmptyRecording);
        }

        let output = self.concatenated();
        self.chunks.clear();
        self.byte_len = 0;

        Ok(output)
    }

    /// The bytes `assemble` would produce, without consuming the buffer
    pub fn concatenated(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(self.byte_len);
        for chunk in &self.chunks {
            output.extend_from_slice(&chunk.data);
        }
        output
    }

    /// Drop every buffered chunk (session abort)
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.byte_len = 0;
    }

    pub fn next_sequence(&self) -> u64 {
        self.chunks.last().map(|c| c.sequence + 1).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    pub fn is_assembled(&self) -> bool {
        self.assembled
    }
}

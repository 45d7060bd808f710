//! Chunked byte queues used for connection receive and send buffering.
//!
//! A [`Chunk`] is a fixed-capacity buffer with a read cursor; a
//! [`ByteQueue`] is a FIFO of chunks. Reads land in the tail chunk while it has
//! slack and in a fresh chunk otherwise, so buffered bytes are never moved.

use std::collections::VecDeque;
use std::io::{self, Read, Write};

use bytes::{Buf, BytesMut};

#[cfg(test)]
mod tests;

/// Capacity of each chunk allocated for inbound data.
pub const READ_CHUNK_SIZE: usize = 2048;

/// Unused bytes a tail chunk must have before it is reused for a read.
pub const MIN_READ_SLACK: usize = 64;

/// Result of a single non-blocking transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOutcome {
    /// Bytes moved; zero on a read means end of stream.
    Transferred(usize),
    /// The descriptor had nothing to offer (or no room) right now.
    WouldBlock,
}

/// Fixed-capacity byte buffer with a consumption cursor.
#[derive(Debug)]
pub struct Chunk {
    bytes: BytesMut,
}

impl Chunk {
    /// Allocates an empty chunk able to hold `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            bytes: BytesMut::with_capacity(capacity),
        }
    }

    /// Builds a full chunk holding a copy of `data`.
    #[must_use]
    pub fn from_slice(data: &[u8]) -> Self {
        Self {
            bytes: BytesMut::from(data),
        }
    }

    /// Bytes written but not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len()
    }

    /// Free space after the written bytes.
    #[must_use]
    pub fn unused(&self) -> usize {
        self.bytes.capacity() - self.bytes.len()
    }

    /// Unconsumed bytes, oldest first.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// Consumes and returns the next byte.
    pub fn get_byte(&mut self) -> Option<u8> {
        self.bytes.has_remaining().then(|| self.bytes.get_u8())
    }

    /// Marks `count` bytes as consumed.
    pub fn consume(&mut self, count: usize) {
        self.bytes.advance(count.min(self.bytes.len()));
    }

    /// Performs one read from `reader` into the unused space.
    ///
    /// Interrupted reads are retried.
    ///
    /// # Errors
    ///
    /// Returns any read error other than would-block or interruption.
    pub fn fill_from(&mut self, reader: &mut impl Read) -> io::Result<IoOutcome> {
        let filled = self.bytes.len();
        self.bytes.resize(filled + self.unused(), 0);
        let result = loop {
            let spare = self.bytes.get_mut(filled..).unwrap_or_default();
            match reader.read(spare) {
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                other => break other,
            }
        };
        match result {
            Ok(count) => {
                self.bytes.truncate(filled + count);
                Ok(IoOutcome::Transferred(count))
            }
            Err(error) => {
                self.bytes.truncate(filled);
                if error.kind() == io::ErrorKind::WouldBlock {
                    Ok(IoOutcome::WouldBlock)
                } else {
                    Err(error)
                }
            }
        }
    }

    /// Performs one write of the unconsumed bytes to `writer`.
    ///
    /// Interrupted writes are retried. A write that accepts nothing is
    /// reported as would-block.
    ///
    /// # Errors
    ///
    /// Returns any write error other than would-block or interruption.
    pub fn drain_to(&mut self, writer: &mut impl Write) -> io::Result<IoOutcome> {
        loop {
            match writer.write(&self.bytes) {
                Ok(0) if !self.bytes.is_empty() => return Ok(IoOutcome::WouldBlock),
                Ok(count) => {
                    self.bytes.advance(count);
                    return Ok(IoOutcome::Transferred(count));
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(IoOutcome::WouldBlock);
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// FIFO of [`Chunk`]s.
#[derive(Debug, Default)]
pub struct ByteQueue {
    chunks: VecDeque<Chunk>,
}

impl ByteQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk at the tail.
    pub fn enqueue(&mut self, chunk: Chunk) {
        self.chunks.push_back(chunk);
    }

    /// Oldest chunk.
    #[must_use]
    pub fn peek(&self) -> Option<&Chunk> {
        self.chunks.front()
    }

    /// Oldest chunk, mutably.
    pub fn peek_mut(&mut self) -> Option<&mut Chunk> {
        self.chunks.front_mut()
    }

    /// Newest chunk, mutably.
    pub fn peek_tail_mut(&mut self) -> Option<&mut Chunk> {
        self.chunks.back_mut()
    }

    /// Removes and returns the oldest chunk.
    pub fn dequeue(&mut self) -> Option<Chunk> {
        self.chunks.pop_front()
    }

    /// Reports whether the queue holds no chunks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Unconsumed bytes across every chunk.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.chunks.iter().map(Chunk::remaining).sum()
    }
}

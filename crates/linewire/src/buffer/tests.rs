use std::io::{self, Cursor, Read, Write};

use rstest::rstest;

use super::*;

/// Reader that fails once with the given kind before delegating.
struct FlakyReader<R> {
    inner: R,
    failure: Option<io::ErrorKind>,
}

impl<R: Read> Read for FlakyReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(kind) = self.failure.take() {
            return Err(kind.into());
        }
        self.inner.read(buf)
    }
}

/// Writer accepting at most `limit` bytes per call, then blocking.
struct ThrottledWriter {
    accepted: Vec<u8>,
    limit: usize,
    calls_before_block: usize,
}

impl Write for ThrottledWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.calls_before_block == 0 {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        self.calls_before_block -= 1;
        let count = buf.len().min(self.limit);
        self.accepted.extend_from_slice(&buf[..count]);
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn fill_reads_into_unused_space_only() {
    let mut chunk = Chunk::with_capacity(8);
    let mut source = Cursor::new(b"abcdefghijkl".to_vec());

    assert_eq!(
        chunk.fill_from(&mut source).expect("fill"),
        IoOutcome::Transferred(8)
    );
    assert_eq!(chunk.as_slice(), b"abcdefgh");
    assert_eq!(chunk.unused(), 0);
}

#[test]
fn get_byte_walks_the_cursor() {
    let mut chunk = Chunk::from_slice(b"hi");
    assert_eq!(chunk.get_byte(), Some(b'h'));
    assert_eq!(chunk.remaining(), 1);
    assert_eq!(chunk.get_byte(), Some(b'i'));
    assert_eq!(chunk.get_byte(), None);
}

#[rstest]
#[case(io::ErrorKind::WouldBlock, IoOutcome::WouldBlock)]
#[case(io::ErrorKind::Interrupted, IoOutcome::Transferred(3))]
fn fill_classifies_transient_errors(#[case] kind: io::ErrorKind, #[case] expected: IoOutcome) {
    let mut chunk = Chunk::with_capacity(16);
    let mut reader = FlakyReader {
        inner: Cursor::new(b"abc".to_vec()),
        failure: Some(kind),
    };
    assert_eq!(chunk.fill_from(&mut reader).expect("fill"), expected);
}

#[test]
fn fill_surfaces_hard_errors_and_keeps_contents() {
    let mut chunk = Chunk::with_capacity(16);
    chunk
        .fill_from(&mut Cursor::new(b"kept".to_vec()))
        .expect("first fill");
    let mut reader = FlakyReader {
        inner: Cursor::new(Vec::new()),
        failure: Some(io::ErrorKind::ConnectionReset),
    };

    let error = chunk.fill_from(&mut reader).expect_err("reset surfaces");
    assert_eq!(error.kind(), io::ErrorKind::ConnectionReset);
    assert_eq!(chunk.as_slice(), b"kept");
}

#[test]
fn drain_stops_at_would_block() {
    let mut chunk = Chunk::from_slice(b"0123456789");
    let mut writer = ThrottledWriter {
        accepted: Vec::new(),
        limit: 4,
        calls_before_block: 2,
    };

    assert_eq!(
        chunk.drain_to(&mut writer).expect("drain"),
        IoOutcome::Transferred(4)
    );
    assert_eq!(
        chunk.drain_to(&mut writer).expect("drain"),
        IoOutcome::Transferred(4)
    );
    assert_eq!(
        chunk.drain_to(&mut writer).expect("drain"),
        IoOutcome::WouldBlock
    );
    assert_eq!(writer.accepted, b"01234567");
    assert_eq!(chunk.as_slice(), b"89");
}

#[test]
fn queue_is_fifo() {
    let mut queue = ByteQueue::new();
    assert!(queue.is_empty());
    queue.enqueue(Chunk::from_slice(b"first"));
    queue.enqueue(Chunk::from_slice(b"second"));

    assert_eq!(queue.buffered(), 11);
    assert_eq!(queue.peek().map(Chunk::as_slice), Some(&b"first"[..]));
    assert_eq!(
        queue.peek_tail_mut().map(|chunk| chunk.as_slice().to_vec()),
        Some(b"second".to_vec())
    );
    assert!(queue.dequeue().is_some());
    assert_eq!(queue.peek().map(Chunk::as_slice), Some(&b"second"[..]));
}

//! Purpose: In-process byte pipe joining a producer thread to a stream decoder.
//! Exports: `pipe`, `PipeWriter`, `PipeReader`, `DEFAULT_PIPE_CAPACITY`.
//! Role: Handoff channel for concurrent production/consumption of framed records.
//! Invariants: Bytes reach the reader only on `flush` (or when the pending buffer fills).
//! Invariants: A full channel blocks `flush`; this is the only backpressure.
//! Invariants: Dropping the writer ends the reader cleanly; dropping the reader fails
//! the writer's next flush with `BrokenPipe`.
use std::io::{self, Read, Write};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};

/// Chunks the channel holds before `flush` blocks.
pub const DEFAULT_PIPE_CAPACITY: usize = 16;

// Pending bytes are handed off early once they reach this size.
const MAX_PENDING_BYTES: usize = 64 * 1024;

pub fn pipe(capacity: usize) -> (PipeWriter, PipeReader) {
    let (tx, rx) = sync_channel(capacity.max(1));
    (
        PipeWriter {
            tx,
            pending: Vec::new(),
        },
        PipeReader {
            rx,
            chunk: Vec::new(),
            pos: 0,
        },
    )
}

pub struct PipeWriter {
    tx: SyncSender<Vec<u8>>,
    pending: Vec<u8>,
}

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        if self.pending.len() >= MAX_PENDING_BYTES {
            self.flush()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::take(&mut self.pending);
        self.tx
            .send(chunk)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "pipe reader closed"))
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

pub struct PipeReader {
    rx: Receiver<Vec<u8>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.pos >= self.chunk.len() {
            match self.rx.recv() {
                Ok(chunk) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                // Writer dropped.
                Err(_) => return Ok(0),
            }
        }
        let available = &self.chunk[self.pos..];
        let take = available.len().min(buf.len());
        buf[..take].copy_from_slice(&available[..take]);
        self.pos += take;
        Ok(take)
    }
}

#[cfg(test)]
mod tests {
    use super::pipe;
    use crate::core::error::ErrorKind;
    use crate::core::stream::{StreamDecoder, StreamEncoder};
    use std::io::{Read, Write};

    #[test]
    fn bytes_arrive_after_flush() {
        let (mut writer, mut reader) = pipe(4);
        writer.write_all(b"hello").expect("write");
        writer.flush().expect("flush");
        drop(writer);
        let mut out = String::new();
        reader.read_to_string(&mut out).expect("read");
        assert_eq!(out, "hello");
    }

    #[test]
    fn producer_thread_feeds_decoder_in_order() {
        let (writer, reader) = pipe(1);
        let producer = std::thread::spawn(move || {
            let mut encoder = StreamEncoder::new(writer);
            for n in 0..50u32 {
                encoder.encode(&n).expect("encode");
                encoder.encode(&"sep").expect("encode");
            }
        });

        let mut decoder = StreamDecoder::new(reader);
        let mut seen = Vec::new();
        while let Some(n) = decoder.next_record::<u32>().expect("number") {
            seen.push(n);
            let sep: String = decoder.next_record().expect("sep").expect("some");
            assert_eq!(sep, "sep");
        }
        producer.join().expect("join");
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn closed_reader_fails_next_encode() {
        let (writer, reader) = pipe(4);
        drop(reader);
        let mut encoder = StreamEncoder::new(writer);
        let err = encoder.encode(&1u8).expect_err("closed");
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(encoder.records_written(), 0);
    }
}

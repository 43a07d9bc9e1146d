//! # Streaming Buffer
//!
//! Relays bytes from a producer thread (a download) to a consumer thread
//! (the decryptor), so decryption starts before the download ends.
//!
//! ```text
//!   producer                       buffer                        consumer
//!   ────────                       ──────                        ────────
//!   write(bytes) ──push──► ┌──────────────────────┐
//!                 notify   │ chunks: VecDeque      │ ◄──wait── read(size)
//!                 one ───► │ available: usize      │   until available ≥ size
//!                          │ finished: bool        │   or finished
//!   mark_finished ───────► └──────────────────────┘
//!                 notify all
//! ```
//!
//! One producer and one consumer. Writes never block; memory grows if the
//! producer outpaces the consumer. Reads wake on every write and
//! re-check; a wait that times out logs a warning and waits again, so a
//! stalled producer is visible without turning into an error.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use parking_lot::{Condvar, Mutex};

/// How long a read waits before logging that the producer is slow
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(1);

struct BufferState {
    chunks: VecDeque<Bytes>,
    available: usize,
    finished: bool,
}

impl BufferState {
    /// Remove up to `size` bytes from the front of the queue
    fn take(&mut self, size: usize) -> Bytes {
        let size = size.min(self.available);
        self.available -= size;

        if let Some(front) = self.chunks.front_mut() {
            if front.len() >= size {
                let out = front.split_to(size);
                if front.is_empty() {
                    self.chunks.pop_front();
                }
                return out;
            }
        }

        let mut out = BytesMut::with_capacity(size);
        while out.len() < size {
            let Some(mut front) = self.chunks.pop_front() else {
                break;
            };
            let needed = size - out.len();
            if front.len() > needed {
                out.extend_from_slice(&front.split_to(needed));
                self.chunks.push_front(front);
            } else {
                out.extend_from_slice(&front);
            }
        }
        out.freeze()
    }
}

/// Single-producer, single-consumer byte relay
pub struct StreamingBuffer {
    state: Mutex<BufferState>,
    ready: Condvar,
    wait_timeout: Duration,
}

impl StreamingBuffer {
    /// Create an empty buffer with the default wait timeout
    pub fn new() -> Self {
        Self::with_wait_timeout(DEFAULT_WAIT_TIMEOUT)
    }

    /// Create an empty buffer whose reads log after `wait_timeout` of silence
    pub fn with_wait_timeout(wait_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(BufferState {
                chunks: VecDeque::new(),
                available: 0,
                finished: false,
            }),
            ready: Condvar::new(),
            wait_timeout,
        }
    }

    /// Append `data` and wake the reader
    ///
    /// Never blocks. Returns the number of bytes accepted, which is 0 once
    /// the buffer is finished.
    pub fn write(&self, data: &[u8]) -> usize {
        if data.is_empty() {
            return 0;
        }

        let mut state = self.state.lock();
        if state.finished {
            tracing::debug!("Dropping {} bytes written after finish", data.len());
            return 0;
        }
        state.chunks.push_back(Bytes::copy_from_slice(data));
        state.available += data.len();
        drop(state);

        self.ready.notify_one();
        data.len()
    }

    /// Take `size` bytes, blocking until they are available
    ///
    /// Returns fewer bytes only once the buffer is finished; an empty
    /// result means the stream is exhausted.
    pub fn read(&self, size: usize) -> Bytes {
        let mut state = self.state.lock();

        while state.available < size && !state.finished {
            let waited = self.ready.wait_for(&mut state, self.wait_timeout);
            if waited.timed_out() && state.available < size && !state.finished {
                tracing::warn!(
                    "Waited {:?} for {} bytes from the producer, {} available",
                    self.wait_timeout,
                    size,
                    state.available
                );
            }
        }

        state.take(size)
    }

    /// Signal that no more bytes will be written
    ///
    /// Wakes every waiting reader. Calling it again does nothing.
    pub fn mark_finished(&self) {
        let mut state = self.state.lock();
        if state.finished {
            return;
        }
        state.finished = true;
        drop(state);

        tracing::debug!("Streaming buffer finished");
        self.ready.notify_all();
    }

    /// Whether [`Self::mark_finished`] has been called
    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Bytes written but not yet read
    pub fn available(&self) -> usize {
        self.state.lock().available
    }
}

impl Default for StreamingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl Read for &StreamingBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let bytes = StreamingBuffer::read(*self, buf.len());
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    fn read_to_end(&mut self, _buf: &mut Vec<u8>) -> io::Result<usize> {
        Err(unbounded_read())
    }

    fn read_to_string(&mut self, _buf: &mut String) -> io::Result<usize> {
        Err(unbounded_read())
    }
}

impl Write for &StreamingBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(StreamingBuffer::write(*self, buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn unbounded_read() -> io::Error {
    io::Error::new(
        ErrorKind::InvalidInput,
        "Streaming buffer only supports sized reads",
    )
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_read_after_finish_returns_short() {
        let buffer = StreamingBuffer::new();
        buffer.write(b"hello ");
        buffer.write(b"world");
        buffer.mark_finished();

        assert_eq!(&buffer.read(4)[..], b"hell");
        assert_eq!(&buffer.read(4)[..], b"o wo");
        assert_eq!(&buffer.read(4)[..], b"rld");
        assert!(buffer.read(4).is_empty());
    }

    #[test]
    fn test_read_spans_writes() {
        let buffer = StreamingBuffer::new();
        buffer.write(b"ab");
        buffer.write(b"cd");
        buffer.write(b"ef");

        assert_eq!(&buffer.read(5)[..], b"abcde");
        assert_eq!(buffer.available(), 1);
    }

    #[test]
    fn test_mark_finished_idempotent() {
        let buffer = StreamingBuffer::new();
        buffer.mark_finished();
        buffer.mark_finished();

        assert!(buffer.is_finished());
        assert_eq!(buffer.write(b"late"), 0);
        assert!(buffer.read(1).is_empty());
    }

    #[test]
    fn test_unbounded_read_rejected() {
        let buffer = StreamingBuffer::new();
        buffer.write(b"data");
        buffer.mark_finished();

        let mut out = Vec::new();
        let err = (&buffer).read_to_end(&mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(buffer.available(), 4);
    }

    #[test]
    fn test_producer_consumer_preserves_order() {
        let buffer = StreamingBuffer::with_wait_timeout(Duration::from_millis(10));
        let expected: Vec<u8> = (0..10_000u32).map(|i| (i % 256) as u8).collect();

        let received = thread::scope(|scope| {
            scope.spawn(|| {
                for piece in expected.chunks(37) {
                    buffer.write(piece);
                    if piece[0] % 50 == 0 {
                        thread::sleep(Duration::from_millis(1));
                    }
                }
                buffer.mark_finished();
            });

            let mut received = Vec::new();
            for size in [1usize, 100, 4096, 13].iter().cycle() {
                let bytes = buffer.read(*size);
                if bytes.is_empty() {
                    break;
                }
                received.extend_from_slice(&bytes);
            }
            received
        });

        assert_eq!(received, expected);
    }

    #[test]
    fn test_reader_waits_past_timeout() {
        let buffer = StreamingBuffer::with_wait_timeout(Duration::from_millis(5));

        thread::scope(|scope| {
            scope.spawn(|| {
                thread::sleep(Duration::from_millis(30));
                buffer.write(b"late bytes");
            });

            assert_eq!(&buffer.read(10)[..], b"late bytes");
        });
    }
}

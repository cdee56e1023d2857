//! Byte transport abstraction the I/O loop reads from and writes to.
//!
//! A serial port is the usual implementation (see the `serialport` feature),
//! [`MemoryTransport`] serves simulations and tests.

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use crate::{constants::NMEA_END_CHAR_2, error::ReadError};

/// Bidirectional byte stream with a configurable read timeout
pub trait Transport: Send {
    /// Number of bytes that can be read without waiting
    fn bytes_available(&mut self) -> io::Result<usize>;

    /// Read exactly `len` bytes or fail with [`ReadError::FrameTimeout`]
    fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, ReadError>;

    /// Read up to and including the next `\n`, at most `max_len` bytes.
    ///
    /// Hitting `max_len` is not an error, the caller sees an unterminated line.
    fn read_line(&mut self, max_len: usize) -> Result<Vec<u8>, ReadError> {
        let mut line = Vec::new();
        while line.len() < max_len {
            let byte = match self.read_exact(1) {
                Ok(byte) => byte,
                Err(ReadError::FrameTimeout { .. }) => {
                    return Err(ReadError::LineTimeout { got: line.len() })
                },
                Err(e) => return Err(e),
            };
            line.extend_from_slice(&byte);
            if byte[0] == NMEA_END_CHAR_2 {
                break;
            }
        }
        Ok(line)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    fn timeout(&self) -> Duration;

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn bytes_available(&mut self) -> io::Result<usize> {
        (**self).bytes_available()
    }

    fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, ReadError> {
        (**self).read_exact(len)
    }

    fn read_line(&mut self, max_len: usize) -> Result<Vec<u8>, ReadError> {
        (**self).read_line(max_len)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        (**self).write_all(data)
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        (**self).set_timeout(timeout)
    }
}

/// Computes the device reply to a written chunk, if any
type Responder = Box<dyn FnMut(&[u8]) -> Option<Vec<u8>> + Send>;

struct MemoryState {
    incoming: VecDeque<u8>,
    written: Vec<Vec<u8>>,
    timeout: Duration,
    timeout_history: Vec<Duration>,
    responder: Option<Responder>,
    write_error: Option<io::ErrorKind>,
}

/// In-memory transport.
///
/// Reads never block: when fewer bytes are queued than requested, the
/// available ones are consumed and a timeout is reported.
pub struct MemoryTransport {
    state: Arc<Mutex<MemoryState>>,
}

/// Test-side view of a [`MemoryTransport`]
#[derive(Clone)]
pub struct MemoryHandle {
    state: Arc<Mutex<MemoryState>>,
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryTransport {
    pub fn new() -> (Self, MemoryHandle) {
        let state = Arc::new(Mutex::new(MemoryState {
            incoming: VecDeque::new(),
            written: Vec::new(),
            timeout: Duration::ZERO,
            timeout_history: Vec::new(),
            responder: None,
            write_error: None,
        }));
        (
            Self {
                state: state.clone(),
            },
            MemoryHandle { state },
        )
    }

    /// Every written chunk is passed to `responder`, its reply is queued
    /// as incoming bytes
    pub fn with_responder<F>(responder: F) -> (Self, MemoryHandle)
    where
        F: FnMut(&[u8]) -> Option<Vec<u8>> + Send + 'static,
    {
        let (transport, handle) = Self::new();
        lock(&transport.state).responder = Some(Box::new(responder));
        (transport, handle)
    }
}

impl Transport for MemoryTransport {
    fn bytes_available(&mut self) -> io::Result<usize> {
        Ok(lock(&self.state).incoming.len())
    }

    fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, ReadError> {
        let mut state = lock(&self.state);
        let got = len.min(state.incoming.len());
        let data: Vec<u8> = state.incoming.drain(..got).collect();
        if got < len {
            return Err(ReadError::FrameTimeout { expected: len, got });
        }
        Ok(data)
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = lock(&self.state);
        if let Some(kind) = state.write_error {
            return Err(kind.into());
        }
        state.written.push(data.to_vec());
        let reply = state.responder.as_mut().and_then(|respond| respond(data));
        if let Some(reply) = reply {
            state.incoming.extend(reply);
        }
        Ok(())
    }

    fn timeout(&self) -> Duration {
        lock(&self.state).timeout
    }

    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        let mut state = lock(&self.state);
        state.timeout = timeout;
        state.timeout_history.push(timeout);
        Ok(())
    }
}

impl MemoryHandle {
    /// Queue bytes as if the device had sent them
    pub fn push_incoming(&self, data: &[u8]) {
        lock(&self.state).incoming.extend(data.iter().copied());
    }

    pub fn pending_incoming(&self) -> usize {
        lock(&self.state).incoming.len()
    }

    /// Chunks written so far, one entry per `write_all` call
    pub fn written(&self) -> Vec<Vec<u8>> {
        lock(&self.state).written.clone()
    }

    pub fn take_written(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut lock(&self.state).written)
    }

    pub fn timeout(&self) -> Duration {
        lock(&self.state).timeout
    }

    /// Every value passed to `set_timeout`, oldest first
    pub fn timeout_history(&self) -> Vec<Duration> {
        lock(&self.state).timeout_history.clone()
    }

    /// Make subsequent writes fail, emulating an unplugged device
    pub fn fail_writes(&self, kind: io::ErrorKind) {
        lock(&self.state).write_error = Some(kind);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_exact_consumes_available_on_timeout() {
        let (mut transport, handle) = MemoryTransport::new();
        handle.push_incoming(&[1, 2, 3]);
        assert_eq!(transport.read_exact(2).unwrap(), vec![1, 2]);
        match transport.read_exact(4) {
            Err(ReadError::FrameTimeout { expected, got }) => {
                assert_eq!(expected, 4);
                assert_eq!(got, 1);
            },
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(handle.pending_incoming(), 0);
    }

    #[test]
    fn read_line_stops_after_newline() {
        let (mut transport, handle) = MemoryTransport::new();
        handle.push_incoming(b"abc\r\ndef");
        assert_eq!(transport.read_line(82).unwrap(), b"abc\r\n");
        match transport.read_line(82) {
            Err(ReadError::LineTimeout { got }) => assert_eq!(got, 3),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn read_line_stops_at_limit() {
        let (mut transport, handle) = MemoryTransport::new();
        handle.push_incoming(b"0123456789\n");
        assert_eq!(transport.read_line(4).unwrap(), b"0123");
        assert_eq!(transport.bytes_available().unwrap(), 7);
    }

    #[test]
    fn responder_replies_are_readable() {
        let (mut transport, handle) =
            MemoryTransport::with_responder(|data| Some(data.iter().rev().copied().collect()));
        transport.write_all(&[1, 2]).unwrap();
        assert_eq!(handle.written(), vec![vec![1, 2]]);
        assert_eq!(transport.read_exact(2).unwrap(), vec![2, 1]);
        assert_eq!(handle.take_written().len(), 1);
        assert!(handle.written().is_empty());
    }

    #[test]
    fn failed_writes_surface_io_errors() {
        let (mut transport, handle) = MemoryTransport::new();
        handle.fail_writes(io::ErrorKind::BrokenPipe);
        let err = transport.write_all(b"x").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}

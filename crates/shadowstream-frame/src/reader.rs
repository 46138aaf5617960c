use std::io::{ErrorKind, Read};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use shadowstream_transport::StreamTimeouts;
use tracing::trace;

use crate::codec::{decode_message, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete messages from any `Read` stream.
///
/// Handles partial reads internally; callers always get complete messages.
/// Bytes of a message that is still arriving stay in the internal buffer
/// across calls, including calls that fail with [`FrameError::Timeout`], so a
/// later call resumes exactly where the stream left off.
pub struct MessageReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> MessageReader<T> {
    /// Create a new message reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new message reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete message (blocking).
    ///
    /// Uses whatever timeout the underlying stream carries. The timed read
    /// below restores blocking mode when it returns.
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached.
    pub fn read_message(&mut self) -> Result<Bytes> {
        self.read_until(None, |_, _| Ok(()))
    }

    /// Number of bytes received but not yet returned as a message.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum message size for subsequent decoding.
    pub fn set_max_message_size(&mut self, max_message_size: usize) {
        self.config.max_message_size = max_message_size;
    }

    /// Current message reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    fn read_until<F>(&mut self, deadline: Option<(Instant, Duration)>, mut arm: F) -> Result<Bytes>
    where
        F: FnMut(&T, Duration) -> std::io::Result<()>,
    {
        loop {
            if let Some(message) = decode_message(&mut self.buf, self.config.max_message_size)? {
                trace!(len = message.len(), "message received");
                return Ok(message);
            }

            if let Some((deadline, timeout)) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(FrameError::Timeout(timeout));
                }
                arm(&self.inner, remaining)?;
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if deadline.is_some()
                        && matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    continue;
                }
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed);
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }
}

impl<T: Read + StreamTimeouts> MessageReader<T> {
    /// Read the next complete message, waiting at most `timeout` for all of it.
    ///
    /// `None`, or a timeout too large to form a deadline, blocks until the
    /// message arrives or the stream closes. The stream's read timeout is
    /// cleared before returning, so a later [`read_message`](Self::read_message)
    /// blocks normally.
    pub fn read_message_timeout(&mut self, timeout: Option<Duration>) -> Result<Bytes> {
        let deadline =
            timeout.and_then(|timeout| Instant::now().checked_add(timeout).map(|at| (at, timeout)));

        let result = match deadline {
            Some(deadline) => self.read_until(Some(deadline), |inner, remaining| {
                inner.set_read_timeout(Some(remaining))
            }),
            None => {
                self.inner.set_read_timeout(None)?;
                self.read_message()
            }
        };
        let reset = self.inner.set_read_timeout(None);

        let message = result?;
        reset?;
        Ok(message)
    }
}

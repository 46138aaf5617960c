use std::io::{ErrorKind, Write};
use std::time::{Duration, Instant};

use bytes::{Buf, BytesMut};
use shadowstream_transport::StreamTimeouts;

use crate::codec::{encode_message, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 1024;

/// Writes complete messages to any `Write` stream.
///
/// Bytes the stream has not accepted yet stay queued across calls, so a
/// write that fails with [`FrameError::Timeout`] never leaves a torn message
/// on the wire as long as the writer keeps being used.
pub struct MessageWriter<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Write> MessageWriter<T> {
    /// Create a new message writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new message writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Frame, write, and flush one message (blocking).
    pub fn write_message(&mut self, payload: &[u8]) -> Result<()> {
        self.write_until(payload, None, |_, _| Ok(()))
    }

    /// Write any queued bytes, then flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        self.flush_until(None, |_, _| Ok(()))
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum message size for subsequent encoding.
    pub fn set_max_message_size(&mut self, max_message_size: usize) {
        self.config.max_message_size = max_message_size;
    }

    /// Current message writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Bytes of an earlier message that are still waiting to be written.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn write_until<F>(
        &mut self,
        payload: &[u8],
        deadline: Option<(Instant, Duration)>,
        mut arm: F,
    ) -> Result<()>
    where
        F: FnMut(&T, Duration) -> std::io::Result<()>,
    {
        if payload.len() > self.config.max_message_size {
            return Err(FrameError::MessageTooLarge {
                size: payload.len(),
                max: self.config.max_message_size,
            });
        }

        // The peer has already seen the header of a message that timed out.
        // Its tail goes out before anything new is framed.
        self.drain(deadline, &mut arm)?;

        encode_message(payload, &mut self.buf)?;
        self.flush_until(deadline, arm)
    }

    fn drain<F>(&mut self, deadline: Option<(Instant, Duration)>, arm: &mut F) -> Result<()>
    where
        F: FnMut(&T, Duration) -> std::io::Result<()>,
    {
        while !self.buf.is_empty() {
            if let Some((deadline, timeout)) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(FrameError::Timeout(timeout));
                }
                arm(&self.inner, remaining)?;
            }

            match self.inner.write(&self.buf) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => self.buf.advance(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) if deadline.is_some() && err.kind() == ErrorKind::TimedOut => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        Ok(())
    }

    fn flush_until<F>(&mut self, deadline: Option<(Instant, Duration)>, mut arm: F) -> Result<()>
    where
        F: FnMut(&T, Duration) -> std::io::Result<()>,
    {
        self.drain(deadline, &mut arm)?;

        loop {
            if let Some((deadline, timeout)) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(FrameError::Timeout(timeout));
                }
                arm(&self.inner, remaining)?;
            }

            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) if deadline.is_some() && err.kind() == ErrorKind::TimedOut => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }
}

impl<T: Write + StreamTimeouts> MessageWriter<T> {
    /// Frame, write, and flush one message, giving up after `timeout`.
    ///
    /// `None`, or a timeout too large to form a deadline, blocks until the
    /// transport accepts every byte. After [`FrameError::Timeout`] the
    /// unsent remainder stays queued and is written first by the next
    /// `write_message*` or `flush` call, so the timed-out payload must not be
    /// sent again. The stream's write timeout is cleared before returning.
    pub fn write_message_timeout(&mut self, payload: &[u8], timeout: Option<Duration>) -> Result<()> {
        let deadline =
            timeout.and_then(|timeout| Instant::now().checked_add(timeout).map(|at| (at, timeout)));

        let result = match deadline {
            Some(deadline) => self.write_until(payload, Some(deadline), |inner, remaining| {
                inner.set_write_timeout(Some(remaining))
            }),
            None => {
                self.inner.set_write_timeout(None)?;
                self.write_message(payload)
            }
        };
        let reset = self.inner.set_write_timeout(None);

        result?;
        reset?;
        Ok(())
    }
}

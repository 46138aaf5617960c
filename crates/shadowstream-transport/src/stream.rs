use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::endpoint::Endpoint;
use crate::error::{Result, TransportError};

/// Streams whose blocking reads and writes can be bounded by a timeout.
///
/// `None` restores fully blocking behavior. Implementations must reject a
/// zero duration the way `std::net` does, so callers treat an exhausted
/// deadline as a timeout before calling in.
pub trait StreamTimeouts {
    /// Bound subsequent blocking reads.
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;

    /// Bound subsequent blocking writes.
    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;
}

impl StreamTimeouts for TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        TcpStream::set_write_timeout(self, timeout)
    }
}

#[cfg(unix)]
impl StreamTimeouts for std::os::unix::net::UnixStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::os::unix::net::UnixStream::set_read_timeout(self, timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::os::unix::net::UnixStream::set_write_timeout(self, timeout)
    }
}

/// A connected data service stream. Implements Read + Write.
///
/// Wraps a TCP connection with Nagle disabled, since the service sends one
/// small message per frame of motion data and the client sends rare requests.
pub struct DataStream {
    inner: TcpStream,
    peer: SocketAddr,
}

impl DataStream {
    /// Connect to the data service (blocking).
    ///
    /// Every resolved address is tried in order. `timeout` bounds each
    /// individual attempt; `None` uses the operating system default.
    pub fn connect(endpoint: &Endpoint, timeout: Option<Duration>) -> Result<Self> {
        let mut last_err = None;

        for addr in endpoint.resolve()? {
            let attempt = match timeout {
                Some(timeout) if !timeout.is_zero() => TcpStream::connect_timeout(&addr, timeout),
                _ => TcpStream::connect(addr),
            };

            match attempt {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    debug!(%endpoint, %addr, "connected to data service");
                    return Ok(Self {
                        inner: stream,
                        peer: addr,
                    });
                }
                Err(err) => {
                    debug!(%endpoint, %addr, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(TransportError::Connect {
            endpoint: endpoint.to_string(),
            source: last_err.unwrap_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound)),
        })
    }

    /// Wrap an already connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Result<Self> {
        let peer = stream.peer_addr()?;
        Ok(Self { inner: stream, peer })
    }

    /// Address of the data service this stream is connected to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            inner: self.inner.try_clone()?,
            peer: self.peer,
        })
    }

    /// Shut down both halves of the connection.
    pub fn shutdown(&self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Borrow the underlying TCP stream.
    pub fn get_ref(&self) -> &TcpStream {
        &self.inner
    }

    /// Consume the stream and return the TCP stream.
    pub fn into_inner(self) -> TcpStream {
        self.inner
    }
}

impl Read for DataStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for DataStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl StreamTimeouts for DataStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        self.inner.set_read_timeout(timeout)
    }

    fn set_write_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        self.inner.set_write_timeout(timeout)
    }
}

impl std::fmt::Debug for DataStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataStream")
            .field("peer", &self.peer)
            .finish()
    }
}

/// Connect to the data service on the tokio runtime.
#[cfg(feature = "async")]
pub async fn connect_async(endpoint: &Endpoint) -> Result<tokio::net::TcpStream> {
    let stream = tokio::net::TcpStream::connect((endpoint.host.as_str(), endpoint.port))
        .await
        .map_err(|source| TransportError::Connect {
            endpoint: endpoint.to_string(),
            source,
        })?;
    stream.set_nodelay(true)?;
    debug!(%endpoint, "connected to data service");
    Ok(stream)
}

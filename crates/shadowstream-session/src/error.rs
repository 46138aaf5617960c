use std::time::Duration;

use shadowstream_frame::FrameError;
use shadowstream_transport::TransportError;

/// Errors that can occur in session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Transport-level error while reaching the data service.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The connection failed or closed mid-stream.
    #[error("connection error: {0}")]
    Frame(FrameError),

    /// A bounded wait did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The first message was not metadata, so this is not a Shadow data stream.
    #[error("unknown data stream format: {0}")]
    ProtocolFormat(String),

    /// A sample payload did not decode to whole `(key, count, values)` records.
    #[error("malformed sample payload: {0}")]
    MalformedPayload(String),

    /// A metadata payload was not a well-formed node list.
    #[error("malformed metadata: {0}")]
    MalformedMetadata(String),

    /// A channel request could not be serialized.
    #[error("invalid channel request: {0}")]
    InvalidRequest(String),
}

impl SessionError {
    /// Whether the connection is unusable after this error.
    ///
    /// Malformed payloads leave framing intact, so the next read is safe.
    /// A timeout leaves the connection usable too. A timed-out read keeps
    /// its partial bytes buffered, and a timed-out write keeps its unsent
    /// tail queued for the next write on the same session.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SessionError::Transport(_) | SessionError::Frame(_) | SessionError::ProtocolFormat(_)
        )
    }
}

impl From<FrameError> for SessionError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Timeout(timeout) => SessionError::Timeout(timeout),
            other => SessionError::Frame(other),
        }
    }
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::Frame(FrameError::Io(err))
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_timeout_becomes_session_timeout() {
        let err = SessionError::from(FrameError::Timeout(Duration::from_millis(5)));
        assert!(matches!(err, SessionError::Timeout(t) if t == Duration::from_millis(5)));
        assert!(!err.is_fatal());
    }

    #[test]
    fn closed_connection_is_fatal() {
        let err = SessionError::from(FrameError::ConnectionClosed);
        assert!(matches!(err, SessionError::Frame(FrameError::ConnectionClosed)));
        assert!(err.is_fatal());
    }

    #[test]
    fn malformed_payload_is_recoverable() {
        assert!(!SessionError::MalformedPayload("x".into()).is_fatal());
        assert!(!SessionError::MalformedMetadata("x".into()).is_fatal());
        assert!(SessionError::ProtocolFormat("x".into()).is_fatal());
    }
}

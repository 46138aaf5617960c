use std::time::Duration;

/// Errors that can occur while reading or writing messages.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The message exceeds the configured maximum size.
    #[error("message too large ({size} bytes, max {max})")]
    MessageTooLarge { size: usize, max: usize },

    /// A bounded read or write did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// An I/O error occurred while reading or writing messages.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete message was received.
    #[error("connection closed (incomplete message)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;

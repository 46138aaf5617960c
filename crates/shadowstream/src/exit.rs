use std::fmt;
use std::io;

use shadowstream_frame::FrameError;
use shadowstream_session::SessionError;
use shadowstream_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } if source.kind() == io::ErrorKind::TimedOut => {
            CliError::new(TIMEOUT, format!("{context}: connect timed out: {source}"))
        }
        TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidEndpoint(_) => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        FrameError::MessageTooLarge { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        FrameError::ConnectionClosed => {
            CliError::new(FAILURE, format!("{context}: data stream interrupted: {err}"))
        }
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Transport(err) => transport_error(context, err),
        SessionError::Frame(err) => frame_error(context, err),
        SessionError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        SessionError::ProtocolFormat(_)
        | SessionError::MalformedPayload(_)
        | SessionError::MalformedMetadata(_) => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        SessionError::InvalidRequest(_) => CliError::new(USAGE, format!("{context}: {err}")),
    }
}

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use shadowstream_frame::{FrameConfig, MessageReader, MessageWriter};
use shadowstream_transport::{DataStream, Endpoint, StreamTimeouts};
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::metadata::{is_metadata, parse_metadata, NameMap};
use crate::request::ChannelRequest;
use crate::sample::{decode_sample, Sample};

/// How long connect waits for the service to announce itself.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const FORMAT_PREVIEW_LEN: usize = 16;

/// Connection settings for a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Data service to connect to. Default: `127.0.0.1:32076`.
    pub endpoint: Endpoint,
    /// Bound on each TCP connect attempt.
    pub connect_timeout: Option<Duration>,
    /// Bound on the first message read. Default: 1 second.
    pub handshake_timeout: Option<Duration>,
    /// Message framing limits.
    pub frame: FrameConfig,
}

impl SessionConfig {
    /// Default settings for the given endpoint.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            ..Self::default()
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            handshake_timeout: Some(DEFAULT_HANDSHAKE_TIMEOUT),
            frame: FrameConfig::default(),
        }
    }
}

/// A validated connection to a Shadow data stream.
///
/// The handshake metadata populates the name map, so [`Session::name_map`]
/// is available as soon as construction succeeds. Metadata messages that
/// arrive later replace the map wholesale while [`Session::next_sample`]
/// skips over them.
///
/// All reading and writing takes `&mut self`: one call in flight at a time.
pub struct Session<T = DataStream> {
    reader: MessageReader<T>,
    writer: MessageWriter<T>,
    name_map: Option<Arc<NameMap>>,
}

impl Session<DataStream> {
    /// Connect to the data service and validate the stream format.
    pub fn connect(config: &SessionConfig) -> Result<Self> {
        let stream = DataStream::connect(&config.endpoint, config.connect_timeout)?;
        let reader_stream = stream.try_clone()?;
        Self::handshake(reader_stream, stream, config)
    }

    /// Address of the connected data service.
    pub fn peer_addr(&self) -> std::net::SocketAddr {
        self.reader.get_ref().peer_addr()
    }

    /// Close the connection.
    pub fn close(self) -> Result<()> {
        self.writer.get_ref().shutdown()?;
        Ok(())
    }
}

impl<T: Read + Write + StreamTimeouts> Session<T> {
    /// Start a session over already connected reader and writer halves.
    ///
    /// Reads one message within `config.handshake_timeout`. Anything other
    /// than metadata fails with [`SessionError::ProtocolFormat`].
    pub fn handshake(reader: T, writer: T, config: &SessionConfig) -> Result<Self> {
        let mut reader = MessageReader::with_config(reader, config.frame.clone());
        let writer = MessageWriter::with_config(writer, config.frame.clone());

        let first = reader.read_message_timeout(config.handshake_timeout)?;
        if !is_metadata(&first) {
            return Err(SessionError::ProtocolFormat(format_preview(&first)));
        }
        let name_map = parse_metadata(&first)?;
        debug!(nodes = name_map.len(), "data stream handshake complete");

        Ok(Self {
            reader,
            writer,
            name_map: Some(Arc::new(name_map)),
        })
    }

    /// Read until the next sample message and return its raw payload.
    ///
    /// Metadata messages on the way update the name map and are not
    /// returned. `timeout` bounds each individual message read.
    pub fn next_message(&mut self, timeout: Option<Duration>) -> Result<Bytes> {
        loop {
            let message = self.reader.read_message_timeout(timeout)?;
            if let Some(payload) = absorb_metadata(&mut self.name_map, message)? {
                return Ok(payload);
            }
        }
    }

    /// Read until the next sample message and decode it.
    ///
    /// A [`SessionError::MalformedPayload`] error consumes only the bad
    /// message; the following call reads the next one.
    pub fn next_sample(&mut self, timeout: Option<Duration>) -> Result<Sample> {
        let payload = self.next_message(timeout)?;
        decode_sample(&payload).inspect_err(|err| {
            warn!(len = payload.len(), error = %err, "dropping malformed sample");
        })
    }

    /// Send one raw message to the data service.
    ///
    /// After a [`SessionError::Timeout`] the rest of `payload` is still
    /// queued and goes out ahead of the next message, so do not resend it.
    pub fn write_message(&mut self, payload: &[u8], timeout: Option<Duration>) -> Result<()> {
        self.writer.write_message_timeout(payload, timeout)?;
        Ok(())
    }

    /// Ask the service to stream `request`'s channels.
    pub fn request_channels(
        &mut self,
        request: &ChannelRequest,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let xml = request.to_xml()?;
        debug!(channels = ?request.channels(), inactive = request.inactive(), "requesting channels");
        self.write_message(xml.as_bytes(), timeout)
    }

    /// Current node name map.
    pub fn name_map(&self) -> Option<Arc<NameMap>> {
        self.name_map.clone()
    }
}

/// Swap in the name map if `message` is metadata, otherwise hand it back.
pub(crate) fn absorb_metadata(
    slot: &mut Option<Arc<NameMap>>,
    message: Bytes,
) -> Result<Option<Bytes>> {
    if !is_metadata(&message) {
        return Ok(Some(message));
    }

    match parse_metadata(&message) {
        Ok(map) => {
            debug!(nodes = map.len(), "name map replaced");
            *slot = Some(Arc::new(map));
            Ok(None)
        }
        Err(err) => {
            warn!(error = %err, "ignoring malformed metadata, keeping previous name map");
            Err(err)
        }
    }
}

pub(crate) fn format_preview(message: &[u8]) -> String {
    let shown = &message[..message.len().min(FORMAT_PREVIEW_LEN)];
    let hex: Vec<String> = shown.iter().map(|b| format!("{b:02x}")).collect();
    format!(
        "first message ({} bytes) is not metadata: {}{}",
        message.len(),
        hex.join(" "),
        if message.len() > FORMAT_PREVIEW_LEN { " .." } else { "" }
    )
}

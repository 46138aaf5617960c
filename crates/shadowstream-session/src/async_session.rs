use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use shadowstream_frame::{FrameError, MessageCodec};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::metadata::{is_metadata, parse_metadata, NameMap};
use crate::request::ChannelRequest;
use crate::sample::{decode_sample, Sample};
use crate::session::{absorb_metadata, format_preview, SessionConfig};

/// [`Session`](crate::Session) for the tokio runtime.
///
/// Same handshake, metadata handling and error semantics. A timed-out
/// `next_sample` future can be dropped safely: buffered bytes stay in the
/// codec and the next call picks up the same message.
pub struct AsyncSession<T = TcpStream> {
    framed: Framed<T, MessageCodec>,
    name_map: Option<Arc<NameMap>>,
}

impl AsyncSession<TcpStream> {
    /// Connect to the data service and validate the stream format.
    pub async fn connect(config: &SessionConfig) -> Result<Self> {
        let connect = shadowstream_transport::connect_async(&config.endpoint);
        let stream = match config.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| SessionError::Timeout(timeout))??,
            None => connect.await?,
        };
        Self::handshake(stream, config).await
    }
}

impl<T: AsyncRead + AsyncWrite + Unpin> AsyncSession<T> {
    /// Start a session over an already connected stream.
    pub async fn handshake(io: T, config: &SessionConfig) -> Result<Self> {
        let mut framed = Framed::new(io, MessageCodec::with_config(config.frame.clone()));

        let first = recv(&mut framed, config.handshake_timeout).await?;
        if !is_metadata(&first) {
            return Err(SessionError::ProtocolFormat(format_preview(&first)));
        }
        let name_map = parse_metadata(&first)?;
        debug!(nodes = name_map.len(), "data stream handshake complete");

        Ok(Self {
            framed,
            name_map: Some(Arc::new(name_map)),
        })
    }

    /// Read until the next sample message and return its raw payload.
    pub async fn next_message(&mut self, timeout: Option<Duration>) -> Result<Bytes> {
        loop {
            let message = recv(&mut self.framed, timeout).await?;
            if let Some(payload) = absorb_metadata(&mut self.name_map, message)? {
                return Ok(payload);
            }
        }
    }

    /// Read until the next sample message and decode it.
    pub async fn next_sample(&mut self, timeout: Option<Duration>) -> Result<Sample> {
        let payload = self.next_message(timeout).await?;
        decode_sample(&payload).inspect_err(|err| {
            warn!(len = payload.len(), error = %err, "dropping malformed sample");
        })
    }

    /// Send one raw message to the data service.
    pub async fn write_message(&mut self, payload: &[u8], timeout: Option<Duration>) -> Result<()> {
        let send = self.framed.send(payload);
        match timeout {
            Some(timeout) => tokio::time::timeout(timeout, send)
                .await
                .map_err(|_| SessionError::Timeout(timeout))??,
            None => send.await?,
        }
        Ok(())
    }

    /// Ask the service to stream `request`'s channels.
    pub async fn request_channels(
        &mut self,
        request: &ChannelRequest,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let xml = request.to_xml()?;
        debug!(channels = ?request.channels(), inactive = request.inactive(), "requesting channels");
        self.write_message(xml.as_bytes(), timeout).await
    }

    /// Current node name map.
    pub fn name_map(&self) -> Option<Arc<NameMap>> {
        self.name_map.clone()
    }

    /// Consume the session and return the underlying stream.
    pub fn into_inner(self) -> T {
        self.framed.into_inner()
    }
}

async fn recv<T>(framed: &mut Framed<T, MessageCodec>, timeout: Option<Duration>) -> Result<Bytes>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let next = match timeout {
        Some(timeout) => tokio::time::timeout(timeout, framed.next())
            .await
            .map_err(|_| SessionError::Timeout(timeout))?,
        None => framed.next().await,
    };

    match next {
        Some(Ok(message)) => Ok(message),
        Some(Err(err)) => Err(err.into()),
        None => Err(SessionError::Frame(FrameError::ConnectionClosed)),
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::DuplexStream;

    use super::*;
    use crate::sample::encode_sample;

    const HANDSHAKE: &[u8] = br#"<?xml version="1.0"?><node><node key="1" id="Hips"/></node>"#;

    async fn pair() -> (AsyncSession<DuplexStream>, Framed<DuplexStream, MessageCodec>) {
        let (client, server) = tokio::io::duplex(64 * 1024);
        let mut service = Framed::new(server, MessageCodec::new());
        service.send(HANDSHAKE).await.unwrap();
        let session = AsyncSession::handshake(client, &SessionConfig::default())
            .await
            .unwrap();
        (session, service)
    }

    #[tokio::test]
    async fn handshake_populates_name_map() {
        let (session, _service) = pair().await;
        assert_eq!(session.name_map().unwrap().get(1), Some("Hips"));
    }

    #[tokio::test]
    async fn handshake_rejects_binary_first_message() {
        let (client, server) = tokio::io::duplex(1024);
        let mut service = Framed::new(server, MessageCodec::new());
        service.send(&[0u8, 0, 0, 0, 0, 0, 0, 0][..]).await.unwrap();

        let err = AsyncSession::handshake(client, &SessionConfig::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::ProtocolFormat(_)));
    }

    #[tokio::test]
    async fn absorbs_metadata_and_decodes_samples() {
        let (mut session, mut service) = pair().await;
        let expected: Sample = [(1u32, vec![1.5f32, 2.5]), (9, vec![3.0])]
            .into_iter()
            .collect();

        service
            .send(&br#"<?xml version="1.0"?><node><node key="9" id="Head"/></node>"#[..])
            .await
            .unwrap();
        service.send(encode_sample(&expected)).await.unwrap();

        assert_eq!(session.next_sample(None).await.unwrap(), expected);
        assert_eq!(session.name_map().unwrap().get(9), Some("Head"));
        assert_eq!(session.name_map().unwrap().get(1), None);
    }

    #[tokio::test]
    async fn timeout_then_resume() {
        let (mut session, mut service) = pair().await;

        let err = session
            .next_sample(Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Timeout(_)));

        let expected: Sample = [(2u32, vec![0.5f32])].into_iter().collect();
        service.send(encode_sample(&expected)).await.unwrap();
        assert_eq!(session.next_sample(None).await.unwrap(), expected);
    }

    #[tokio::test]
    async fn request_channels_reaches_service() {
        let (mut session, mut service) = pair().await;
        session
            .request_channels(&ChannelRequest::new(["Lq"]), Some(Duration::from_secs(1)))
            .await
            .unwrap();

        let message = service.next().await.unwrap().unwrap();
        assert_eq!(
            message.as_ref(),
            br#"<?xml version="1.0"?><configurable><Lq/></configurable>"#
        );
    }

    #[tokio::test]
    async fn closed_stream_is_connection_error() {
        let (mut session, service) = pair().await;
        drop(service);

        let err = session.next_sample(None).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn connect_over_tcp() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = shadowstream_transport::Endpoint::from(listener.local_addr().unwrap());

        let service = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut framed = Framed::new(stream, MessageCodec::new());
            framed.send(HANDSHAKE).await.unwrap();
            framed
        });

        let session = AsyncSession::connect(&SessionConfig::new(endpoint))
            .await
            .unwrap();
        assert!(session.name_map().is_some());
        let _framed = service.await.unwrap();
    }
}

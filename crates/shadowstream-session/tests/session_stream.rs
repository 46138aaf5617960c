use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;

use shadowstream_frame::{MessageReader, MessageWriter};
use shadowstream_session::{
    encode_sample, ChannelRequest, Sample, Session, SessionConfig, SessionError,
};
use shadowstream_transport::Endpoint;

const NODE_LIST: &[u8] = br#"<?xml version="1.0"?><node key="0" id="default"><node key="1" id="FirstName"></node><node key="9" id="LastName"/></node>"#;

/// Loopback stand-in for the Configurable service.
fn spawn_service<F>(script: F) -> (Endpoint, thread::JoinHandle<()>)
where
    F: FnOnce(MessageReader<TcpStream>, MessageWriter<TcpStream>) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("listener should bind");
    let endpoint = Endpoint::from(listener.local_addr().expect("local addr"));

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("service should accept");
        let reader = MessageReader::new(stream.try_clone().expect("clone"));
        let writer = MessageWriter::new(stream);
        script(reader, writer);
    });

    (endpoint, handle)
}

fn config(endpoint: Endpoint) -> SessionConfig {
    SessionConfig {
        handshake_timeout: Some(Duration::from_secs(2)),
        ..SessionConfig::new(endpoint)
    }
}

fn sample(nodes: &[(u32, &[f32])]) -> Sample {
    nodes.iter().map(|(k, v)| (*k, v.to_vec())).collect()
}

#[test]
fn streams_samples_after_channel_request() {
    let (endpoint, service) = spawn_service(|mut reader, mut writer| {
        writer
            .write_message(br#"<?xml version="1.0"?><configurable/>"#)
            .unwrap();

        let request = reader.read_message().expect("request should arrive");
        assert_eq!(
            request.as_ref(),
            br#"<?xml version="1.0"?><configurable inactive="1"><Lq/><c/></configurable>"#
        );

        writer.write_message(NODE_LIST).unwrap();
        for i in 0..10 {
            let value = i as f32;
            let payload = encode_sample(&sample(&[(1, &[value, value + 0.5]), (9, &[-value])]));
            writer.write_message(&payload).unwrap();
        }
    });

    let mut session = Session::connect(&config(endpoint)).expect("session should connect");
    assert!(session.name_map().expect("handshake map").is_empty());

    session
        .request_channels(
            &ChannelRequest::new(["Lq", "c"]).with_inactive(true),
            Some(Duration::from_secs(1)),
        )
        .unwrap();

    for i in 0..10 {
        let value = i as f32;
        let received = session
            .next_sample(Some(Duration::from_secs(2)))
            .expect("sample should decode");
        assert_eq!(
            received,
            sample(&[(1, &[value, value + 0.5]), (9, &[-value])])
        );
    }

    let names = session.name_map().expect("name map");
    assert_eq!(
        names.iter().collect::<Vec<_>>(),
        vec![(1, "FirstName"), (9, "LastName")]
    );

    service.join().unwrap();
}

#[test]
fn non_xml_first_message_is_rejected() {
    let (endpoint, service) = spawn_service(|_reader, mut writer| {
        writer.write_message(b"ABCD").unwrap();
        // Anything after the bad handshake must never be read as a sample.
        let _ = writer.write_message(&encode_sample(&sample(&[(1, &[1.0])])));
    });

    let err = Session::connect(&config(endpoint)).err().expect("connect should fail");
    assert!(matches!(err, SessionError::ProtocolFormat(_)), "{err}");
    assert!(err.to_string().contains("41 42 43 44"));

    service.join().unwrap();
}

#[test]
fn silent_service_times_out_handshake() {
    let (endpoint, service) = spawn_service(|_reader, _writer| {
        thread::sleep(Duration::from_millis(300));
    });

    let cfg = SessionConfig {
        handshake_timeout: Some(Duration::from_millis(50)),
        ..SessionConfig::new(endpoint)
    };
    let err = Session::connect(&cfg).err().expect("connect should time out");
    assert!(matches!(err, SessionError::Timeout(_)), "{err}");

    service.join().unwrap();
}

#[test]
fn refused_connection_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let endpoint = Endpoint::from(listener.local_addr().unwrap());
    drop(listener);

    let err = Session::connect(&config(endpoint)).err().expect("connect should fail");
    assert!(matches!(err, SessionError::Transport(_)), "{err}");
    assert!(err.is_fatal());
}

#[test]
fn service_closing_mid_message_is_connection_error() {
    let (endpoint, service) = spawn_service(|_reader, mut writer| {
        writer.write_message(NODE_LIST).unwrap();
        let mut stream = writer.into_inner();
        std::io::Write::write_all(&mut stream, &[0, 0, 0, 16, 1, 2, 3]).unwrap();
    });

    let mut session = Session::connect(&config(endpoint)).unwrap();
    service.join().unwrap();

    let err = session.next_sample(Some(Duration::from_secs(2))).unwrap_err();
    assert!(matches!(err, SessionError::Frame(_)), "{err}");
    assert!(err.is_fatal());
}

#[test]
fn truncated_sample_is_malformed_and_stream_continues() {
    let (endpoint, service) = spawn_service(|_reader, mut writer| {
        writer.write_message(NODE_LIST).unwrap();

        let mut bad = Vec::new();
        bad.extend_from_slice(&1u32.to_le_bytes());
        bad.extend_from_slice(&10u32.to_le_bytes());
        bad.extend_from_slice(&1.0f32.to_le_bytes());
        writer.write_message(&bad).unwrap();

        writer
            .write_message(&encode_sample(&sample(&[(9, &[3.0])])))
            .unwrap();
    });

    let mut session = Session::connect(&config(endpoint)).unwrap();

    let err = session.next_sample(Some(Duration::from_secs(2))).unwrap_err();
    assert!(matches!(err, SessionError::MalformedPayload(_)), "{err}");

    let next = session.next_sample(Some(Duration::from_secs(2))).unwrap();
    assert_eq!(next, sample(&[(9, &[3.0])]));

    service.join().unwrap();
}

#[test]
fn close_shuts_down_connection() {
    let (endpoint, service) = spawn_service(|mut reader, mut writer| {
        writer.write_message(NODE_LIST).unwrap();
        assert!(reader.read_message().is_err());
    });

    let session = Session::connect(&config(endpoint)).unwrap();
    assert_eq!(session.name_map().unwrap().len(), 2);
    session.close().unwrap();

    service.join().unwrap();
}

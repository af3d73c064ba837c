//! Tests for the handshake dispatcher.

use std::io::{Cursor, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use rstest::{fixture, rstest};

use super::handshake::read_header_line;
use super::{
    ACCEPT_RESPONSE, Dispatcher, HandshakeError, HandshakeOutcome, REJECT_RESPONSE, RejectReason,
};
use crate::header::HeaderError;
use crate::registry::Registry;
use crate::tests::support::RecordingHandler;

struct Bench {
    dispatcher: Dispatcher,
    handler: Arc<RecordingHandler>,
}

#[fixture]
fn bench() -> Bench {
    let registry = Arc::new(Registry::new());
    let handler = Arc::new(RecordingHandler::default());
    registry
        .bind_service(handler.clone(), "echo", "1.0")
        .expect("bind echo");
    Bench {
        dispatcher: Dispatcher::new(registry),
        handler,
    }
}

/// Runs one handshake server-side while `client` drives the peer.
fn exchange<F>(
    dispatcher: &Dispatcher,
    client: F,
) -> (Result<HandshakeOutcome, HandshakeError>, Vec<u8>)
where
    F: FnOnce(&mut TcpStream) -> Vec<u8> + Send + 'static,
{
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind listener");
    let addr = listener.local_addr().expect("listener address");
    let peer = thread::spawn(move || {
        let mut stream = TcpStream::connect(addr).expect("connect client");
        client(&mut stream)
    });

    let (stream, _) = listener.accept().expect("accept connection");
    let outcome = dispatcher.handshake(stream).run();
    let received = peer.join().expect("join client");
    (outcome, received)
}

fn read_all(stream: &mut TcpStream) -> Vec<u8> {
    let mut response = Vec::new();
    stream.read_to_end(&mut response).expect("read response");
    response
}

#[rstest]
fn accepted_connection_reaches_handler_once(bench: Bench) {
    let (outcome, received) = exchange(&bench.dispatcher, |stream| {
        stream
            .write_all(b"backtalk/1.0 echo 1.0\n")
            .expect("write header");
        let mut response = [0_u8; ACCEPT_RESPONSE.len()];
        stream.read_exact(&mut response).expect("read response");
        stream.write_all(b"payload").expect("write payload");
        stream.shutdown(Shutdown::Write).expect("half close");
        response.to_vec()
    });

    assert_eq!(received, ACCEPT_RESPONSE);
    assert_eq!(
        outcome.expect("handshake should succeed"),
        HandshakeOutcome::HandedOff {
            service: "echo".to_owned(),
            version: "1.0".to_owned(),
        }
    );
    assert_eq!(bench.handler.calls(), 1);
    assert_eq!(bench.handler.payloads(), vec![b"payload".to_vec()]);
}

#[rstest]
fn bytes_sent_with_the_header_stay_with_the_handler(bench: Bench) {
    let (outcome, _) = exchange(&bench.dispatcher, |stream| {
        stream
            .write_all(b"backtalk/1.0 ECHO 1.0 (trace)\r\nhello")
            .expect("write header and payload");
        stream.shutdown(Shutdown::Write).expect("half close");
        read_all(stream)
    });

    assert!(matches!(outcome, Ok(HandshakeOutcome::HandedOff { .. })));
    assert_eq!(bench.handler.payloads(), vec![b"hello".to_vec()]);
}

#[rstest]
fn unknown_service_is_rejected(bench: Bench) {
    let (outcome, received) = exchange(&bench.dispatcher, |stream| {
        stream
            .write_all(b"backtalk/1.0 ghost 1.0\n")
            .expect("write header");
        read_all(stream)
    });

    assert_eq!(received, REJECT_RESPONSE);
    assert_eq!(
        outcome.expect("handshake should complete"),
        HandshakeOutcome::Rejected(RejectReason::NoSuchService {
            service: "ghost".to_owned(),
            version: "1.0".to_owned(),
        })
    );
    assert_eq!(bench.handler.calls(), 0);
}

#[rstest]
#[case(b"foo/1.0 echo 1.0\n", HeaderError::MissingProtocol)]
#[case(b"backtalk/1.0 echo 1.0 (a=)\n", HeaderError::BadOptionSpecification)]
#[case(b"\n", HeaderError::MissingProtocol)]
fn malformed_header_gets_the_same_rejection(
    bench: Bench,
    #[case] request: &'static [u8],
    #[case] reason: HeaderError,
) {
    let (outcome, received) = exchange(&bench.dispatcher, move |stream| {
        stream.write_all(request).expect("write header");
        read_all(stream)
    });

    assert_eq!(received, REJECT_RESPONSE);
    assert_eq!(
        outcome.expect("handshake should complete"),
        HandshakeOutcome::Rejected(RejectReason::Malformed(reason))
    );
    assert_eq!(bench.handler.calls(), 0);
}

#[rstest]
fn silent_disconnect_is_reported(bench: Bench) {
    let (outcome, _) = exchange(&bench.dispatcher, |stream| {
        stream.shutdown(Shutdown::Write).expect("half close");
        Vec::new()
    });

    assert!(matches!(outcome, Err(HandshakeError::Closed)));
    assert_eq!(bench.handler.calls(), 0);
}

#[test]
fn header_read_stops_at_newline() {
    let mut input = Cursor::new(b"backtalk/1.0 echo 1.0\r\nrest".to_vec());
    let line = read_header_line(&mut input).expect("line");
    assert_eq!(line, "backtalk/1.0 echo 1.0");

    let mut rest = String::new();
    input.read_to_string(&mut rest).expect("read rest");
    assert_eq!(rest, "rest");
}

#[test]
fn header_read_accepts_unterminated_final_line() {
    let mut input = Cursor::new(b"backtalk/1.0 echo 1.0".to_vec());
    assert_eq!(
        read_header_line(&mut input).expect("line"),
        "backtalk/1.0 echo 1.0"
    );
}

#[test]
fn header_read_reports_empty_stream() {
    let mut input = Cursor::new(Vec::new());
    assert!(matches!(
        read_header_line(&mut input),
        Err(HandshakeError::Closed)
    ));
}

//! Handler double that records the connections it is given.

use std::io::Read;
use std::net::TcpStream;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::handler::Handler;

/// Counts calls and keeps everything each connection sent until EOF.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    calls: AtomicUsize,
    payloads: Mutex<Vec<Vec<u8>>>,
}

impl RecordingHandler {
    /// Number of connections handed over so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Bytes read from each finished connection, in completion order.
    #[must_use]
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads
            .lock()
            .expect("recording handler mutex poisoned")
            .clone()
    }
}

impl Handler for RecordingHandler {
    fn handle(&self, mut stream: TcpStream) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut payload = Vec::new();
        stream.read_to_end(&mut payload).ok();
        self.payloads
            .lock()
            .expect("recording handler mutex poisoned")
            .push(payload);
    }
}

//! Test helpers for the transport module.

use std::net::TcpListener;
use std::thread;
use std::time::{Duration, Instant};

use super::AcceptorSettings;

/// Finds a currently unused loopback port above the reserved range.
pub(crate) fn free_port() -> u16 {
    loop {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind probe listener");
        let port = listener.local_addr().expect("probe address").port();
        if port > backtalk_config::RESERVED_PORT_CEILING {
            return port;
        }
    }
}

/// Loopback settings with short timeouts so tests stop quickly.
pub(crate) fn loopback_settings(port: u16) -> AcceptorSettings {
    AcceptorSettings {
        host: "127.0.0.1".to_owned(),
        port,
        accept_timeout: Some(Duration::from_millis(50)),
        acceptor_grace: Duration::from_millis(500),
        worker_grace: Duration::from_millis(500),
    }
}

/// Polls `condition` for up to two seconds.
pub(crate) fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

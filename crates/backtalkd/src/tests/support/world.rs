//! BDD test worlds: a bare acceptor stack and a full daemon process.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use backtalk_config::ListenerUpdate;

use crate::dispatch::{ACCEPT_RESPONSE, Dispatcher};
use crate::handler::EchoHandler;
use crate::health::HealthReporter;
use crate::process::{ControlSignal, LaunchError, run_daemon_with};
use crate::registry::Registry;
use crate::transport::{
    Acceptor, AcceptorError, StopReport, WorkerPool, free_port, loopback_settings, wait_until,
};

use super::config_loader::TestConfigLoader;
use super::handler::RecordingHandler;
use super::reporter::RecordingHealthReporter;
use super::signals::ScriptedSignals;

pub type StepResult = Result<(), String>;

const CLIENT_TIMEOUT: Duration = Duration::from_secs(2);

/// What one client saw after sending its header.
#[derive(Debug, Default)]
pub struct ClientExchange {
    pub response: Vec<u8>,
    pub closed: bool,
}

/// Acceptor, registry and pool wired together without the process layer.
pub struct ServerWorld {
    pub registry: Arc<Registry>,
    pub recorder: Arc<RecordingHandler>,
    pub acceptor: Acceptor,
    pub exchange: Option<ClientExchange>,
    pub session: Option<TcpStream>,
    pub previous_addr: Option<SocketAddr>,
    pub start_error: Option<AcceptorError>,
    pub stop: Option<(StopReport, Duration)>,
    client: Option<TcpStream>,
}

impl ServerWorld {
    #[must_use]
    pub fn new() -> Self {
        let registry = Arc::new(Registry::new());
        registry
            .bind_service(
                Arc::new(EchoHandler),
                EchoHandler::SERVICE,
                EchoHandler::VERSION,
            )
            .expect("bind echo");
        let mut acceptor = Acceptor::new(loopback_settings(free_port()));
        acceptor
            .bind_dispatcher(Dispatcher::new(Arc::clone(&registry)))
            .expect("bind dispatcher");
        Self {
            registry,
            recorder: Arc::new(RecordingHandler::default()),
            acceptor,
            exchange: None,
            session: None,
            previous_addr: None,
            start_error: None,
            stop: None,
            client: None,
        }
    }

    pub fn install_pool(&mut self) {
        let pool = WorkerPool::new(4, 8).expect("worker pool");
        self.acceptor
            .set_worker_pool(Arc::new(pool))
            .expect("install pool");
    }

    pub fn start(&mut self) {
        if let Err(error) = self.acceptor.start() {
            self.start_error = Some(error);
        }
    }

    pub fn addr(&self) -> Result<SocketAddr, String> {
        self.acceptor
            .local_addr()
            .ok_or_else(|| "acceptor is not listening".to_owned())
    }

    pub fn bind_recorder(&self, service: &str, version: &str) {
        self.registry
            .bind_service(self.recorder.clone(), service, version)
            .expect("bind recorder");
    }

    /// Sends `header` plus a newline and reads the router's answer.
    pub fn send_header(&mut self, header: &str) -> StepResult {
        let mut stream = connect(self.addr()?)?;
        stream
            .write_all(format!("{header}\n").as_bytes())
            .map_err(|error| error.to_string())?;
        let exchange = read_response(&mut stream)?;
        self.exchange = Some(exchange);
        self.client = Some(stream);
        Ok(())
    }

    /// Sends `payload` on the last client connection and half-closes it.
    pub fn send_payload(&mut self, payload: &str) -> StepResult {
        let stream = self
            .client
            .as_mut()
            .ok_or_else(|| "no client connection".to_owned())?;
        stream
            .write_all(payload.as_bytes())
            .map_err(|error| error.to_string())?;
        stream
            .shutdown(Shutdown::Write)
            .map_err(|error| error.to_string())
    }

    pub fn open_echo_session(&mut self) -> StepResult {
        let session = open_echo(self.addr()?)?;
        self.session = Some(session);
        Ok(())
    }

    pub fn rebind_to_fresh_port(&mut self) -> StepResult {
        self.previous_addr = Some(self.addr()?);
        self.acceptor
            .rebind(ListenerUpdate {
                port: Some(free_port()),
                accept_timeout: None,
            })
            .map(|_| ())
            .map_err(|error| error.to_string())
    }

    pub fn stop(&mut self) {
        let started = Instant::now();
        let report = self.acceptor.stop();
        self.stop = Some((report, started.elapsed()));
    }
}

impl Drop for ServerWorld {
    fn drop(&mut self) {
        self.acceptor.stop();
    }
}

/// Runs the full daemon on a background thread with scripted signals.
pub struct DaemonWorld {
    pub loader: TestConfigLoader,
    pub reporter: Arc<RecordingHealthReporter>,
    signals: Option<Sender<ControlSignal>>,
    handle: Option<JoinHandle<Result<StopReport, LaunchError>>>,
    pub result: Option<Result<StopReport, LaunchError>>,
}

impl DaemonWorld {
    #[must_use]
    pub fn new() -> Self {
        Self {
            loader: TestConfigLoader::new(),
            reporter: Arc::new(RecordingHealthReporter::default()),
            signals: None,
            handle: None,
            result: None,
        }
    }

    pub fn run(&mut self) -> StepResult {
        if self.handle.is_some() {
            return Err("daemon already running".to_owned());
        }
        let (sender, signals) = ScriptedSignals::new();
        let loader = self.loader.clone();
        let reporter = self.reporter.clone() as Arc<dyn HealthReporter>;
        self.signals = Some(sender);
        self.handle = Some(thread::spawn(move || {
            run_daemon_with(&loader, reporter, signals)
        }));
        Ok(())
    }

    pub fn signal(&self, signal: ControlSignal) -> StepResult {
        self.signals
            .as_ref()
            .ok_or_else(|| "daemon not running".to_owned())?
            .send(signal)
            .map_err(|_| "daemon stopped listening for signals".to_owned())
    }

    /// Waits until `count` ready events exist and returns the latest address.
    pub fn wait_for_ready(&self, count: usize) -> Result<SocketAddr, String> {
        if !wait_until(|| self.reporter.ready_addresses().len() >= count) {
            return Err(format!(
                "expected {count} listener_ready events, saw {:?}",
                self.reporter.events()
            ));
        }
        self.reporter
            .ready_addresses()
            .last()
            .copied()
            .ok_or_else(|| "no listener address reported".to_owned())
    }

    /// Collects the daemon thread's result once it has finished.
    pub fn wait_for_exit(&mut self) -> StepResult {
        if self.result.is_some() {
            return Ok(());
        }
        let handle = self
            .handle
            .take()
            .ok_or_else(|| "daemon was never started".to_owned())?;
        if !wait_until(|| handle.is_finished()) {
            self.handle = Some(handle);
            return Err("daemon did not exit".to_owned());
        }
        let result = handle
            .join()
            .map_err(|_| "daemon thread panicked".to_owned())?;
        self.result = Some(result);
        Ok(())
    }
}

impl Drop for DaemonWorld {
    fn drop(&mut self) {
        if let Some(sender) = self.signals.take() {
            sender.send(ControlSignal::Terminate).ok();
        }
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

pub fn connect(addr: SocketAddr) -> Result<TcpStream, String> {
    let stream = TcpStream::connect(addr).map_err(|error| error.to_string())?;
    stream
        .set_read_timeout(Some(CLIENT_TIMEOUT))
        .map_err(|error| error.to_string())?;
    Ok(stream)
}

/// Reads until the accept response is complete or the server closes.
pub fn read_response(stream: &mut TcpStream) -> Result<ClientExchange, String> {
    let mut exchange = ClientExchange::default();
    let mut buffer = [0_u8; 64];
    while exchange.response != ACCEPT_RESPONSE {
        match stream.read(&mut buffer) {
            Ok(0) => {
                exchange.closed = true;
                break;
            }
            Ok(read) => exchange.response.extend_from_slice(&buffer[..read]),
            Err(error) => return Err(error.to_string()),
        }
    }
    Ok(exchange)
}

pub fn open_echo(addr: SocketAddr) -> Result<TcpStream, String> {
    let mut stream = connect(addr)?;
    stream
        .write_all(b"backtalk/1.0 echo 1.0\n")
        .map_err(|error| error.to_string())?;
    let exchange = read_response(&mut stream)?;
    if exchange.response != ACCEPT_RESPONSE {
        return Err(format!(
            "echo session refused: {}",
            String::from_utf8_lossy(&exchange.response)
        ));
    }
    Ok(stream)
}

pub fn echo_round_trip(stream: &mut TcpStream, payload: &[u8]) -> StepResult {
    stream
        .write_all(payload)
        .map_err(|error| error.to_string())?;
    let mut echoed = vec![0_u8; payload.len()];
    stream
        .read_exact(&mut echoed)
        .map_err(|error| error.to_string())?;
    if echoed == payload {
        Ok(())
    } else {
        Err(format!("echo mismatch: {echoed:?}"))
    }
}

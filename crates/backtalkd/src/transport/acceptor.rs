//! Acceptor state machine owning the listening socket and its accept thread.

use std::collections::HashMap;
use std::hash::BuildHasher;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use backtalk_config::{Config, ListenerUpdate, RESERVED_PORT_CEILING};

use super::{
    AcceptorError, ListenerError, ListenerSocket, Precondition, ShutdownReport, TRANSPORT_TARGET,
    WorkerPool,
};
use crate::dispatch::Dispatcher;

const ACCEPT_THREAD_NAME: &str = "backtalk-acceptor";

/// Socket and shutdown settings used by an [`Acceptor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptorSettings {
    /// Interface to bind.
    pub host: String,
    /// Port to bind; must exceed the reserved range.
    pub port: u16,
    /// Accept timeout; `None` blocks until a peer connects.
    pub accept_timeout: Option<Duration>,
    /// Per-phase wait for the accept thread.
    pub acceptor_grace: Duration,
    /// Per-phase wait for the worker pool.
    pub worker_grace: Duration,
}

impl AcceptorSettings {
    /// Extracts the acceptor settings from a configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.listener_host.clone(),
            port: config.listener_port,
            accept_timeout: config.accept_timeout(),
            acceptor_grace: config.acceptor_grace(),
            worker_grace: config.worker_grace(),
        }
    }
}

impl Default for AcceptorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Shutdown outcome of both execution contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopReport {
    /// The accept thread.
    pub acceptor: ShutdownReport,
    /// The worker pool.
    pub workers: ShutdownReport,
}

impl StopReport {
    /// Returns `true` when neither context had to be detached.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.acceptor.is_complete() && self.workers.is_complete()
    }
}

/// Owns the listening socket and feeds accepted connections to the pool.
///
/// The acceptor is idle until [`Acceptor::start`] succeeds and returns to
/// idle on [`Acceptor::stop`] or when the accept loop hits a socket error.
/// Reconfiguration while listening quiesces the loop and starts a fresh one;
/// the worker pool and the connections it holds are left alone.
#[derive(Debug)]
pub struct Acceptor {
    settings: AcceptorSettings,
    pool: Option<Arc<WorkerPool>>,
    dispatcher: Option<Dispatcher>,
    active: Option<AcceptLoop>,
}

impl Acceptor {
    /// Creates an idle acceptor.
    #[must_use]
    pub const fn new(settings: AcceptorSettings) -> Self {
        Self {
            settings,
            pool: None,
            dispatcher: None,
            active: None,
        }
    }

    /// Current settings, including values recorded while idle.
    #[must_use]
    pub const fn settings(&self) -> &AcceptorSettings {
        &self.settings
    }

    /// Returns `true` while an accept loop is running.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.active.as_ref().is_some_and(AcceptLoop::is_running)
    }

    /// Address of the running accept loop.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.active
            .as_ref()
            .filter(|active| active.is_running())
            .map(|active| active.local_addr)
    }

    /// Installs the pool that will run handshake tasks.
    ///
    /// A running loop is restarted so new connections reach the new pool.
    /// The previous pool is not shut down.
    ///
    /// # Errors
    ///
    /// Propagates a failure to restart the loop.
    pub fn set_worker_pool(&mut self, pool: Arc<WorkerPool>) -> Result<(), AcceptorError> {
        let was_listening = self.quiesce();
        self.pool = Some(pool);
        self.resume(was_listening)
    }

    /// Binds the dispatcher used for new connections.
    ///
    /// While listening the loop is quiesced and restarted with the new
    /// dispatcher; while idle the binding is only recorded.
    ///
    /// # Errors
    ///
    /// Propagates a failure to restart the loop.
    pub fn bind_dispatcher(&mut self, dispatcher: Dispatcher) -> Result<(), AcceptorError> {
        let was_listening = self.quiesce();
        self.dispatcher = Some(dispatcher);
        self.resume(was_listening)
    }

    /// Stops any running loop and clears the dispatcher binding.
    pub fn unbind_dispatcher(&mut self) -> Option<Dispatcher> {
        self.quiesce();
        self.dispatcher.take()
    }

    /// Binds the socket and spawns the accept thread.
    ///
    /// # Errors
    ///
    /// Returns [`AcceptorError::AlreadyListening`] when a loop is running and
    /// [`AcceptorError::Precondition`] when the pool or dispatcher is missing
    /// or the port is reserved; no socket is bound in either case. Socket and
    /// thread failures surface as [`AcceptorError::Listener`].
    pub fn start(&mut self) -> Result<(), AcceptorError> {
        if self.is_listening() {
            return Err(AcceptorError::AlreadyListening);
        }
        let pool = self.pool.clone().ok_or(Precondition::MissingWorkerPool)?;
        let dispatcher = self
            .dispatcher
            .clone()
            .ok_or(Precondition::MissingDispatcher)?;
        if self.settings.port <= RESERVED_PORT_CEILING {
            return Err(Precondition::PortOutOfRange(self.settings.port).into());
        }

        // A loop that ended on its own still holds a joinable thread.
        if let Some(finished) = self.active.take() {
            finished.shutdown(self.settings.acceptor_grace);
        }
        let active = AcceptLoop::spawn(&self.settings, pool, dispatcher)?;
        info!(
            target: TRANSPORT_TARGET,
            addr = %active.local_addr,
            accept_timeout_ms = self.settings.accept_timeout.map(|timeout| timeout.as_millis()),
            "acceptor listening"
        );
        self.active = Some(active);
        Ok(())
    }

    /// Stops the accept thread and the worker pool with two-phase shutdown.
    ///
    /// The pool is released afterwards, so a later [`Acceptor::start`] needs
    /// [`Acceptor::set_worker_pool`] first. Calling `stop` again reports
    /// both contexts as idle.
    pub fn stop(&mut self) -> StopReport {
        let acceptor = self
            .active
            .take()
            .map_or_else(ShutdownReport::idle, |active| {
                active.shutdown(self.settings.acceptor_grace)
            });
        let workers = self
            .pool
            .take()
            .map_or_else(ShutdownReport::idle, |pool| {
                pool.shutdown(self.settings.worker_grace)
            });
        let report = StopReport { acceptor, workers };
        info!(
            target: TRANSPORT_TARGET,
            acceptor = ?report.acceptor.outcome(),
            workers = ?report.workers.outcome(),
            "acceptor stopped"
        );
        report
    }

    /// Applies a new port and/or accept timeout.
    ///
    /// Fields left as `None` keep their current value. Returns `Ok(false)`
    /// when nothing changed. A running loop is quiesced and restarted on the
    /// new values; an idle acceptor only records them.
    ///
    /// # Errors
    ///
    /// Returns [`Precondition::PortOutOfRange`] for a reserved port before
    /// touching the running loop, and propagates restart failures.
    pub fn rebind(&mut self, update: ListenerUpdate) -> Result<bool, AcceptorError> {
        let port = update.port.filter(|port| *port != self.settings.port);
        let accept_timeout = update
            .accept_timeout
            .filter(|timeout| *timeout != self.settings.accept_timeout);
        if port.is_none() && accept_timeout.is_none() {
            return Ok(false);
        }
        if let Some(port) = port
            && port <= RESERVED_PORT_CEILING
        {
            return Err(Precondition::PortOutOfRange(port).into());
        }

        let was_listening = self.quiesce();
        if let Some(port) = port {
            self.settings.port = port;
        }
        if let Some(accept_timeout) = accept_timeout {
            self.settings.accept_timeout = accept_timeout;
        }
        info!(
            target: TRANSPORT_TARGET,
            port = self.settings.port,
            accept_timeout_ms = self.settings.accept_timeout.map(|timeout| timeout.as_millis()),
            restart = was_listening,
            "listener reconfigured"
        );
        self.resume(was_listening)?;
        Ok(true)
    }

    /// Applies `listenerport` and `accepttimeout` from a property map.
    ///
    /// # Errors
    ///
    /// Returns [`AcceptorError::Update`] for unparseable values, otherwise
    /// behaves like [`Acceptor::rebind`].
    pub fn update<S: BuildHasher>(
        &mut self,
        properties: &HashMap<String, String, S>,
    ) -> Result<bool, AcceptorError> {
        let update = ListenerUpdate::from_properties(properties)?;
        self.rebind(update)
    }

    fn quiesce(&mut self) -> bool {
        let Some(active) = self.active.take() else {
            return false;
        };
        let was_running = active.is_running();
        let report = active.shutdown(self.settings.acceptor_grace);
        debug!(
            target: TRANSPORT_TARGET,
            outcome = ?report.outcome(),
            "accept loop quiesced"
        );
        was_running
    }

    fn resume(&mut self, was_listening: bool) -> Result<(), AcceptorError> {
        if was_listening {
            self.start()
        } else {
            Ok(())
        }
    }
}

/// One running accept thread and the handles needed to stop it.
#[derive(Debug)]
struct AcceptLoop {
    socket: Arc<ListenerSocket>,
    cancel: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    done: Receiver<()>,
    handle: Option<JoinHandle<()>>,
    local_addr: SocketAddr,
}

impl AcceptLoop {
    fn spawn(
        settings: &AcceptorSettings,
        pool: Arc<WorkerPool>,
        dispatcher: Dispatcher,
    ) -> Result<Self, ListenerError> {
        let socket = Arc::new(ListenerSocket::bind(
            &settings.host,
            settings.port,
            settings.accept_timeout,
        )?);
        let cancel = Arc::new(AtomicBool::new(false));
        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, done) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name(ACCEPT_THREAD_NAME.to_owned())
            .spawn({
                let socket = Arc::clone(&socket);
                let cancel = Arc::clone(&cancel);
                let running = Arc::clone(&running);
                move || {
                    // Dropping the sender on exit, even by panic, signals completion.
                    let _done = done_tx;
                    run_accept_loop(&socket, &cancel, &pool, &dispatcher);
                    socket.close();
                    running.store(false, Ordering::SeqCst);
                }
            })
            .map_err(|source| ListenerError::ThreadSpawn { source })?;

        let local_addr = socket.local_addr();
        Ok(Self {
            socket,
            cancel,
            running,
            done,
            handle: Some(handle),
            local_addr,
        })
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn shutdown(mut self, grace: Duration) -> ShutdownReport {
        self.cancel.store(true, Ordering::SeqCst);
        if self.wait(grace) {
            return ShutdownReport::graceful();
        }

        warn!(
            target: TRANSPORT_TARGET,
            addr = %self.local_addr,
            grace_ms = grace.as_millis(),
            "accept thread still running; closing listening socket"
        );
        self.socket.close();
        if self.wait(grace) {
            return ShutdownReport::escalated(1, 0);
        }
        error!(
            target: TRANSPORT_TARGET,
            addr = %self.local_addr,
            "accept thread ignored forced shutdown; detaching"
        );
        self.handle = None;
        ShutdownReport::escalated(1, 1)
    }

    fn wait(&mut self, grace: Duration) -> bool {
        match self.done.recv_timeout(grace) {
            Err(RecvTimeoutError::Timeout) => false,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take()
                    && handle.join().is_err()
                {
                    error!(target: TRANSPORT_TARGET, "accept thread panicked");
                }
                true
            }
        }
    }
}

impl Drop for AcceptLoop {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::SeqCst);
        self.socket.close();
    }
}

fn run_accept_loop(
    socket: &ListenerSocket,
    cancel: &AtomicBool,
    pool: &WorkerPool,
    dispatcher: &Dispatcher,
) {
    debug!(
        target: TRANSPORT_TARGET,
        addr = %socket.local_addr(),
        "accept loop running"
    );
    while !cancel.load(Ordering::SeqCst) {
        match socket.accept() {
            Ok(Some(stream)) => submit(pool, dispatcher, stream),
            Ok(None) => {}
            Err(error) => {
                if !cancel.load(Ordering::SeqCst) && !socket.is_closed() {
                    error!(
                        target: TRANSPORT_TARGET,
                        addr = %socket.local_addr(),
                        error = %error,
                        "accept failed; listener stopping"
                    );
                }
                break;
            }
        }
    }
    debug!(
        target: TRANSPORT_TARGET,
        addr = %socket.local_addr(),
        "accept loop finished"
    );
}

fn submit(pool: &WorkerPool, dispatcher: &Dispatcher, stream: TcpStream) {
    let peer = stream.peer_addr().ok();
    let dispatcher = dispatcher.clone();
    if let Err(error) = pool.execute(stream, move |stream| {
        dispatcher.handshake(stream).run_logged();
    }) {
        warn!(
            target: TRANSPORT_TARGET,
            peer = ?peer,
            error = %error,
            "connection refused by worker pool"
        );
    }
}

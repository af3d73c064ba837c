//! Fixed-size worker pool for connection tasks.
//!
//! Jobs travel over a bounded channel, so a burst of connections beyond the
//! queue depth is refused instead of buffered without limit. The pool keeps a
//! duplicate handle of every connection it owns; the forced shutdown phase
//! uses those handles to sever connections whose tasks would otherwise block
//! forever.

use std::collections::HashMap;
use std::net::{Shutdown, TcpStream};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use super::{PoolError, ShutdownReport, TRANSPORT_TARGET};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Bounded pool of named worker threads.
#[derive(Debug)]
pub struct WorkerPool {
    sender: Mutex<Option<SyncSender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shared: Arc<Shared>,
    next_id: AtomicU64,
    threads: usize,
}

#[derive(Debug, Default)]
struct Shared {
    cancelled: AtomicBool,
    in_flight: Mutex<HashMap<u64, TcpStream>>,
    live: Mutex<usize>,
    exited: Condvar,
}

impl WorkerPool {
    /// Starts `threads` workers behind a queue holding `queue` pending jobs.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoWorkers`] for an empty pool and
    /// [`PoolError::Spawn`] when a thread cannot be started; workers already
    /// running are released in that case.
    pub fn new(threads: usize, queue: usize) -> Result<Self, PoolError> {
        if threads == 0 {
            return Err(PoolError::NoWorkers);
        }
        let (sender, receiver) = mpsc::sync_channel::<Job>(queue);
        let receiver = Arc::new(Mutex::new(receiver));
        let shared = Arc::new(Shared::default());
        let mut workers = Vec::with_capacity(threads);

        for index in 0..threads {
            *lock(&shared.live) += 1;
            let spawned = thread::Builder::new()
                .name(format!("backtalk-worker-{index}"))
                .spawn({
                    let receiver = Arc::clone(&receiver);
                    let shared = Arc::clone(&shared);
                    move || worker_loop(&receiver, &shared)
                });
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    *lock(&shared.live) -= 1;
                    return Err(PoolError::Spawn { index, source });
                }
            }
        }

        debug!(target: TRANSPORT_TARGET, threads, queue, "worker pool started");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
            shared,
            next_id: AtomicU64::new(0),
            threads,
        })
    }

    /// Number of worker threads the pool was built with.
    #[must_use]
    pub const fn threads(&self) -> usize {
        self.threads
    }

    /// Connections submitted and not yet released by their task.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        lock(&self.shared.in_flight).len()
    }

    /// Returns `true` once [`WorkerPool::shutdown`] has been called.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        lock(&self.sender).is_none()
    }

    /// Queues `task` to run on a worker with ownership of `stream`.
    ///
    /// The connection stays tracked until the task returns. A task still
    /// queued when the forced shutdown phase begins is dropped unrun, closing
    /// its connection.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Saturated`] when the queue is full and
    /// [`PoolError::ShuttingDown`] after shutdown began. The stream is closed
    /// in both cases.
    pub fn execute<F>(&self, stream: TcpStream, task: F) -> Result<(), PoolError>
    where
        F: FnOnce(TcpStream) + Send + 'static,
    {
        let sender = lock(&self.sender);
        let Some(sender) = sender.as_ref() else {
            return Err(PoolError::ShuttingDown);
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match stream.try_clone() {
            Ok(handle) => {
                lock(&self.shared.in_flight).insert(id, handle);
            }
            Err(error) => warn!(
                target: TRANSPORT_TARGET,
                error = %error,
                "could not duplicate connection handle; forced shutdown cannot sever it"
            ),
        }

        let shared = Arc::clone(&self.shared);
        let job: Job = Box::new(move || {
            let _release = InFlight {
                shared: &shared,
                id,
            };
            if shared.cancelled.load(Ordering::SeqCst) {
                return;
            }
            task(stream);
        });

        match sender.try_send(job) {
            Ok(()) => Ok(()),
            Err(refused) => {
                lock(&self.shared.in_flight).remove(&id);
                match refused {
                    TrySendError::Full(_) => Err(PoolError::Saturated),
                    TrySendError::Disconnected(_) => Err(PoolError::ShuttingDown),
                }
            }
        }
    }

    /// Stops the pool in two bounded phases.
    ///
    /// The graceful phase closes the queue and waits up to `grace` for the
    /// workers to drain it. If workers remain, the forced phase discards
    /// queued jobs, severs every tracked connection and waits up to `grace`
    /// again. Workers that survive both phases are detached. Calling this
    /// again after completion reports a graceful stop.
    pub fn shutdown(&self, grace: Duration) -> ShutdownReport {
        drop(lock(&self.sender).take());

        let remaining = self.shared.wait_for_exit(grace);
        if remaining == 0 {
            self.join_workers();
            debug!(target: TRANSPORT_TARGET, "worker pool drained");
            return ShutdownReport::graceful();
        }

        warn!(
            target: TRANSPORT_TARGET,
            remaining,
            grace_ms = grace.as_millis(),
            "workers still busy; severing connections"
        );
        self.shared.cancelled.store(true, Ordering::SeqCst);
        let severed = self.shared.sever_all();
        let still_running = self.shared.wait_for_exit(grace);
        if still_running == 0 {
            self.join_workers();
            info!(target: TRANSPORT_TARGET, severed, "worker pool stopped after forced phase");
        } else {
            lock(&self.workers).clear();
            error!(
                target: TRANSPORT_TARGET,
                remaining = still_running,
                "workers ignored forced shutdown; detaching"
            );
        }
        ShutdownReport::escalated(remaining, still_running)
    }

    fn join_workers(&self) {
        let workers = std::mem::take(&mut *lock(&self.workers));
        for worker in workers {
            if worker.join().is_err() {
                error!(target: TRANSPORT_TARGET, "worker thread panicked");
            }
        }
    }
}

impl Shared {
    fn wait_for_exit(&self, grace: Duration) -> usize {
        let live = lock(&self.live);
        let (live, _) = self
            .exited
            .wait_timeout_while(live, grace, |live| *live > 0)
            .unwrap_or_else(PoisonError::into_inner);
        *live
    }

    fn sever_all(&self) -> usize {
        let in_flight = lock(&self.in_flight);
        for stream in in_flight.values() {
            if let Err(error) = stream.shutdown(Shutdown::Both) {
                debug!(target: TRANSPORT_TARGET, error = %error, "connection already closed");
            }
        }
        in_flight.len()
    }
}

fn worker_loop(receiver: &Mutex<Receiver<Job>>, shared: &Shared) {
    let _exit = WorkerExit { shared };
    loop {
        let next = lock(receiver).recv();
        let Ok(job) = next else {
            break;
        };
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            error!(target: TRANSPORT_TARGET, "connection task panicked");
        }
    }
}

struct InFlight<'a> {
    shared: &'a Shared,
    id: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        lock(&self.shared.in_flight).remove(&self.id);
    }
}

struct WorkerExit<'a> {
    shared: &'a Shared,
}

impl Drop for WorkerExit<'_> {
    fn drop(&mut self) {
        let mut live = lock(&self.shared.live);
        *live = live.saturating_sub(1);
        self.shared.exited.notify_all();
    }
}

// Pool state is only ever left consistent between statements, so a poisoned
// lock is still usable.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

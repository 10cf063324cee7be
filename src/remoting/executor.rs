//! Bounded worker pool for work that must not run on transport threads.
//!
//! Jobs are plain blocking closures. Each worker hands its job to the
//! runtime's blocking pool, so at most `workers` jobs run at once and none of
//! them occupies an async worker thread.

use crate::error::ExecutorError;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of workers draining a bounded queue.
///
/// Submission never blocks: a full queue rejects the job.
pub struct BoundedExecutor {
    name: String,
    sender: mpsc::Sender<Job>,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl BoundedExecutor {
    /// Spawn `workers` workers on `runtime` sharing a queue of `capacity`.
    pub fn new(name: impl Into<String>, workers: usize, capacity: usize, runtime: &Handle) -> Self {
        let name = name.into();
        let (sender, receiver) = mpsc::channel::<Job>(capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let shutdown = CancellationToken::new();

        let handles = (0..workers.max(1))
            .map(|worker| {
                let receiver = Arc::clone(&receiver);
                let shutdown = shutdown.clone();
                let name = name.clone();
                let blocking = runtime.clone();
                runtime.spawn(async move {
                    loop {
                        let job = tokio::select! {
                            job = async { receiver.lock().await.recv().await } => job,
                            _ = shutdown.cancelled() => None,
                        };
                        let Some(job) = job else {
                            break;
                        };
                        if let Err(e) = blocking.spawn_blocking(job).await {
                            error!(executor = %name, worker, error = %e, "Executor job panicked");
                        }
                    }
                    debug!(executor = %name, worker, "Executor worker exiting");
                })
            })
            .collect();

        Self {
            name,
            sender,
            shutdown,
            workers: Mutex::new(handles),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a job.
    pub fn execute<F>(&self, job: F) -> Result<(), ExecutorError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            return Err(ExecutorError::Shutdown {
                name: self.name.clone(),
            });
        }
        self.sender.try_send(Box::new(job)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => ExecutorError::Rejected {
                name: self.name.clone(),
            },
            mpsc::error::TrySendError::Closed(_) => ExecutorError::Shutdown {
                name: self.name.clone(),
            },
        })
    }

    /// Jobs waiting in the queue.
    pub fn queued(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Stop the workers. Queued jobs that have not started are dropped.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        self.workers.lock().clear();
    }
}

impl Drop for BoundedExecutor {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl std::fmt::Debug for BoundedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedExecutor")
            .field("name", &self.name)
            .field("queued", &self.queued())
            .finish()
    }
}

//! Background worker pool for chunk loads.
//!
//! A small fixed pool of threads drains a job channel. Each scheduled job
//! hands back a [`TaskHandle`]; callers that need quiescence (tests, the
//! batch CLI) wait on the handles, everyone else fires and forgets. Jobs
//! run to completion: there is no cancellation of in-flight loads.

use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Result, StrataError};

type Job = Box<dyn FnOnce() -> Result<()> + Send + 'static>;

struct JobEnvelope {
    job: Job,
    done: Sender<Result<()>>,
}

/// Handle to one scheduled background task.
pub struct TaskHandle {
    done: Receiver<Result<()>>,
}

impl TaskHandle {
    /// Block until the task finishes and return its outcome. A worker that
    /// disappeared before reporting counts as an invariant violation.
    pub fn wait(self) -> Result<()> {
        self.done
            .recv()
            .unwrap_or_else(|_| Err(StrataError::InvariantViolation("worker exited before reporting".into())))
    }

    /// Non-blocking probe; `None` while the task is still running.
    pub fn try_wait(&self) -> Option<Result<()>> {
        self.done.recv_timeout(Duration::from_millis(0)).ok()
    }
}

/// Fixed-size pool of load workers.
pub struct Scheduler {
    sender: Option<Sender<JobEnvelope>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn `threads` workers (at least one).
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let (sender, receiver) = channel::<JobEnvelope>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..threads)
            .map(|i| {
                let receiver = Arc::clone(&receiver);
                thread::Builder::new()
                    .name(format!("strata-load-{i}"))
                    .spawn(move || Self::worker_loop(receiver))
                    .expect("spawn load worker")
            })
            .collect();

        Self {
            sender: Some(sender),
            workers,
        }
    }

    fn worker_loop(receiver: Arc<Mutex<Receiver<JobEnvelope>>>) {
        loop {
            let envelope = {
                let rx = receiver.lock();
                match rx.recv_timeout(Duration::from_millis(50)) {
                    Ok(env) => env,
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            };
            let outcome = (envelope.job)();
            if let Err(err) = &outcome {
                debug!(%err, "background load task failed");
            }
            // Nobody waiting on the handle is fine.
            let _ = envelope.done.send(outcome);
        }
    }

    /// Queue `job` on the pool and return a handle to await it.
    pub fn schedule<F>(&self, job: F) -> TaskHandle
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        let (done_tx, done_rx) = channel();
        let envelope = JobEnvelope {
            job: Box::new(job),
            done: done_tx,
        };
        if let Some(sender) = &self.sender {
            if let Err(send_err) = sender.send(envelope) {
                // Pool already shut down; report through the handle.
                let _ = send_err.0.done.send(Err(StrataError::InvariantViolation(
                    "scheduler is shut down".into(),
                )));
            }
        }
        TaskHandle { done: done_rx }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

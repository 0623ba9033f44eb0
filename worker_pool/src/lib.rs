// Copyright 2025 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

#![deny(warnings)]
// Enable all clippy lints except for many of the pedantic ones. It's a shame this needs to be copied and pasted across crates, but there doesn't appear to be a way to include inner attributes from a common source.
#![deny(
    clippy::all,
    clippy::default_trait_access,
    clippy::expl_impl_clone_on_copy,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::unseparated_literal_suffix,
    clippy::used_underscore_binding
)]
// It is often more clear to show that nothing is being moved.
#![allow(clippy::match_ref_pats)]
// Subjective style.
#![allow(
    clippy::len_without_is_empty,
    clippy::redundant_field_names,
    clippy::too_many_arguments
)]
// Default isn't as big a deal as people seem to think it is.
#![allow(clippy::new_without_default, clippy::new_ret_no_self)]
// Arc<Mutex> can be more clear than needing to grok Orderings:
#![allow(clippy::mutex_atomic)]

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};

/// The closure a worker runs for one job.
pub type Work<T> = Box<dyn FnOnce() -> Result<T, String> + Send>;

///
/// The work submitted for one node: an opaque caller context plus the closure to run. Workers
/// never see any state beyond what the closure captured.
///
pub struct Job<C, T> {
    pub context: C,
    pub work: Work<T>,
}

///
/// What came out the other end: the job's context and either the value its closure returned or
/// the error it produced.
///
pub struct JobResult<C, T> {
    pub context: C,
    pub result: Result<T, String>,
}

impl<C, T> JobResult<C, T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

enum Message<C, T> {
    Run(Job<C, T>),
    Stop,
}

///
/// A bounded set of worker threads sharing a FIFO job queue and a FIFO result queue.
///
/// Jobs go in with `push_job` and `JobResult`s come out with `pop_result`, in completion order. A
/// failing or panicking closure is captured as an error result; the worker that ran it returns to
/// service either way.
///
pub struct WorkerPool<C, T> {
    worker_count: usize,
    jobs_tx: Sender<Message<C, T>>,
    jobs_rx: Receiver<Message<C, T>>,
    results_tx: Sender<JobResult<C, T>>,
    results_rx: Receiver<JobResult<C, T>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl<C: Send + 'static, T: Send + 'static> WorkerPool<C, T> {
    pub fn new(worker_count: usize) -> WorkerPool<C, T> {
        assert!(worker_count > 0, "Invalid worker_count {worker_count}");
        let (jobs_tx, jobs_rx) = crossbeam_channel::unbounded();
        let (results_tx, results_rx) = crossbeam_channel::unbounded();
        WorkerPool {
            worker_count,
            jobs_tx,
            jobs_rx,
            results_tx,
            results_rx,
            workers: Vec::new(),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn start(&mut self) {
        for index in 0..self.worker_count {
            let jobs = self.jobs_rx.clone();
            let results = self.results_tx.clone();
            let handle = thread::Builder::new()
                .name(format!("worker-{index}"))
                .spawn(move || Self::work_loop(&jobs, &results))
                .expect("Failed to spawn a worker thread");
            self.workers.push(handle);
        }
    }

    /// Enqueues a job without blocking. Must not be called after `stop`.
    pub fn push_job(&self, job: Job<C, T>) {
        self.jobs_tx
            .send(Message::Run(job))
            .expect("The job queue outlives the pool");
    }

    ///
    /// Returns a result if one is available, waiting up to `timeout` for one to arrive when a
    /// timeout is given.
    ///
    pub fn pop_result(&self, timeout: Option<Duration>) -> Option<JobResult<C, T>> {
        match timeout {
            Some(timeout) => self.results_rx.recv_timeout(timeout).ok(),
            None => self.results_rx.try_recv().ok(),
        }
    }

    ///
    /// Delivers one stop sentinel per worker and joins them all. In-flight jobs run to
    /// completion first; their results remain poppable afterwards.
    ///
    pub fn stop(&mut self) {
        for _ in &self.workers {
            self.jobs_tx
                .send(Message::Stop)
                .expect("The job queue outlives the pool");
        }
        for handle in self.workers.drain(..) {
            handle.join().expect("A worker thread panicked");
        }
    }

    fn work_loop(jobs: &Receiver<Message<C, T>>, results: &Sender<JobResult<C, T>>) {
        while let Ok(Message::Run(job)) = jobs.recv() {
            let result = match panic::catch_unwind(AssertUnwindSafe(job.work)) {
                Ok(outcome) => outcome,
                Err(payload) => Err(panic_message(payload.as_ref())),
            };
            let _ = results.send(JobResult {
                context: job.context,
                result,
            });
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("job panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("job panicked: {message}")
    } else {
        "job panicked".to_owned()
    }
}

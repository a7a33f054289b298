//! Background threads that run prefetch decodes.
//!
//! A fixed set of worker threads pulls jobs from one shared channel. Jobs are
//! fire-and-forget: once sent, a job runs to completion and cannot be
//! cancelled. Dropping the pool sends a shutdown message per worker and joins
//! them after already queued jobs have run.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

/// A unit of background work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Message sent to the worker threads.
enum WorkerMessage {
    /// Run a job
    Run(Job),
    /// Exit the worker loop
    Shutdown,
}

/// Fixed-size pool of background threads.
pub struct WorkerPool {
    /// Sender for jobs to the worker threads
    job_tx: Sender<WorkerMessage>,
    /// Handles to the worker threads (for joining on drop)
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `size` worker threads.
    ///
    /// Returns `Err` if a thread fails to spawn; workers spawned before the
    /// failure are shut down again.
    pub fn spawn(size: usize) -> Result<Self, std::io::Error> {
        let (job_tx, job_rx) = mpsc::channel::<WorkerMessage>();
        let job_rx = Arc::new(Mutex::new(job_rx));

        let mut pool = Self {
            job_tx,
            workers: Vec::with_capacity(size),
        };

        for index in 0..size {
            let job_rx = Arc::clone(&job_rx);
            let handle = thread::Builder::new()
                .name(format!("frame-prefetch-{}", index))
                .spawn(move || {
                    log::debug!("Prefetch worker {} started", index);
                    Self::worker_loop(&job_rx);
                    log::debug!("Prefetch worker {} exiting", index);
                })?;
            pool.workers.push(handle);
        }

        log::info!("Spawned {} prefetch workers", size);
        Ok(pool)
    }

    /// Worker thread main loop.
    fn worker_loop(job_rx: &Mutex<Receiver<WorkerMessage>>) {
        loop {
            // The receiver lock is released before the job runs
            let message = job_rx.lock().recv();
            match message {
                Ok(WorkerMessage::Run(job)) => job(),
                Ok(WorkerMessage::Shutdown) => break,
                // Channel closed, exit
                Err(_) => break,
            }
        }
    }

    /// Queue a job. Returns false if the workers are gone.
    pub fn execute(&self, job: Job) -> bool {
        if self.job_tx.send(WorkerMessage::Run(job)).is_err() {
            log::error!("Failed to queue prefetch job: channel closed");
            return false;
        }
        true
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        log::debug!("Shutting down {} prefetch workers", self.workers.len());

        for _ in &self.workers {
            let _ = self.job_tx.send(WorkerMessage::Shutdown);
        }

        for handle in self.workers.drain(..) {
            if let Err(e) = handle.join() {
                log::warn!("Prefetch worker panicked: {:?}", e);
            }
        }
    }
}

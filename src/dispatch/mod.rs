//! Consumer dispatch pool.
//!
//! A broker task hands each submitted job to exactly one idle worker by
//! rendezvous: every idle worker advertises its private inbox on a shared
//! *ready* channel, and the broker pairs the next job with the next
//! advertised inbox. There is no shared queue under a lock; the bounded
//! submission channel is the only buffer and provides backpressure.
//!
//! ```text
//! submit -> [jobs] -> broker -> worker inbox (1 slot) -> handler
//!                       ^
//!           [ready] <---+--- idle workers advertise their inbox
//! ```
//!
//! `stop` lets in-flight jobs finish, including jobs already handed to an
//! inbox. Jobs still in the submission queue are dropped. `drain` first
//! hands out every queued job, then stops.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::PoolConfig;

/// Errors from submitting to the pool.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Dispatch pool stopped")]
    Stopped,

    #[error("Dispatch queue full")]
    Full,
}

/// Processes one job. An error is logged and isolated to that job.
#[async_trait]
pub trait JobHandler<J>: Send + Sync + 'static {
    type Error: fmt::Display + Send;

    async fn handle(&self, job: J) -> Result<(), Self::Error>;
}

/// Job outcome counters.
#[derive(Debug, Default)]
pub struct PoolStats {
    processed: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    active_workers: AtomicUsize,
}

impl PoolStats {
    /// Jobs whose handler returned `Ok`.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::SeqCst)
    }

    /// Worker tasks that have not yet exited.
    pub fn active_workers(&self) -> usize {
        self.active_workers.load(Ordering::SeqCst)
    }
}

type Inbox<J> = mpsc::Sender<J>;

struct Handles {
    broker: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

/// Fixed-size worker pool fed through a broker.
pub struct DispatchPool<J> {
    name: String,
    submit_tx: Mutex<Option<mpsc::Sender<J>>>,
    stop_tx: watch::Sender<bool>,
    handles: Mutex<Handles>,
    stats: Arc<PoolStats>,
}

impl<J: Send + 'static> DispatchPool<J> {
    /// Spawn the broker and `config.workers` workers.
    pub fn start<H>(name: impl Into<String>, config: &PoolConfig, handler: Arc<H>) -> Self
    where
        H: JobHandler<J>,
    {
        let name = name.into();
        let workers = config.workers.max(1);
        let (submit_tx, submit_rx) = mpsc::channel(config.queue_capacity.max(1));
        let (ready_tx, ready_rx) = mpsc::channel::<Inbox<J>>(workers);
        let (stop_tx, stop_rx) = watch::channel(false);
        let stats = Arc::new(PoolStats::default());

        let broker = tokio::spawn(broker(name.clone(), submit_rx, ready_rx, stop_rx.clone()));
        let worker_handles = (0..workers)
            .map(|id| {
                stats.active_workers.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(worker(
                    id,
                    handler.clone(),
                    ready_tx.clone(),
                    stop_rx.clone(),
                    stats.clone(),
                ))
            })
            .collect();

        info!(pool = %name, workers, queue_capacity = config.queue_capacity, "Dispatch pool started");

        Self {
            name,
            submit_tx: Mutex::new(Some(submit_tx)),
            stop_tx,
            handles: Mutex::new(Handles {
                broker: Some(broker),
                workers: worker_handles,
            }),
            stats,
        }
    }

    fn sender(&self) -> Option<mpsc::Sender<J>> {
        self.submit_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Queue a job, waiting while the queue is full.
    pub async fn submit(&self, job: J) -> Result<(), PoolError> {
        let sender = self.sender().ok_or(PoolError::Stopped)?;
        sender.send(job).await.map_err(|_| PoolError::Stopped)
    }

    /// Queue a job without waiting.
    pub fn try_submit(&self, job: J) -> Result<(), PoolError> {
        let sender = self.sender().ok_or(PoolError::Stopped)?;
        sender.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PoolError::Full,
            mpsc::error::TrySendError::Closed(_) => PoolError::Stopped,
        })
    }

    pub fn stats(&self) -> &Arc<PoolStats> {
        &self.stats
    }

    /// Signal all tasks to exit and wait for them. In-flight jobs finish.
    pub async fn stop(&self) {
        self.submit_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let _ = self.stop_tx.send(true);

        let (broker, workers) = {
            let mut handles = self.handles.lock().unwrap_or_else(|e| e.into_inner());
            (handles.broker.take(), std::mem::take(&mut handles.workers))
        };
        if let Some(broker) = broker {
            if let Err(e) = broker.await {
                error!(pool = %self.name, error = %e, "Broker task failed");
            }
        }
        for handle in workers {
            if let Err(e) = handle.await {
                error!(pool = %self.name, error = %e, "Worker task failed");
            }
        }
        info!(
            pool = %self.name,
            processed = self.stats.processed(),
            failed = self.stats.failed(),
            "Dispatch pool stopped"
        );
    }

    /// Stop accepting jobs, hand out everything queued, then stop.
    pub async fn drain(&self) {
        self.submit_tx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        let broker = self
            .handles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .broker
            .take();
        if let Some(broker) = broker {
            if let Err(e) = broker.await {
                error!(pool = %self.name, error = %e, "Broker task failed");
            }
        }
        self.stop().await;
    }
}

async fn broker<J>(
    pool: String,
    mut jobs: mpsc::Receiver<J>,
    mut ready: mpsc::Receiver<Inbox<J>>,
    mut stop: watch::Receiver<bool>,
) {
    'jobs: loop {
        let mut job = tokio::select! {
            biased;
            _ = stop.changed() => break,
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        // Pair the job with the next idle worker. A worker that exited
        // after advertising hands the job back.
        loop {
            let inbox = tokio::select! {
                biased;
                _ = stop.changed() => break 'jobs,
                inbox = ready.recv() => inbox,
            };
            let Some(inbox) = inbox else {
                break 'jobs;
            };
            match inbox.send(job).await {
                Ok(()) => continue 'jobs,
                Err(mpsc::error::SendError(returned)) => job = returned,
            }
        }
    }
    debug!(pool = %pool, "Broker exited");
}

async fn worker<J, H>(
    id: usize,
    handler: Arc<H>,
    ready: mpsc::Sender<Inbox<J>>,
    mut stop: watch::Receiver<bool>,
    stats: Arc<PoolStats>,
) where
    J: Send + 'static,
    H: JobHandler<J>,
{
    let (inbox_tx, mut inbox) = mpsc::channel::<J>(1);

    loop {
        if *stop.borrow_and_update() {
            break;
        }
        let advertised = tokio::select! {
            biased;
            _ = stop.changed() => false,
            sent = ready.send(inbox_tx.clone()) => sent.is_ok(),
        };
        if !advertised {
            break;
        }
        let job = tokio::select! {
            biased;
            _ = stop.changed() => None,
            job = inbox.recv() => job,
        };
        match job {
            Some(job) => run_job(id, handler.as_ref(), job, &stats).await,
            None => break,
        }
    }

    // Finish a job the broker handed over just before stop.
    inbox.close();
    while let Ok(job) = inbox.try_recv() {
        run_job(id, handler.as_ref(), job, &stats).await;
    }

    stats.active_workers.fetch_sub(1, Ordering::SeqCst);
    debug!(worker = id, "Worker exited");
}

async fn run_job<J, H>(worker: usize, handler: &H, job: J, stats: &PoolStats)
where
    J: Send + 'static,
    H: JobHandler<J>,
{
    match AssertUnwindSafe(handler.handle(job)).catch_unwind().await {
        Ok(Ok(())) => {
            stats.processed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Err(e)) => {
            stats.failed.fetch_add(1, Ordering::SeqCst);
            warn!(worker, error = %e, "Job failed");
        }
        Err(_) => {
            stats.panicked.fetch_add(1, Ordering::SeqCst);
            error!(worker, "Job handler panicked");
        }
    }
}

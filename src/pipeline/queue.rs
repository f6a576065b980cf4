//! Job queue and dispatcher.
//!
//! Jobs are document ids on an unbounded channel. The dispatcher takes a
//! worker permit per job and runs it as its own task, so at most
//! `worker_concurrency` pipelines execute at once. On shutdown the dispatcher
//! stops taking jobs and waits for the running ones; queued ids stay Pending
//! in the database and are re-enqueued by startup recovery.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

use super::processor::VerificationOrchestrator;
use crate::models::DocumentId;

pub type JobSender = mpsc::UnboundedSender<DocumentId>;
pub type JobReceiver = mpsc::UnboundedReceiver<DocumentId>;

pub fn job_channel() -> (JobSender, JobReceiver) {
    mpsc::unbounded_channel()
}

/// Handle for the running dispatcher task.
pub struct DispatcherHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl DispatcherHandle {
    /// Stop taking new jobs and wait for in-flight ones to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.handle).await {
            tracing::error!(error = %e, "Dispatcher task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// Spawn the dispatcher on the current runtime.
pub fn spawn_dispatcher(
    orchestrator: Arc<VerificationOrchestrator>,
    jobs: JobReceiver,
    worker_concurrency: usize,
) -> DispatcherHandle {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let workers = worker_concurrency.max(1);
    let handle = tokio::spawn(dispatch_loop(orchestrator, jobs, workers, shutdown_rx));

    tracing::info!(workers, "Verification dispatcher started");

    DispatcherHandle {
        shutdown_tx: Some(shutdown_tx),
        handle,
    }
}

async fn dispatch_loop(
    orchestrator: Arc<VerificationOrchestrator>,
    mut jobs: JobReceiver,
    workers: usize,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let permits = Arc::new(Semaphore::new(workers));
    let mut running = JoinSet::new();

    loop {
        let id = tokio::select! {
            _ = &mut shutdown_rx => break,
            Some(_) = running.join_next(), if !running.is_empty() => continue,
            job = jobs.recv() => match job {
                Some(id) => id,
                None => break,
            },
        };

        let permit = tokio::select! {
            _ = &mut shutdown_rx => break,
            permit = permits.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let orchestrator = orchestrator.clone();
        running.spawn(async move {
            let _permit = permit;
            orchestrator.run_job(id).await;
        });
    }

    if !running.is_empty() {
        tracing::info!(in_flight = running.len(), "Dispatcher draining in-flight jobs");
    }
    while running.join_next().await.is_some() {}
    tracing::info!("Verification dispatcher stopped");
}

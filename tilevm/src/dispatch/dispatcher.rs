//! Scoped worker threads, one per exchange.

use super::{
    DispatchError, DispatchReport, FailurePolicy, Task, TileFailure, TileOutcome, TileResult,
};
use crate::config::TASK_QUEUE_DEPTH_PER_WORKER;
use crate::exchange::{InvocationStage, TileExchange};
use crate::log::Logger;
use crate::tile::TileCoord;
use crate::{log_debug, log_error, log_info, log_warn};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Runs tasks across a fixed set of exchanges.
pub struct Dispatcher {
    policy: FailurePolicy,
    cancel: CancellationToken,
    logger: Arc<dyn Logger>,
}

impl Dispatcher {
    pub fn new(policy: FailurePolicy, logger: Arc<dyn Logger>) -> Self {
        Self {
            policy,
            cancel: CancellationToken::new(),
            logger,
        }
    }

    /// Cancel runs from outside. Each run uses a child of `token`, so a
    /// fail-fast abort inside one run does not cancel the parent.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Process `tasks` with one worker per exchange.
    ///
    /// Blocks until every task has a result. With no exchanges, every task
    /// fails with [`DispatchError::NoHealthyWorkers`].
    pub fn run<E: TileExchange>(&self, tasks: Vec<Task>, exchanges: Vec<E>) -> DispatchReport {
        let started = Instant::now();
        let workers = exchanges.len();
        let coords: HashMap<usize, TileCoord> =
            tasks.iter().map(|t| (t.index, t.coord())).collect();
        let token = self.cancel.child_token();

        log_debug!(
            self.logger,
            "dispatching {} tiles to {} workers ({})",
            tasks.len(),
            workers,
            self.policy
        );

        let mut results = Vec::with_capacity(tasks.len());
        let mut first_failure = None;

        if workers == 0 {
            for task in tasks {
                let failure = TileFailure::new(
                    task.coord(),
                    InvocationStage::Invoke,
                    DispatchError::NoHealthyWorkers,
                );
                first_failure.get_or_insert(task.index);
                results.push(TileResult::failed(task.index, failure, None));
            }
        } else {
            let depth = workers * TASK_QUEUE_DEPTH_PER_WORKER;
            let (task_tx, task_rx) = mpsc::sync_channel::<Task>(depth);
            let (result_tx, result_rx) = mpsc::channel::<TileResult>();
            let queue = Mutex::new(task_rx);
            let active = AtomicUsize::new(workers);

            thread::scope(|scope| {
                let feeder = Feeder {
                    tasks,
                    queue: task_tx,
                    results: result_tx.clone(),
                    token: &token,
                };
                if let Err(e) = thread::Builder::new()
                    .name("tile-feeder".to_string())
                    .spawn_scoped(scope, move || feeder.run())
                {
                    log_error!(self.logger, "failed to start tile feeder: {}", e);
                }

                for (id, exchange) in exchanges.into_iter().enumerate() {
                    let worker = Worker {
                        id,
                        queue: &queue,
                        results: result_tx.clone(),
                        token: &token,
                        active: &active,
                        policy: self.policy,
                        logger: self.logger.as_ref(),
                    };
                    // On spawn failure the worker is dropped here, which
                    // retires it like any other.
                    if let Err(e) = thread::Builder::new()
                        .name(format!("tile-worker-{}", id))
                        .spawn_scoped(scope, move || worker.run(exchange))
                    {
                        log_error!(self.logger, "failed to start tile worker {}: {}", id, e);
                    }
                }
                drop(result_tx);

                for result in result_rx {
                    if let TileOutcome::Failed(failure) = &result.outcome {
                        if first_failure.is_none() {
                            first_failure = Some(result.index);
                        }
                        log_warn!(self.logger, "{}", failure);
                    }
                    results.push(result);
                }
            });
        }

        // Anything still unaccounted for never reached a worker.
        if results.len() < coords.len() {
            let seen: std::collections::HashSet<usize> = results.iter().map(|r| r.index).collect();
            for (&index, &coord) in coords.iter().filter(|(i, _)| !seen.contains(i)) {
                let failure =
                    TileFailure::new(coord, InvocationStage::Invoke, DispatchError::WorkerLost);
                results.push(TileResult::failed(index, failure, None));
            }
        }

        let report = DispatchReport::new(results, workers, started.elapsed(), first_failure);
        log_info!(
            self.logger,
            "dispatched {} tiles in {:?}: {} processed, {} failed, {} cancelled",
            report.len(),
            report.elapsed(),
            report.processed_count(),
            report.failed_count(),
            report.cancelled_count()
        );
        report
    }
}

/// Feeds the bounded queue; stops feeding once the run is cancelled.
struct Feeder<'a> {
    tasks: Vec<Task>,
    queue: SyncSender<Task>,
    results: Sender<TileResult>,
    token: &'a CancellationToken,
}

impl Feeder<'_> {
    fn run(self) {
        for task in self.tasks {
            if self.token.is_cancelled() {
                let _ = self
                    .results
                    .send(TileResult::cancelled(task.index, task.coord(), None));
                continue;
            }
            if let Err(mpsc::SendError(task)) = self.queue.send(task) {
                let failure = TileFailure::new(
                    task.coord(),
                    InvocationStage::Invoke,
                    DispatchError::NoHealthyWorkers,
                );
                let _ = self
                    .results
                    .send(TileResult::failed(task.index, failure, None));
            }
        }
    }
}

/// One worker thread's share of the run.
///
/// Dropping a worker retires it. The last worker to retire drains whatever
/// is left in the queue so every task still gets a result.
struct Worker<'a> {
    id: usize,
    queue: &'a Mutex<Receiver<Task>>,
    results: Sender<TileResult>,
    token: &'a CancellationToken,
    active: &'a AtomicUsize,
    policy: FailurePolicy,
    logger: &'a dyn Logger,
}

impl Worker<'_> {
    fn next_task(&self) -> Option<Task> {
        let queue = self.queue.lock().unwrap_or_else(PoisonError::into_inner);
        queue.recv().ok()
    }

    fn run<E: TileExchange>(self, mut exchange: E) {
        loop {
            if !exchange.is_healthy() {
                log_warn!(
                    self.logger,
                    "worker {} retiring: {} exchange is no longer healthy",
                    self.id,
                    exchange.name()
                );
                break;
            }

            let Some(task) = self.next_task() else {
                break;
            };
            if self.token.is_cancelled() {
                let _ = self
                    .results
                    .send(TileResult::cancelled(task.index, task.coord(), Some(self.id)));
                continue;
            }

            let started = Instant::now();
            let invoked = panic::catch_unwind(AssertUnwindSafe(|| exchange.invoke(&task.tile)));
            let (outcome, retire) = match invoked {
                Ok(Ok(image)) => (TileOutcome::Processed(image), false),
                Ok(Err(e)) => (
                    TileOutcome::Failed(TileFailure::from_exchange(task.coord(), e)),
                    false,
                ),
                Err(payload) => {
                    let failure = TileFailure::new(
                        task.coord(),
                        InvocationStage::Invoke,
                        DispatchError::WorkerPanicked {
                            worker: self.id,
                            message: panic_message(payload.as_ref()),
                        },
                    );
                    (TileOutcome::Failed(failure), true)
                }
            };

            if matches!(outcome, TileOutcome::Failed(_)) && self.policy == FailurePolicy::FailFast {
                self.token.cancel();
            }

            let _ = self.results.send(TileResult {
                index: task.index,
                coord: task.coord(),
                outcome,
                worker: Some(self.id),
                elapsed: started.elapsed(),
            });

            if retire {
                break;
            }
        }
    }
}

impl Drop for Worker<'_> {
    fn drop(&mut self) {
        if self.active.fetch_sub(1, Ordering::AcqRel) != 1 {
            return;
        }
        // Last worker out: report everything still queued.
        let mut drained = 0usize;
        while let Some(task) = self.next_task() {
            let result = if self.token.is_cancelled() {
                TileResult::cancelled(task.index, task.coord(), None)
            } else {
                let failure = TileFailure::new(
                    task.coord(),
                    InvocationStage::Invoke,
                    DispatchError::NoHealthyWorkers,
                );
                TileResult::failed(task.index, failure, None)
            };
            let _ = self.results.send(result);
            drained += 1;
        }
        if drained > 0 {
            log_debug!(self.logger, "worker {} drained {} queued tiles", self.id, drained);
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

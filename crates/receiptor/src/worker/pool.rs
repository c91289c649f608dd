use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info};

use crate::error::WorkerError;
use crate::pipeline::ReceiptPipeline;
use crate::worker::job::{WorkItem, WorkResult};

/// Runs work items on a fixed set of threads sharing one pipeline.
///
/// Runs for different messages proceed in parallel. Two runs for the same
/// message are serialized by the receipt store, not by the pool.
pub struct WorkerPool {
    item_sender: Sender<WorkItem>,
    result_receiver: Receiver<WorkResult>,
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    /// Starts `worker_count` threads (at least one).
    pub fn new(pipeline: Arc<ReceiptPipeline>, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let (item_sender, item_receiver) = bounded::<WorkItem>(worker_count * 2);
        let (result_sender, result_receiver) = bounded::<WorkResult>(worker_count * 2);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let item_rx = item_receiver.clone();
            let result_tx = result_sender.clone();
            let shutdown_flag = Arc::clone(&shutdown);
            let worker_pipeline = Arc::clone(&pipeline);

            let handle = thread::spawn(move || {
                run_worker(worker_id, item_rx, result_tx, shutdown_flag, worker_pipeline);
            });

            workers.push(handle);
        }

        info!("Started {} workers", worker_count);

        Self {
            item_sender,
            result_receiver,
            workers,
            shutdown,
        }
    }

    /// Queues an item. Blocks while the queue is full.
    pub fn submit(&self, item: WorkItem) -> Result<(), WorkerError> {
        if self.shutdown.load(Ordering::Relaxed) {
            return Err(WorkerError::ChannelClosed);
        }

        self.item_sender
            .send(item)
            .map_err(|_| WorkerError::ChannelClosed)
    }

    pub fn try_recv_result(&self) -> Option<WorkResult> {
        self.result_receiver.try_recv().ok()
    }

    pub fn recv_result(&self) -> Option<WorkResult> {
        self.result_receiver.recv().ok()
    }

    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn wait(self) {
        // Dropping the sender lets idle workers exit.
        drop(self.item_sender);

        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }
}

fn run_worker(
    worker_id: usize,
    item_receiver: Receiver<WorkItem>,
    result_sender: Sender<WorkResult>,
    shutdown: Arc<AtomicBool>,
    pipeline: Arc<ReceiptPipeline>,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        match item_receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(item) => {
                debug!("Worker {} picked up: {}", worker_id, item.describe());

                let outcome = match &item {
                    WorkItem::Process(message) => pipeline.process_message(message),
                    WorkItem::Reprocess { receipt_id } => pipeline.reprocess(*receipt_id),
                };

                if let Err(e) = &outcome {
                    error!("Worker {} failed to {}: {}", worker_id, item.describe(), e);
                }

                if let Err(e) = result_sender.send(WorkResult { item, outcome }) {
                    error!("Worker {} failed to send result: {}", worker_id, e);
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                continue;
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                debug!("Worker {} work channel disconnected", worker_id);
                break;
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}

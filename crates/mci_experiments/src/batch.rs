//! Off-thread batch execution.
//!
//! A batch runs on its own worker thread and reports back over a channel:
//! zero or more [BatchMessage::Progress] values, then exactly one terminal
//! message ([BatchMessage::Complete], or [BatchMessage::Failed] if the worker
//! could not run the batch at all).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use mci_core::scenario::ScenarioConfig;
use serde::{Deserialize, Serialize};

use crate::error::ExperimentError;
use crate::metrics::MonteCarloReport;
use crate::runner::{run_monte_carlo_with, MonteCarloOptions};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub config: ScenarioConfig,
    pub runs: usize,
    pub base_seed: u64,
    #[serde(default)]
    pub num_threads: Option<usize>,
}

impl BatchRequest {
    /// A request for `config.monte_carlo_runs` replications.
    pub fn from_config(config: ScenarioConfig, base_seed: u64) -> Self {
        let runs = config.monte_carlo_runs;
        Self {
            config,
            runs,
            base_seed,
            num_threads: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BatchMessage {
    /// Completed fraction in `[0, 1]`, non-decreasing.
    Progress(f64),
    Complete(MonteCarloReport),
    Failed(String),
}

impl BatchMessage {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BatchMessage::Progress(_))
    }
}

pub struct BatchHandle {
    receiver: Receiver<BatchMessage>,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl BatchHandle {
    /// Requests cancellation. Replications not yet started are skipped and
    /// running ones stop at their next event; the batch still completes with a
    /// report that counts them as cancelled.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Blocks for the next message.
    pub fn recv(&self) -> Result<BatchMessage, RecvError> {
        self.receiver.recv()
    }

    /// Drains messages until the terminal one, feeding progress to `on_progress`.
    pub fn wait_with<F>(mut self, mut on_progress: F) -> Result<MonteCarloReport, String>
    where
        F: FnMut(f64),
    {
        let outcome = loop {
            match self.receiver.recv() {
                Ok(BatchMessage::Progress(fraction)) => on_progress(fraction),
                Ok(BatchMessage::Complete(report)) => break Ok(report),
                Ok(BatchMessage::Failed(message)) => break Err(message),
                Err(_) => break Err("batch worker exited without a result".to_string()),
            }
        };
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        outcome
    }

    pub fn wait(self) -> Result<MonteCarloReport, String> {
        self.wait_with(|_| {})
    }
}

/// Validates `request` and starts it on a worker thread.
pub fn spawn_batch(request: BatchRequest) -> Result<BatchHandle, ExperimentError> {
    request.config.validate_batch(request.runs)?;

    let (sender, receiver) = mpsc::channel();
    let cancel = Arc::new(AtomicBool::new(false));
    let worker_cancel = Arc::clone(&cancel);

    let worker = thread::Builder::new()
        .name("mci-batch".to_string())
        .spawn(move || {
            let mut options = MonteCarloOptions::new(request.runs, request.base_seed);
            options.num_threads = request.num_threads;
            let progress_sender = sender.clone();
            let result = run_monte_carlo_with(&request.config, &options, &worker_cancel, |fraction| {
                let _ = progress_sender.send(BatchMessage::Progress(fraction));
            });
            let terminal = match result {
                Ok(report) => BatchMessage::Complete(report),
                Err(err) => BatchMessage::Failed(err.to_string()),
            };
            let _ = sender.send(terminal);
        })?;

    Ok(BatchHandle {
        receiver,
        cancel,
        worker: Some(worker),
    })
}

use std::panic::{self, AssertUnwindSafe};

use tokio::sync::mpsc;

/// A unit of work executed on the delivery loop.
pub type DeliveryTask = Box<dyn FnOnce() + Send + 'static>;

/// A single-consumer execution context that runs posted tasks later, in
/// posting order, without blocking the caller.
pub trait DeliveryContext: Send + Sync {
    fn post(&self, task: DeliveryTask);
}

/// Producer half of the delivery queue. Cheap to clone; every clone feeds the
/// same [`DeliveryLoop`].
#[derive(Clone, Debug)]
pub struct DeliveryQueue {
    sender: mpsc::UnboundedSender<DeliveryTask>,
}

/// Consumer half of the delivery queue. There is exactly one per queue, and
/// every listener callback runs on whichever thread or task drives it.
///
/// | Driver                 | Use                                              |
/// |------------------------|--------------------------------------------------|
/// | [`run`](Self::run)     | spawned onto a tokio runtime                     |
/// | [`run_blocking`](Self::run_blocking) | a dedicated OS thread (a "main loop") |
/// | [`drain`](Self::drain) | a host that pumps its own loop, and tests         |
pub struct DeliveryLoop {
    receiver: mpsc::UnboundedReceiver<DeliveryTask>,
}

impl DeliveryQueue {
    pub fn new() -> (Self, DeliveryLoop) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, DeliveryLoop { receiver })
    }
}

impl DeliveryContext for DeliveryQueue {
    fn post(&self, task: DeliveryTask) {
        if self.sender.send(task).is_err() {
            log::debug!("[delivery_queue] loop is gone, dropping task");
        }
    }
}

impl DeliveryLoop {
    /// Runs tasks until every [`DeliveryQueue`] handle has been dropped.
    pub async fn run(mut self) {
        while let Some(task) = self.receiver.recv().await {
            execute(task);
        }
        log::debug!("[delivery_loop] all producers dropped, exiting");
    }

    /// Blocking variant of [`run`](Self::run). Must not be called from within
    /// an async context.
    pub fn run_blocking(mut self) {
        while let Some(task) = self.receiver.blocking_recv() {
            execute(task);
        }
        log::debug!("[delivery_loop] all producers dropped, exiting");
    }

    /// Runs every task queued so far and returns how many ran.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.receiver.try_recv() {
            execute(task);
            ran += 1;
        }
        ran
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

/// Runs one task; a panic is logged and does not end the loop.
fn execute(task: DeliveryTask) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        log::error!("[delivery_loop] listener panicked: {}", msg);
    }
}

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use super::MessageStore;
use crate::messages::Message;
use crate::runtime::ExitSignal;

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(10);
const BACKLOG_WARNING: usize = 100;

type SharedReceiver = Arc<Mutex<mpsc::UnboundedReceiver<Message>>>;

enum Received {
    Message(Message),
    Idle,
    Closed,
    Exit,
}

/// Drains the message channel into a [`MessageStore`].
pub struct StorageObserver {
    store: Arc<dyn MessageStore>,
    rx: SharedReceiver,
    exit: ExitSignal,
    parallel: bool,
    workers: usize,
    timeout: Duration,
}

impl StorageObserver {
    pub fn new(
        store: Arc<dyn MessageStore>,
        rx: mpsc::UnboundedReceiver<Message>,
        exit: ExitSignal,
    ) -> Self {
        Self {
            store,
            rx: Arc::new(Mutex::new(rx)),
            exit,
            parallel: false,
            workers: 1,
            timeout: RECEIVE_TIMEOUT,
        }
    }

    /// Uses `workers` consumers sharing the channel when `parallel` is set.
    pub fn with_workers(mut self, parallel: bool, workers: usize) -> Self {
        self.parallel = parallel;
        self.workers = workers.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn run(self) {
        if !self.parallel {
            info!("Starting single storage worker");
            worker(0, self.store, self.rx, self.exit, self.timeout).await;
            return;
        }

        info!(workers = self.workers, "Starting parallel storage workers");
        let mut tasks = JoinSet::new();
        for id in 0..self.workers {
            tasks.spawn(worker(
                id,
                self.store.clone(),
                self.rx.clone(),
                self.exit.clone(),
                self.timeout,
            ));
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Storage worker panicked");
            }
        }
    }
}

async fn receive(rx: &SharedReceiver, exit: &ExitSignal, timeout: Duration) -> Received {
    let mut rx = rx.lock().await;
    let backlog = rx.len();
    if backlog > BACKLOG_WARNING {
        error!(backlog, "Storage queue is too big");
    }

    tokio::select! {
        _ = exit.wait() => Received::Exit,
        received = tokio::time::timeout(timeout, rx.recv()) => match received {
            Ok(Some(message)) => Received::Message(message),
            Ok(None) => Received::Closed,
            Err(_) => Received::Idle,
        },
    }
}

async fn worker(
    id: usize,
    store: Arc<dyn MessageStore>,
    rx: SharedReceiver,
    exit: ExitSignal,
    timeout: Duration,
) {
    info!(worker = id, "Storage worker started");
    while !exit.is_set() {
        match receive(&rx, &exit, timeout).await {
            Received::Message(message) => {
                if let Err(e) = store.store(&message).await {
                    error!(
                        worker = id,
                        source_address = message.data().source_address,
                        error = %e,
                        "Failed to store message"
                    );
                }
            }
            Received::Idle => debug!(worker = id, "No messages to store"),
            Received::Closed => {
                info!(worker = id, "Message channel closed");
                break;
            }
            Received::Exit => break,
        }
    }
    info!(worker = id, "Storage worker exiting");
}

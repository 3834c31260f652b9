use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Process wide stop flag shared by every task.
#[derive(Clone, Debug)]
pub struct ExitSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ExitSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn set(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_set(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the signal is set.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in self, so the channel cannot close while waiting.
        let _ = rx.wait_for(|set| *set).await;
    }

    /// Sets the signal on Ctrl-C.
    pub fn set_on_ctrl_c(&self) {
        let signal = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupt received, shutting down");
                signal.set();
            }
        });
    }
}

impl Default for ExitSignal {
    fn default() -> Self {
        Self::new()
    }
}

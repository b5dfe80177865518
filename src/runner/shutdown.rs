//! Cooperative cancellation shared by the polling loop and the executor.
//!
//! A single [`ShutdownController`] fans out to any number of cloned
//! [`ShutdownToken`]s. Tokens observe cancellation; they cannot cause it.

use tokio::sync::watch;

pub fn channel() -> (ShutdownController, ShutdownToken) {
    let (tx, rx) = watch::channel(false);
    (ShutdownController { tx }, ShutdownToken { rx })
}

/// The triggering half. Dropping it without calling [`trigger`] leaves all
/// tokens pending forever, which is the correct "never cancelled" behavior.
///
/// [`trigger`]: ShutdownController::trigger
pub struct ShutdownController {
    tx: watch::Sender<bool>,
}

impl ShutdownController {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

#[derive(Clone)]
pub struct ShutdownToken {
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is triggered. Never resolves if the
    /// controller goes away without triggering.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
